use std::time::Duration;

use tokio::signal;

use crate::tasks::pipeline::Pipeline;

pub(crate) const PIPELINE_DRAIN_GRACE: Duration = Duration::from_secs(30);

pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}

/// Lets in-flight pipeline runs reach their next persisted state before exit.
/// Runs still active after the grace period are abandoned mid-stage and can
/// be restarted with a re-grade.
pub(crate) async fn drain_pipeline(pipeline: &Pipeline, grace: Duration) {
    if pipeline.drain(grace).await {
        tracing::info!("pipeline drained");
    } else {
        tracing::warn!(grace_seconds = grace.as_secs(), "pipeline runs still active at shutdown");
    }
}
