pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;
pub(crate) mod tasks;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use anyhow::Context;

use crate::core::{config::Settings, shutdown, state::AppState, telemetry};
use crate::repositories::roster::PgRosterDirectory;
use crate::repositories::worksheets::PgWorksheetStore;
use crate::services::ai_grading::AiGradingService;
use crate::services::datalab_ocr::DatalabOcrService;
use crate::services::events::EventBus;
use crate::services::worksheets::WorksheetService;
use crate::tasks::pipeline::{Collaborators, Pipeline};

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let db_pool = db::init_pool(&settings).await?;
    db::run_migrations(&db_pool).await?;

    let store = Arc::new(PgWorksheetStore::new(db_pool.clone()));
    let roster = Arc::new(PgRosterDirectory::new(db_pool.clone()));

    let ai = Arc::new(AiGradingService::from_settings(&settings)?);
    let ocr = Arc::new(DatalabOcrService::from_settings(&settings)?);
    let collaborators = Collaborators { ocr, grader: ai.clone(), feedback: ai };

    let events = EventBus::new(settings.pipeline().event_channel_capacity);
    let pipeline = Pipeline::new(store.clone(), collaborators, events.clone(), settings.pipeline());
    let service = WorksheetService::new(
        store,
        roster,
        pipeline.clone(),
        events,
        settings.pipeline().allowed_mime_types.clone(),
    );

    let state = AppState::new(settings, service);
    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr())
        .await
        .with_context(|| format!("Failed to bind {}", state.settings().server_addr()))?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        concurrency = state.settings().pipeline().concurrency,
        "worksheet grader listening"
    );

    let result = axum::serve(listener, app).with_graceful_shutdown(shutdown::shutdown_signal()).await;

    shutdown::drain_pipeline(&pipeline, shutdown::PIPELINE_DRAIN_GRACE).await;
    db_pool.close().await;
    tracing::info!("database pool closed");

    result?;

    Ok(())
}
