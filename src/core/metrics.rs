use std::sync::OnceLock;

use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);
    describe();
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

fn describe() {
    describe_counter!("pipeline_runs_total", "Pipeline runs by outcome");
    describe_histogram!(
        "pipeline_run_duration_seconds",
        Unit::Seconds,
        "Wall time of one pipeline run"
    );
    describe_histogram!(
        "pipeline_stage_duration_seconds",
        Unit::Seconds,
        "Collaborator call time per stage"
    );
    describe_counter!("grading_fallback_total", "Grading replies replaced by the fallback result");
    describe_counter!("notifications_dropped_total", "Event subscribers dropped for lagging");
    describe_counter!("http_requests_total", "HTTP responses by status");
    describe_histogram!("http_request_duration_seconds", Unit::Seconds, "HTTP request latency");
}
