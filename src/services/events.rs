//! Best-effort stage-transition notifications.

use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::db::models::Worksheet;
use crate::db::types::{WorksheetId, WorksheetStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum EventKind {
    WorksheetUploaded,
    OcrStarted,
    OcrCompleted,
    GradingStarted,
    GradingCompleted,
    WorksheetGraded,
    WorksheetFailed,
    ManualGradeApplied,
    RegradeRequested,
}

impl EventKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::WorksheetUploaded => "worksheet_uploaded",
            Self::OcrStarted => "ocr_started",
            Self::OcrCompleted => "ocr_completed",
            Self::GradingStarted => "grading_started",
            Self::GradingCompleted => "grading_completed",
            Self::WorksheetGraded => "worksheet_graded",
            Self::WorksheetFailed => "worksheet_failed",
            Self::ManualGradeApplied => "manual_grade_applied",
            Self::RegradeRequested => "regrade_requested",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PipelineEvent {
    pub(crate) event: EventKind,
    pub(crate) worksheet_id: WorksheetId,
    pub(crate) status: WorksheetStatus,
    pub(crate) progress: u8,
}

impl PipelineEvent {
    pub(crate) fn for_worksheet(event: EventKind, worksheet: &Worksheet) -> Self {
        Self {
            event,
            worksheet_id: worksheet.id,
            status: worksheet.status,
            progress: worksheet.progress,
        }
    }
}

/// Fan-out of [`PipelineEvent`]s to live subscribers. At-most-once, no replay.
#[derive(Clone)]
pub(crate) struct EventBus {
    tx: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Never fails; having no subscribers is not an error.
    pub(crate) fn publish(&self, event: PipelineEvent) {
        match self.tx.send(event) {
            Ok(count) => {
                tracing::debug!(subscribers = count, "pipeline event published");
            }
            Err(_) => {
                tracing::trace!("pipeline event dropped, no subscribers");
            }
        }
    }

    pub(crate) fn subscribe(&self) -> EventSubscription {
        EventSubscription { rx: self.tx.subscribe() }
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

pub(crate) struct EventSubscription {
    rx: broadcast::Receiver<PipelineEvent>,
}

impl EventSubscription {
    /// Next event, or `None` once the subscriber is dropped. A subscriber
    /// that falls behind the channel capacity is dropped rather than resumed.
    pub(crate) async fn next(&mut self) -> Option<PipelineEvent> {
        match self.rx.recv().await {
            Ok(event) => Some(event),
            Err(RecvError::Lagged(skipped)) => {
                metrics::counter!("notifications_dropped_total").increment(1);
                tracing::warn!(skipped, "event subscriber lagged, dropping it");
                None
            }
            Err(RecvError::Closed) => None,
        }
    }
}
