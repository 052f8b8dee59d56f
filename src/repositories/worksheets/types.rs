use thiserror::Error;
use time::PrimitiveDateTime;

use crate::db::models::{ErrorInfo, OcrText, Worksheet, WorksheetMetadata};
use crate::db::types::{ProcessingStage, WorksheetId, WorksheetStatus};
use crate::services::scoring::{NormalizedScore, RawGradingResult};

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("worksheet {id} is corrupt: {reason}")]
    Corrupt { id: WorksheetId, reason: String },
}

/// Condition a write must satisfy against the stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteGuard {
    /// Pipeline write for one run: passes only while that run is current and
    /// the record is not locked by a manual grade.
    Run { generation: i64 },
    /// Human-initiated write (manual grade, re-grade): always passes.
    Override,
}

impl WriteGuard {
    pub(crate) fn permits(&self, record: &Worksheet) -> bool {
        match self {
            Self::Run { generation } => record.generation == *generation && !record.locked,
            Self::Override => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ApplyOutcome {
    Applied(Worksheet),
    Superseded,
    Missing,
}

/// Partial update. `None` leaves a field untouched; the nested `Option`
/// on clearable fields distinguishes "clear" from "keep".
#[derive(Debug, Clone, Default)]
pub(crate) struct WorksheetPatch {
    pub(crate) status: Option<WorksheetStatus>,
    pub(crate) processing_stage: Option<ProcessingStage>,
    pub(crate) progress: Option<u8>,
    pub(crate) ocr_result: Option<Option<OcrText>>,
    pub(crate) grading_result: Option<Option<RawGradingResult>>,
    pub(crate) normalized_score: Option<Option<NormalizedScore>>,
    pub(crate) feedback: Option<Option<String>>,
    pub(crate) error_info: Option<Option<ErrorInfo>>,
    pub(crate) completed_at: Option<Option<PrimitiveDateTime>>,
    pub(crate) metadata: Option<WorksheetMetadata>,
    pub(crate) locked: Option<bool>,
    pub(crate) manually_edited: Option<bool>,
    pub(crate) bump_generation: bool,
    /// Starts a new run: progress and stage may move backwards.
    pub(crate) restart: bool,
}

/// Applies `patch` to `record` in place. Shared by every store so the
/// monotonic progress and stage rules hold regardless of backend.
pub(crate) fn apply_patch(record: &mut Worksheet, patch: WorksheetPatch, now: PrimitiveDateTime) {
    if let Some(status) = patch.status {
        record.status = status;
    }
    if let Some(stage) = patch.processing_stage {
        record.processing_stage =
            if patch.restart { stage } else { record.processing_stage.max(stage) };
    }
    if let Some(progress) = patch.progress {
        let progress = progress.min(100);
        record.progress = if patch.restart { progress } else { record.progress.max(progress) };
    }
    if let Some(ocr_result) = patch.ocr_result {
        record.ocr_result = ocr_result;
    }
    if let Some(grading_result) = patch.grading_result {
        record.grading_result = grading_result;
    }
    if let Some(score) = patch.normalized_score {
        record.normalized_score = score;
    }
    if let Some(feedback) = patch.feedback {
        record.feedback = feedback;
    }
    if let Some(error_info) = patch.error_info {
        record.error_info = error_info;
    }
    if let Some(completed_at) = patch.completed_at {
        record.completed_at = completed_at;
    }
    if let Some(metadata) = patch.metadata {
        record.metadata = metadata;
    }
    if let Some(locked) = patch.locked {
        record.locked = locked;
    }
    if let Some(manually_edited) = patch.manually_edited {
        record.manually_edited = manually_edited;
    }
    if patch.bump_generation {
        record.generation += 1;
    }
    record.updated_at = now;
}
