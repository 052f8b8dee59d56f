//! Stage executors and the store patches each transition writes.

use thiserror::Error;
use time::PrimitiveDateTime;

use crate::db::models::{ErrorInfo, OcrText, Worksheet};
use crate::db::types::{ProcessingStage, StageName, WorksheetStatus};
use crate::repositories::worksheets::WorksheetPatch;
use crate::services::collaborators::{
    FeedbackRequest, FeedbackWriter, GradeRequest, GradingModel, OcrEngine,
};
use crate::services::llm_json::grading_result_or_fallback;
use crate::services::scoring::{normalize, NormalizedScore, RawGradingResult};

pub(crate) const OCR_STARTED_PROGRESS: u8 = 20;
pub(crate) const OCR_DONE_PROGRESS: u8 = 60;
pub(crate) const GRADING_STARTED_PROGRESS: u8 = 70;
pub(crate) const GRADING_DONE_PROGRESS: u8 = 90;
pub(crate) const COMPLETE_PROGRESS: u8 = 100;

#[derive(Debug, Clone, Error, PartialEq)]
#[error("{stage} stage failed: {cause}")]
pub(crate) struct StageFailure {
    pub(crate) stage: StageName,
    pub(crate) cause: String,
}

impl StageFailure {
    pub(crate) fn new(stage: StageName, err: impl std::fmt::Display) -> Self {
        Self { stage, cause: err.to_string() }
    }
}

pub(crate) struct GradingOutput {
    pub(crate) result: RawGradingResult,
    pub(crate) score: NormalizedScore,
    pub(crate) used_fallback: bool,
}

pub(crate) async fn run_ocr(
    engine: &dyn OcrEngine,
    worksheet: &Worksheet,
) -> Result<OcrText, StageFailure> {
    let text = engine
        .extract(&worksheet.file_ref, &worksheet.mime_type)
        .await
        .map_err(|err| StageFailure::new(StageName::Ocr, format!("{err:#}")))?;

    if text.text.trim().is_empty() {
        return Err(StageFailure::new(StageName::Ocr, "no text extracted"));
    }
    Ok(text)
}

pub(crate) async fn run_grading(
    model: &dyn GradingModel,
    worksheet: &Worksheet,
    text: &OcrText,
) -> Result<GradingOutput, StageFailure> {
    let request = GradeRequest {
        text: text.text.clone(),
        rubric: worksheet.metadata.rubric.clone(),
        subject: worksheet.metadata.subject.clone().unwrap_or_else(|| "General".to_string()),
        grade_level: worksheet.metadata.grade_level.clone().unwrap_or_else(|| "All".to_string()),
        student_name: worksheet.student_name.clone(),
        custom_instructions: worksheet.metadata.custom_instructions.clone(),
    };

    let reply = model
        .grade(&request)
        .await
        .map_err(|err| StageFailure::new(StageName::Grading, format!("{err:#}")))?;

    let (result, used_fallback) = grading_result_or_fallback(&reply);
    let score = normalize(&result);
    Ok(GradingOutput { result, score, used_fallback })
}

pub(crate) async fn run_feedback(
    writer: &dyn FeedbackWriter,
    worksheet: &Worksheet,
    output: &GradingOutput,
    default_tone: &str,
) -> Result<String, StageFailure> {
    let request = FeedbackRequest {
        score: output.score.clone(),
        result: output.result.clone(),
        student_name: worksheet.student_name.clone(),
        subject: worksheet.metadata.subject.clone().unwrap_or_else(|| "General".to_string()),
        tone: worksheet.metadata.tone.clone().unwrap_or_else(|| default_tone.to_string()),
    };

    writer
        .write(&request)
        .await
        .map_err(|err| StageFailure::new(StageName::Feedback, format!("{err:#}")))
}

pub(crate) fn ocr_started() -> WorksheetPatch {
    WorksheetPatch {
        status: Some(WorksheetStatus::Processing),
        processing_stage: Some(ProcessingStage::Ocr),
        progress: Some(OCR_STARTED_PROGRESS),
        ..WorksheetPatch::default()
    }
}

pub(crate) fn ocr_completed(text: OcrText) -> WorksheetPatch {
    WorksheetPatch {
        ocr_result: Some(Some(text)),
        progress: Some(OCR_DONE_PROGRESS),
        ..WorksheetPatch::default()
    }
}

pub(crate) fn grading_started() -> WorksheetPatch {
    WorksheetPatch {
        status: Some(WorksheetStatus::Grading),
        processing_stage: Some(ProcessingStage::Grading),
        progress: Some(GRADING_STARTED_PROGRESS),
        ..WorksheetPatch::default()
    }
}

pub(crate) fn grading_completed(output: &GradingOutput) -> WorksheetPatch {
    WorksheetPatch {
        grading_result: Some(Some(output.result.clone())),
        normalized_score: Some(Some(output.score.clone())),
        progress: Some(GRADING_DONE_PROGRESS),
        ..WorksheetPatch::default()
    }
}

pub(crate) fn completed(feedback: Option<String>, now: PrimitiveDateTime) -> WorksheetPatch {
    WorksheetPatch {
        status: Some(WorksheetStatus::Graded),
        processing_stage: Some(ProcessingStage::Completed),
        progress: Some(COMPLETE_PROGRESS),
        feedback: Some(feedback),
        completed_at: Some(Some(now)),
        ..WorksheetPatch::default()
    }
}

/// Progress is left where the last successful step put it.
pub(crate) fn failed(failure: &StageFailure) -> WorksheetPatch {
    WorksheetPatch {
        status: Some(WorksheetStatus::Error),
        processing_stage: Some(ProcessingStage::Failed),
        error_info: Some(Some(ErrorInfo {
            stage: failure.stage,
            message: failure.cause.clone(),
        })),
        ..WorksheetPatch::default()
    }
}
