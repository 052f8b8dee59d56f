use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{ErrorInfo, OcrText, Worksheet, WorksheetMetadata};
use crate::db::types::{ClassId, ProcessingStage, StudentId, WorksheetId, WorksheetStatus};
use crate::services::scoring::{NormalizedScore, QuestionScore, RawGradingResult, ScoreOverride};
use crate::services::worksheets::{ManualGrade, ManualScore, RegradeRequest, SubmitWorksheet};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmitWorksheetRequest {
    #[validate(length(min = 1, max = 2048, message = "fileRef must not be empty"))]
    pub(crate) file_ref: String,
    #[validate(length(min = 1, message = "mimeType must not be empty"))]
    pub(crate) mime_type: String,
    #[serde(default)]
    pub(crate) student_id: Option<String>,
    #[serde(default)]
    pub(crate) class_id: Option<String>,
    #[serde(default)]
    #[validate(length(max = 255, message = "originalName is too long"))]
    pub(crate) original_name: Option<String>,
    #[serde(default)]
    pub(crate) subject: Option<String>,
    #[serde(default)]
    pub(crate) grade_level: Option<String>,
    #[serde(default)]
    pub(crate) assignment: Option<String>,
    #[serde(default)]
    #[validate(length(max = 4000, message = "customInstructions is too long"))]
    pub(crate) custom_instructions: Option<String>,
    #[serde(default)]
    pub(crate) rubric: Option<Value>,
    #[serde(default)]
    pub(crate) tone: Option<String>,
}

impl SubmitWorksheetRequest {
    /// Parses the roster ids. A blank id is passed on as absent.
    pub(crate) fn into_submission(self) -> Result<SubmitWorksheet, String> {
        let student_id = parse_optional_id::<StudentId>(self.student_id, "Invalid student ID")?;
        let class_id = parse_optional_id::<ClassId>(self.class_id, "Invalid class ID")?;
        Ok(SubmitWorksheet {
            file_ref: self.file_ref,
            mime_type: self.mime_type,
            student_id,
            class_id,
            metadata: WorksheetMetadata {
                original_name: self.original_name,
                subject: self.subject,
                grade_level: self.grade_level,
                assignment: self.assignment,
                custom_instructions: self.custom_instructions,
                rubric: self.rubric,
                tone: self.tone,
            },
        })
    }
}

fn parse_optional_id<T: std::str::FromStr>(
    value: Option<String>,
    message: &str,
) -> Result<Option<T>, String> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(|_| message.to_string()),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RegradeWorksheetRequest {
    #[serde(default)]
    pub(crate) rubric: Option<Value>,
    #[serde(default)]
    pub(crate) subject: Option<String>,
    #[serde(default)]
    pub(crate) grade_level: Option<String>,
}

impl From<RegradeWorksheetRequest> for RegradeRequest {
    fn from(request: RegradeWorksheetRequest) -> Self {
        Self { rubric: request.rubric, subject: request.subject, grade_level: request.grade_level }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ManualGradeRequest {
    #[serde(default)]
    pub(crate) question_scores: Option<Vec<QuestionScore>>,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 100.0, message = "finalScore must be between 0 and 100"))]
    pub(crate) final_score: Option<f64>,
    #[serde(default)]
    pub(crate) overrides: Option<Vec<ScoreOverride>>,
    #[serde(default)]
    #[validate(length(max = 10000, message = "feedback is too long"))]
    pub(crate) feedback: Option<String>,
}

impl ManualGradeRequest {
    /// Exactly one score form must be present.
    pub(crate) fn into_manual_grade(self) -> Result<ManualGrade, String> {
        let score = match (self.question_scores, self.final_score, self.overrides) {
            (Some(questions), None, None) => ManualScore::Questions(questions),
            (None, Some(score), None) => ManualScore::Final(score),
            (None, None, Some(overrides)) => ManualScore::Overrides(overrides),
            (None, None, None) => {
                return Err("one of questionScores, finalScore or overrides is required".into())
            }
            _ => {
                return Err("only one of questionScores, finalScore or overrides may be set".into())
            }
        };
        Ok(ManualGrade { score, feedback: self.feedback })
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListWorksheetsQuery {
    #[serde(default)]
    pub(crate) limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WorksheetResponse {
    pub(crate) id: WorksheetId,
    pub(crate) student_id: StudentId,
    pub(crate) class_id: ClassId,
    pub(crate) student_name: String,
    pub(crate) class_name: String,
    pub(crate) file_ref: String,
    pub(crate) mime_type: String,
    pub(crate) metadata: WorksheetMetadata,
    pub(crate) status: WorksheetStatus,
    pub(crate) processing_stage: ProcessingStage,
    pub(crate) progress: u8,
    pub(crate) ocr_result: Option<OcrText>,
    pub(crate) grading_result: Option<RawGradingResult>,
    pub(crate) normalized_score: Option<NormalizedScore>,
    pub(crate) feedback: Option<String>,
    pub(crate) error_info: Option<ErrorInfo>,
    pub(crate) locked: bool,
    pub(crate) manually_edited: bool,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
    pub(crate) completed_at: Option<String>,
}

impl From<Worksheet> for WorksheetResponse {
    fn from(worksheet: Worksheet) -> Self {
        Self {
            id: worksheet.id,
            student_id: worksheet.student_id,
            class_id: worksheet.class_id,
            student_name: worksheet.student_name,
            class_name: worksheet.class_name,
            file_ref: worksheet.file_ref,
            mime_type: worksheet.mime_type,
            metadata: worksheet.metadata,
            status: worksheet.status,
            processing_stage: worksheet.processing_stage,
            progress: worksheet.progress,
            ocr_result: worksheet.ocr_result,
            grading_result: worksheet.grading_result,
            normalized_score: worksheet.normalized_score,
            feedback: worksheet.feedback,
            error_info: worksheet.error_info,
            locked: worksheet.locked,
            manually_edited: worksheet.manually_edited,
            created_at: format_primitive(worksheet.created_at),
            updated_at: format_primitive(worksheet.updated_at),
            completed_at: worksheet.completed_at.map(format_primitive),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WorksheetListResponse {
    pub(crate) items: Vec<WorksheetResponse>,
    pub(crate) count: usize,
}
