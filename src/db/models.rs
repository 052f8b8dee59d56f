use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::db::types::{
    ClassId, ProcessingStage, StageName, StudentId, WorksheetId, WorksheetStatus,
};
use crate::services::scoring::{NormalizedScore, RawGradingResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WorksheetMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) original_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) grade_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) assignment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) custom_instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) rubric: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) tone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OcrText {
    pub(crate) text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ErrorInfo {
    pub(crate) stage: StageName,
    pub(crate) message: String,
}

/// The durable worksheet record.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Worksheet {
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
    pub(crate) generation: i64,
    pub(crate) manually_edited: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
    pub(crate) completed_at: Option<PrimitiveDateTime>,
}

pub(crate) struct NewWorksheet {
    pub(crate) student_id: StudentId,
    pub(crate) class_id: ClassId,
    pub(crate) student_name: String,
    pub(crate) class_name: String,
    pub(crate) file_ref: String,
    pub(crate) mime_type: String,
    pub(crate) metadata: WorksheetMetadata,
}

impl Worksheet {
    pub(crate) fn uploaded(new: NewWorksheet, now: PrimitiveDateTime) -> Self {
        Self {
            id: WorksheetId::new(),
            student_id: new.student_id,
            class_id: new.class_id,
            student_name: new.student_name,
            class_name: new.class_name,
            file_ref: new.file_ref,
            mime_type: new.mime_type,
            metadata: new.metadata,
            status: WorksheetStatus::Uploaded,
            processing_stage: ProcessingStage::Uploaded,
            progress: 0,
            ocr_result: None,
            grading_result: None,
            normalized_score: None,
            feedback: None,
            error_info: None,
            locked: false,
            generation: 0,
            manually_edited: false,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub(crate) fn is_graded(&self) -> bool {
        self.status == WorksheetStatus::Graded
            && self.grading_result.is_some()
            && self.normalized_score.is_some()
            && self.completed_at.is_some()
    }
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct WorksheetRow {
    pub(crate) id: Uuid,
    pub(crate) student_id: Uuid,
    pub(crate) class_id: Uuid,
    pub(crate) student_name: String,
    pub(crate) class_name: String,
    pub(crate) file_ref: String,
    pub(crate) mime_type: String,
    pub(crate) metadata: Json<WorksheetMetadata>,
    pub(crate) status: WorksheetStatus,
    pub(crate) processing_stage: ProcessingStage,
    pub(crate) progress: i16,
    pub(crate) ocr_result: Option<Json<OcrText>>,
    pub(crate) grading_result: Option<Json<RawGradingResult>>,
    pub(crate) normalized_score: Option<Json<NormalizedScore>>,
    pub(crate) feedback: Option<String>,
    pub(crate) error_info: Option<Json<ErrorInfo>>,
    pub(crate) locked: bool,
    pub(crate) generation: i64,
    pub(crate) manually_edited: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
    pub(crate) completed_at: Option<PrimitiveDateTime>,
}

impl From<WorksheetRow> for Worksheet {
    fn from(row: WorksheetRow) -> Self {
        Self {
            id: row.id.into(),
            student_id: row.student_id.into(),
            class_id: row.class_id.into(),
            student_name: row.student_name,
            class_name: row.class_name,
            file_ref: row.file_ref,
            mime_type: row.mime_type,
            metadata: row.metadata.0,
            status: row.status,
            processing_stage: row.processing_stage,
            progress: row.progress.clamp(0, 100) as u8,
            ocr_result: row.ocr_result.map(|value| value.0),
            grading_result: row.grading_result.map(|value| value.0),
            normalized_score: row.normalized_score.map(|value| value.0),
            feedback: row.feedback,
            error_info: row.error_info.map(|value| value.0),
            locked: row.locked,
            generation: row.generation,
            manually_edited: row.manually_edited,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub(crate) struct StudentRecord {
    pub(crate) id: StudentId,
    pub(crate) name: String,
    pub(crate) email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub(crate) struct ClassRecord {
    pub(crate) id: ClassId,
    pub(crate) name: String,
    pub(crate) subject: Option<String>,
    pub(crate) grade_level: Option<String>,
}
