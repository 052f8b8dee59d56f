//! Contracts of the external OCR and generative-model collaborators.

use async_trait::async_trait;
use serde_json::Value;

use crate::db::models::OcrText;
use crate::services::scoring::{NormalizedScore, RawGradingResult};

#[async_trait]
pub(crate) trait OcrEngine: Send + Sync {
    async fn extract(&self, file_ref: &str, mime_type: &str) -> anyhow::Result<OcrText>;
}

#[derive(Debug, Clone)]
pub(crate) struct GradeRequest {
    pub(crate) text: String,
    pub(crate) rubric: Option<Value>,
    pub(crate) subject: String,
    pub(crate) grade_level: String,
    pub(crate) student_name: String,
    pub(crate) custom_instructions: Option<String>,
}

/// Returns the model's reply verbatim; JSON recovery happens in the caller.
#[async_trait]
pub(crate) trait GradingModel: Send + Sync {
    async fn grade(&self, request: &GradeRequest) -> anyhow::Result<String>;
}

#[derive(Debug, Clone)]
pub(crate) struct FeedbackRequest {
    pub(crate) score: NormalizedScore,
    pub(crate) result: RawGradingResult,
    pub(crate) student_name: String,
    pub(crate) subject: String,
    pub(crate) tone: String,
}

#[async_trait]
pub(crate) trait FeedbackWriter: Send + Sync {
    async fn write(&self, request: &FeedbackRequest) -> anyhow::Result<String>;
}
