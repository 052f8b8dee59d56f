//! Worksheet operations exposed to callers: submission, status, re-grade,
//! manual grading and class analytics.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::core::time::{format_primitive, primitive_now_utc};
use crate::db::models::{NewWorksheet, Worksheet, WorksheetMetadata};
use crate::db::types::{ClassId, ProcessingStage, StudentId, WorksheetId, WorksheetStatus};
use crate::repositories::roster::RosterDirectory;
use crate::repositories::worksheets::{
    ApplyOutcome, StoreError, WorksheetPatch, WorksheetStore, WriteGuard,
};
use crate::services::analytics::{
    self, ClassReport, ClassReports, FleetSummary, ReportingWindows, StudentPerformance,
};
use crate::services::events::{EventBus, EventKind, PipelineEvent};
use crate::services::scoring::{
    apply_overrides, normalize, question_totals, OverrideError, QuestionScore, RawGradingResult,
    ScoreOverride,
};
use crate::tasks::pipeline::stages::{GRADING_STARTED_PROGRESS, OCR_STARTED_PROGRESS};
use crate::tasks::pipeline::{Pipeline, RunTicket};

pub(crate) const DEFAULT_LIST_LIMIT: usize = 50;
pub(crate) const MAX_LIST_LIMIT: usize = 200;
const RECENT_LIMIT: usize = 10;

#[derive(Debug, Error)]
pub(crate) enum WorksheetError {
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<OverrideError> for WorksheetError {
    fn from(err: OverrideError) -> Self {
        Self::Validation(err.to_string())
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct SubmitWorksheet {
    pub(crate) file_ref: String,
    pub(crate) mime_type: String,
    pub(crate) student_id: Option<StudentId>,
    pub(crate) class_id: Option<ClassId>,
    pub(crate) metadata: WorksheetMetadata,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct RegradeRequest {
    pub(crate) rubric: Option<Value>,
    pub(crate) subject: Option<String>,
    pub(crate) grade_level: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ManualScore {
    Questions(Vec<QuestionScore>),
    Final(f64),
    Overrides(Vec<ScoreOverride>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ManualGrade {
    pub(crate) score: ManualScore,
    pub(crate) feedback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StudentGradesReport {
    pub(crate) class_id: ClassId,
    pub(crate) class_name: String,
    pub(crate) students: Vec<StudentPerformance>,
}

#[derive(Clone)]
pub(crate) struct WorksheetService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    store: Arc<dyn WorksheetStore>,
    roster: Arc<dyn RosterDirectory>,
    pipeline: Pipeline,
    events: EventBus,
    allowed_mime_types: Vec<String>,
}

impl WorksheetService {
    pub(crate) fn new(
        store: Arc<dyn WorksheetStore>,
        roster: Arc<dyn RosterDirectory>,
        pipeline: Pipeline,
        events: EventBus,
        allowed_mime_types: Vec<String>,
    ) -> Self {
        Self { inner: Arc::new(ServiceInner { store, roster, pipeline, events, allowed_mime_types }) }
    }

    pub(crate) fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Records the worksheet in `uploaded` and launches its pipeline run
    /// without waiting for it.
    pub(crate) async fn submit(&self, request: SubmitWorksheet) -> Result<Worksheet, WorksheetError> {
        let file_ref = request.file_ref.trim().to_string();
        if file_ref.is_empty() {
            return Err(WorksheetError::Validation("No file uploaded".to_string()));
        }
        let mime_type = request.mime_type.trim().to_ascii_lowercase();
        if !self.inner.allowed_mime_types.iter().any(|allowed| *allowed == mime_type) {
            return Err(WorksheetError::Validation(
                "Invalid file type. Only PDF, JPG, and PNG are allowed.".to_string(),
            ));
        }

        let class_id = request
            .class_id
            .ok_or_else(|| WorksheetError::Validation("classId is required".to_string()))?;
        let student_id = request
            .student_id
            .ok_or_else(|| WorksheetError::Validation("studentId is required".to_string()))?;

        let class = self
            .inner
            .roster
            .find_class(class_id)
            .await?
            .ok_or(WorksheetError::NotFound("Class not found"))?;
        let student = self
            .inner
            .roster
            .find_student(student_id)
            .await?
            .ok_or(WorksheetError::NotFound("Student not found"))?;

        let mut metadata = request.metadata;
        if metadata.subject.is_none() {
            metadata.subject = class.subject.clone();
        }
        if metadata.grade_level.is_none() {
            metadata.grade_level = class.grade_level.clone();
        }

        let worksheet = Worksheet::uploaded(
            NewWorksheet {
                student_id: student.id,
                class_id: class.id,
                student_name: student.name,
                class_name: class.name,
                file_ref,
                mime_type,
                metadata,
            },
            primitive_now_utc(),
        );
        self.inner.store.insert(&worksheet).await?;

        tracing::info!(worksheet_id = %worksheet.id, class_id = %class_id, "worksheet uploaded");
        self.inner
            .events
            .publish(PipelineEvent::for_worksheet(EventKind::WorksheetUploaded, &worksheet));
        self.inner.pipeline.launch(RunTicket::for_worksheet(&worksheet));

        Ok(worksheet)
    }

    pub(crate) async fn status(&self, id: WorksheetId) -> Result<Worksheet, WorksheetError> {
        self.inner.store.get(id).await?.ok_or(WorksheetError::NotFound("Worksheet not found"))
    }

    pub(crate) async fn list(&self, limit: Option<usize>) -> Result<Vec<Worksheet>, WorksheetError> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
        Ok(self.inner.store.list_recent(limit).await?)
    }

    pub(crate) async fn delete(&self, id: WorksheetId) -> Result<(), WorksheetError> {
        if !self.inner.store.delete(id).await? {
            return Err(WorksheetError::NotFound("Worksheet not found"));
        }
        tracing::info!(worksheet_id = %id, "worksheet deleted");
        Ok(())
    }

    /// Starts a fresh run. Any run still in flight for this worksheet is
    /// superseded by the generation bump.
    pub(crate) async fn regrade(
        &self,
        id: WorksheetId,
        request: RegradeRequest,
    ) -> Result<Worksheet, WorksheetError> {
        let current = self.status(id).await?;

        let mut metadata = current.metadata.clone();
        if request.rubric.is_some() {
            metadata.rubric = request.rubric;
        }
        if request.subject.is_some() {
            metadata.subject = request.subject;
        }
        if request.grade_level.is_some() {
            metadata.grade_level = request.grade_level;
        }

        let (status, stage, progress) = if current.ocr_result.is_some() {
            (WorksheetStatus::Grading, ProcessingStage::Grading, GRADING_STARTED_PROGRESS)
        } else {
            (WorksheetStatus::Processing, ProcessingStage::Ocr, OCR_STARTED_PROGRESS)
        };

        let patch = WorksheetPatch {
            status: Some(status),
            processing_stage: Some(stage),
            progress: Some(progress),
            grading_result: Some(None),
            normalized_score: Some(None),
            feedback: Some(None),
            error_info: Some(None),
            completed_at: Some(None),
            metadata: Some(metadata),
            locked: Some(false),
            manually_edited: Some(false),
            bump_generation: true,
            restart: true,
            ..WorksheetPatch::default()
        };

        let worksheet = self.apply_override(id, patch).await?;
        tracing::info!(worksheet_id = %id, generation = worksheet.generation, "re-grade requested");
        self.inner
            .events
            .publish(PipelineEvent::for_worksheet(EventKind::RegradeRequested, &worksheet));
        self.inner.pipeline.launch(RunTicket::for_worksheet(&worksheet));

        Ok(worksheet)
    }

    /// Writes a teacher-supplied grade and locks the worksheet against any
    /// in-flight pipeline run.
    pub(crate) async fn manual_grade(
        &self,
        id: WorksheetId,
        grade: ManualGrade,
    ) -> Result<Worksheet, WorksheetError> {
        let current = self.status(id).await?;

        let mut result = match grade.score {
            ManualScore::Final(score) => {
                if !score.is_finite() || !(0.0..=100.0).contains(&score) {
                    return Err(WorksheetError::Validation(
                        "finalScore must be between 0 and 100".to_string(),
                    ));
                }
                RawGradingResult::aggregate(score, 100.0)
            }
            ManualScore::Questions(questions) => {
                validate_questions(&questions)?;
                question_grade(questions)
            }
            ManualScore::Overrides(overrides) => {
                let existing = current
                    .grading_result
                    .as_ref()
                    .and_then(RawGradingResult::questions)
                    .ok_or(OverrideError::NoQuestions)?;
                let adjusted = apply_overrides(existing, &overrides)?;
                validate_questions(&adjusted)?;
                question_grade(adjusted)
            }
        }
        .with_detail("manual", Value::Bool(true));
        if let Some(previous) = &current.grading_result {
            result = result.with_common_errors(previous.common_errors.clone());
        }
        let score = normalize(&result);

        let mut patch = WorksheetPatch {
            status: Some(WorksheetStatus::Graded),
            processing_stage: Some(ProcessingStage::Completed),
            progress: Some(100),
            grading_result: Some(Some(result)),
            normalized_score: Some(Some(score)),
            error_info: Some(None),
            completed_at: Some(Some(primitive_now_utc())),
            locked: Some(true),
            manually_edited: Some(true),
            bump_generation: true,
            restart: true,
            ..WorksheetPatch::default()
        };
        if let Some(feedback) = grade.feedback.map(|text| text.trim().to_string()) {
            if !feedback.is_empty() {
                patch.feedback = Some(Some(feedback));
            }
        }

        let worksheet = self.apply_override(id, patch).await?;
        tracing::info!(
            worksheet_id = %id,
            generation = worksheet.generation,
            "manual grade applied"
        );
        self.inner
            .events
            .publish(PipelineEvent::for_worksheet(EventKind::ManualGradeApplied, &worksheet));

        Ok(worksheet)
    }

    pub(crate) async fn class_analytics(
        &self,
        class_id: ClassId,
    ) -> Result<ClassReport, WorksheetError> {
        let class = self
            .inner
            .roster
            .find_class(class_id)
            .await?
            .ok_or(WorksheetError::NotFound("Class not found"))?;
        let students = self.inner.roster.class_students(class_id).await?;
        let worksheets = self.inner.store.list_graded_by_class(class_id).await?;

        Ok(analytics::class_report(&class, &students, &worksheets))
    }

    pub(crate) async fn all_class_analytics(&self) -> Result<ClassReports, WorksheetError> {
        let classes = self.inner.roster.list_classes().await?;
        let mut reports = Vec::with_capacity(classes.len());
        for class in &classes {
            let students = self.inner.roster.class_students(class.id).await?;
            let worksheets = self.inner.store.list_graded_by_class(class.id).await?;
            reports.push(analytics::class_report(class, &students, &worksheets));
        }

        Ok(ClassReports {
            total_classes: reports.len(),
            generated_at: format_primitive(primitive_now_utc()),
            classes: reports,
        })
    }

    pub(crate) async fn student_grades(
        &self,
        class_id: ClassId,
    ) -> Result<StudentGradesReport, WorksheetError> {
        let class = self
            .inner
            .roster
            .find_class(class_id)
            .await?
            .ok_or(WorksheetError::NotFound("Class not found"))?;
        let students = self.inner.roster.class_students(class_id).await?;
        let worksheets = self.inner.store.list_graded_by_class(class_id).await?;

        Ok(StudentGradesReport {
            class_id: class.id,
            class_name: class.name,
            students: analytics::student_grades(&students, &worksheets),
        })
    }

    pub(crate) async fn fleet_summary(&self) -> Result<FleetSummary, WorksheetError> {
        let counts = self.inner.store.count_by_status().await?;
        let graded = self.inner.store.list_graded().await?;
        let recent = self.inner.store.list_recent(RECENT_LIMIT).await?;
        let windows = ReportingWindows::ending_at(primitive_now_utc());
        let windowed = self.inner.store.list_created_since(windows.earliest()).await?;

        Ok(analytics::fleet_summary(&counts, &graded, &recent, &windows, &windowed))
    }

    pub(crate) async fn ping(&self) -> Result<(), WorksheetError> {
        Ok(self.inner.store.ping().await?)
    }

    async fn apply_override(
        &self,
        id: WorksheetId,
        patch: WorksheetPatch,
    ) -> Result<Worksheet, WorksheetError> {
        match self.inner.store.apply(id, WriteGuard::Override, patch).await? {
            ApplyOutcome::Applied(worksheet) => Ok(worksheet),
            ApplyOutcome::Missing | ApplyOutcome::Superseded => {
                Err(WorksheetError::NotFound("Worksheet not found"))
            }
        }
    }
}

/// Manual question scores are stored as aggregate points, keeping the list as detail.
fn question_grade(questions: Vec<QuestionScore>) -> RawGradingResult {
    let (earned, possible) = question_totals(&questions);
    RawGradingResult::aggregate(earned, possible).with_detail("questions", json!(questions))
}

fn validate_questions(questions: &[QuestionScore]) -> Result<(), WorksheetError> {
    if questions.is_empty() {
        return Err(WorksheetError::Validation("questionScores must not be empty".to_string()));
    }
    for (index, question) in questions.iter().enumerate() {
        let number = index + 1;
        if !question.earned().is_finite() || question.earned() < 0.0 {
            return Err(WorksheetError::Validation(format!(
                "question {number}: score must be a non-negative number"
            )));
        }
        if !question.possible().is_finite() || question.possible() < 0.0 {
            return Err(WorksheetError::Validation(format!(
                "question {number}: maxScore must be a non-negative number"
            )));
        }
    }
    Ok(())
}
