//! Detached per-worksheet pipeline runs: OCR, grading, feedback.
//!
//! A run is identified by `(worksheet_id, generation)`. Each transition is
//! persisted through [`WorksheetStore::apply`] under a run guard before the
//! next stage starts, so a run whose generation is stale, or whose worksheet
//! was locked by a manual grade, stops at its next write. Outcomes are only
//! observable through the store and the event bus.

pub(crate) mod stages;

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::core::config::PipelineSettings;
use crate::core::time::primitive_now_utc;
use crate::db::models::Worksheet;
use crate::db::types::{StageName, WorksheetId};
use crate::repositories::worksheets::{
    ApplyOutcome, StoreError, WorksheetPatch, WorksheetStore, WriteGuard,
};
use crate::services::collaborators::{FeedbackWriter, GradingModel, OcrEngine};
use crate::services::events::{EventBus, EventKind, PipelineEvent};

use stages::StageFailure;

#[derive(Clone)]
pub(crate) struct Collaborators {
    pub(crate) ocr: Arc<dyn OcrEngine>,
    pub(crate) grader: Arc<dyn GradingModel>,
    pub(crate) feedback: Arc<dyn FeedbackWriter>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RunTicket {
    pub(crate) worksheet_id: WorksheetId,
    pub(crate) generation: i64,
}

impl RunTicket {
    pub(crate) fn for_worksheet(worksheet: &Worksheet) -> Self {
        Self { worksheet_id: worksheet.id, generation: worksheet.generation }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RunOutcome {
    Graded,
    Failed(StageName),
    Superseded,
    Missing,
    StoreFailed,
    Cancelled,
}

impl RunOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Graded => "graded",
            Self::Failed(_) => "failed",
            Self::Superseded => "superseded",
            Self::Missing => "missing",
            Self::StoreFailed => "store_failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Why a run stopped before reaching a terminal write.
enum Halt {
    Superseded,
    Missing,
    Store(StoreError),
}

impl From<StoreError> for Halt {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

#[derive(Clone)]
pub(crate) struct Pipeline {
    inner: Arc<PipelineInner>,
}

struct PipelineInner {
    store: Arc<dyn WorksheetStore>,
    collaborators: Collaborators,
    events: EventBus,
    permits: Arc<Semaphore>,
    concurrency: usize,
    stage_timeout: Duration,
    default_tone: String,
}

impl Pipeline {
    pub(crate) fn new(
        store: Arc<dyn WorksheetStore>,
        collaborators: Collaborators,
        events: EventBus,
        settings: &PipelineSettings,
    ) -> Self {
        Self {
            inner: Arc::new(PipelineInner {
                store,
                collaborators,
                events,
                permits: Arc::new(Semaphore::new(settings.concurrency.max(1))),
                concurrency: settings.concurrency.max(1),
                stage_timeout: Duration::from_secs(settings.stage_timeout_seconds),
                default_tone: settings.feedback_tone.clone(),
            }),
        }
    }

    /// Spawns the run and returns immediately. At most `concurrency` runs
    /// execute at once; the rest wait for a permit.
    pub(crate) fn launch(&self, ticket: RunTicket) -> JoinHandle<RunOutcome> {
        let pipeline = self.clone();
        tokio::spawn(async move {
            let _permit = match pipeline.inner.permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    tracing::info!(
                        worksheet_id = %ticket.worksheet_id,
                        "pipeline closed, run not started"
                    );
                    return RunOutcome::Cancelled;
                }
            };
            pipeline.run(ticket).await
        })
    }

    /// Stops admitting runs and waits up to `grace` for in-flight runs to
    /// finish. Returns `false` when runs were still active at the deadline.
    pub(crate) async fn drain(&self, grace: Duration) -> bool {
        let permits = u32::try_from(self.inner.concurrency).unwrap_or(u32::MAX);
        let acquired = tokio::time::timeout(grace, self.inner.permits.acquire_many(permits)).await;
        self.inner.permits.close();
        matches!(acquired, Ok(Ok(_)))
    }

    pub(crate) async fn run(&self, ticket: RunTicket) -> RunOutcome {
        let worksheet_id = ticket.worksheet_id;
        let generation = ticket.generation;
        let timer = Instant::now();

        let outcome = match self.drive(ticket).await {
            Ok(outcome) => outcome,
            Err(Halt::Superseded) => {
                tracing::info!(%worksheet_id, generation, "pipeline run superseded, stopping");
                RunOutcome::Superseded
            }
            Err(Halt::Missing) => {
                tracing::info!(%worksheet_id, generation, "worksheet removed, stopping run");
                RunOutcome::Missing
            }
            Err(Halt::Store(err)) => {
                tracing::error!(%worksheet_id, generation, error = %err, "pipeline store write failed");
                RunOutcome::StoreFailed
            }
        };

        metrics::counter!("pipeline_runs_total", "outcome" => outcome.as_str()).increment(1);
        metrics::histogram!("pipeline_run_duration_seconds").record(timer.elapsed().as_secs_f64());
        outcome
    }

    async fn drive(&self, ticket: RunTicket) -> Result<RunOutcome, Halt> {
        let id = ticket.worksheet_id;
        let guard = WriteGuard::Run { generation: ticket.generation };
        let inner = &self.inner;

        let worksheet = inner.store.get(id).await?.ok_or(Halt::Missing)?;
        if !guard.permits(&worksheet) {
            return Err(Halt::Superseded);
        }

        let text = match worksheet.ocr_result.clone() {
            Some(text) => text,
            None => {
                let worksheet =
                    self.transition(id, guard, stages::ocr_started(), EventKind::OcrStarted).await?;
                let ocr = inner.collaborators.ocr.clone();
                let extracted = self
                    .timed(StageName::Ocr, async { stages::run_ocr(ocr.as_ref(), &worksheet).await })
                    .await;
                match extracted {
                    Ok(text) => {
                        self.transition(
                            id,
                            guard,
                            stages::ocr_completed(text.clone()),
                            EventKind::OcrCompleted,
                        )
                        .await?;
                        text
                    }
                    Err(failure) => return self.fail(id, guard, failure).await,
                }
            }
        };

        let worksheet =
            self.transition(id, guard, stages::grading_started(), EventKind::GradingStarted).await?;
        let grader = inner.collaborators.grader.clone();
        let graded = self
            .timed(StageName::Grading, async {
                stages::run_grading(grader.as_ref(), &worksheet, &text).await
            })
            .await;
        let output = match graded {
            Ok(output) => output,
            Err(failure) => return self.fail(id, guard, failure).await,
        };
        if output.used_fallback {
            metrics::counter!("grading_fallback_total").increment(1);
            tracing::warn!(worksheet_id = %id, "grading reply was unusable, stored fallback result");
        }
        let worksheet = self
            .transition(
                id,
                guard,
                stages::grading_completed(&output),
                EventKind::GradingCompleted,
            )
            .await?;

        let writer = inner.collaborators.feedback.clone();
        let feedback = self
            .timed(StageName::Feedback, async {
                stages::run_feedback(writer.as_ref(), &worksheet, &output, &inner.default_tone)
                    .await
            })
            .await;
        let feedback = match feedback {
            Ok(text) => Some(text),
            Err(failure) => {
                tracing::warn!(worksheet_id = %id, error = %failure, "feedback generation failed, grading stands");
                None
            }
        };

        self.transition(
            id,
            guard,
            stages::completed(feedback, primitive_now_utc()),
            EventKind::WorksheetGraded,
        )
        .await?;
        tracing::info!(worksheet_id = %id, generation = ticket.generation, "worksheet graded");

        Ok(RunOutcome::Graded)
    }

    async fn transition(
        &self,
        id: WorksheetId,
        guard: WriteGuard,
        patch: WorksheetPatch,
        event: EventKind,
    ) -> Result<Worksheet, Halt> {
        match self.inner.store.apply(id, guard, patch).await? {
            ApplyOutcome::Applied(worksheet) => {
                self.inner.events.publish(PipelineEvent::for_worksheet(event, &worksheet));
                Ok(worksheet)
            }
            ApplyOutcome::Superseded => Err(Halt::Superseded),
            ApplyOutcome::Missing => Err(Halt::Missing),
        }
    }

    async fn fail(
        &self,
        id: WorksheetId,
        guard: WriteGuard,
        failure: StageFailure,
    ) -> Result<RunOutcome, Halt> {
        tracing::error!(worksheet_id = %id, stage = %failure.stage, error = %failure.cause, "pipeline stage failed");
        self.transition(id, guard, stages::failed(&failure), EventKind::WorksheetFailed).await?;
        Ok(RunOutcome::Failed(failure.stage))
    }

    /// A collaborator that outlives the stage ceiling is a stage failure.
    async fn timed<T, F>(&self, stage: StageName, fut: F) -> Result<T, StageFailure>
    where
        F: Future<Output = Result<T, StageFailure>>,
    {
        let timer = Instant::now();
        let result = match tokio::time::timeout(self.inner.stage_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StageFailure::new(
                stage,
                format!("timed out after {}s", self.inner.stage_timeout.as_secs()),
            )),
        };
        metrics::histogram!("pipeline_stage_duration_seconds", "stage" => stage.as_str())
            .record(timer.elapsed().as_secs_f64());
        result
    }
}
