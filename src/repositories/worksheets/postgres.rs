use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use time::PrimitiveDateTime;

use crate::core::time::primitive_now_utc;
use crate::db::models::{Worksheet, WorksheetRow};
use crate::db::types::{ClassId, WorksheetId, WorksheetStatus};

use super::types::{apply_patch, ApplyOutcome, StoreError, WorksheetPatch, WriteGuard};
use super::WorksheetStore;

const COLUMNS: &str = "id, student_id, class_id, student_name, class_name, file_ref, mime_type,
    metadata, status, processing_stage, progress, ocr_result, grading_result, normalized_score,
    feedback, error_info, locked, generation, manually_edited, created_at, updated_at, completed_at";

#[derive(Clone)]
pub(crate) struct PgWorksheetStore {
    pool: PgPool,
}

impl PgWorksheetStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorksheetStore for PgWorksheetStore {
    async fn insert(&self, worksheet: &Worksheet) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO worksheets ({COLUMNS})
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21,$22)"
        ))
        .bind(worksheet.id)
        .bind(worksheet.student_id)
        .bind(worksheet.class_id)
        .bind(&worksheet.student_name)
        .bind(&worksheet.class_name)
        .bind(&worksheet.file_ref)
        .bind(&worksheet.mime_type)
        .bind(Json(&worksheet.metadata))
        .bind(worksheet.status)
        .bind(worksheet.processing_stage)
        .bind(i16::from(worksheet.progress))
        .bind(worksheet.ocr_result.as_ref().map(Json))
        .bind(worksheet.grading_result.as_ref().map(Json))
        .bind(worksheet.normalized_score.as_ref().map(Json))
        .bind(&worksheet.feedback)
        .bind(worksheet.error_info.as_ref().map(Json))
        .bind(worksheet.locked)
        .bind(worksheet.generation)
        .bind(worksheet.manually_edited)
        .bind(worksheet.created_at)
        .bind(worksheet.updated_at)
        .bind(worksheet.completed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: WorksheetId) -> Result<Option<Worksheet>, StoreError> {
        let row = sqlx::query_as::<_, WorksheetRow>(&format!(
            "SELECT {COLUMNS} FROM worksheets WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(decode).transpose()
    }

    async fn apply(
        &self,
        id: WorksheetId,
        guard: WriteGuard,
        patch: WorksheetPatch,
    ) -> Result<ApplyOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, WorksheetRow>(&format!(
            "SELECT {COLUMNS} FROM worksheets WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(ApplyOutcome::Missing);
        };

        let mut worksheet = decode(row)?;
        if !guard.permits(&worksheet) {
            tx.rollback().await?;
            return Ok(ApplyOutcome::Superseded);
        }

        apply_patch(&mut worksheet, patch, primitive_now_utc());
        write_back(&mut tx, &worksheet).await?;
        tx.commit().await?;

        Ok(ApplyOutcome::Applied(worksheet))
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<Worksheet>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, WorksheetRow>(&format!(
            "SELECT {COLUMNS} FROM worksheets ORDER BY created_at DESC, id LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(decode).collect()
    }

    async fn list_graded_by_class(&self, class_id: ClassId) -> Result<Vec<Worksheet>, StoreError> {
        let rows = sqlx::query_as::<_, WorksheetRow>(&format!(
            "SELECT {COLUMNS} FROM worksheets
             WHERE class_id = $1 AND status = $2
             ORDER BY created_at"
        ))
        .bind(class_id)
        .bind(WorksheetStatus::Graded)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(decode).collect()
    }

    async fn list_graded(&self) -> Result<Vec<Worksheet>, StoreError> {
        let rows = sqlx::query_as::<_, WorksheetRow>(&format!(
            "SELECT {COLUMNS} FROM worksheets WHERE status = $1 ORDER BY created_at"
        ))
        .bind(WorksheetStatus::Graded)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(decode).collect()
    }

    async fn list_created_since(
        &self,
        since: PrimitiveDateTime,
    ) -> Result<Vec<Worksheet>, StoreError> {
        let rows = sqlx::query_as::<_, WorksheetRow>(&format!(
            "SELECT {COLUMNS} FROM worksheets WHERE created_at >= $1 ORDER BY created_at"
        ))
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(decode).collect()
    }

    async fn count_by_status(&self) -> Result<Vec<(WorksheetStatus, u64)>, StoreError> {
        let rows = sqlx::query_as::<_, (WorksheetStatus, i64)>(
            "SELECT status, COUNT(*) FROM worksheets GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(status, count)| (status, u64::try_from(count).unwrap_or(0)))
            .collect())
    }

    async fn delete(&self, id: WorksheetId) -> Result<bool, StoreError> {
        let result =
            sqlx::query("DELETE FROM worksheets WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn decode(row: WorksheetRow) -> Result<Worksheet, StoreError> {
    if !(0..=100).contains(&row.progress) {
        return Err(StoreError::Corrupt {
            id: row.id.into(),
            reason: format!("progress {} out of range", row.progress),
        });
    }
    Ok(Worksheet::from(row))
}

async fn write_back(
    tx: &mut Transaction<'_, Postgres>,
    worksheet: &Worksheet,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE worksheets
         SET metadata = $1,
             status = $2,
             processing_stage = $3,
             progress = $4,
             ocr_result = $5,
             grading_result = $6,
             normalized_score = $7,
             feedback = $8,
             error_info = $9,
             locked = $10,
             generation = $11,
             manually_edited = $12,
             updated_at = $13,
             completed_at = $14
         WHERE id = $15",
    )
    .bind(Json(&worksheet.metadata))
    .bind(worksheet.status)
    .bind(worksheet.processing_stage)
    .bind(i16::from(worksheet.progress))
    .bind(worksheet.ocr_result.as_ref().map(Json))
    .bind(worksheet.grading_result.as_ref().map(Json))
    .bind(worksheet.normalized_score.as_ref().map(Json))
    .bind(&worksheet.feedback)
    .bind(worksheet.error_info.as_ref().map(Json))
    .bind(worksheet.locked)
    .bind(worksheet.generation)
    .bind(worksheet.manually_edited)
    .bind(worksheet.updated_at)
    .bind(worksheet.completed_at)
    .bind(worksheet.id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
