use std::collections::HashMap;

use async_trait::async_trait;
use time::PrimitiveDateTime;
use tokio::sync::RwLock;

use crate::core::time::primitive_now_utc;
use crate::db::models::Worksheet;
use crate::db::types::{ClassId, WorksheetId, WorksheetStatus};

use super::types::{apply_patch, ApplyOutcome, StoreError, WorksheetPatch, WriteGuard};
use super::WorksheetStore;

#[derive(Default)]
pub(crate) struct MemoryWorksheetStore {
    records: RwLock<HashMap<WorksheetId, Worksheet>>,
}

impl MemoryWorksheetStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorksheetStore for MemoryWorksheetStore {
    async fn insert(&self, worksheet: &Worksheet) -> Result<(), StoreError> {
        self.records.write().await.insert(worksheet.id, worksheet.clone());
        Ok(())
    }

    async fn get(&self, id: WorksheetId) -> Result<Option<Worksheet>, StoreError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn apply(
        &self,
        id: WorksheetId,
        guard: WriteGuard,
        patch: WorksheetPatch,
    ) -> Result<ApplyOutcome, StoreError> {
        let mut records = self.records.write().await;
        let Some(current) = records.get(&id) else {
            return Ok(ApplyOutcome::Missing);
        };
        if !guard.permits(current) {
            return Ok(ApplyOutcome::Superseded);
        }

        let mut next = current.clone();
        apply_patch(&mut next, patch, primitive_now_utc());
        records.insert(id, next.clone());
        Ok(ApplyOutcome::Applied(next))
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<Worksheet>, StoreError> {
        let mut all: Vec<Worksheet> = self.records.read().await.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        all.truncate(limit);
        Ok(all)
    }

    async fn list_graded_by_class(&self, class_id: ClassId) -> Result<Vec<Worksheet>, StoreError> {
        let mut graded: Vec<Worksheet> = self
            .records
            .read()
            .await
            .values()
            .filter(|worksheet| {
                worksheet.class_id == class_id && worksheet.status == WorksheetStatus::Graded
            })
            .cloned()
            .collect();
        graded.sort_by_key(|worksheet| worksheet.created_at);
        Ok(graded)
    }

    async fn list_graded(&self) -> Result<Vec<Worksheet>, StoreError> {
        let mut graded: Vec<Worksheet> = self
            .records
            .read()
            .await
            .values()
            .filter(|worksheet| worksheet.status == WorksheetStatus::Graded)
            .cloned()
            .collect();
        graded.sort_by_key(|worksheet| worksheet.created_at);
        Ok(graded)
    }

    async fn list_created_since(
        &self,
        since: PrimitiveDateTime,
    ) -> Result<Vec<Worksheet>, StoreError> {
        let mut created: Vec<Worksheet> = self
            .records
            .read()
            .await
            .values()
            .filter(|worksheet| worksheet.created_at >= since)
            .cloned()
            .collect();
        created.sort_by_key(|worksheet| worksheet.created_at);
        Ok(created)
    }

    async fn count_by_status(&self) -> Result<Vec<(WorksheetStatus, u64)>, StoreError> {
        let mut counts: HashMap<WorksheetStatus, u64> = HashMap::new();
        for worksheet in self.records.read().await.values() {
            *counts.entry(worksheet.status).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }

    async fn delete(&self, id: WorksheetId) -> Result<bool, StoreError> {
        Ok(self.records.write().await.remove(&id).is_some())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
