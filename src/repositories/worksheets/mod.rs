mod postgres;
mod types;

#[cfg(test)]
mod memory;

use async_trait::async_trait;
use time::PrimitiveDateTime;

use crate::db::models::Worksheet;
use crate::db::types::{ClassId, WorksheetId, WorksheetStatus};

pub(crate) use postgres::PgWorksheetStore;
pub(crate) use types::{ApplyOutcome, StoreError, WorksheetPatch, WriteGuard};

#[cfg(test)]
pub(crate) use memory::MemoryWorksheetStore;

/// Durable worksheet records. Every write is atomic per record: readers
/// observe either the previous or the next full state.
#[async_trait]
pub(crate) trait WorksheetStore: Send + Sync {
    async fn insert(&self, worksheet: &Worksheet) -> Result<(), StoreError>;

    async fn get(&self, id: WorksheetId) -> Result<Option<Worksheet>, StoreError>;

    /// Read-modify-write under `guard`.
    async fn apply(
        &self,
        id: WorksheetId,
        guard: WriteGuard,
        patch: WorksheetPatch,
    ) -> Result<ApplyOutcome, StoreError>;

    /// Newest first.
    async fn list_recent(&self, limit: usize) -> Result<Vec<Worksheet>, StoreError>;

    async fn list_graded_by_class(&self, class_id: ClassId) -> Result<Vec<Worksheet>, StoreError>;

    async fn list_graded(&self) -> Result<Vec<Worksheet>, StoreError>;

    /// Any status, oldest first.
    async fn list_created_since(
        &self,
        since: PrimitiveDateTime,
    ) -> Result<Vec<Worksheet>, StoreError>;

    async fn count_by_status(&self) -> Result<Vec<(WorksheetStatus, u64)>, StoreError>;

    async fn delete(&self, id: WorksheetId) -> Result<bool, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
