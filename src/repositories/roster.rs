use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::models::{ClassRecord, StudentRecord};
use crate::db::types::{ClassId, StudentId};
use crate::repositories::worksheets::StoreError;

/// Read-only view of students, classes and class membership.
#[async_trait]
pub(crate) trait RosterDirectory: Send + Sync {
    async fn find_class(&self, id: ClassId) -> Result<Option<ClassRecord>, StoreError>;

    async fn find_student(&self, id: StudentId) -> Result<Option<StudentRecord>, StoreError>;

    async fn class_students(&self, id: ClassId) -> Result<Vec<StudentRecord>, StoreError>;

    /// Sorted by name.
    async fn list_classes(&self) -> Result<Vec<ClassRecord>, StoreError>;
}

#[derive(Clone)]
pub(crate) struct PgRosterDirectory {
    pool: PgPool,
}

impl PgRosterDirectory {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RosterDirectory for PgRosterDirectory {
    async fn find_class(&self, id: ClassId) -> Result<Option<ClassRecord>, StoreError> {
        let class = sqlx::query_as::<_, ClassRecord>(
            "SELECT id, name, subject, grade_level FROM classes WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(class)
    }

    async fn find_student(&self, id: StudentId) -> Result<Option<StudentRecord>, StoreError> {
        let student =
            sqlx::query_as::<_, StudentRecord>("SELECT id, name, email FROM students WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(student)
    }

    async fn class_students(&self, id: ClassId) -> Result<Vec<StudentRecord>, StoreError> {
        let students = sqlx::query_as::<_, StudentRecord>(
            "SELECT s.id, s.name, s.email
             FROM students s
             JOIN class_students cs ON cs.student_id = s.id
             WHERE cs.class_id = $1
             ORDER BY s.name",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(students)
    }

    async fn list_classes(&self) -> Result<Vec<ClassRecord>, StoreError> {
        let classes = sqlx::query_as::<_, ClassRecord>(
            "SELECT id, name, subject, grade_level FROM classes ORDER BY name, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(classes)
    }
}

#[cfg(test)]
pub(crate) use memory::MemoryRoster;
