// service/job_store.rs
//
// Read-only contract over the externally managed job-posting store. The
// core only needs creator, price and the soft-delete tombstone.
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::db::DBClient;
use crate::models::offermodel::JobPosting;
use crate::service::error::ServiceError;

#[async_trait]
pub trait JobPostingStore: Send + Sync {
    async fn get_job_posting(&self, id: Uuid) -> Result<Option<JobPosting>, ServiceError>;
}

#[derive(Debug, Clone)]
pub struct PgJobPostingStore {
    db_client: Arc<DBClient>,
}

impl PgJobPostingStore {
    pub fn new(db_client: Arc<DBClient>) -> Self {
        Self { db_client }
    }
}

#[async_trait]
impl JobPostingStore for PgJobPostingStore {
    async fn get_job_posting(&self, id: Uuid) -> Result<Option<JobPosting>, ServiceError> {
        let posting = sqlx::query_as::<_, JobPosting>(
            r#"
            SELECT id, created_by, title, price, status, created_at
            FROM job_postings
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db_client.pool)
        .await?;

        Ok(posting)
    }
}
