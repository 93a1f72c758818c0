use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::models::Job;

pub mod pg;

pub use pg::PgJobQueue;

pub const STATUS_QUEUED: &str = "queued";
pub const STATUS_PROCESSING: &str = "processing";
pub const STATUS_SUCCEEDED: &str = "succeeded";
pub const STATUS_FAILED: &str = "failed";

pub const JOB_EMBEDDING: &str = "embedding";
pub const JOB_CLAUSE_EXTRACTION: &str = "clause-extraction";
pub const JOB_RISK_ASSESSMENT: &str = "risk-assessment";
pub const JOB_DIFF: &str = "diff";

#[derive(Debug, Error)]
pub enum JobQueueError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("database pool error: {0}")]
    Pool(String),
    #[error("queue task panicked: {0}")]
    Task(String),
}

pub type JobQueueResult<T> = Result<T, JobQueueError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisJobPayload {
    pub contract_id: Uuid,
    pub version_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_version_id: Option<Uuid>,
}

#[async_trait]
pub trait JobQueue: Send + Sync + 'static {
    async fn enqueue(
        &self,
        job_type: &str,
        payload: Value,
        run_after: Option<NaiveDateTime>,
    ) -> JobQueueResult<Job>;

    /// Jobs stuck in `processing` past `reclaim_after` are claimed again.
    async fn reserve(
        &self,
        job_types: &[&'static str],
        reclaim_after: Duration,
    ) -> JobQueueResult<Option<Job>>;

    async fn mark_succeeded(&self, job_id: Uuid) -> JobQueueResult<()>;

    async fn retry_after(
        &self,
        job_id: Uuid,
        delay: Duration,
        error_message: &str,
    ) -> JobQueueResult<()>;

    async fn mark_failed(&self, job_id: Uuid, error_message: &str) -> JobQueueResult<()>;
}
