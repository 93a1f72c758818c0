use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::{
    analysis::{DiffSummary, TaskResult},
    jobs::JOB_DIFF,
    models::{AiTaskType, ContractVersion, Job},
};

use super::{
    analysis::{
        analysis_failure, complete, load_version, mark_running, parse_payload, record_failure,
        version_text,
    },
    JobContext, JobExecution, JobHandler,
};

fn same_document(previous: &ContractVersion, current: &ContractVersion) -> bool {
    previous.file_url == current.file_url || previous.checksum == current.checksum
}

pub struct DiffJob;

impl DiffJob {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl JobHandler for DiffJob {
    fn job_type(&self) -> &'static str {
        JOB_DIFF
    }

    async fn handle(&self, ctx: Arc<JobContext>, job: Job) -> JobExecution {
        let payload = match parse_payload(&job) {
            Ok(payload) => payload,
            Err(execution) => return execution,
        };
        if let Err(execution) = mark_running(&ctx, &payload, AiTaskType::Diff).await {
            return execution;
        }

        let Some(previous_id) = payload.previous_version_id else {
            return JobExecution::Failed {
                error: "diff job has no previous version".into(),
            };
        };

        let current = match load_version(&ctx, payload.contract_id, payload.version_id).await {
            Ok(version) => version,
            Err(execution) => return execution,
        };
        let previous = match load_version(&ctx, payload.contract_id, previous_id).await {
            Ok(version) => version,
            Err(execution) => return execution,
        };

        if same_document(&previous, &current) {
            info!(job_id = %job.id, version_id = %current.id, "versions are identical; recording empty diff");
            return complete(&ctx, &payload, TaskResult::Diff(DiffSummary::no_changes())).await;
        }

        let previous_text = match version_text(&ctx, &job, &previous).await {
            Ok(text) => text,
            Err(execution) => return execution,
        };
        let current_text = match version_text(&ctx, &job, &current).await {
            Ok(text) => text,
            Err(execution) => return execution,
        };

        match ctx
            .runner
            .summarize_diff(&previous_text, &current_text)
            .await
        {
            Ok(summary) => complete(&ctx, &payload, TaskResult::Diff(summary)).await,
            Err(err) => analysis_failure(&job, err),
        }
    }

    async fn give_up(&self, ctx: Arc<JobContext>, job: &Job, error: &str) {
        record_failure(&ctx, job, AiTaskType::Diff, error).await;
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    fn version(num: i32, file_url: &str, checksum: &str) -> ContractVersion {
        ContractVersion {
            id: Uuid::new_v4(),
            contract_id: Uuid::nil(),
            version_num: num,
            file_url: file_url.into(),
            checksum: checksum.into(),
            size_bytes: 10,
            status: "Draft".into(),
            created_at: Utc::now().naive_utc(),
        }
    }

    #[test]
    fn identical_reference_or_checksum_skips_analysis() {
        let v1 = version(1, "s3://bucket/c/v1.pdf", "abc");
        assert!(same_document(&v1, &version(2, "s3://bucket/c/v1.pdf", "def")));
        assert!(same_document(&v1, &version(2, "s3://bucket/c/v2.pdf", "abc")));
        assert!(!same_document(&v1, &version(2, "s3://bucket/c/v2.pdf", "def")));
    }
}
