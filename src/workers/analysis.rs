use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    analysis::{
        text::{chunk_text, DEFAULT_CHUNK_SIZE},
        AnalysisError, EmbeddingSummary, TaskResult,
    },
    jobs::{AnalysisJobPayload, JOB_CLAUSE_EXTRACTION, JOB_EMBEDDING, JOB_RISK_ASSESSMENT},
    models::{AiTaskType, ContractVersion, Job, NewEmbedding},
    storage::version_object_key,
};

use super::{JobContext, JobExecution, JobHandler};

pub(crate) fn parse_payload(job: &Job) -> Result<AnalysisJobPayload, JobExecution> {
    serde_json::from_value(job.payload.clone()).map_err(|err| JobExecution::Failed {
        error: format!("invalid {} payload: {err}", job.job_type),
    })
}

pub(crate) fn analysis_failure(job: &Job, err: AnalysisError) -> JobExecution {
    match err {
        AnalysisError::Transient(message) => {
            warn!(job_id = %job.id, error = %message, "analysis call failed transiently");
            JobExecution::Retry { error: message }
        }
        AnalysisError::Fatal(message) => JobExecution::Failed { error: message },
    }
}

pub(crate) async fn mark_running(
    ctx: &JobContext,
    payload: &AnalysisJobPayload,
    task_type: AiTaskType,
) -> Result<(), JobExecution> {
    ctx.statuses
        .mark_running(payload.contract_id, payload.version_id, task_type)
        .await
        .map(|_| ())
        .map_err(|err| JobExecution::Retry {
            error: format!("failed to record running status: {err}"),
        })
}

pub(crate) async fn load_version(
    ctx: &JobContext,
    contract_id: Uuid,
    version_id: Uuid,
) -> Result<ContractVersion, JobExecution> {
    match ctx.store.find_version(version_id).await {
        Ok(Some(version)) if version.contract_id == contract_id => Ok(version),
        Ok(_) => Err(JobExecution::Failed {
            error: format!("version {version_id} not found for contract {contract_id}"),
        }),
        Err(err) => Err(JobExecution::Retry {
            error: format!("failed to load version {version_id}: {err}"),
        }),
    }
}

pub(crate) async fn version_text(
    ctx: &JobContext,
    job: &Job,
    version: &ContractVersion,
) -> Result<String, JobExecution> {
    let key = version_object_key(version.contract_id, version.version_num);
    let bytes = ctx
        .storage
        .get_object(&key)
        .await
        .map_err(|err| JobExecution::Retry {
            error: format!("failed to download {key}: {err}"),
        })?;

    ctx.runner
        .extract_text(&bytes)
        .await
        .map_err(|err| analysis_failure(job, err))
}

pub(crate) async fn complete(
    ctx: &JobContext,
    payload: &AnalysisJobPayload,
    result: TaskResult,
) -> JobExecution {
    let task_type = result.task_type();
    match ctx
        .statuses
        .mark_completed(payload.contract_id, payload.version_id, result)
        .await
    {
        Ok(_) => {
            info!(contract_id = %payload.contract_id, version_id = %payload.version_id, task_type = %task_type, "analysis task completed");
            JobExecution::Success
        }
        Err(err) => JobExecution::Retry {
            error: format!("failed to record result: {err}"),
        },
    }
}

pub(crate) async fn record_failure(
    ctx: &JobContext,
    job: &Job,
    task_type: AiTaskType,
    message: &str,
) {
    let Ok(payload) = serde_json::from_value::<AnalysisJobPayload>(job.payload.clone()) else {
        error!(job_id = %job.id, "cannot record failure for job with invalid payload");
        return;
    };

    if let Err(err) = ctx
        .statuses
        .mark_failed(payload.contract_id, payload.version_id, task_type, message)
        .await
    {
        error!(job_id = %job.id, task_type = %task_type, error = %err, "failed to record task failure");
    }
}

async fn prepare(
    ctx: &JobContext,
    job: &Job,
    task_type: AiTaskType,
) -> Result<(AnalysisJobPayload, ContractVersion, String), JobExecution> {
    let payload = parse_payload(job)?;
    mark_running(ctx, &payload, task_type).await?;
    let version = load_version(ctx, payload.contract_id, payload.version_id).await?;
    let text = version_text(ctx, job, &version).await?;
    Ok((payload, version, text))
}

pub struct EmbeddingJob;

impl EmbeddingJob {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl JobHandler for EmbeddingJob {
    fn job_type(&self) -> &'static str {
        JOB_EMBEDDING
    }

    async fn handle(&self, ctx: Arc<JobContext>, job: Job) -> JobExecution {
        let (payload, version, text) = match prepare(&ctx, &job, AiTaskType::Embedding).await {
            Ok(prepared) => prepared,
            Err(execution) => return execution,
        };

        let chunks = chunk_text(&text, DEFAULT_CHUNK_SIZE);
        if chunks.is_empty() {
            return JobExecution::Failed {
                error: "document produced no text chunks".into(),
            };
        }

        let inputs: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = match ctx.runner.embed(&inputs).await {
            Ok(vectors) => vectors,
            Err(err) => return analysis_failure(&job, err),
        };
        if vectors.len() != chunks.len() {
            return JobExecution::Failed {
                error: format!(
                    "expected {} embeddings, got {}",
                    chunks.len(),
                    vectors.len()
                ),
            };
        }

        let rows: Vec<NewEmbedding> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| NewEmbedding {
                id: Uuid::new_v4(),
                contract_id: version.contract_id,
                version_id: version.id,
                chunk_index: chunk.index as i32,
                text: chunk.text,
                page_num: chunk.page as i32,
                embedding: serde_json::Value::from(vector),
            })
            .collect();

        let stored = match ctx.store.replace_embeddings(version.id, rows).await {
            Ok(stored) => stored,
            Err(err) => {
                return JobExecution::Retry {
                    error: format!("failed to store embeddings: {err}"),
                }
            }
        };

        complete(
            &ctx,
            &payload,
            TaskResult::Embedding(EmbeddingSummary { chunks: stored }),
        )
        .await
    }

    async fn give_up(&self, ctx: Arc<JobContext>, job: &Job, error: &str) {
        record_failure(&ctx, job, AiTaskType::Embedding, error).await;
    }
}

pub struct ClauseExtractionJob;

impl ClauseExtractionJob {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl JobHandler for ClauseExtractionJob {
    fn job_type(&self) -> &'static str {
        JOB_CLAUSE_EXTRACTION
    }

    async fn handle(&self, ctx: Arc<JobContext>, job: Job) -> JobExecution {
        let (payload, _, text) =
            match prepare(&ctx, &job, AiTaskType::ClauseExtraction).await {
                Ok(prepared) => prepared,
                Err(execution) => return execution,
            };

        let extraction = match ctx.runner.extract_clauses(&text).await {
            Ok(extraction) => extraction,
            Err(err) => return analysis_failure(&job, err),
        };
        if let Err(reason) = extraction.validate() {
            return JobExecution::Failed { error: reason };
        }

        complete(&ctx, &payload, TaskResult::ClauseExtraction(extraction)).await
    }

    async fn give_up(&self, ctx: Arc<JobContext>, job: &Job, error: &str) {
        record_failure(&ctx, job, AiTaskType::ClauseExtraction, error).await;
    }
}

pub struct RiskAssessmentJob;

impl RiskAssessmentJob {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl JobHandler for RiskAssessmentJob {
    fn job_type(&self) -> &'static str {
        JOB_RISK_ASSESSMENT
    }

    async fn handle(&self, ctx: Arc<JobContext>, job: Job) -> JobExecution {
        let (payload, _, text) = match prepare(&ctx, &job, AiTaskType::RiskAssessment).await {
            Ok(prepared) => prepared,
            Err(execution) => return execution,
        };

        match ctx.runner.assess_risks(&text).await {
            Ok(assessment) => {
                complete(&ctx, &payload, TaskResult::RiskAssessment(assessment)).await
            }
            Err(err) => analysis_failure(&job, err),
        }
    }

    async fn give_up(&self, ctx: Arc<JobContext>, job: &Job, error: &str) {
        record_failure(&ctx, job, AiTaskType::RiskAssessment, error).await;
    }
}
