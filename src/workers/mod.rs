use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::time::{sleep, timeout};
use tracing::{error, info, warn};

use crate::{
    analysis::AnalysisRunner,
    config::AppConfig,
    jobs::{JobQueue, JobQueueError},
    models::Job,
    storage::ObjectStorage,
    store::ContractStore,
    tasks::TaskStatusStore,
};

pub mod analysis;
pub mod diff;
pub mod retry;

pub use retry::RetryPolicy;

#[derive(Debug, PartialEq, Eq)]
pub enum JobExecution {
    Success,
    Retry { error: String },
    Failed { error: String },
}

pub struct JobContext {
    pub store: Arc<dyn ContractStore>,
    pub storage: Arc<dyn ObjectStorage>,
    pub runner: Arc<dyn AnalysisRunner>,
    pub statuses: TaskStatusStore,
}

impl JobContext {
    pub fn new(
        store: Arc<dyn ContractStore>,
        storage: Arc<dyn ObjectStorage>,
        runner: Arc<dyn AnalysisRunner>,
    ) -> Self {
        let statuses = TaskStatusStore::new(store.clone());
        Self {
            store,
            storage,
            runner,
            statuses,
        }
    }
}

#[async_trait]
pub trait JobHandler: Send + Sync {
    fn job_type(&self) -> &'static str;

    async fn handle(&self, ctx: Arc<JobContext>, job: Job) -> JobExecution;

    async fn give_up(&self, ctx: Arc<JobContext>, job: &Job, error: &str);
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    pub poll_interval: Duration,
    pub job_timeout: Duration,
    pub retry: RetryPolicy,
}

impl WorkerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            poll_interval: config.worker_poll_interval,
            job_timeout: config.job_timeout,
            retry: RetryPolicy::from_config(config),
        }
    }

    pub fn stale_after(&self) -> Duration {
        self.job_timeout.saturating_mul(2)
    }
}

pub struct Worker {
    context: Arc<JobContext>,
    queue: Arc<dyn JobQueue>,
    handlers: HashMap<&'static str, Arc<dyn JobHandler>>,
    settings: WorkerSettings,
}

impl Worker {
    pub fn new(
        context: Arc<JobContext>,
        queue: Arc<dyn JobQueue>,
        handlers: Vec<Arc<dyn JobHandler>>,
        settings: WorkerSettings,
    ) -> Self {
        let map = handlers
            .into_iter()
            .map(|handler| (handler.job_type(), handler))
            .collect();
        Self {
            context,
            queue,
            handlers: map,
            settings,
        }
    }

    pub async fn run(&self) {
        info!(
            job_types = self.handlers.len(),
            timeout_secs = self.settings.job_timeout.as_secs(),
            max_retries = self.settings.retry.max_retries,
            "worker started"
        );
        loop {
            match self.tick().await {
                Ok(true) => {}
                Ok(false) => sleep(self.settings.poll_interval).await,
                Err(err) => {
                    error!(error = %err, "worker tick failed");
                    sleep(self.settings.poll_interval).await;
                }
            }
        }
    }

    pub async fn tick(&self) -> Result<bool, JobQueueError> {
        let job_types: Vec<&'static str> = self.handlers.keys().copied().collect();
        if job_types.is_empty() {
            return Ok(false);
        }

        let Some(job) = self
            .queue
            .reserve(&job_types, self.settings.stale_after())
            .await?
        else {
            return Ok(false);
        };

        let Some(handler) = self.handlers.get(job.job_type.as_str()) else {
            error!(job_type = %job.job_type, "no handler registered for job type");
            self.queue.mark_failed(job.id, "no handler registered").await?;
            return Ok(true);
        };

        // A reclaimed job whose lost runs already used the whole budget.
        if !self.settings.retry.allows_run(job.attempts) {
            let error = format!(
                "worker stopped responding; gave up after {} attempts",
                job.attempts - 1
            );
            warn!(job_id = %job.id, job_type = %job.job_type, attempts = job.attempts, "abandoned job has no retries left");
            handler.give_up(self.context.clone(), &job, &error).await;
            self.queue.mark_failed(job.id, &error).await?;
            return Ok(true);
        }

        let execution = match timeout(
            self.settings.job_timeout,
            handler.handle(self.context.clone(), job.clone()),
        )
        .await
        {
            Ok(execution) => execution,
            Err(_) => JobExecution::Retry {
                error: format!(
                    "job exceeded {}s timeout",
                    self.settings.job_timeout.as_secs()
                ),
            },
        };

        match execution {
            JobExecution::Success => {
                self.queue.mark_succeeded(job.id).await?;
                info!(job_id = %job.id, job_type = %job.job_type, attempts = job.attempts, "job completed successfully");
            }
            JobExecution::Retry { error } if self.settings.retry.should_retry(job.attempts) => {
                let delay = self.settings.retry.delay_for(job.attempts);
                warn!(job_id = %job.id, job_type = %job.job_type, attempts = job.attempts, delay_ms = delay.as_millis() as u64, %error, "job will retry");
                self.queue.retry_after(job.id, delay, &error).await?;
            }
            JobExecution::Retry { error } => {
                warn!(job_id = %job.id, job_type = %job.job_type, attempts = job.attempts, %error, "job exhausted its retries");
                handler.give_up(self.context.clone(), &job, &error).await;
                self.queue.mark_failed(job.id, &error).await?;
            }
            JobExecution::Failed { error } => {
                error!(job_id = %job.id, job_type = %job.job_type, %error, "job failed");
                handler.give_up(self.context.clone(), &job, &error).await;
                self.queue.mark_failed(job.id, &error).await?;
            }
        }

        Ok(true)
    }
}

pub fn default_handlers() -> Vec<Arc<dyn JobHandler>> {
    vec![
        Arc::new(analysis::EmbeddingJob::new()),
        Arc::new(analysis::ClauseExtractionJob::new()),
        Arc::new(analysis::RiskAssessmentJob::new()),
        Arc::new(diff::DiffJob::new()),
    ]
}
