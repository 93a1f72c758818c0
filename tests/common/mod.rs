use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, ensure, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::{NaiveDateTime, Utc};
use clauseiq::analysis::{
    AnalysisError, AnalysisResult, AnalysisRunner, Clause, ClauseExtraction, DiffEntry,
    DiffSummary, Risk, RiskAssessment, Severity,
};
use clauseiq::auth::jwt::JwtService;
use clauseiq::config::AppConfig;
use clauseiq::jobs::{JobQueue, JobQueueError, JobQueueResult, STATUS_FAILED, STATUS_QUEUED,
    STATUS_SUCCEEDED, STATUS_PROCESSING};
use clauseiq::models::{
    AiTask, AiTaskType, Contract, ContractStatus, ContractVersion, Embedding, Job,
    NewAiTask, NewContract, NewContractVersion, NewEmbedding, NewParticipant, Participant,
    ParticipantRole,
};
use clauseiq::routes;
use clauseiq::state::AppState;
use clauseiq::storage::ObjectStorage;
use clauseiq::store::{
    ContractRepository, EmbeddingRepository, ParticipantRepository, StoreError, StoreResult,
    TaskRepository, VersionRepository,
};
use clauseiq::{default_handlers, JobContext, Worker, WorkerSettings};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

#[derive(Default)]
struct MemoryTables {
    contracts: Vec<Contract>,
    versions: Vec<ContractVersion>,
    participants: Vec<Participant>,
    tasks: Vec<AiTask>,
    embeddings: Vec<Embedding>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<MemoryTables>,
    reject_version_inserts: AtomicBool,
}

#[allow(dead_code)]
impl MemoryStore {
    pub async fn set_contract_status(&self, contract_id: Uuid, status: ContractStatus) {
        let mut tables = self.tables.lock().await;
        if let Some(contract) = tables.contracts.iter_mut().find(|c| c.id == contract_id) {
            contract.status = status;
            contract.updated_at = now();
        }
    }

    pub fn reject_version_inserts(&self, reject: bool) {
        self.reject_version_inserts.store(reject, Ordering::SeqCst);
    }

    pub async fn task_count(&self) -> usize {
        self.tables.lock().await.tasks.len()
    }

    pub async fn version_count(&self, contract_id: Uuid) -> usize {
        self.tables
            .lock()
            .await
            .versions
            .iter()
            .filter(|version| version.contract_id == contract_id)
            .count()
    }

    pub async fn embeddings_for(&self, version_id: Uuid) -> Vec<Embedding> {
        self.tables
            .lock()
            .await
            .embeddings
            .iter()
            .filter(|row| row.version_id == version_id)
            .cloned()
            .collect()
    }

    pub async fn insert_version_row(&self, contract_id: Uuid, version_num: i32) -> ContractVersion {
        let version = ContractVersion {
            id: Uuid::new_v4(),
            contract_id,
            version_num,
            file_url: format!("memory://{contract_id}/v{version_num}.pdf"),
            checksum: format!("checksum-{version_num}"),
            size_bytes: 1,
            status: "Draft".into(),
            created_at: now(),
        };
        self.tables.lock().await.versions.push(version.clone());
        version
    }
}

fn sort_participants(rows: &mut [Participant]) {
    rows.sort_by(|a, b| {
        a.role
            .as_str()
            .cmp(b.role.as_str())
            .then_with(|| match (a.signing_order, b.signing_order) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            })
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
}

#[async_trait]
impl ContractRepository for MemoryStore {
    async fn insert_contract(&self, contract: NewContract) -> StoreResult<Contract> {
        let now = now();
        let row = Contract {
            id: contract.id,
            title: contract.title,
            status: contract.status,
            expiry_date: contract.expiry_date,
            created_by: contract.created_by,
            created_at: now,
            updated_at: now,
        };
        self.tables.lock().await.contracts.push(row.clone());
        Ok(row)
    }

    async fn find_contract(&self, contract_id: Uuid) -> StoreResult<Option<Contract>> {
        let tables = self.tables.lock().await;
        Ok(tables.contracts.iter().find(|c| c.id == contract_id).cloned())
    }

    async fn list_contracts_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Contract>> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<Contract> = tables
            .contracts
            .iter()
            .filter(|contract| {
                contract.created_by == user_id
                    || tables
                        .participants
                        .iter()
                        .any(|p| p.contract_id == contract.id && p.user_id == user_id)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }
}

#[async_trait]
impl VersionRepository for MemoryStore {
    async fn max_version_num(&self, contract_id: Uuid) -> StoreResult<Option<i32>> {
        let max = {
            let tables = self.tables.lock().await;
            tables
                .versions
                .iter()
                .filter(|version| version.contract_id == contract_id)
                .map(|version| version.version_num)
                .max()
        };
        // Give concurrent uploads a chance to read the same maximum.
        tokio::task::yield_now().await;
        Ok(max)
    }

    async fn insert_version(&self, version: NewContractVersion) -> StoreResult<ContractVersion> {
        if self.reject_version_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Conflict(
                "duplicate key value violates unique constraint".into(),
            ));
        }

        let mut tables = self.tables.lock().await;
        if tables.versions.iter().any(|existing| {
            existing.contract_id == version.contract_id
                && existing.version_num == version.version_num
        }) {
            return Err(StoreError::Conflict(format!(
                "version {} already exists",
                version.version_num
            )));
        }

        let row = ContractVersion {
            id: version.id,
            contract_id: version.contract_id,
            version_num: version.version_num,
            file_url: version.file_url,
            checksum: version.checksum,
            size_bytes: version.size_bytes,
            status: version.status,
            created_at: now(),
        };
        tables.versions.push(row.clone());
        Ok(row)
    }

    async fn delete_version(&self, version_id: Uuid) -> StoreResult<()> {
        self.tables
            .lock()
            .await
            .versions
            .retain(|version| version.id != version_id);
        Ok(())
    }

    async fn find_version(&self, version_id: Uuid) -> StoreResult<Option<ContractVersion>> {
        let tables = self.tables.lock().await;
        Ok(tables.versions.iter().find(|v| v.id == version_id).cloned())
    }

    async fn find_version_by_num(
        &self,
        contract_id: Uuid,
        version_num: i32,
    ) -> StoreResult<Option<ContractVersion>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .versions
            .iter()
            .find(|v| v.contract_id == contract_id && v.version_num == version_num)
            .cloned())
    }

    async fn list_versions(&self, contract_id: Uuid) -> StoreResult<Vec<ContractVersion>> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<ContractVersion> = tables
            .versions
            .iter()
            .filter(|v| v.contract_id == contract_id)
            .cloned()
            .collect();
        rows.sort_by_key(|v| v.version_num);
        Ok(rows)
    }
}

#[async_trait]
impl ParticipantRepository for MemoryStore {
    async fn upsert_participants(
        &self,
        contract_id: Uuid,
        participants: Vec<NewParticipant>,
    ) -> StoreResult<Vec<Participant>> {
        let mut tables = self.tables.lock().await;
        let mut staged = tables.participants.clone();
        let now = now();

        for incoming in participants {
            match staged
                .iter_mut()
                .find(|p| p.contract_id == contract_id && p.user_id == incoming.user_id)
            {
                Some(existing) => {
                    existing.role = incoming.role;
                    existing.signing_order = incoming.signing_order;
                    existing.status = incoming.status;
                    existing.updated_at = now;
                }
                None => staged.push(Participant {
                    id: incoming.id,
                    contract_id,
                    user_id: incoming.user_id,
                    role: incoming.role,
                    signing_order: incoming.signing_order,
                    status: incoming.status,
                    created_at: now,
                    updated_at: now,
                }),
            }
        }

        let mut orders: Vec<i32> = staged
            .iter()
            .filter(|p| p.contract_id == contract_id)
            .filter_map(|p| p.signing_order)
            .collect();
        let total = orders.len();
        orders.sort_unstable();
        orders.dedup();
        if orders.len() != total {
            return Err(StoreError::Conflict(
                "contract_participants_signing_order_key".into(),
            ));
        }

        tables.participants = staged;
        let mut rows: Vec<Participant> = tables
            .participants
            .iter()
            .filter(|p| p.contract_id == contract_id)
            .cloned()
            .collect();
        sort_participants(&mut rows);
        Ok(rows)
    }

    async fn list_participants(&self, contract_id: Uuid) -> StoreResult<Vec<Participant>> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<Participant> = tables
            .participants
            .iter()
            .filter(|p| p.contract_id == contract_id)
            .cloned()
            .collect();
        sort_participants(&mut rows);
        Ok(rows)
    }

    async fn find_participant(
        &self,
        contract_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<Participant>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .participants
            .iter()
            .find(|p| p.contract_id == contract_id && p.user_id == user_id)
            .cloned())
    }

    async fn delete_participant(&self, contract_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.participants.len();
        tables
            .participants
            .retain(|p| !(p.contract_id == contract_id && p.user_id == user_id));
        Ok(tables.participants.len() != before)
    }
}

#[async_trait]
impl TaskRepository for MemoryStore {
    async fn upsert_task(&self, task: NewAiTask) -> StoreResult<AiTask> {
        let mut tables = self.tables.lock().await;
        let now = now();
        if let Some(existing) = tables.tasks.iter_mut().find(|row| {
            row.contract_id == task.contract_id
                && row.version_id == task.version_id
                && row.task_type == task.task_type
        }) {
            existing.status = task.status;
            existing.result = task.result;
            existing.error = task.error;
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let row = AiTask {
            id: task.id,
            contract_id: task.contract_id,
            version_id: task.version_id,
            task_type: task.task_type,
            status: task.status,
            result: task.result,
            error: task.error,
            created_at: now,
            updated_at: now,
        };
        tables.tasks.push(row.clone());
        Ok(row)
    }

    async fn find_task(
        &self,
        contract_id: Uuid,
        version_id: Uuid,
        task_type: AiTaskType,
    ) -> StoreResult<Option<AiTask>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .tasks
            .iter()
            .find(|row| {
                row.contract_id == contract_id
                    && row.version_id == version_id
                    && row.task_type == task_type
            })
            .cloned())
    }

    async fn list_tasks_for_version(
        &self,
        contract_id: Uuid,
        version_id: Uuid,
    ) -> StoreResult<Vec<AiTask>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .tasks
            .iter()
            .filter(|row| row.contract_id == contract_id && row.version_id == version_id)
            .cloned()
            .collect())
    }

    async fn list_tasks_for_contract(&self, contract_id: Uuid) -> StoreResult<Vec<AiTask>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .tasks
            .iter()
            .filter(|row| row.contract_id == contract_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl EmbeddingRepository for MemoryStore {
    async fn replace_embeddings(
        &self,
        version_id: Uuid,
        rows: Vec<NewEmbedding>,
    ) -> StoreResult<usize> {
        let mut tables = self.tables.lock().await;
        tables.embeddings.retain(|row| row.version_id != version_id);
        let count = rows.len();
        let now = now();
        tables.embeddings.extend(rows.into_iter().map(|row| Embedding {
            id: row.id,
            contract_id: row.contract_id,
            version_id: row.version_id,
            chunk_index: row.chunk_index,
            text: row.text,
            page_num: row.page_num,
            embedding: row.embedding,
            created_at: now,
        }));
        Ok(count)
    }

    async fn list_embeddings(&self, version_id: Uuid) -> StoreResult<Vec<Embedding>> {
        let mut rows = self.embeddings_for(version_id).await;
        rows.sort_by_key(|row| row.chunk_index);
        Ok(rows)
    }
}

#[allow(dead_code)]
#[derive(Clone)]
pub struct StoredObject {
    pub key: String,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
}

#[derive(Default)]
pub struct FakeStorage {
    objects: Mutex<HashMap<String, StoredObject>>,
    fail_puts: AtomicBool,
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
        content_disposition: Option<String>,
    ) -> Result<()> {
        ensure!(
            !self.fail_puts.load(Ordering::SeqCst),
            "storage unavailable"
        );
        let stored = StoredObject {
            key: key.to_string(),
            bytes,
            content_type,
            content_disposition,
        };
        let mut guard = self.objects.lock().await;
        guard.insert(stored.key.clone(), stored);
        Ok(())
    }

    async fn presign_get_object(&self, key: &str, expires_in: Duration) -> Result<String> {
        let guard = self.objects.lock().await;
        ensure!(guard.contains_key(key), "object {key} missing");
        Ok(format!(
            "https://fake-storage/{key}?expires_in={}",
            expires_in.as_secs()
        ))
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        let guard = self.objects.lock().await;
        guard
            .get(key)
            .map(|obj| obj.bytes.clone())
            .ok_or_else(|| anyhow!("object {key} missing"))
    }

    fn object_url(&self, key: &str) -> String {
        format!("memory://test-bucket/{key}")
    }
}

#[allow(dead_code)]
impl FakeStorage {
    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        let guard = self.objects.lock().await;
        guard.get(key).cloned()
    }

    pub async fn object_count(&self) -> usize {
        let guard = self.objects.lock().await;
        guard.len()
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeQueue {
    jobs: Mutex<Vec<Job>>,
    fail_enqueue: AtomicBool,
}

#[allow(dead_code)]
impl FakeQueue {
    pub fn fail_enqueue(&self, fail: bool) {
        self.fail_enqueue.store(fail, Ordering::SeqCst);
    }

    pub async fn jobs(&self) -> Vec<Job> {
        self.jobs.lock().await.clone()
    }

    pub async fn backdate(&self, job_id: Uuid, by: chrono::Duration) {
        let mut jobs = self.jobs.lock().await;
        if let Some(job) = jobs.iter_mut().find(|job| job.id == job_id) {
            job.updated_at -= by;
        }
    }

    pub async fn jobs_by_type(&self, job_type: &str) -> Vec<Job> {
        self.jobs
            .lock()
            .await
            .iter()
            .filter(|job| job.job_type == job_type)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl JobQueue for FakeQueue {
    async fn enqueue(
        &self,
        job_type: &str,
        payload: serde_json::Value,
        run_after: Option<NaiveDateTime>,
    ) -> JobQueueResult<Job> {
        if self.fail_enqueue.load(Ordering::SeqCst) {
            return Err(JobQueueError::Pool("queue unavailable".into()));
        }
        let now = now();
        let job = Job {
            id: Uuid::new_v4(),
            job_type: job_type.to_string(),
            payload,
            status: STATUS_QUEUED.to_string(),
            attempts: 0,
            run_after: run_after.unwrap_or(now),
            last_error: None,
            created_at: now,
            updated_at: now,
        };
        self.jobs.lock().await.push(job.clone());
        Ok(job)
    }

    async fn reserve(
        &self,
        job_types: &[&'static str],
        reclaim_after: Duration,
    ) -> JobQueueResult<Option<Job>> {
        let mut jobs = self.jobs.lock().await;
        let now = now();
        let abandoned_before = now
            - chrono::Duration::from_std(reclaim_after)
                .unwrap_or_else(|_| chrono::Duration::hours(1));
        let Some(job) = jobs.iter_mut().find(|job| {
            let runnable = (job.status == STATUS_QUEUED && job.run_after <= now)
                || (job.status == STATUS_PROCESSING && job.updated_at < abandoned_before);
            runnable && job_types.contains(&job.job_type.as_str())
        }) else {
            return Ok(None);
        };
        job.status = STATUS_PROCESSING.to_string();
        job.attempts += 1;
        job.updated_at = now;
        Ok(Some(job.clone()))
    }

    async fn mark_succeeded(&self, job_id: Uuid) -> JobQueueResult<()> {
        self.update(job_id, |job| {
            job.status = STATUS_SUCCEEDED.to_string();
            job.last_error = None;
        })
        .await
    }

    async fn retry_after(
        &self,
        job_id: Uuid,
        delay: Duration,
        error_message: &str,
    ) -> JobQueueResult<()> {
        let error_message = error_message.to_string();
        self.update(job_id, move |job| {
            job.status = STATUS_QUEUED.to_string();
            job.run_after = now() + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
            job.last_error = Some(error_message);
        })
        .await
    }

    async fn mark_failed(&self, job_id: Uuid, error_message: &str) -> JobQueueResult<()> {
        let error_message = error_message.to_string();
        self.update(job_id, move |job| {
            job.status = STATUS_FAILED.to_string();
            job.last_error = Some(error_message);
        })
        .await
    }
}

impl FakeQueue {
    async fn update(&self, job_id: Uuid, apply: impl FnOnce(&mut Job)) -> JobQueueResult<()> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs
            .iter_mut()
            .find(|job| job.id == job_id)
            .ok_or_else(|| JobQueueError::Task(format!("job {job_id} missing")))?;
        apply(job);
        job.updated_at = now();
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeRunner {
    calls: Mutex<HashMap<&'static str, usize>>,
    errors: Mutex<HashMap<&'static str, VecDeque<AnalysisError>>>,
    delays: Mutex<HashMap<&'static str, Duration>>,
}

pub const EXTRACT_TEXT: &str = "extract_text";
pub const EMBED: &str = "embed";
pub const EXTRACT_CLAUSES: &str = "extract_clauses";
pub const ASSESS_RISKS: &str = "assess_risks";
pub const SUMMARIZE_DIFF: &str = "summarize_diff";
pub const ANSWER_QUESTION: &str = "answer_question";

#[allow(dead_code)]
impl FakeRunner {
    pub async fn calls(&self, operation: &str) -> usize {
        self.calls.lock().await.get(operation).copied().unwrap_or(0)
    }

    pub async fn fail_next(&self, operation: &'static str, errors: Vec<AnalysisError>) {
        self.errors
            .lock()
            .await
            .entry(operation)
            .or_default()
            .extend(errors);
    }

    pub async fn delay(&self, operation: &'static str, delay: Duration) {
        self.delays.lock().await.insert(operation, delay);
    }

    async fn enter(&self, operation: &'static str) -> AnalysisResult<()> {
        *self.calls.lock().await.entry(operation).or_default() += 1;

        let delay = self.delays.lock().await.get(operation).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self
            .errors
            .lock()
            .await
            .get_mut(operation)
            .and_then(VecDeque::pop_front)
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AnalysisRunner for FakeRunner {
    async fn extract_text(&self, document: &[u8]) -> AnalysisResult<String> {
        self.enter(EXTRACT_TEXT).await?;
        let text = String::from_utf8_lossy(document).into_owned();
        if text.trim().is_empty() {
            return Err(AnalysisError::Fatal("no text extracted from document".into()));
        }
        Ok(text)
    }

    async fn embed(&self, inputs: &[String]) -> AnalysisResult<Vec<Vec<f32>>> {
        self.enter(EMBED).await?;
        Ok(inputs
            .iter()
            .map(|input| vec![input.len() as f32, 0.5, 0.25])
            .collect())
    }

    async fn extract_clauses(&self, _text: &str) -> AnalysisResult<ClauseExtraction> {
        self.enter(EXTRACT_CLAUSES).await?;
        let clauses = ["Parties", "Term", "Payment Terms", "Governing Law"]
            .into_iter()
            .enumerate()
            .map(|(index, clause_type)| Clause {
                clause_type: clause_type.to_string(),
                text: format!("{clause_type} clause text."),
                page: index as u32 + 1,
                confidence: 0.9,
            })
            .collect();
        Ok(ClauseExtraction { clauses })
    }

    async fn assess_risks(&self, _text: &str) -> AnalysisResult<RiskAssessment> {
        self.enter(ASSESS_RISKS).await?;
        Ok(RiskAssessment {
            risks: vec![Risk {
                severity: Severity::High,
                description: "Uncapped liability".into(),
                risky_text: "liable for all losses".into(),
                page: 2,
                recommendation: "Cap liability at twelve months of fees.".into(),
            }],
        })
    }

    async fn summarize_diff(&self, _previous: &str, _current: &str) -> AnalysisResult<DiffSummary> {
        self.enter(SUMMARIZE_DIFF).await?;
        Ok(DiffSummary {
            summary: "Payment terms extended.".into(),
            diffs: vec![DiffEntry {
                section: "Payment".into(),
                old: "30 days".into(),
                new: "45 days".into(),
            }],
        })
    }

    async fn answer_question(&self, question: &str, context: &[String]) -> AnalysisResult<String> {
        self.enter(ANSWER_QUESTION).await?;
        Ok(format!("{question} See: {}", context.join(" | ")))
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://unused@localhost/unused".to_string(),
        database_max_pool_size: 1,
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        jwt_secret: "test-secret".to_string(),
        jwt_issuer: Some("test-issuer".to_string()),
        jwt_audience: "authenticated".to_string(),
        cors_allowed_origin: None,
        aws_endpoint_url: None,
        aws_access_key_id: None,
        aws_secret_access_key: None,
        aws_region: "us-east-1".to_string(),
        s3_bucket: "test-bucket".to_string(),
        openai_api_key: None,
        openai_base_url: "http://localhost:0".to_string(),
        openai_chat_model: "test-chat".to_string(),
        openai_embedding_model: "test-embedding".to_string(),
        job_max_retries: 3,
        job_retry_base_delay: Duration::ZERO,
        job_timeout: Duration::from_secs(5),
        version_insert_max_attempts: 5,
        worker_poll_interval: Duration::from_millis(10),
    }
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
    pub store: Arc<MemoryStore>,
    pub storage: Arc<FakeStorage>,
    pub queue: Arc<FakeQueue>,
    pub runner: Arc<FakeRunner>,
    pub worker: Worker,
}

#[allow(dead_code)]
impl TestApp {
    pub fn new() -> Result<Self> {
        Self::with_config(test_config())
    }

    pub fn with_config(config: AppConfig) -> Result<Self> {
        Self::build(config, true)
    }

    pub fn without_chat() -> Result<Self> {
        Self::build(test_config(), false)
    }

    fn build(config: AppConfig, chat_enabled: bool) -> Result<Self> {
        let store = Arc::new(MemoryStore::default());
        let storage = Arc::new(FakeStorage::default());
        let queue = Arc::new(FakeQueue::default());
        let runner = Arc::new(FakeRunner::default());

        let jwt = JwtService::from_config(&config)?;
        let settings = WorkerSettings::from_config(&config);
        let state = AppState::new(
            config,
            store.clone(),
            storage.clone(),
            queue.clone(),
            chat_enabled.then(|| runner.clone() as Arc<dyn AnalysisRunner>),
            jwt,
        );
        let router = routes::create_router(state.clone());

        let context = Arc::new(JobContext::new(
            store.clone(),
            storage.clone(),
            runner.clone(),
        ));
        let worker = Worker::new(context, queue.clone(), default_handlers(), settings);

        Ok(Self {
            state,
            router,
            store,
            storage,
            queue,
            runner,
            worker,
        })
    }

    pub fn token_for(&self, user_id: Uuid) -> Result<String> {
        self.state
            .jwt
            .generate_token(user_id, Some("user@example.com"), "authenticated")
    }

    pub async fn run_jobs(&self) -> Result<usize> {
        let mut processed = 0;
        for _ in 0..200 {
            if !self.worker.tick().await? {
                return Ok(processed);
            }
            processed += 1;
        }
        Err(anyhow!("job queue did not drain"))
    }

    pub async fn create_contract(&self, token: &str, title: &str) -> Result<Uuid> {
        #[derive(Serialize)]
        struct Payload<'a> {
            title: &'a str,
        }

        let response = self
            .post_json("/api/contracts", &Payload { title }, Some(token))
            .await?;
        ensure!(
            response.status() == StatusCode::CREATED,
            "contract creation failed with status {}",
            response.status()
        );

        #[derive(serde::Deserialize)]
        struct Created {
            id: Uuid,
        }
        let created: Created = json_body(response).await?;
        Ok(created.id)
    }

    pub async fn upload_version(
        &self,
        contract_id: Uuid,
        data: &[u8],
        token: &str,
    ) -> Result<hyper::Response<Body>> {
        self.upload_file(
            &format!("/api/contracts/{contract_id}/versions"),
            "contract.pdf",
            "application/pdf",
            data,
            token,
        )
        .await
    }

    pub async fn task(
        &self,
        contract_id: Uuid,
        version_id: Uuid,
        task_type: AiTaskType,
    ) -> Option<AiTask> {
        self.state
            .orchestrator
            .statuses()
            .get_status(contract_id, version_id, task_type)
            .await
            .ok()
            .flatten()
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn post_empty(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(Method::POST).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(Method::GET).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let builder = Request::builder().method(Method::DELETE).uri(path);
        let builder = if let Some(token) = token {
            builder.header("authorization", format!("Bearer {token}"))
        } else {
            builder
        };
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn upload_file(
        &self,
        path: &str,
        filename: &str,
        content_type: &str,
        data: &[u8],
        token: &str,
    ) -> Result<hyper::Response<Body>> {
        let boundary = format!("boundary-{}", Uuid::new_v4());
        let mut body = Vec::new();
        body.extend(format!("--{boundary}\r\n").as_bytes());
        body.extend(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                filename
            )
            .as_bytes(),
        );
        body.extend(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
        body.extend(data);
        body.extend(b"\r\n");
        body.extend(format!("--{boundary}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .header("authorization", format!("Bearer {token}"))
            .body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

pub async fn json_body<T: DeserializeOwned>(response: hyper::Response<Body>) -> Result<T> {
    let body = body_to_vec(response.into_body()).await?;
    Ok(serde_json::from_slice(&body)?)
}

#[allow(dead_code)]
pub fn signer(user_id: Uuid, order: i32) -> serde_json::Value {
    serde_json::json!({
        "user_id": user_id,
        "role": ParticipantRole::AuthorizedSigner,
        "signing_order": order,
    })
}

#[allow(dead_code)]
pub fn collaborator(user_id: Uuid) -> serde_json::Value {
    serde_json::json!({ "user_id": user_id, "role": ParticipantRole::Collaborator })
}
