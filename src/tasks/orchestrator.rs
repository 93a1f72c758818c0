use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use super::status::TaskStatusStore;
use crate::{
    error::{EngineError, EngineResult},
    jobs::{AnalysisJobPayload, JobQueue, JobQueueError},
    models::{AiTask, AiTaskType, ContractVersion},
    store::ContractStore,
};

pub const BASE_TASKS: [AiTaskType; 3] = [
    AiTaskType::Embedding,
    AiTaskType::ClauseExtraction,
    AiTaskType::RiskAssessment,
];

pub struct TaskOrchestrator {
    store: Arc<dyn ContractStore>,
    queue: Arc<dyn JobQueue>,
    statuses: TaskStatusStore,
}

impl TaskOrchestrator {
    pub fn new(store: Arc<dyn ContractStore>, queue: Arc<dyn JobQueue>) -> Self {
        let statuses = TaskStatusStore::new(store.clone());
        Self {
            store,
            queue,
            statuses,
        }
    }

    pub fn statuses(&self) -> &TaskStatusStore {
        &self.statuses
    }

    pub async fn on_version_created(&self, version: &ContractVersion) -> Vec<AiTaskType> {
        let mut planned: Vec<(AiTaskType, Option<Uuid>)> =
            BASE_TASKS.iter().map(|task_type| (*task_type, None)).collect();

        match self.store.find_previous_version(version).await {
            Ok(Some(previous)) => planned.push((AiTaskType::Diff, Some(previous.id))),
            Ok(None) if version.version_num > 1 => {
                warn!(contract_id = %version.contract_id, version_id = %version.id, version_num = version.version_num, "previous version missing; skipping diff");
            }
            Ok(None) => {}
            Err(err) => {
                warn!(contract_id = %version.contract_id, version_id = %version.id, error = %err, "could not load previous version; skipping diff");
            }
        }

        let mut dispatched = Vec::with_capacity(planned.len());
        for (task_type, previous_version_id) in planned {
            if self
                .dispatch(version, task_type, previous_version_id)
                .await
                .is_ok()
            {
                dispatched.push(task_type);
            }
        }

        info!(contract_id = %version.contract_id, version_id = %version.id, jobs = dispatched.len(), "analysis jobs dispatched");
        dispatched
    }

    pub async fn trigger_job(
        &self,
        contract_id: Uuid,
        version_id: Uuid,
        task_type: AiTaskType,
        requested_by: Uuid,
    ) -> EngineResult<AiTask> {
        let contract = self
            .store
            .find_contract(contract_id)
            .await?
            .ok_or(EngineError::NotFound("contract"))?;
        if contract.created_by != requested_by {
            return Err(EngineError::not_contract_manager());
        }

        let version = self.load_version(contract_id, version_id).await?;

        let previous_version_id = if task_type == AiTaskType::Diff {
            let previous = self
                .store
                .find_previous_version(&version)
                .await?
                .ok_or_else(|| EngineError::validation("a diff requires a previous version"))?;
            Some(previous.id)
        } else {
            None
        };

        self.dispatch(&version, task_type, previous_version_id)
            .await?;

        self.statuses
            .get_status(contract_id, version_id, task_type)
            .await?
            .ok_or(EngineError::NotFound("task"))
    }

    pub async fn get_task(
        &self,
        contract_id: Uuid,
        version_id: Uuid,
        task_type: AiTaskType,
    ) -> EngineResult<AiTask> {
        self.load_version(contract_id, version_id).await?;
        self.statuses
            .get_status(contract_id, version_id, task_type)
            .await?
            .ok_or(EngineError::NotFound("task"))
    }

    pub async fn list_tasks(&self, contract_id: Uuid, version_id: Uuid) -> EngineResult<Vec<AiTask>> {
        self.load_version(contract_id, version_id).await?;
        Ok(self.statuses.list_for_version(contract_id, version_id).await?)
    }

    async fn load_version(&self, contract_id: Uuid, version_id: Uuid) -> EngineResult<ContractVersion> {
        self.store
            .find_version(version_id)
            .await?
            .filter(|version| version.contract_id == contract_id)
            .ok_or(EngineError::NotFound("version"))
    }

    // Pending is written before the enqueue so a fast worker's Running write
    // is never overwritten by it.
    async fn dispatch(
        &self,
        version: &ContractVersion,
        task_type: AiTaskType,
        previous_version_id: Option<Uuid>,
    ) -> Result<(), JobQueueError> {
        let contract_id = version.contract_id;

        if let Err(err) = self
            .statuses
            .mark_pending(contract_id, version.id, task_type)
            .await
        {
            error!(%contract_id, version_id = %version.id, task_type = %task_type, error = %err, "failed to record pending task");
        }

        let payload = AnalysisJobPayload {
            contract_id,
            version_id: version.id,
            previous_version_id,
        };
        let payload = serde_json::to_value(&payload).unwrap_or_default();

        match self
            .queue
            .enqueue(task_type.job_type(), payload, None)
            .await
        {
            Ok(job) => {
                info!(%contract_id, version_id = %version.id, task_type = %task_type, job_id = %job.id, "analysis job enqueued");
                Ok(())
            }
            Err(err) => {
                warn!(%contract_id, version_id = %version.id, task_type = %task_type, error = %err, "failed to enqueue analysis job");
                if let Err(store_err) = self
                    .statuses
                    .mark_failed(
                        contract_id,
                        version.id,
                        task_type,
                        format!("failed to enqueue job: {err}"),
                    )
                    .await
                {
                    error!(%contract_id, version_id = %version.id, task_type = %task_type, error = %store_err, "failed to record enqueue failure");
                }
                Err(err)
            }
        }
    }
}
