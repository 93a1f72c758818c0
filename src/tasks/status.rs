use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::{
    analysis::TaskResult,
    models::{AiTask, AiTaskStatus, AiTaskType, NewAiTask},
    store::{ContractStore, StoreResult},
};

#[derive(Clone)]
pub struct TaskStatusStore {
    store: Arc<dyn ContractStore>,
}

impl TaskStatusStore {
    pub fn new(store: Arc<dyn ContractStore>) -> Self {
        Self { store }
    }

    pub async fn upsert_status(
        &self,
        contract_id: Uuid,
        version_id: Uuid,
        task_type: AiTaskType,
        status: AiTaskStatus,
        result: Option<TaskResult>,
        error: Option<String>,
    ) -> StoreResult<AiTask> {
        debug_assert!(result
            .as_ref()
            .map_or(true, |result| result.task_type() == task_type));

        let task = self
            .store
            .upsert_task(NewAiTask {
                id: Uuid::new_v4(),
                contract_id,
                version_id,
                task_type,
                status,
                result: result.as_ref().map(TaskResult::to_value),
                error,
            })
            .await?;

        debug!(%contract_id, %version_id, task_type = %task_type, status = %status, "task status written");
        Ok(task)
    }

    pub async fn mark_pending(
        &self,
        contract_id: Uuid,
        version_id: Uuid,
        task_type: AiTaskType,
    ) -> StoreResult<AiTask> {
        self.upsert_status(contract_id, version_id, task_type, AiTaskStatus::Pending, None, None)
            .await
    }

    pub async fn mark_running(
        &self,
        contract_id: Uuid,
        version_id: Uuid,
        task_type: AiTaskType,
    ) -> StoreResult<AiTask> {
        self.upsert_status(contract_id, version_id, task_type, AiTaskStatus::Running, None, None)
            .await
    }

    pub async fn mark_completed(
        &self,
        contract_id: Uuid,
        version_id: Uuid,
        result: TaskResult,
    ) -> StoreResult<AiTask> {
        self.upsert_status(
            contract_id,
            version_id,
            result.task_type(),
            AiTaskStatus::Completed,
            Some(result),
            None,
        )
        .await
    }

    pub async fn mark_failed(
        &self,
        contract_id: Uuid,
        version_id: Uuid,
        task_type: AiTaskType,
        error: impl Into<String>,
    ) -> StoreResult<AiTask> {
        self.upsert_status(
            contract_id,
            version_id,
            task_type,
            AiTaskStatus::Failed,
            None,
            Some(error.into()),
        )
        .await
    }

    pub async fn get_status(
        &self,
        contract_id: Uuid,
        version_id: Uuid,
        task_type: AiTaskType,
    ) -> StoreResult<Option<AiTask>> {
        self.store.find_task(contract_id, version_id, task_type).await
    }

    pub async fn list_for_version(
        &self,
        contract_id: Uuid,
        version_id: Uuid,
    ) -> StoreResult<Vec<AiTask>> {
        self.store.list_tasks_for_version(contract_id, version_id).await
    }

    pub async fn list_for_contract(&self, contract_id: Uuid) -> StoreResult<Vec<AiTask>> {
        self.store.list_tasks_for_contract(contract_id).await
    }

}
