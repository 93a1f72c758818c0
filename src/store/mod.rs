use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    AiTask, AiTaskType, Contract, ContractVersion, Embedding, NewAiTask, NewContract,
    NewContractVersion, NewEmbedding, NewParticipant, Participant,
};

pub mod pg;

pub use pg::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("conflicting write: {0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait ContractRepository: Send + Sync + 'static {
    async fn insert_contract(&self, contract: NewContract) -> StoreResult<Contract>;

    async fn find_contract(&self, contract_id: Uuid) -> StoreResult<Option<Contract>>;

    async fn list_contracts_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Contract>>;
}

#[async_trait]
pub trait VersionRepository: Send + Sync + 'static {
    async fn max_version_num(&self, contract_id: Uuid) -> StoreResult<Option<i32>>;

    /// Fails with [`StoreError::Conflict`] when `(contract_id, version_num)`
    /// already exists.
    async fn insert_version(&self, version: NewContractVersion) -> StoreResult<ContractVersion>;

    async fn delete_version(&self, version_id: Uuid) -> StoreResult<()>;

    async fn find_version(&self, version_id: Uuid) -> StoreResult<Option<ContractVersion>>;

    async fn find_version_by_num(
        &self,
        contract_id: Uuid,
        version_num: i32,
    ) -> StoreResult<Option<ContractVersion>>;

    async fn find_previous_version(
        &self,
        version: &ContractVersion,
    ) -> StoreResult<Option<ContractVersion>> {
        if version.version_num <= 1 {
            return Ok(None);
        }
        self.find_version_by_num(version.contract_id, version.version_num - 1)
            .await
    }

    async fn list_versions(&self, contract_id: Uuid) -> StoreResult<Vec<ContractVersion>>;
}

#[async_trait]
pub trait ParticipantRepository: Send + Sync + 'static {
    async fn upsert_participants(
        &self,
        contract_id: Uuid,
        participants: Vec<NewParticipant>,
    ) -> StoreResult<Vec<Participant>>;

    async fn list_participants(&self, contract_id: Uuid) -> StoreResult<Vec<Participant>>;

    async fn find_participant(
        &self,
        contract_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<Participant>>;

    async fn delete_participant(&self, contract_id: Uuid, user_id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait TaskRepository: Send + Sync + 'static {
    async fn upsert_task(&self, task: NewAiTask) -> StoreResult<AiTask>;

    async fn find_task(
        &self,
        contract_id: Uuid,
        version_id: Uuid,
        task_type: AiTaskType,
    ) -> StoreResult<Option<AiTask>>;

    async fn list_tasks_for_version(
        &self,
        contract_id: Uuid,
        version_id: Uuid,
    ) -> StoreResult<Vec<AiTask>>;

    async fn list_tasks_for_contract(&self, contract_id: Uuid) -> StoreResult<Vec<AiTask>>;
}

#[async_trait]
pub trait EmbeddingRepository: Send + Sync + 'static {
    async fn replace_embeddings(
        &self,
        version_id: Uuid,
        rows: Vec<NewEmbedding>,
    ) -> StoreResult<usize>;

    async fn list_embeddings(&self, version_id: Uuid) -> StoreResult<Vec<Embedding>>;
}

pub trait ContractStore:
    ContractRepository + VersionRepository + ParticipantRepository + TaskRepository + EmbeddingRepository
{
}

impl<T> ContractStore for T where
    T: ContractRepository
        + VersionRepository
        + ParticipantRepository
        + TaskRepository
        + EmbeddingRepository
{
}
