use std::collections::BTreeMap;

use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::{
    load_visible_contract,
    participants::ParticipantResponse,
    tasks::TaskResponse,
    to_iso,
    versions::VersionResponse,
};
use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::{Contract, ContractStatus, NewContract};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateContractRequest {
    pub title: String,
    #[serde(default)]
    pub status: Option<ContractStatus>,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Serialize)]
pub struct ContractResponse {
    pub id: Uuid,
    pub title: String,
    pub status: ContractStatus,
    pub expiry_date: Option<NaiveDate>,
    pub created_by: Uuid,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Contract> for ContractResponse {
    fn from(contract: Contract) -> Self {
        Self {
            id: contract.id,
            title: contract.title,
            status: contract.status,
            expiry_date: contract.expiry_date,
            created_by: contract.created_by,
            created_at: to_iso(contract.created_at),
            updated_at: to_iso(contract.updated_at),
        }
    }
}

pub type TasksByVersion = BTreeMap<String, BTreeMap<String, TaskResponse>>;

#[derive(Serialize)]
pub struct ContractDetailResponse {
    pub contract: ContractResponse,
    pub versions: Vec<VersionResponse>,
    pub participants: Vec<ParticipantResponse>,
    pub ai_tasks: TasksByVersion,
}

pub async fn create_contract(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateContractRequest>,
) -> AppResult<(StatusCode, Json<ContractResponse>)> {
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(AppError::bad_request("title must not be empty"));
    }

    let contract = state
        .store
        .insert_contract(NewContract {
            id: Uuid::new_v4(),
            title: title.to_string(),
            status: payload.status.unwrap_or(ContractStatus::Draft),
            expiry_date: payload.expiry_date,
            created_by: user.user_id,
        })
        .await?;

    info!(contract_id = %contract.id, created_by = %user.user_id, "contract created");
    Ok((StatusCode::CREATED, Json(contract.into())))
}

pub async fn list_contracts(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<ContractResponse>>> {
    let contracts = state.store.list_contracts_for_user(user.user_id).await?;
    Ok(Json(contracts.into_iter().map(Into::into).collect()))
}

pub async fn get_contract(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(contract_id): Path<Uuid>,
) -> AppResult<Json<ContractDetailResponse>> {
    let contract = load_visible_contract(&state, contract_id, &user).await?;

    let versions = state.store.list_versions(contract_id).await?;
    let participants = state.participants.list(contract_id).await?;
    let tasks = state
        .orchestrator
        .statuses()
        .list_for_contract(contract_id)
        .await?;

    let mut ai_tasks = TasksByVersion::new();
    for task in tasks {
        ai_tasks
            .entry(task.version_id.to_string())
            .or_default()
            .insert(task.task_type.to_string(), task.into());
    }

    Ok(Json(ContractDetailResponse {
        contract: contract.into(),
        versions: versions.into_iter().map(Into::into).collect(),
        participants: participants.into_iter().map(Into::into).collect(),
        ai_tasks,
    }))
}
