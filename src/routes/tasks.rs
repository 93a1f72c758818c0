use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::{load_visible_contract, to_iso};
use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::{AiTask, AiTaskStatus, AiTaskType};
use crate::state::AppState;

#[derive(Serialize, Clone)]
pub struct TaskResponse {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub version_id: Uuid,
    #[serde(rename = "type")]
    pub task_type: AiTaskType,
    pub status: AiTaskStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<AiTask> for TaskResponse {
    fn from(task: AiTask) -> Self {
        Self {
            id: task.id,
            contract_id: task.contract_id,
            version_id: task.version_id,
            task_type: task.task_type,
            status: task.status,
            result: task.result,
            error: task.error,
            created_at: to_iso(task.created_at),
            updated_at: to_iso(task.updated_at),
        }
    }
}

fn parse_task_type(segment: &str) -> AppResult<AiTaskType> {
    AiTaskType::from_job_type(segment)
        .or_else(|| segment.parse().ok())
        .ok_or_else(|| AppError::bad_request(format!("unknown analysis job '{segment}'")))
}

pub async fn trigger_task(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((contract_id, version_id, job)): Path<(Uuid, Uuid, String)>,
) -> AppResult<(StatusCode, Json<TaskResponse>)> {
    let task_type = parse_task_type(&job)?;
    load_visible_contract(&state, contract_id, &user).await?;

    let task = state
        .orchestrator
        .trigger_job(contract_id, version_id, task_type, user.user_id)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(task.into())))
}

pub async fn get_task(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((contract_id, version_id, job)): Path<(Uuid, Uuid, String)>,
) -> AppResult<Json<TaskResponse>> {
    let task_type = parse_task_type(&job)?;
    load_visible_contract(&state, contract_id, &user).await?;

    let task = state
        .orchestrator
        .get_task(contract_id, version_id, task_type)
        .await?;
    Ok(Json(task.into()))
}

pub async fn list_tasks(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((contract_id, version_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<Vec<TaskResponse>>> {
    load_visible_contract(&state, contract_id, &user).await?;
    let tasks = state
        .orchestrator
        .list_tasks(contract_id, version_id)
        .await?;
    Ok(Json(tasks.into_iter().map(Into::into).collect()))
}
