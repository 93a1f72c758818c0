use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use uuid::Uuid;

use super::load_visible_contract;
use crate::auth::AuthenticatedUser;
use crate::chat::ChatAnswer;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct QuestionRequest {
    pub text: String,
}

pub async fn ask_question(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((contract_id, version_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<QuestionRequest>,
) -> AppResult<Json<ChatAnswer>> {
    load_visible_contract(&state, contract_id, &user).await?;
    let chat = state.chat.as_ref().ok_or_else(|| {
        AppError::new(StatusCode::SERVICE_UNAVAILABLE, "contract chat is not configured")
    })?;

    let answer = chat.ask(contract_id, version_id, &request.text).await?;
    Ok(Json(answer))
}
