use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{load_visible_contract, to_iso};
use crate::auth::AuthenticatedUser;
use crate::error::AppResult;
use crate::models::{Participant, ParticipantRole};
use crate::participants::ParticipantAssignment;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AssignParticipantsRequest {
    pub participants: Vec<ParticipantAssignment>,
}

#[derive(Serialize, Clone)]
pub struct ParticipantResponse {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub user_id: Uuid,
    pub role: ParticipantRole,
    pub signing_order: Option<i32>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Participant> for ParticipantResponse {
    fn from(participant: Participant) -> Self {
        Self {
            id: participant.id,
            contract_id: participant.contract_id,
            user_id: participant.user_id,
            role: participant.role,
            signing_order: participant.signing_order,
            status: participant.status,
            created_at: to_iso(participant.created_at),
            updated_at: to_iso(participant.updated_at),
        }
    }
}

pub async fn assign_participants(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(contract_id): Path<Uuid>,
    Json(payload): Json<AssignParticipantsRequest>,
) -> AppResult<Json<Vec<ParticipantResponse>>> {
    let participants = state
        .participants
        .assign_participants(contract_id, user.user_id, payload.participants)
        .await?;
    Ok(Json(participants.into_iter().map(Into::into).collect()))
}

pub async fn list_participants(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(contract_id): Path<Uuid>,
) -> AppResult<Json<Vec<ParticipantResponse>>> {
    load_visible_contract(&state, contract_id, &user).await?;
    let participants = state.participants.list(contract_id).await?;
    Ok(Json(participants.into_iter().map(Into::into).collect()))
}

pub async fn remove_participant(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((contract_id, user_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    state
        .participants
        .remove_participant(contract_id, user_id, user.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
