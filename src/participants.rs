use std::{collections::HashSet, sync::Arc};

use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{EngineError, EngineResult},
    lifecycle::ensure_participants_mutable,
    models::{Contract, NewParticipant, Participant, ParticipantRole, PARTICIPANT_STATUS_INVITED},
    store::{ContractStore, StoreError},
};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ParticipantAssignment {
    pub user_id: Uuid,
    pub role: ParticipantRole,
    #[serde(default)]
    pub signing_order: Option<i32>,
}

pub fn validate_assignments(
    contract: &Contract,
    requested_by: Uuid,
    assignments: &[ParticipantAssignment],
) -> EngineResult<()> {
    ensure_participants_mutable(contract)?;

    if requested_by != contract.created_by {
        return Err(EngineError::not_contract_manager());
    }

    let mut users = HashSet::new();
    let mut orders = HashSet::new();
    for entry in assignments {
        if entry.user_id == contract.created_by {
            return Err(EngineError::validation(
                "the contract manager cannot be assigned as a participant",
            ));
        }
        if !users.insert(entry.user_id) {
            return Err(EngineError::validation(format!(
                "user {} appears more than once",
                entry.user_id
            )));
        }

        match (entry.role, entry.signing_order) {
            (ParticipantRole::ContractManager, _) => {
                return Err(EngineError::validation(
                    "the CM role is reserved for the contract owner",
                ));
            }
            (ParticipantRole::AuthorizedSigner, None) => {
                return Err(EngineError::validation(
                    "authorized signers require a signing_order",
                ));
            }
            (ParticipantRole::AuthorizedSigner, Some(order)) if order < 1 => {
                return Err(EngineError::validation("signing_order must be at least 1"));
            }
            (ParticipantRole::AuthorizedSigner, Some(order)) => {
                if !orders.insert(order) {
                    return Err(EngineError::validation(format!(
                        "signing_order {order} is assigned to more than one signer"
                    )));
                }
            }
            (ParticipantRole::Collaborator, Some(_)) => {
                return Err(EngineError::validation(
                    "collaborators cannot have a signing_order",
                ));
            }
            (ParticipantRole::Collaborator, None) => {}
        }
    }

    Ok(())
}

pub struct ParticipantRegistry {
    store: Arc<dyn ContractStore>,
}

impl ParticipantRegistry {
    pub fn new(store: Arc<dyn ContractStore>) -> Self {
        Self { store }
    }

    pub async fn assign_participants(
        &self,
        contract_id: Uuid,
        requested_by: Uuid,
        assignments: Vec<ParticipantAssignment>,
    ) -> EngineResult<Vec<Participant>> {
        let contract = self.load_contract(contract_id).await?;
        validate_assignments(&contract, requested_by, &assignments)?;

        if assignments.is_empty() {
            return Ok(self.store.list_participants(contract_id).await?);
        }

        let requested_users: HashSet<Uuid> =
            assignments.iter().map(|entry| entry.user_id).collect();
        let requested_orders: HashSet<i32> = assignments
            .iter()
            .filter_map(|entry| entry.signing_order)
            .collect();

        let existing = self.store.list_participants(contract_id).await?;
        if let Some(holder) = existing.iter().find(|participant| {
            !requested_users.contains(&participant.user_id)
                && participant
                    .signing_order
                    .is_some_and(|order| requested_orders.contains(&order))
        }) {
            return Err(EngineError::validation(format!(
                "signing_order {} is already held by user {}",
                holder.signing_order.unwrap_or_default(),
                holder.user_id
            )));
        }

        let rows = assignments
            .into_iter()
            .map(|entry| NewParticipant {
                id: Uuid::new_v4(),
                contract_id,
                user_id: entry.user_id,
                role: entry.role,
                signing_order: entry.signing_order,
                status: PARTICIPANT_STATUS_INVITED.to_string(),
            })
            .collect::<Vec<_>>();
        let count = rows.len();

        let participants = match self.store.upsert_participants(contract_id, rows).await {
            Ok(participants) => participants,
            Err(StoreError::Conflict(detail)) => {
                return Err(EngineError::validation(format!(
                    "signing order conflict: {detail}"
                )))
            }
            Err(err) => return Err(err.into()),
        };

        info!(%contract_id, %requested_by, count, "participants assigned");
        Ok(participants)
    }

    pub async fn remove_participant(
        &self,
        contract_id: Uuid,
        user_id: Uuid,
        requested_by: Uuid,
    ) -> EngineResult<()> {
        let contract = self.load_contract(contract_id).await?;
        ensure_participants_mutable(&contract)?;

        if requested_by != contract.created_by {
            return Err(EngineError::not_contract_manager());
        }
        if user_id == contract.created_by {
            return Err(EngineError::validation(
                "the contract manager cannot be removed",
            ));
        }
        if self
            .store
            .find_participant(contract_id, user_id)
            .await?
            .is_none()
        {
            return Err(EngineError::NotFound("participant"));
        }

        self.store.delete_participant(contract_id, user_id).await?;
        info!(%contract_id, %user_id, %requested_by, "participant removed");
        Ok(())
    }

    pub async fn list(&self, contract_id: Uuid) -> EngineResult<Vec<Participant>> {
        Ok(self.store.list_participants(contract_id).await?)
    }

    pub async fn is_member(&self, contract: &Contract, user_id: Uuid) -> EngineResult<bool> {
        if contract.created_by == user_id {
            return Ok(true);
        }
        Ok(self
            .store
            .find_participant(contract.id, user_id)
            .await?
            .is_some())
    }

    async fn load_contract(&self, contract_id: Uuid) -> EngineResult<Contract> {
        self.store
            .find_contract(contract_id)
            .await?
            .ok_or(EngineError::NotFound("contract"))
    }
}
