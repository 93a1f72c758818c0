use async_trait::async_trait;
use chrono::Utc;
use diesel::{
    pg::{upsert::excluded, PgConnection},
    prelude::*,
    result::{DatabaseErrorKind, Error as DieselError},
};
use tokio::task;
use uuid::Uuid;

use super::{
    ContractRepository, EmbeddingRepository, ParticipantRepository, StoreError, StoreResult,
    TaskRepository, VersionRepository,
};
use crate::{
    db::PgPool,
    models::{
        AiTask, AiTaskType, Contract, ContractVersion, Embedding, NewAiTask, NewContract,
        NewContractVersion, NewEmbedding, NewParticipant, Participant,
    },
    schema::{ai_tasks, contract_participants, contract_versions, contracts, embeddings},
};

impl From<DieselError> for StoreError {
    fn from(value: DieselError) -> Self {
        match value {
            DieselError::NotFound => StoreError::NotFound,
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                StoreError::Conflict(info.message().to_string())
            }
            other => StoreError::Database(other.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn run<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| StoreError::Database(format!("database pool error: {err}")))?;
            f(&mut conn)
        })
        .await
        .map_err(|err| StoreError::Database(format!("store task panicked: {err}")))?
    }
}

#[async_trait]
impl ContractRepository for PgStore {
    async fn insert_contract(&self, contract: NewContract) -> StoreResult<Contract> {
        self.run(move |conn| {
            let created = diesel::insert_into(contracts::table)
                .values(&contract)
                .get_result(conn)?;
            Ok(created)
        })
        .await
    }

    async fn find_contract(&self, contract_id: Uuid) -> StoreResult<Option<Contract>> {
        self.run(move |conn| {
            let contract = contracts::table
                .find(contract_id)
                .first(conn)
                .optional()?;
            Ok(contract)
        })
        .await
    }

    async fn list_contracts_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Contract>> {
        self.run(move |conn| {
            let participating = contract_participants::table
                .filter(contract_participants::user_id.eq(user_id))
                .select(contract_participants::contract_id);

            let rows = contracts::table
                .filter(
                    contracts::created_by
                        .eq(user_id)
                        .or(contracts::id.eq_any(participating)),
                )
                .order(contracts::created_at.desc())
                .load(conn)?;
            Ok(rows)
        })
        .await
    }
}

#[async_trait]
impl VersionRepository for PgStore {
    async fn max_version_num(&self, contract_id: Uuid) -> StoreResult<Option<i32>> {
        self.run(move |conn| {
            let max = contract_versions::table
                .filter(contract_versions::contract_id.eq(contract_id))
                .select(diesel::dsl::max(contract_versions::version_num))
                .first::<Option<i32>>(conn)?;
            Ok(max)
        })
        .await
    }

    async fn insert_version(&self, version: NewContractVersion) -> StoreResult<ContractVersion> {
        self.run(move |conn| {
            let created = diesel::insert_into(contract_versions::table)
                .values(&version)
                .get_result(conn)?;
            Ok(created)
        })
        .await
    }

    async fn delete_version(&self, version_id: Uuid) -> StoreResult<()> {
        self.run(move |conn| {
            diesel::delete(contract_versions::table.find(version_id)).execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn find_version(&self, version_id: Uuid) -> StoreResult<Option<ContractVersion>> {
        self.run(move |conn| {
            let version = contract_versions::table
                .find(version_id)
                .first(conn)
                .optional()?;
            Ok(version)
        })
        .await
    }

    async fn find_version_by_num(
        &self,
        contract_id: Uuid,
        version_num: i32,
    ) -> StoreResult<Option<ContractVersion>> {
        self.run(move |conn| {
            let version = contract_versions::table
                .filter(contract_versions::contract_id.eq(contract_id))
                .filter(contract_versions::version_num.eq(version_num))
                .first(conn)
                .optional()?;
            Ok(version)
        })
        .await
    }

    async fn list_versions(&self, contract_id: Uuid) -> StoreResult<Vec<ContractVersion>> {
        self.run(move |conn| {
            let rows = contract_versions::table
                .filter(contract_versions::contract_id.eq(contract_id))
                .order(contract_versions::version_num.asc())
                .load(conn)?;
            Ok(rows)
        })
        .await
    }
}

fn load_participants(conn: &mut PgConnection, contract_id: Uuid) -> QueryResult<Vec<Participant>> {
    contract_participants::table
        .filter(contract_participants::contract_id.eq(contract_id))
        .order((
            contract_participants::role.asc(),
            contract_participants::signing_order.asc(),
            contract_participants::created_at.asc(),
        ))
        .load(conn)
}

#[async_trait]
impl ParticipantRepository for PgStore {
    async fn upsert_participants(
        &self,
        contract_id: Uuid,
        participants: Vec<NewParticipant>,
    ) -> StoreResult<Vec<Participant>> {
        self.run(move |conn| {
            let rows = conn.transaction(|conn| {
                let now = Utc::now().naive_utc();
                for participant in &participants {
                    diesel::insert_into(contract_participants::table)
                        .values(participant)
                        .on_conflict((
                            contract_participants::contract_id,
                            contract_participants::user_id,
                        ))
                        .do_update()
                        .set((
                            contract_participants::role.eq(excluded(contract_participants::role)),
                            contract_participants::signing_order
                                .eq(excluded(contract_participants::signing_order)),
                            contract_participants::status
                                .eq(excluded(contract_participants::status)),
                            contract_participants::updated_at.eq(now),
                        ))
                        .execute(conn)?;
                }

                // The signing-order constraint is deferred; force the check
                // here so a violation surfaces as this statement's error.
                diesel::sql_query("SET CONSTRAINTS contract_participants_signing_order_key IMMEDIATE")
                    .execute(conn)?;

                load_participants(conn, contract_id)
            })?;
            Ok(rows)
        })
        .await
    }

    async fn list_participants(&self, contract_id: Uuid) -> StoreResult<Vec<Participant>> {
        self.run(move |conn| Ok(load_participants(conn, contract_id)?))
            .await
    }

    async fn find_participant(
        &self,
        contract_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<Participant>> {
        self.run(move |conn| {
            let participant = contract_participants::table
                .filter(contract_participants::contract_id.eq(contract_id))
                .filter(contract_participants::user_id.eq(user_id))
                .first(conn)
                .optional()?;
            Ok(participant)
        })
        .await
    }

    async fn delete_participant(&self, contract_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        self.run(move |conn| {
            let deleted = diesel::delete(
                contract_participants::table
                    .filter(contract_participants::contract_id.eq(contract_id))
                    .filter(contract_participants::user_id.eq(user_id)),
            )
            .execute(conn)?;
            Ok(deleted > 0)
        })
        .await
    }
}

#[async_trait]
impl TaskRepository for PgStore {
    async fn upsert_task(&self, task: NewAiTask) -> StoreResult<AiTask> {
        self.run(move |conn| {
            let row = diesel::insert_into(ai_tasks::table)
                .values(&task)
                .on_conflict((
                    ai_tasks::contract_id,
                    ai_tasks::version_id,
                    ai_tasks::task_type,
                ))
                .do_update()
                .set((
                    ai_tasks::status.eq(excluded(ai_tasks::status)),
                    ai_tasks::result.eq(excluded(ai_tasks::result)),
                    ai_tasks::error.eq(excluded(ai_tasks::error)),
                    ai_tasks::updated_at.eq(Utc::now().naive_utc()),
                ))
                .get_result(conn)?;
            Ok(row)
        })
        .await
    }

    async fn find_task(
        &self,
        contract_id: Uuid,
        version_id: Uuid,
        task_type: AiTaskType,
    ) -> StoreResult<Option<AiTask>> {
        self.run(move |conn| {
            let row = ai_tasks::table
                .filter(ai_tasks::contract_id.eq(contract_id))
                .filter(ai_tasks::version_id.eq(version_id))
                .filter(ai_tasks::task_type.eq(task_type))
                .first(conn)
                .optional()?;
            Ok(row)
        })
        .await
    }

    async fn list_tasks_for_version(
        &self,
        contract_id: Uuid,
        version_id: Uuid,
    ) -> StoreResult<Vec<AiTask>> {
        self.run(move |conn| {
            let rows = ai_tasks::table
                .filter(ai_tasks::contract_id.eq(contract_id))
                .filter(ai_tasks::version_id.eq(version_id))
                .order(ai_tasks::task_type.asc())
                .load(conn)?;
            Ok(rows)
        })
        .await
    }

    async fn list_tasks_for_contract(&self, contract_id: Uuid) -> StoreResult<Vec<AiTask>> {
        self.run(move |conn| {
            let rows = ai_tasks::table
                .filter(ai_tasks::contract_id.eq(contract_id))
                .order((ai_tasks::version_id.asc(), ai_tasks::task_type.asc()))
                .load(conn)?;
            Ok(rows)
        })
        .await
    }
}

#[async_trait]
impl EmbeddingRepository for PgStore {
    async fn replace_embeddings(
        &self,
        version_id: Uuid,
        rows: Vec<NewEmbedding>,
    ) -> StoreResult<usize> {
        self.run(move |conn| {
            let inserted = conn.transaction(|conn| {
                diesel::delete(embeddings::table.filter(embeddings::version_id.eq(version_id)))
                    .execute(conn)?;
                if rows.is_empty() {
                    return Ok(0);
                }
                diesel::insert_into(embeddings::table)
                    .values(&rows)
                    .execute(conn)
            })?;
            Ok(inserted)
        })
        .await
    }

    async fn list_embeddings(&self, version_id: Uuid) -> StoreResult<Vec<Embedding>> {
        self.run(move |conn| {
            let rows = embeddings::table
                .filter(embeddings::version_id.eq(version_id))
                .order(embeddings::chunk_index.asc())
                .load(conn)?;
            Ok(rows)
        })
        .await
    }
}
