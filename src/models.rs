use std::{fmt, str::FromStr};

use chrono::{NaiveDate, NaiveDateTime};
use diesel::{
    deserialize::{self, FromSql, FromSqlRow},
    expression::AsExpression,
    pg::{Pg, PgValue},
    prelude::*,
    serialize::{self, Output, ToSql},
    sql_types::Text,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::schema::*;

pub const VERSION_STATUS_DRAFT: &str = "Draft";
pub const PARTICIPANT_STATUS_INVITED: &str = "Invited";

#[derive(Debug, Error)]
#[error("unknown {kind} value '{value}'")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

macro_rules! text_column_enum {
    ($ty:ty) => {
        impl ToSql<Text, Pg> for $ty {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
                <str as ToSql<Text, Pg>>::to_sql(self.as_str(), out)
            }
        }

        impl FromSql<Text, Pg> for $ty {
            fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
                let raw = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
                Ok(raw.parse::<$ty>()?)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = Text)]
pub enum ContractStatus {
    Draft,
    NeedsRevision,
    AwaitingSignatures,
    Signed,
    ExpiringSoon,
    Expired,
}

impl ContractStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::Draft => "Draft",
            ContractStatus::NeedsRevision => "NeedsRevision",
            ContractStatus::AwaitingSignatures => "AwaitingSignatures",
            ContractStatus::Signed => "Signed",
            ContractStatus::ExpiringSoon => "ExpiringSoon",
            ContractStatus::Expired => "Expired",
        }
    }
}

impl FromStr for ContractStatus {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Draft" => Ok(ContractStatus::Draft),
            "NeedsRevision" => Ok(ContractStatus::NeedsRevision),
            "AwaitingSignatures" => Ok(ContractStatus::AwaitingSignatures),
            "Signed" => Ok(ContractStatus::Signed),
            "ExpiringSoon" => Ok(ContractStatus::ExpiringSoon),
            "Expired" => Ok(ContractStatus::Expired),
            other => Err(UnknownVariant::new("contract status", other)),
        }
    }
}

text_column_enum!(ContractStatus);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = Text)]
pub enum ParticipantRole {
    #[serde(rename = "CM")]
    ContractManager,
    #[serde(rename = "AS")]
    AuthorizedSigner,
    #[serde(rename = "CO")]
    Collaborator,
}

impl ParticipantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantRole::ContractManager => "CM",
            ParticipantRole::AuthorizedSigner => "AS",
            ParticipantRole::Collaborator => "CO",
        }
    }
}

impl FromStr for ParticipantRole {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "CM" => Ok(ParticipantRole::ContractManager),
            "AS" => Ok(ParticipantRole::AuthorizedSigner),
            "CO" => Ok(ParticipantRole::Collaborator),
            other => Err(UnknownVariant::new("participant role", other)),
        }
    }
}

text_column_enum!(ParticipantRole);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = Text)]
pub enum AiTaskType {
    Embedding,
    ClauseExtraction,
    RiskAssessment,
    Diff,
}

impl AiTaskType {
    pub const ALL: [AiTaskType; 4] = [
        AiTaskType::Embedding,
        AiTaskType::ClauseExtraction,
        AiTaskType::RiskAssessment,
        AiTaskType::Diff,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AiTaskType::Embedding => "Embedding",
            AiTaskType::ClauseExtraction => "ClauseExtraction",
            AiTaskType::RiskAssessment => "RiskAssessment",
            AiTaskType::Diff => "Diff",
        }
    }

    pub fn job_type(&self) -> &'static str {
        match self {
            AiTaskType::Embedding => crate::jobs::JOB_EMBEDDING,
            AiTaskType::ClauseExtraction => crate::jobs::JOB_CLAUSE_EXTRACTION,
            AiTaskType::RiskAssessment => crate::jobs::JOB_RISK_ASSESSMENT,
            AiTaskType::Diff => crate::jobs::JOB_DIFF,
        }
    }

    pub fn from_job_type(job_type: &str) -> Option<Self> {
        AiTaskType::ALL
            .into_iter()
            .find(|task_type| task_type.job_type() == job_type)
    }
}

impl FromStr for AiTaskType {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Embedding" => Ok(AiTaskType::Embedding),
            "ClauseExtraction" => Ok(AiTaskType::ClauseExtraction),
            "RiskAssessment" => Ok(AiTaskType::RiskAssessment),
            "Diff" => Ok(AiTaskType::Diff),
            other => Err(UnknownVariant::new("task type", other)),
        }
    }
}

text_column_enum!(AiTaskType);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = Text)]
pub enum AiTaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl AiTaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiTaskStatus::Pending => "Pending",
            AiTaskStatus::Running => "Running",
            AiTaskStatus::Completed => "Completed",
            AiTaskStatus::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AiTaskStatus::Completed | AiTaskStatus::Failed)
    }
}

impl FromStr for AiTaskStatus {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Pending" => Ok(AiTaskStatus::Pending),
            "Running" => Ok(AiTaskStatus::Running),
            "Completed" => Ok(AiTaskStatus::Completed),
            "Failed" => Ok(AiTaskStatus::Failed),
            other => Err(UnknownVariant::new("task status", other)),
        }
    }
}

text_column_enum!(AiTaskStatus);

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = contracts)]
pub struct Contract {
    pub id: Uuid,
    pub title: String,
    pub status: ContractStatus,
    pub expiry_date: Option<NaiveDate>,
    pub created_by: Uuid,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = contracts)]
pub struct NewContract {
    pub id: Uuid,
    pub title: String,
    pub status: ContractStatus,
    pub expiry_date: Option<NaiveDate>,
    pub created_by: Uuid,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = contract_versions)]
#[diesel(belongs_to(Contract))]
pub struct ContractVersion {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub version_num: i32,
    pub file_url: String,
    pub checksum: String,
    pub size_bytes: i64,
    pub status: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = contract_versions)]
pub struct NewContractVersion {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub version_num: i32,
    pub file_url: String,
    pub checksum: String,
    pub size_bytes: i64,
    pub status: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = contract_participants)]
#[diesel(belongs_to(Contract))]
pub struct Participant {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub user_id: Uuid,
    pub role: ParticipantRole,
    pub signing_order: Option<i32>,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = contract_participants)]
pub struct NewParticipant {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub user_id: Uuid,
    pub role: ParticipantRole,
    pub signing_order: Option<i32>,
    pub status: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = ai_tasks)]
#[diesel(belongs_to(ContractVersion, foreign_key = version_id))]
pub struct AiTask {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub version_id: Uuid,
    pub task_type: AiTaskType,
    pub status: AiTaskStatus,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = ai_tasks)]
pub struct NewAiTask {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub version_id: Uuid,
    pub task_type: AiTaskType,
    pub status: AiTaskStatus,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = embeddings)]
pub struct Embedding {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub version_id: Uuid,
    pub chunk_index: i32,
    pub text: String,
    pub page_num: i32,
    pub embedding: serde_json::Value,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = embeddings)]
pub struct NewEmbedding {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub version_id: Uuid,
    pub chunk_index: i32,
    pub text: String,
    pub page_num: i32,
    pub embedding: serde_json::Value,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = jobs)]
pub struct Job {
    pub id: Uuid,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub attempts: i32,
    pub run_after: NaiveDateTime,
    pub last_error: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = jobs)]
pub struct NewJob {
    pub id: Uuid,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub run_after: NaiveDateTime,
}
