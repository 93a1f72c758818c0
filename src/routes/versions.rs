use std::time::Duration;

use axum::extract::{Json, Multipart, Path, State};
use axum::http::StatusCode;
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use super::{load_visible_contract, to_iso};
use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::ContractVersion;
use crate::state::AppState;
use crate::storage::{version_object_key, PDF_CONTENT_TYPE};

const PRESIGNED_URL_EXPIRY_SECONDS: u64 = 300;

#[derive(Serialize, Clone)]
pub struct VersionResponse {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub version_num: i32,
    pub file_url: String,
    pub checksum: String,
    pub size_bytes: i64,
    pub status: String,
    pub created_at: String,
}

impl From<ContractVersion> for VersionResponse {
    fn from(version: ContractVersion) -> Self {
        Self {
            id: version.id,
            contract_id: version.contract_id,
            version_num: version.version_num,
            file_url: version.file_url,
            checksum: version.checksum,
            size_bytes: version.size_bytes,
            status: version.status,
            created_at: to_iso(version.created_at),
        }
    }
}

#[derive(Serialize)]
pub struct UploadVersionResponse {
    #[serde(flatten)]
    pub version: VersionResponse,
    pub jobs: Vec<&'static str>,
}

#[derive(Serialize)]
pub struct VersionDownloadResponse {
    pub url: String,
    pub expires_in: u64,
    pub filename: String,
    pub size_bytes: i64,
}

fn is_pdf(file_name: Option<&str>, content_type: Option<&str>) -> bool {
    if content_type.is_some_and(|mime| mime.eq_ignore_ascii_case(PDF_CONTENT_TYPE)) {
        return true;
    }
    file_name.is_some_and(|name| {
        mime_guess::from_path(name)
            .first()
            .is_some_and(|mime| mime.essence_str() == PDF_CONTENT_TYPE)
    })
}

pub async fn upload_version(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(contract_id): Path<Uuid>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<UploadVersionResponse>)> {
    let contract = load_visible_contract(&state, contract_id, &user).await?;
    if contract.created_by != user.user_id {
        return Err(AppError::forbidden(
            "only the contract manager may upload versions",
        ));
    }

    let mut file_bytes: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut content_type: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        error!(error = %err, "invalid multipart data");
        AppError::bad_request(format!("invalid multipart data: {err}"))
    })? {
        if field.name() != Some("file") {
            continue;
        }
        file_name = field.file_name().map(str::to_string);
        content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(|err| {
            error!(error = %err, "failed to read file bytes");
            AppError::bad_request(format!("failed to read file bytes: {err}"))
        })?;
        file_bytes = Some(data.to_vec());
    }

    let file_bytes = file_bytes.ok_or_else(|| AppError::bad_request("file field is required"))?;
    if file_bytes.is_empty() {
        return Err(AppError::bad_request("file field must not be empty"));
    }
    if !is_pdf(file_name.as_deref(), content_type.as_deref()) {
        return Err(AppError::bad_request("only PDF documents are supported"));
    }

    let version = state
        .versions
        .create_next_version(contract_id, file_bytes)
        .await?;
    let jobs = state
        .orchestrator
        .on_version_created(&version)
        .await
        .into_iter()
        .map(|task_type| task_type.job_type())
        .collect();

    info!(%contract_id, version_id = %version.id, version_num = version.version_num, "version upload accepted");
    Ok((
        StatusCode::CREATED,
        Json(UploadVersionResponse {
            version: version.into(),
            jobs,
        }),
    ))
}

pub async fn list_versions(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(contract_id): Path<Uuid>,
) -> AppResult<Json<Vec<VersionResponse>>> {
    load_visible_contract(&state, contract_id, &user).await?;
    let versions = state.store.list_versions(contract_id).await?;
    Ok(Json(versions.into_iter().map(Into::into).collect()))
}

pub async fn download_version(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((contract_id, version_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<VersionDownloadResponse>> {
    load_visible_contract(&state, contract_id, &user).await?;
    let version = state
        .store
        .find_version(version_id)
        .await?
        .filter(|version| version.contract_id == contract_id)
        .ok_or_else(AppError::not_found)?;

    let key = version_object_key(contract_id, version.version_num);
    let url = state
        .storage
        .presign_get_object(&key, Duration::from_secs(PRESIGNED_URL_EXPIRY_SECONDS))
        .await
        .map_err(|err| AppError::internal(format!("failed to generate download URL: {err}")))?;

    Ok(Json(VersionDownloadResponse {
        url,
        expires_in: PRESIGNED_URL_EXPIRY_SECONDS,
        filename: format!("v{}.pdf", version.version_num),
        size_bytes: version.size_bytes,
    }))
}
