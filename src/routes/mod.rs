use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Router,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    models::Contract,
    state::AppState,
};

pub mod chat;
pub mod contracts;
pub mod health;
pub mod participants;
pub mod tasks;
pub mod versions;

const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .filter_map(|value| match value.parse::<HeaderValue>() {
                Ok(header) => Some(header),
                Err(_) => {
                    warn!(origin = value, "ignoring invalid CORS allowed origin");
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(headers))
            .allow_methods(AllowMethods::mirror_request())
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(AllowMethods::mirror_request())
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let contract_routes = Router::new()
        .route(
            "/",
            get(contracts::list_contracts).post(contracts::create_contract),
        )
        .route("/:id", get(contracts::get_contract))
        .route(
            "/:id/versions",
            get(versions::list_versions).post(versions::upload_version),
        )
        .route(
            "/:id/versions/:version_id/download",
            get(versions::download_version),
        )
        .route("/:id/versions/:version_id/chat", post(chat::ask_question))
        .route("/:id/versions/:version_id/tasks", get(tasks::list_tasks))
        .route(
            "/:id/versions/:version_id/tasks/:job",
            get(tasks::get_task).post(tasks::trigger_task),
        )
        .route(
            "/:id/participants",
            get(participants::list_participants).post(participants::assign_participants),
        )
        .route(
            "/:id/participants/:user_id",
            delete(participants::remove_participant),
        );

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/api/contracts", contract_routes)
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    Router::new()
        .merge(protected_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

pub(crate) fn to_iso(dt: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc).to_rfc3339()
}

/// Non-members get a 404 so contract ids do not leak.
pub(crate) async fn load_visible_contract(
    state: &AppState,
    contract_id: Uuid,
    user: &AuthenticatedUser,
) -> AppResult<Contract> {
    let contract = state
        .store
        .find_contract(contract_id)
        .await?
        .ok_or_else(AppError::not_found)?;

    if !state.participants.is_member(&contract, user.user_id).await? {
        return Err(AppError::not_found());
    }
    Ok(contract)
}
