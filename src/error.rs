use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt::Display;
use thiserror::Error;

use crate::{analysis::AnalysisError, jobs::JobQueueError, store::StoreError};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized")
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "resource not found")
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn internal<E: Display>(error: E) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (status, body).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Authorization(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("contract is signed; participants can no longer be changed")]
    Lifecycle,
    #[error("could not allocate a version number after {attempts} attempts")]
    VersionConflict { attempts: u32 },
    #[error("blob storage error: {0}")]
    Storage(anyhow::Error),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Queue(#[from] JobQueueError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        EngineError::Validation(message.into())
    }

    pub fn not_contract_manager() -> Self {
        EngineError::Authorization("only the contract manager may perform this action".into())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

impl From<EngineError> for AppError {
    fn from(value: EngineError) -> Self {
        match value {
            EngineError::Validation(message) => AppError::bad_request(message),
            EngineError::Authorization(message) => AppError::forbidden(message),
            EngineError::NotFound(what) => {
                AppError::new(StatusCode::NOT_FOUND, format!("{what} not found"))
            }
            err @ EngineError::Lifecycle => AppError::conflict(err.to_string()),
            err @ EngineError::VersionConflict { .. } => AppError::conflict(err.to_string()),
            EngineError::Store(StoreError::NotFound) => AppError::not_found(),
            err @ EngineError::Analysis(_) => {
                AppError::new(StatusCode::BAD_GATEWAY, err.to_string())
            }
            other => AppError::internal(other),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(value: StoreError) -> Self {
        AppError::from(EngineError::from(value))
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        AppError::internal(value)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        AppError::internal(value)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        AppError::internal(value)
    }
}
