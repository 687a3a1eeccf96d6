use std::time::Duration;

use axum::{Json, http::StatusCode, response::IntoResponse};
use bb8_redis::{bb8::RunError, redis::RedisError};
use serde::Serialize;
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;

use crate::db::BackendKind;

/// Stable numeric codes attached to failure logs as the `code` field.
pub mod codes {
    pub const MYSQL_CONNECT: u16 = 151;
    pub const POSTGRES_CONNECT: u16 = 153;
    pub const SQLITE_CONNECT: u16 = 155;
    pub const KEY_VALUE_CONNECT: u16 = 161;
    pub const DOCUMENT_CONNECT: u16 = 171;
    pub const CREDENTIAL_INSERT: u16 = 1001;
}

#[derive(Debug, ThisError)]
pub enum StoreError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("{backend} backend did not connect within {after:?}")]
    ConnectTimeout {
        backend: BackendKind,
        after: Duration,
    },

    #[error("Database error: {0}")]
    Database(#[from] SqlxError),

    #[error("Key-value error: {0}")]
    KeyValue(#[from] RedisError),

    #[error("Document store error: {0}")]
    Document(#[from] mongodb::error::Error),

    #[error("timed out waiting for a pooled {0} connection")]
    PoolTimeout(BackendKind),

    #[error("{0} backend is not active")]
    BackendInactive(BackendKind),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed request body")]
    BadRequest,

    #[error("invalid email address")]
    InvalidEmail,

    #[error("email already registered")]
    EmailTaken,
}

impl From<RunError<RedisError>> for StoreError {
    fn from(e: RunError<RedisError>) -> Self {
        match e {
            RunError::User(inner) => StoreError::KeyValue(inner),
            RunError::TimedOut => StoreError::PoolTimeout(BackendKind::KeyValue),
        }
    }
}

impl IntoResponse for StoreError {
    fn into_response(self) -> axum::response::Response {
        let (status, code, message) = match self {
            StoreError::BadRequest => (StatusCode::BAD_REQUEST, "BAD_REQUEST", "bad request"),
            StoreError::InvalidEmail => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", "wrong email address")
            }
            StoreError::EmailTaken => (
                StatusCode::FORBIDDEN,
                "EMAIL_TAKEN",
                "email already registered",
            ),
            StoreError::Config(_)
            | StoreError::Figment(_)
            | StoreError::ConnectTimeout { .. }
            | StoreError::Database(_)
            | StoreError::KeyValue(_)
            | StoreError::Document(_)
            | StoreError::PoolTimeout(_)
            | StoreError::BackendInactive(_)
            | StoreError::Io(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "internal server error",
            ),
        };
        let body = ApiErrorResponse {
            error: ApiErrorBody {
                code: code.to_string(),
                message: message.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

/// Standardized API error response body
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}
