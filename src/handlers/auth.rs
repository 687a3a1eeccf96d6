use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};

use crate::db::CredentialRecord;
use crate::error::StoreError;
use crate::router::AppState;
use crate::service::accounts::{self, RegisterRequest};

/// POST /api/v1/register
pub async fn register_handler(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CredentialRecord>), StoreError> {
    let Json(req) = payload.map_err(|_| StoreError::BadRequest)?;
    let record = accounts::create_account(state.relational()?, req).await?;
    Ok((StatusCode::CREATED, Json(record)))
}
