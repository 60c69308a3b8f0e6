// Administrative surface: key lifecycle, rate-limit overrides, gate metrics.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::{Error, Result};
use crate::security::{ApiKeySummary, GateMetrics};

#[derive(Debug, Deserialize)]
pub struct CreateKeyRequest {
    pub name: String,
    pub permissions: Option<Vec<String>>,
    pub rate_limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct CreateKeyResponse {
    /// Shown exactly once; only a digest is retained server-side.
    pub secret: String,
    #[serde(flatten)]
    pub key: ApiKeySummary,
}

pub async fn create_key(
    State(state): State<AppState>,
    Json(request): Json<CreateKeyRequest>,
) -> Result<(StatusCode, Json<CreateKeyResponse>)> {
    let (secret, key) = state
        .keys
        .create_key(&request.name, request.permissions, request.rate_limit)
        .await?;
    Ok((StatusCode::CREATED, Json(CreateKeyResponse { secret, key })))
}

pub async fn list_keys(State(state): State<AppState>) -> Json<Vec<ApiKeySummary>> {
    Json(state.keys.list_keys().await)
}

pub async fn revoke_key(
    State(state): State<AppState>,
    Path(key_id): Path<String>,
) -> Result<StatusCode> {
    if state.keys.revoke_key(&key_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::KeyNotFound(key_id))
    }
}

pub async fn reset_rate_limit(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> StatusCode {
    state.gate.reset_client(&client_id).await;
    StatusCode::NO_CONTENT
}

pub async fn gate_metrics(State(state): State<AppState>) -> Json<GateMetrics> {
    Json(state.gate.metrics().await)
}
