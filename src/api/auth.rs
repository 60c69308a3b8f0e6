// Session token issuance.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::AppState;
use crate::error::Result;

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub subject: String,
    pub permissions: Option<Vec<String>>,
    /// Extra claims embedded verbatim in the token payload.
    pub claims: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

pub async fn issue_token(
    State(state): State<AppState>,
    Json(request): Json<TokenRequest>,
) -> Result<Json<TokenResponse>> {
    let token = state.tokens.create_token(
        &request.subject,
        request.permissions,
        request.claims,
    )?;
    Ok(Json(TokenResponse {
        token,
        token_type: "Bearer",
        expires_in: state.tokens.lifetime_secs(),
    }))
}
