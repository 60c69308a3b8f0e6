use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Caller exceeded its allotted rate; recoverable after the hint.
    #[error("rate limit exceeded")]
    RateLimited { retry_after: u64 },

    /// Presented credential or token did not validate. The reason is
    /// deliberately not differentiated for the caller.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Authenticated, but the permission set does not cover the endpoint.
    #[error("permission denied")]
    PermissionDenied,

    #[error("unknown API key: {0}")]
    KeyNotFound(String),

    /// Fatal at startup only; never produced per-request.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal fault (e.g. randomness source failure). Never silently
    /// converted into an allow decision.
    #[error("internal error")]
    Internal,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Error::AuthenticationFailed => StatusCode::UNAUTHORIZED,
            Error::PermissionDenied => StatusCode::FORBIDDEN,
            Error::KeyNotFound(_) => StatusCode::NOT_FOUND,
            Error::Config(_) | Error::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let retry_after = match &self {
            Error::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        };

        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
            "retry_after": retry_after,
        }));

        let mut response = (status, body).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = secs.to_string().parse() {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
