// ARCHITECTURE: Security Gate - Integrated Request Admission Layer
//
// Consulted once per inbound request. The sequence is fixed:
// 1. AUTHENTICATE: resolve the presented credential (API key or session
//    token) into an identity and permission set; no credential means an
//    anonymous caller keyed by network address with no permissions.
// 2. RATE LIMIT: admission check under the resolved client identifier.
// 3. AUTHORIZE: permission set against the endpoint table.
// Any negative outcome short-circuits the request.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use super::api_keys::{ApiKeyStore, KEY_PREFIX};
use super::permissions::PermissionChecker;
use super::rate_limiter::AdmissionControl;
use super::tokens::TokenIssuer;
use crate::config::RateLimitConfig;
use crate::error::{Error, Result};

/// Resolved per-request identity, inserted into request extensions for
/// downstream handlers.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
    /// Identifier the rate limiter tracked this request under.
    pub client_id: String,
    /// Token subject, when token-authenticated.
    pub subject: Option<String>,
    /// API key id, when key-authenticated.
    pub key_id: Option<String>,
    pub permissions: Vec<String>,
    /// Per-key rate-limit override carried as metadata.
    pub rate_limit: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GateMetrics {
    pub total_checks: u64,
    pub admitted: u64,
    pub rate_limited: u64,
    pub auth_failed: u64,
    pub permission_denied: u64,
}

pub struct SecurityGate {
    limiter: Arc<dyn AdmissionControl>,
    keys: Arc<ApiKeyStore>,
    tokens: Arc<TokenIssuer>,
    permissions: Arc<PermissionChecker>,
    metrics: RwLock<GateMetrics>,
}

impl SecurityGate {
    pub fn new(
        limiter: Arc<dyn AdmissionControl>,
        keys: Arc<ApiKeyStore>,
        tokens: Arc<TokenIssuer>,
        permissions: Arc<PermissionChecker>,
    ) -> Self {
        Self {
            limiter,
            keys,
            tokens,
            permissions,
            metrics: RwLock::new(GateMetrics::default()),
        }
    }

    /// Run the full admission sequence for one request.
    pub async fn check(
        &self,
        client_addr: &str,
        endpoint: &str,
        credential: Option<&str>,
    ) -> Result<RequestContext> {
        self.metrics.write().await.total_checks += 1;
        let endpoint = self.permissions.resolve(endpoint);

        let context = match credential {
            Some(secret) if secret.starts_with(KEY_PREFIX) => {
                match self.keys.validate_key(secret).await {
                    Some(key) => RequestContext {
                        request_id: Uuid::new_v4(),
                        client_id: key.key_id.clone(),
                        subject: None,
                        key_id: Some(key.key_id),
                        permissions: key.permissions,
                        rate_limit: key.rate_limit,
                    },
                    None => return self.deny_auth(client_addr, endpoint).await,
                }
            }
            Some(token) => match self.tokens.verify_token(token) {
                Some(claims) => RequestContext {
                    request_id: Uuid::new_v4(),
                    client_id: claims.sub.clone(),
                    subject: Some(claims.sub),
                    key_id: None,
                    permissions: claims.permissions,
                    rate_limit: None,
                },
                None => return self.deny_auth(client_addr, endpoint).await,
            },
            // No credential presented: an anonymous caller tracked by its
            // network address. The permission table decides what it reaches.
            None => RequestContext {
                request_id: Uuid::new_v4(),
                client_id: client_addr.to_string(),
                subject: None,
                key_id: None,
                permissions: Vec::new(),
                rate_limit: None,
            },
        };

        let decision = self.limiter.is_allowed(&context.client_id).await;
        if !decision.allowed {
            let retry_after = decision.retry_after.unwrap_or(1);
            self.metrics.write().await.rate_limited += 1;
            warn!(
                client_id = %context.client_id,
                endpoint = %endpoint,
                retry_after,
                "rate limit exceeded"
            );
            return Err(Error::RateLimited { retry_after });
        }

        if !self.permissions.has_permission(endpoint, &context.permissions) {
            self.metrics.write().await.permission_denied += 1;
            warn!(
                client_id = %context.client_id,
                endpoint = %endpoint,
                "permission denied"
            );
            return Err(Error::PermissionDenied);
        }

        self.metrics.write().await.admitted += 1;
        debug!(
            request_id = %context.request_id,
            client_id = %context.client_id,
            endpoint = %endpoint,
            "request admitted"
        );
        Ok(context)
    }

    async fn deny_auth(&self, client_addr: &str, endpoint: &str) -> Result<RequestContext> {
        self.metrics.write().await.auth_failed += 1;
        // One undifferentiated outcome for unknown, revoked, tampered and
        // expired credentials alike.
        warn!(client_addr = %client_addr, endpoint = %endpoint, "authentication failed");
        Err(Error::AuthenticationFailed)
    }

    /// Administrative override: clear a client's rate-limit state.
    pub async fn reset_client(&self, client_id: &str) {
        self.limiter.reset(client_id).await;
    }

    pub async fn metrics(&self) -> GateMetrics {
        self.metrics.read().await.clone()
    }

    /// Spawn the periodic sweep that evicts idle rate-limit records, keeping
    /// the client map bounded under churn. The caller owns the handle and
    /// aborts it on shutdown.
    pub fn start_sweeper(&self, config: &RateLimitConfig) -> JoinHandle<()> {
        let limiter = Arc::clone(&self.limiter);
        let period = Duration::from_secs(config.sweep_interval_secs);
        let max_idle = Duration::from_secs(config.client_idle_secs);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The immediate first tick would sweep an empty map.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                limiter.sweep(max_idle).await;
            }
        })
    }
}

/// Axum adapter: extract client address and credential from headers, run the
/// gate, and stash the context for handlers.
pub async fn security_layer(
    State(gate): State<Arc<SecurityGate>>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let client_addr = client_addr(request.headers());
    let credential = bearer_credential(request.headers());

    let context = gate
        .check(&client_addr, request.uri().path(), credential.as_deref())
        .await?;

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

fn client_addr(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

fn bearer_credential(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.to_string())
        .or_else(|| {
            headers
                .get("x-api-key")
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_for_takes_the_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        assert_eq!(client_addr(&headers), "203.0.113.9");
    }

    #[test]
    fn real_ip_is_the_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.4"));
        assert_eq!(client_addr(&headers), "198.51.100.4");
    }

    #[test]
    fn missing_headers_yield_unknown() {
        assert_eq!(client_addr(&HeaderMap::new()), "unknown");
    }

    #[test]
    fn credential_prefers_authorization_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer fg_abc"));
        headers.insert("x-api-key", HeaderValue::from_static("fg_other"));
        assert_eq!(bearer_credential(&headers).as_deref(), Some("fg_abc"));
    }

    #[test]
    fn api_key_header_is_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("fg_abc"));
        assert_eq!(bearer_credential(&headers).as_deref(), Some("fg_abc"));
    }

    #[test]
    fn basic_authorization_is_not_a_bearer_credential() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(bearer_credential(&headers), None);
    }
}
