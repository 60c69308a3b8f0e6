// ARCHITECTURE: API Module - The Gate's Own HTTP Surface
//
// 1. ADMIN (admin.rs): API key lifecycle, rate-limit overrides, gate metrics
//    - POST   /admin/keys: issue a key (plaintext returned exactly once)
//    - GET    /admin/keys: list key metadata (no secret material)
//    - DELETE /admin/keys/{key_id}: revoke
//    - POST   /admin/rate-limit/reset/{client_id}: clear a client's state
//    - GET    /metrics: gate counters
// 2. AUTH (auth.rs): session token issuance
//    - POST /auth/token
// 3. HEALTH (health.rs): GET /health, public liveness indicator
//
// Every route except /health sits behind the security gate and requires the
// admin scope; the business endpoints this gate fronts live elsewhere.

pub mod admin;
pub mod auth;
pub mod health;

use std::sync::Arc;

use crate::security::{ApiKeyStore, SecurityGate, TokenIssuer};

#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<SecurityGate>,
    pub keys: Arc<ApiKeyStore>,
    pub tokens: Arc<TokenIssuer>,
}
