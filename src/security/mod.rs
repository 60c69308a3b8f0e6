// ARCHITECTURE: Security Module - Request Gating Layer
//
// Decides, per incoming call, whether the caller is identified, authorized,
// and within its allotted rate before the call reaches business logic:
// 1. RATE LIMITING: per-client admission, three interchangeable strategies
// 2. API KEYS: digest-backed bearer credential registry
// 3. SESSION TOKENS: signed, stateless identity tokens
// 4. PERMISSIONS: endpoint-to-required-permission table
// 5. GATE: the per-request orchestration of the above

pub mod api_keys;
pub mod middleware;
pub mod permissions;
pub mod rate_limiter;
pub mod tokens;

pub use api_keys::{ApiKey, ApiKeyStore, ApiKeySummary};
pub use middleware::{GateMetrics, RequestContext, SecurityGate, security_layer};
pub use permissions::{PermissionChecker, WILDCARD};
pub use rate_limiter::{AdmissionControl, RateDecision};
pub use tokens::{TokenClaims, TokenIssuer};
