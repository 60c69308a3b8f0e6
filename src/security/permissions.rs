// Endpoint authorization: a fixed table mapping endpoint identifiers to the
// permission tokens that satisfy them, independent of how the caller was
// authenticated.

use std::collections::HashMap;

/// Satisfies any endpoint's requirement.
pub const WILDCARD: &str = "*";

#[derive(Debug, Clone)]
pub struct PermissionChecker {
    table: HashMap<String, Vec<String>>,
}

impl Default for PermissionChecker {
    fn default() -> Self {
        let entries: &[(&str, &[&str])] = &[
            ("/predict", &["predict", WILDCARD]),
            ("/explain", &["explain", WILDCARD]),
            ("/features", &["read", "features", WILDCARD]),
            ("/metrics", &["read", "metrics", WILDCARD]),
            ("/status", &["read", WILDCARD]),
            ("/health", &[WILDCARD]),
            ("/control/start", &["admin", "control", WILDCARD]),
            ("/control/stop", &["admin", "control", WILDCARD]),
            ("/control/config", &["admin", "control", WILDCARD]),
            ("/demo-data", &["read", "demo", WILDCARD]),
            // The gate's own surface. Registered here so the open default
            // for unknown endpoints never applies to key or token issuance.
            ("/admin/keys", &["admin", WILDCARD]),
            ("/admin/rate-limit/reset", &["admin", WILDCARD]),
            ("/auth/token", &["admin", "auth", WILDCARD]),
        ];

        Self::new(
            entries
                .iter()
                .map(|(endpoint, required)| {
                    (
                        (*endpoint).to_string(),
                        required.iter().map(|p| (*p).to_string()).collect(),
                    )
                })
                .collect(),
        )
    }
}

impl PermissionChecker {
    pub fn new(table: HashMap<String, Vec<String>>) -> Self {
        Self { table }
    }

    /// Whether `permissions` covers `endpoint`.
    ///
    /// True when any held permission appears in the endpoint's required set,
    /// when the caller holds the wildcard, or when the endpoint requires
    /// only the wildcard (public). Endpoints absent from the table admit
    /// anyone; that open default is deliberate and every sensitive route is
    /// registered above.
    pub fn has_permission(&self, endpoint: &str, permissions: &[String]) -> bool {
        let Some(required) = self.table.get(endpoint) else {
            return true;
        };
        if required.iter().all(|p| p == WILDCARD) {
            return true;
        }
        permissions
            .iter()
            .any(|held| held == WILDCARD || required.iter().any(|p| p == held))
    }

    /// Map a request path onto a known endpoint identifier by longest-prefix
    /// match at a path-segment boundary ("/admin/keys/ab12" -> "/admin/keys").
    /// Paths matching nothing are returned unchanged.
    pub fn resolve<'a>(&'a self, path: &'a str) -> &'a str {
        let mut best: Option<&str> = None;
        for endpoint in self.table.keys() {
            let matches = path == endpoint.as_str()
                || (path.starts_with(endpoint.as_str())
                    && path.as_bytes().get(endpoint.len()) == Some(&b'/'));
            if matches && best.is_none_or(|b| endpoint.len() > b.len()) {
                best = Some(endpoint.as_str());
            }
        }
        best.unwrap_or(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perms(list: &[&str]) -> Vec<String> {
        list.iter().map(|p| (*p).to_string()).collect()
    }

    #[test]
    fn wildcard_grants_everything() {
        let checker = PermissionChecker::default();
        let wildcard = perms(&[WILDCARD]);
        for endpoint in ["/predict", "/control/start", "/health", "/no-such-endpoint"] {
            assert!(checker.has_permission(endpoint, &wildcard), "{endpoint}");
        }
    }

    #[test]
    fn disjoint_set_is_denied() {
        let checker = PermissionChecker::default();
        assert!(!checker.has_permission("/predict", &perms(&["read", "demo"])));
        assert!(!checker.has_permission("/control/stop", &perms(&["predict"])));
    }

    #[test]
    fn matching_permission_is_granted() {
        let checker = PermissionChecker::default();
        assert!(checker.has_permission("/predict", &perms(&["predict"])));
        assert!(checker.has_permission("/features", &perms(&["read"])));
        assert!(checker.has_permission("/control/config", &perms(&["admin"])));
    }

    #[test]
    fn health_is_public() {
        let checker = PermissionChecker::default();
        assert!(checker.has_permission("/health", &[]));
    }

    #[test]
    fn unknown_endpoints_are_open() {
        let checker = PermissionChecker::default();
        assert!(checker.has_permission("/no-such-endpoint", &[]));
    }

    #[test]
    fn empty_set_denied_on_protected_endpoints() {
        let checker = PermissionChecker::default();
        assert!(!checker.has_permission("/predict", &[]));
        assert!(!checker.has_permission("/admin/keys", &[]));
    }

    #[test]
    fn resolve_prefix_matches_at_segment_boundaries() {
        let checker = PermissionChecker::default();
        assert_eq!(checker.resolve("/admin/keys/ab12cd34"), "/admin/keys");
        assert_eq!(checker.resolve("/control/start"), "/control/start");
        // Not a segment boundary: no match.
        assert_eq!(checker.resolve("/admin/keysmith"), "/admin/keysmith");
        assert_eq!(checker.resolve("/unknown"), "/unknown");
    }
}
