// ARCHITECTURE: API Key Store - Opaque Bearer Credential Registry
//
// Secrets are generated once, returned to the caller once, and never stored:
// only a SHA-256 digest persists, and lookup goes through the digest map, so
// a disclosure of stored state cannot yield a usable credential. Revocation
// flips the active flag and keeps the record for audit; nothing is ever
// physically deleted.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use super::permissions::WILDCARD;
use crate::error::{Error, Result};

/// Recognizable prefix on every issued secret; lets the gate route a
/// presented credential to key validation without guessing.
pub const KEY_PREFIX: &str = "fg_";

/// One registered credential. The digest stays private to this module.
#[derive(Debug, Clone)]
pub struct ApiKey {
    pub key_id: String,
    pub name: String,
    digest: String,
    pub permissions: Vec<String>,
    pub rate_limit: Option<u32>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
    pub request_count: u64,
}

impl ApiKey {
    pub fn summary(&self) -> ApiKeySummary {
        ApiKeySummary {
            key_id: self.key_id.clone(),
            name: self.name.clone(),
            permissions: self.permissions.clone(),
            rate_limit: self.rate_limit,
            active: self.active,
            created_at: self.created_at,
            last_used: self.last_used,
            request_count: self.request_count,
        }
    }
}

/// Listing view. Carries neither the plaintext secret nor its digest.
#[derive(Debug, Clone, Serialize)]
pub struct ApiKeySummary {
    pub key_id: String,
    pub name: String,
    pub permissions: Vec<String>,
    pub rate_limit: Option<u32>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
    pub request_count: u64,
}

#[derive(Debug, Default)]
struct Inner {
    /// key_id -> metadata
    keys: HashMap<String, ApiKey>,
    /// sha256(plaintext) -> key_id
    digests: HashMap<String, String>,
}

/// In-memory credential registry. One lock over both maps keeps
/// digest-index and metadata in step; critical sections hold no await.
#[derive(Default)]
pub struct ApiKeyStore {
    inner: RwLock<Inner>,
}

impl ApiKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new credential. The plaintext secret is returned exactly once
    /// and is not recoverable afterwards.
    pub async fn create_key(
        &self,
        name: &str,
        permissions: Option<Vec<String>>,
        rate_limit: Option<u32>,
    ) -> Result<(String, ApiKeySummary)> {
        let secret = format!("{KEY_PREFIX}{}", hex::encode(random_bytes::<32>()?));
        let key_id = hex::encode(random_bytes::<8>()?);

        let key = ApiKey {
            key_id: key_id.clone(),
            name: name.to_string(),
            digest: digest_of(&secret),
            permissions: permissions.unwrap_or_else(|| vec![WILDCARD.to_string()]),
            rate_limit,
            active: true,
            created_at: Utc::now(),
            last_used: None,
            request_count: 0,
        };
        let summary = key.summary();

        let mut inner = self.inner.write().await;
        inner.digests.insert(key.digest.clone(), key_id.clone());
        inner.keys.insert(key_id.clone(), key);
        drop(inner);

        info!(key_id = %key_id, name = %name, "API key issued");
        Ok((secret, summary))
    }

    /// Register a credential whose plaintext the operator already holds
    /// (e.g. the bootstrap admin key from configuration). Stores the digest
    /// only, like any other key.
    pub async fn import_key(
        &self,
        name: &str,
        secret: &str,
        permissions: Vec<String>,
    ) -> Result<ApiKeySummary> {
        let key_id = hex::encode(random_bytes::<8>()?);
        let key = ApiKey {
            key_id: key_id.clone(),
            name: name.to_string(),
            digest: digest_of(secret),
            permissions,
            rate_limit: None,
            active: true,
            created_at: Utc::now(),
            last_used: None,
            request_count: 0,
        };
        let summary = key.summary();

        let mut inner = self.inner.write().await;
        inner.digests.insert(key.digest.clone(), key_id.clone());
        inner.keys.insert(key_id.clone(), key);
        drop(inner);

        info!(key_id = %key_id, name = %name, "API key imported");
        Ok(summary)
    }

    /// Validate a presented secret by digest lookup. A successful validation
    /// is itself an audit event: it bumps the usage counter and the
    /// last-used timestamp. Unknown and revoked keys are indistinguishable
    /// to the caller.
    pub async fn validate_key(&self, secret: &str) -> Option<ApiKey> {
        let digest = digest_of(secret);

        let mut inner = self.inner.write().await;
        let key_id = inner.digests.get(&digest)?.clone();
        let key = inner.keys.get_mut(&key_id)?;
        if !key.active {
            return None;
        }
        key.last_used = Some(Utc::now());
        key.request_count += 1;
        Some(key.clone())
    }

    /// Deactivate a key. Irreversible; the record is retained for audit.
    /// Returns false when the key id is unknown.
    pub async fn revoke_key(&self, key_id: &str) -> bool {
        let mut inner = self.inner.write().await;
        match inner.keys.get_mut(key_id) {
            Some(key) => {
                key.active = false;
                warn!(key_id = %key_id, "API key revoked");
                true
            }
            None => false,
        }
    }

    /// All registered keys, secrets and digests excluded.
    pub async fn list_keys(&self) -> Vec<ApiKeySummary> {
        self.inner
            .read()
            .await
            .keys
            .values()
            .map(ApiKey::summary)
            .collect()
    }
}

fn digest_of(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

fn random_bytes<const N: usize>() -> Result<[u8; N]> {
    let mut bytes = [0u8; N];
    OsRng.try_fill_bytes(&mut bytes).map_err(|e| {
        error!(error = %e, "OS randomness source failed");
        Error::Internal
    })?;
    Ok(bytes)
}
