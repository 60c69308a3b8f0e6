// Session token issuance and verification. Tokens are self-contained and
// signed; the issuer keeps no per-token state, so verification is a pure
// function of the token, the shared secret, and the clock.

use chrono::{Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::error;

use super::permissions::WILDCARD;
use crate::config::AuthConfig;
use crate::error::{Error, Result};

/// Signed payload carried by every session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Identity the token was issued to.
    pub sub: String,
    /// Issued-at, seconds since the epoch.
    pub iat: i64,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Caller-supplied claims, flattened into the payload.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub struct TokenIssuer {
    header: Header,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    lifetime: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, algorithm: Algorithm, lifetime_hours: i64) -> Self {
        let mut validation = Validation::new(algorithm);
        // No leeway: expiry is exact.
        validation.leeway = 0;
        Self {
            header: Header::new(algorithm),
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            lifetime: Duration::hours(lifetime_hours),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        let algorithm = match config.algorithm.as_str() {
            "HS256" => Algorithm::HS256,
            "HS384" => Algorithm::HS384,
            "HS512" => Algorithm::HS512,
            other => {
                return Err(Error::Config(format!(
                    "unsupported signing algorithm: {other}"
                )));
            }
        };
        Ok(Self::new(
            &config.signing_secret,
            algorithm,
            config.token_lifetime_hours,
        ))
    }

    /// Seconds an issued token stays valid; surfaced in issuance responses.
    pub fn lifetime_secs(&self) -> i64 {
        self.lifetime.num_seconds()
    }

    /// Sign a token for `subject`, valid from now until now + lifetime.
    pub fn create_token(
        &self,
        subject: &str,
        permissions: Option<Vec<String>>,
        custom_claims: Option<Map<String, Value>>,
    ) -> Result<String> {
        let now = Utc::now();
        let claims = TokenClaims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: (now + self.lifetime).timestamp(),
            permissions: permissions.unwrap_or_else(|| vec![WILDCARD.to_string()]),
            extra: custom_claims.unwrap_or_default(),
        };

        encode(&self.header, &claims, &self.encoding).map_err(|e| {
            error!(error = %e, "token signing failed");
            Error::Internal
        })
    }

    /// Verify signature and expiry. Tampered, malformed and expired tokens
    /// all collapse into the same `None`; the caller learns nothing about
    /// which check failed.
    pub fn verify_token(&self, token: &str) -> Option<TokenClaims> {
        decode::<TokenClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new("unit-test-secret", Algorithm::HS256, 1)
    }

    #[test]
    fn round_trip_preserves_subject_and_permissions() {
        let issuer = issuer();
        let token = issuer
            .create_token("svc-7", Some(vec!["predict".to_string()]), None)
            .unwrap();

        let claims = issuer.verify_token(&token).expect("valid token");
        assert_eq!(claims.sub, "svc-7");
        assert_eq!(claims.permissions, vec!["predict".to_string()]);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn custom_claims_survive_the_round_trip() {
        let issuer = issuer();
        let mut extra = Map::new();
        extra.insert("tenant".to_string(), Value::String("acme".to_string()));

        let token = issuer.create_token("svc-7", None, Some(extra)).unwrap();
        let claims = issuer.verify_token(&token).expect("valid token");
        assert_eq!(claims.extra["tenant"], "acme");
    }

    #[test]
    fn default_permission_set_is_wildcard() {
        let issuer = issuer();
        let token = issuer.create_token("svc-7", None, None).unwrap();
        let claims = issuer.verify_token(&token).unwrap();
        assert_eq!(claims.permissions, vec![WILDCARD.to_string()]);
    }

    #[test]
    fn expired_token_is_rejected() {
        let issuer = issuer();
        let now = Utc::now();
        let claims = TokenClaims {
            sub: "svc-7".to_string(),
            iat: (now - Duration::hours(2)).timestamp(),
            exp: (now - Duration::hours(1)).timestamp(),
            permissions: vec![WILDCARD.to_string()],
            extra: Map::new(),
        };
        let token = encode(&issuer.header, &claims, &issuer.encoding).unwrap();

        assert!(issuer.verify_token(&token).is_none());
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let issuer = issuer();
        let token = issuer.create_token("svc-7", None, None).unwrap();

        let mut tampered = token.clone();
        let last = tampered.pop().unwrap();
        tampered.push(if last == 'A' { 'B' } else { 'A' });

        assert!(issuer.verify_token(&tampered).is_none());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issuer().create_token("svc-7", None, None).unwrap();
        let other = TokenIssuer::new("different-secret", Algorithm::HS256, 1);
        assert!(other.verify_token(&token).is_none());
    }

    #[test]
    fn garbage_is_rejected_not_an_error() {
        assert!(issuer().verify_token("not-a-token").is_none());
    }
}
