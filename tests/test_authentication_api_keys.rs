// Credential lifecycle scenarios: issuance, repeated validation, revocation,
// and what listings are allowed to reveal.

use fraudguard_gate::security::{ApiKeyStore, TokenIssuer};
use jsonwebtoken::Algorithm;

#[tokio::test]
async fn full_key_lifecycle() {
    let store = ApiKeyStore::new();

    let (secret, issued) = store
        .create_key("reporting-job", Some(vec!["read".to_string()]), Some(120))
        .await
        .unwrap();
    assert!(secret.starts_with("fg_"));
    assert!(issued.active);

    // Validation is idempotent on the decision, not on the audit counters.
    for expected in 1..=5u64 {
        let key = store.validate_key(&secret).await.expect("valid key");
        assert_eq!(key.request_count, expected);
    }

    assert!(store.revoke_key(&issued.key_id).await);
    assert!(store.validate_key(&secret).await.is_none());

    // Revocation retains the record for audit.
    let listed = store.list_keys().await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].request_count, 5);
    assert!(!listed[0].active);
}

#[tokio::test]
async fn two_keys_do_not_interfere() {
    let store = ApiKeyStore::new();
    let (secret_a, key_a) = store.create_key("a", None, None).await.unwrap();
    let (secret_b, _) = store.create_key("b", None, None).await.unwrap();

    assert_ne!(secret_a, secret_b);

    store.revoke_key(&key_a.key_id).await;
    assert!(store.validate_key(&secret_a).await.is_none());
    assert!(store.validate_key(&secret_b).await.is_some());
}

#[tokio::test]
async fn listings_reveal_no_secret_material() {
    let store = ApiKeyStore::new();
    let (secret, _) = store.create_key("leak-check", None, None).await.unwrap();

    let rendered = serde_json::to_string(&store.list_keys().await).unwrap();
    assert!(!rendered.contains(&secret));
    // Not even a substring of the secret beyond the public prefix.
    assert!(!rendered.contains(&secret["fg_".len()..]));
}

#[test]
fn token_carries_identity_and_scopes() {
    let issuer = TokenIssuer::new("integration-secret", Algorithm::HS256, 24);

    let token = issuer
        .create_token(
            "svc-batch",
            Some(vec!["predict".to_string(), "read".to_string()]),
            None,
        )
        .unwrap();
    let claims = issuer.verify_token(&token).expect("fresh token is valid");

    assert_eq!(claims.sub, "svc-batch");
    assert_eq!(claims.permissions, vec!["predict", "read"]);
    assert_eq!(claims.exp - claims.iat, 24 * 3600);
}

#[test]
fn altered_token_is_invalid() {
    let issuer = TokenIssuer::new("integration-secret", Algorithm::HS256, 24);
    let token = issuer.create_token("svc-batch", None, None).unwrap();

    // Flip one character of the signature segment.
    let mut altered = token.clone();
    let last = altered.pop().unwrap();
    altered.push(if last == 'x' { 'y' } else { 'x' });
    assert!(issuer.verify_token(&altered).is_none());

    // The untouched token still verifies.
    assert!(issuer.verify_token(&token).is_some());
}
