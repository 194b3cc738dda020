//! Issue, validate and exchange: the session lifecycle end to end

mod common;

use std::sync::Arc;

use common::{NOW, SECRET, TestUser, harness, harness_with, user};
use pretty_assertions::assert_eq;
use serde_json::json;
use sessionguard_auth::token::{Algorithm, HmacSigner, Token, TokenError, validate};
use sessionguard_auth::{AuthConfig, AuthError};

#[tokio::test]
async fn test_issued_token_validates_and_authenticates() {
    let h = harness();
    let issued = h.auth.generate_tokens(&user("u1"), None, NOW).await.unwrap();

    let token = Token::decode_at(&issued.access_token, NOW).unwrap();
    h.auth.validate_access_token(&token, NOW + 10).unwrap();

    let authenticated = h.auth.authenticate(&issued.access_token, NOW + 10).await.unwrap();
    assert_eq!(authenticated.identity, user("u1"));
    assert!(!authenticated.was_refreshed());
    assert_eq!(authenticated.token.payload.prop("role"), Some(&json!("member")));
}

#[tokio::test]
async fn test_refresh_token_is_single_use() {
    let h = harness();
    let issued = h.auth.generate_tokens(&user("u1"), Some(900), NOW).await.unwrap();

    let renewed = h
        .auth
        .refresh_access_token(&issued.refresh_token, NOW + 60)
        .await
        .unwrap();
    assert_ne!(renewed.refresh_token, issued.refresh_token);
    assert_ne!(renewed.access_token, issued.access_token);
    // session duration survives the exchange
    assert_eq!(renewed.token.payload.lifetime(), 900);
    assert_eq!(renewed.expires_at, NOW + 60 + 900);

    let second = h
        .auth
        .refresh_access_token(&issued.refresh_token, NOW + 61)
        .await;
    assert!(matches!(second, Err(AuthError::InvalidRefreshToken)));

    // the replacement refresh token works in turn
    assert!(
        h.auth
            .refresh_access_token(&renewed.refresh_token, NOW + 120)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_unknown_refresh_token_is_invalid() {
    let h = harness();
    let result = h.auth.refresh_access_token("no-such-token", NOW).await;
    assert!(matches!(result, Err(AuthError::InvalidRefreshToken)));
}

#[tokio::test]
async fn test_refresh_token_for_deleted_identity_is_invalid_and_consumed() {
    let h = harness();
    let issued = h.auth.generate_tokens(&user("u1"), None, NOW).await.unwrap();
    h.users.remove("u1");

    let result = h.auth.refresh_access_token(&issued.refresh_token, NOW).await;
    assert!(matches!(result, Err(AuthError::InvalidRefreshToken)));

    h.users.insert(user("u1"));
    let retry = h.auth.refresh_access_token(&issued.refresh_token, NOW).await;
    assert!(matches!(retry, Err(AuthError::InvalidRefreshToken)));
}

#[tokio::test]
async fn test_exchange_picks_up_changed_claims() {
    let h = harness();
    let issued = h.auth.generate_tokens(&user("u1"), None, NOW).await.unwrap();
    h.users.insert(TestUser::new("u1", "owner"));

    let renewed = h
        .auth
        .refresh_access_token(&issued.refresh_token, NOW + 5)
        .await
        .unwrap();
    assert_eq!(renewed.token.payload.prop("role"), Some(&json!("owner")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_exchange_has_one_winner() {
    let h = Arc::new(harness());
    let issued = h.auth.generate_tokens(&user("u2"), None, NOW).await.unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let h = Arc::clone(&h);
            let refresh_token = issued.refresh_token.clone();
            tokio::spawn(async move { h.auth.refresh_access_token(&refresh_token, NOW).await })
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(AuthError::InvalidRefreshToken) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(successes, 1);
}

#[tokio::test]
async fn test_authenticate_rejects_bad_tokens() {
    let h = harness();
    let issued = h.auth.generate_tokens(&user("u1"), None, NOW).await.unwrap();

    assert!(h.auth.authenticate("garbage", NOW).await.is_none());

    // tampered signature
    let mut tampered = issued.access_token.clone();
    let last = tampered.pop().unwrap();
    tampered.push(if last == 'A' { 'B' } else { 'A' });
    assert!(h.auth.authenticate(&tampered, NOW).await.is_none());

    // signed with another key
    let foreign = Token::new(
        issued.token.header.clone(),
        issued.token.payload.clone(),
    )
    .encode(&HmacSigner::new("another-secret-that-is-long-enough"));
    assert!(h.auth.authenticate(&foreign, NOW).await.is_none());

    // subject deleted after issuance
    h.users.remove("u1");
    assert!(h.auth.authenticate(&issued.access_token, NOW).await.is_none());
}

#[tokio::test]
async fn test_not_yet_valid_token_is_never_refreshed() {
    let h = harness();
    let signer = HmacSigner::new(SECRET);
    let token = Token::new(
        sessionguard_auth::token::Header::new(Algorithm::HS256),
        sessionguard_auth::token::Payload::new(NOW, NOW + 3600)
            .with_subject("u1")
            .with_not_before(NOW + 100),
    );
    let encoded = token.encode(&signer);

    let decoded = Token::decode_at(&encoded, NOW).unwrap();
    assert_eq!(
        validate(&decoded, &signer, NOW),
        Err(TokenError::FutureToken {
            nbf: NOW + 100,
            now: NOW
        })
    );
    assert!(h.auth.authenticate(&encoded, NOW).await.is_none());
    assert!(h.cache.is_empty());
}

#[tokio::test]
async fn test_custom_prefix_and_algorithm() {
    let config = AuthConfig::builder()
        .secret_key(SECRET)
        .algorithm(Algorithm::HS512)
        .cache_prefix("app:")
        .build()
        .unwrap();
    let h = harness_with(config);
    let issued = h.auth.generate_tokens(&user("u1"), None, NOW).await.unwrap();

    assert_eq!(issued.token.header.algorithm, Algorithm::HS512);
    assert!(h.auth.refresh_tokens().key(&issued.refresh_token).starts_with("app:rt:"));
    assert!(h.auth.refresh_tokens().peek(&issued.refresh_token).await.unwrap().is_some());
}
