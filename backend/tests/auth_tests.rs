//! Authentication tests
//!
//! Property-based and unit tests for:
//! - Access token signing and validation
//! - Verification and refresh token hashing
//! - Error mapping of authentication failures

use axum::{http::StatusCode, response::IntoResponse};
use proptest::prelude::*;
use uuid::Uuid;

use tradeflow_backend::error::AppError;
use tradeflow_backend::services::auth::{decode_access_token, encode_access_token, hash_token};

// ============================================================================
// Property Test Strategies
// ============================================================================

/// Generate valid user names (3-32 characters, alphanumeric or underscore)
fn user_name_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_]{3,32}"
}

/// Generate signing secrets
fn secret_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9]{16,64}"
}

/// Generate opaque tokens as issued in verification links
fn opaque_token_strategy() -> impl Strategy<Value = String> {
    "[a-f0-9]{32,64}"
}

// ============================================================================
// Access tokens
// ============================================================================

proptest! {
    #[test]
    fn access_token_carries_user(
        user_name in user_name_strategy(),
        secret in secret_strategy(),
        expiry in 60i64..86_400,
    ) {
        let user_id = Uuid::new_v4();
        let token = encode_access_token(user_id, &user_name, &secret, expiry).unwrap();
        let claims = decode_access_token(&token, &secret).unwrap();

        prop_assert_eq!(claims.sub, user_id.to_string());
        prop_assert_eq!(claims.user_name, user_name);
        prop_assert_eq!(claims.exp - claims.iat, expiry);
    }

    #[test]
    fn access_token_rejects_other_secret(
        user_name in user_name_strategy(),
        secret in secret_strategy(),
        other in secret_strategy(),
    ) {
        prop_assume!(secret != other);
        let token = encode_access_token(Uuid::new_v4(), &user_name, &secret, 3600).unwrap();
        let err = decode_access_token(&token, &other).unwrap_err();
        prop_assert!(matches!(err, AppError::InvalidToken));
    }

    #[test]
    fn token_hash_is_hex_sha256(token in opaque_token_strategy()) {
        let hash = hash_token(&token);
        prop_assert_eq!(hash.len(), 64);
        prop_assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        prop_assert_eq!(&hash, &hash_token(&token));
        prop_assert_ne!(hash, token);
    }

    #[test]
    fn distinct_tokens_hash_differently(a in opaque_token_strategy(), b in opaque_token_strategy()) {
        prop_assume!(a != b);
        prop_assert_ne!(hash_token(&a), hash_token(&b));
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[test]
fn test_expired_token() {
    let token = encode_access_token(Uuid::new_v4(), "jan_kowalski", "secret", -3600).unwrap();
    let err = decode_access_token(&token, "secret").unwrap_err();
    assert!(matches!(err, AppError::TokenExpired));
}

#[test]
fn test_tampered_token() {
    let token = encode_access_token(Uuid::new_v4(), "jan_kowalski", "secret", 3600).unwrap();
    let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
    parts[1].push('A');
    let tampered = parts.join(".");
    assert!(decode_access_token(&tampered, "secret").is_err());
}

#[test]
fn test_known_hash() {
    assert_eq!(
        hash_token("abc"),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}

#[test]
fn test_auth_error_statuses() {
    let cases = [
        (AppError::InvalidCredentials, StatusCode::UNAUTHORIZED),
        (AppError::TokenExpired, StatusCode::UNAUTHORIZED),
        (AppError::InvalidToken, StatusCode::UNAUTHORIZED),
        (AppError::EmailNotVerified, StatusCode::FORBIDDEN),
        (
            AppError::Forbidden("Only the company owner may do this".into()),
            StatusCode::FORBIDDEN,
        ),
    ];
    for (error, expected) in cases {
        assert_eq!(error.into_response().status(), expected);
    }
}
