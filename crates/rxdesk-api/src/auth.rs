//! Password hashing and token minting.
//!
//! Passwords are hashed with Argon2id. Tokens are HS256 JWTs carrying the
//! user's role so the staff/admin guards never need a database round trip.
//! Decoding lives in `rxdesk_common::auth` so the gateway can share it.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use rxdesk_common::auth::{Claims, ACCESS_TOKEN, REFRESH_TOKEN};
use rxdesk_common::models::user::Role;
use serde::Serialize;
use uuid::Uuid;

/// Token pair returned on login/register/refresh.
#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub token_type: String,
}

/// Hash a password using Argon2id.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against an Argon2id hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(hash)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

fn generate_token(
    user_id: Uuid,
    email: &str,
    role: Role,
    token_type: &str,
    secret: &str,
    ttl_secs: u64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        role,
        iat: now.timestamp(),
        exp: (now + Duration::seconds(ttl_secs as i64)).timestamp(),
        token_type: token_type.to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Generate both access and refresh tokens.
pub fn generate_token_pair(
    user_id: Uuid,
    email: &str,
    role: Role,
    secret: &str,
    access_ttl: u64,
    refresh_ttl: u64,
) -> Result<TokenPair, jsonwebtoken::errors::Error> {
    Ok(TokenPair {
        access_token: generate_token(user_id, email, role, ACCESS_TOKEN, secret, access_ttl)?,
        refresh_token: generate_token(user_id, email, role, REFRESH_TOKEN, secret, refresh_ttl)?,
        expires_in: access_ttl,
        token_type: "Bearer".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rxdesk_common::auth::validate_token;

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse battery", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        assert!(verify_password("x", "not-a-phc-string").is_err());
    }

    #[test]
    fn test_token_pair_claims() {
        let id = Uuid::now_v7();
        let pair = generate_token_pair(id, "rph@example.com", Role::Pharmacist, "secret", 60, 3600).unwrap();
        assert_eq!(pair.expires_in, 60);

        let access = validate_token(&pair.access_token, "secret").unwrap();
        assert!(access.is_access());
        assert_eq!(access.sub, id.to_string());
        assert_eq!(access.role, Role::Pharmacist);

        let refresh = validate_token(&pair.refresh_token, "secret").unwrap();
        assert!(refresh.is_refresh());
        assert!(refresh.exp > access.exp);

        assert!(validate_token(&pair.access_token, "other-secret").is_err());
    }
}
