//! Bearer-token authentication: argon2 password hashing, HS256 JWTs, and
//! the `AuthUser` extractor that turns a valid Authorization header into
//! the requesting user's document. Role and profile-completeness gates
//! live here too.

use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use bson::{doc, oid::ObjectId};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::AppError;
use crate::state::AppState;
use crate::user::{User, UserType};

#[derive(Serialize, Deserialize, Debug)]
pub struct Claims {
    /// User id, hex-encoded.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}").into()))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

pub fn issue_token(user_id: &ObjectId, config: &Config) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_hex(),
        iat: now.timestamp(),
        exp: (now + Duration::hours(config.token_ttl_hours)).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("token signing failed: {e}").into()))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            AppError::Unauthorized("Token expired.".to_string())
        }
        _ => AppError::Unauthorized("Invalid token.".to_string()),
    })
}

/// The authenticated requester, loaded fresh from the store. Handlers take
/// this by value instead of reading auth state off the request.
pub struct AuthUser(pub User);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let missing = || AppError::Unauthorized("Access denied. No token provided.".to_string());

        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(missing)?;
        let token = header.strip_prefix("Bearer ").ok_or_else(missing)?;

        let claims = verify_token(token, &state.config.jwt_secret)?;
        let user_id = ObjectId::parse_str(&claims.sub)
            .map_err(|_| AppError::Unauthorized("Invalid token.".to_string()))?;

        let user = state
            .users()
            .find_one(doc! { "_id": user_id })
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid token. User not found.".to_string()))?;

        if !user.is_active {
            return Err(AppError::Unauthorized("Account is deactivated.".to_string()));
        }

        Ok(AuthUser(user))
    }
}

pub fn require_user_type(user: &User, allowed: &[UserType]) -> Result<(), AppError> {
    if allowed.contains(&user.user_type) {
        return Ok(());
    }

    let wanted: Vec<&str> = allowed.iter().map(|t| t.as_str()).collect();
    Err(AppError::Forbidden(format!(
        "Access denied. Required user type: {}",
        wanted.join(" or ")
    )))
}

pub fn require_complete_profile(user: &User) -> Result<(), AppError> {
    if user.is_profile_complete() {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Please complete your profile before accessing this feature.".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            port: 0,
            mongo_url: String::new(),
            db_name: String::new(),
            jwt_secret: "test-secret".to_string(),
            token_ttl_hours: 1,
        }
    }

    #[test]
    fn test_password_roundtrip() {
        let hash = hash_password("hunter22").unwrap();
        assert_ne!(hash, "hunter22");
        assert!(verify_password("hunter22", &hash));
        assert!(!verify_password("hunter23", &hash));
    }

    #[test]
    fn test_garbage_hash_never_verifies() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn test_token_roundtrip() {
        let config = test_config();
        let user_id = ObjectId::new();

        let token = issue_token(&user_id, &config).unwrap();
        let claims = verify_token(&token, &config.jwt_secret).unwrap();
        assert_eq!(claims.sub, user_id.to_hex());
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_token_rejected_with_wrong_secret() {
        let config = test_config();
        let token = issue_token(&ObjectId::new(), &config).unwrap();
        assert!(verify_token(&token, "other-secret").is_err());
    }

    #[test]
    fn test_tampered_token_rejected() {
        let config = test_config();
        let mut token = issue_token(&ObjectId::new(), &config).unwrap();
        token.push('x');
        assert!(verify_token(&token, &config.jwt_secret).is_err());
    }

    #[test]
    fn test_require_user_type() {
        let user = User::new(
            "n".into(),
            "e@example.com".into(),
            "h".into(),
            UserType::Contributor,
            bson::DateTime::now(),
        );

        assert!(require_user_type(&user, &[UserType::Contributor, UserType::Both]).is_ok());
        assert!(require_user_type(&user, &[UserType::Creator]).is_err());
    }
}
