//! Bearer-token authentication and password hashing.
//!
//! Handlers take [`AuthUser`] for any signed-in caller, or [`Authorized<R>`] to
//! also require a role. Admins pass every role check.

use std::marker::PhantomData;
use std::ops::Deref;

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::Role;
use crate::error::AppError;
use crate::state::AppState;

/// JWT claims carried by access tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    pub role: Role,
    /// Issued at (Unix timestamp seconds)
    pub iat: i64,
    /// Expiration (Unix timestamp seconds)
    pub exp: i64,
}

/// Create a signed HS256 token for a user.
pub fn issue_token(user_id: Uuid, role: Role, secret: &[u8], ttl_hours: i64) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        role,
        iat: now.timestamp(),
        exp: (now + Duration::hours(ttl_hours)).timestamp(),
    };
    jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(secret))
        .map_err(|e| AppError::Internal(format!("failed to sign token: {e}")))
}

pub fn decode_token(token: &str, secret: &[u8]) -> Result<Claims, AppError> {
    jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(secret), &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!("JWT validation failed: {e}");
            AppError::Unauthorized("Invalid or expired token".to_string())
        })
}

/// Authenticated caller extracted from the `Authorization: Bearer` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized("Invalid Authorization format".to_string()))?;

        let claims = decode_token(token.trim(), state.config.jwt_secret_bytes())?;
        Ok(Self { user_id: claims.sub, role: claims.role })
    }
}

/// A role an endpoint can demand.
pub trait RequiredRole: Send + Sync + 'static {
    const ROLE: Role;
}

pub struct UserRole;
pub struct SellerRole;
pub struct AdminRole;

impl RequiredRole for UserRole {
    const ROLE: Role = Role::User;
}
impl RequiredRole for SellerRole {
    const ROLE: Role = Role::Seller;
}
impl RequiredRole for AdminRole {
    const ROLE: Role = Role::Admin;
}

/// An [`AuthUser`] whose role satisfies `R`.
pub struct Authorized<R: RequiredRole> {
    user: AuthUser,
    _role: PhantomData<R>,
}

impl<R: RequiredRole> Authorized<R> {
    pub fn check(user: AuthUser) -> Result<Self, AppError> {
        if !user.role.satisfies(R::ROLE) {
            return Err(AppError::Forbidden(format!("Access denied: {} role required", R::ROLE)));
        }
        Ok(Self { user, _role: PhantomData })
    }
}

impl<R: RequiredRole> Deref for Authorized<R> {
    type Target = AuthUser;
    fn deref(&self) -> &AuthUser {
        &self.user
    }
}

#[axum::async_trait]
impl<R: RequiredRole> FromRequestParts<AppState> for Authorized<R> {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        Self::check(user)
    }
}

/// Hash a password with Argon2id and a random salt.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}

/// Verify a password against a stored PHC hash string.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"k3J9x2LmQ8vR4tY7wZ1pA6sD0fG5hB3n";

    #[test]
    fn test_token_round_trip() {
        let id = Uuid::now_v7();
        let token = issue_token(id, Role::Seller, SECRET, 24).unwrap();
        let claims = decode_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.role, Role::Seller);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_rejects_bad_tokens() {
        let token = issue_token(Uuid::now_v7(), Role::User, SECRET, 24).unwrap();
        assert!(matches!(decode_token(&token, b"another-secret-another-secret-xx"), Err(AppError::Unauthorized(_))));
        let expired = issue_token(Uuid::now_v7(), Role::User, SECRET, -2).unwrap();
        assert!(decode_token(&expired, SECRET).is_err());
        assert!(decode_token("not.a.token", SECRET).is_err());
    }

    #[test]
    fn test_role_guard() {
        let seller = AuthUser { user_id: Uuid::now_v7(), role: Role::Seller };
        assert!(Authorized::<SellerRole>::check(seller).is_ok());
        assert!(matches!(Authorized::<AdminRole>::check(seller), Err(AppError::Forbidden(_))));
        assert!(Authorized::<UserRole>::check(seller).is_err());
        let admin = AuthUser { user_id: Uuid::now_v7(), role: Role::Admin };
        assert_eq!(Authorized::<SellerRole>::check(admin).unwrap().user_id, admin.user_id);
    }

    #[test]
    fn test_password_hashing() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse battery staple", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("anything", "not-a-hash"));
    }
}
