//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs signed with `JWT_SECRET`. Handlers take [`AuthUser`]
//! to require a valid token, or [`AdminUser`] to additionally require the
//! admin role.

use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header, request::Parts};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::state::AppState;
use crate::utils::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    #[serde(default)]
    pub department: Option<String>,
    pub role: Role,
    pub exp: i64,
}

pub fn issue_token(
    config: &Config,
    user_id: Uuid,
    email: impl Into<String>,
    department: Option<String>,
    role: Role,
) -> Result<String, AppError> {
    let claims = Claims {
        sub: user_id,
        email: email.into(),
        department,
        role,
        exp: (Utc::now() + config.jwt_expires_in).timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(format!("failed to sign token: {e}")))
}

pub fn verify_token(config: &Config, token: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!(error = %e, "Rejected bearer token");
        AppError::AuthError("Invalid or expired token".to_string())
    })
}

/// The caller identified by a valid bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub department: Option<String>,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            department: claims.department,
            role: claims.role,
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app = AppState::from_ref(state);

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::AuthError("Access token required".to_string()))?
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::AuthError("Expected 'Bearer <token>'".to_string()))?;

        verify_token(&app.config, token).map(AuthUser::from)
    }
}

/// An authenticated caller holding the admin role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }
        Ok(Self(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_roundtrip_keeps_department_and_role() {
        let config = Config::local("secret");
        let id = Uuid::new_v4();
        let token = issue_token(&config, id, "a@pgb.gov", Some("PGSO".into()), Role::Admin).unwrap();

        let claims = verify_token(&config, &token).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.department.as_deref(), Some("PGSO"));
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = issue_token(&Config::local("one"), Uuid::new_v4(), "a@b", None, Role::User).unwrap();
        let err = verify_token(&Config::local("two"), &token).unwrap_err();
        assert!(matches!(err, AppError::AuthError(_)));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let mut config = Config::local("secret");
        config.jwt_expires_in = chrono::Duration::hours(-2);
        let token = issue_token(&config, Uuid::new_v4(), "a@b", None, Role::User).unwrap();
        assert!(verify_token(&config, &token).is_err());
    }
}
