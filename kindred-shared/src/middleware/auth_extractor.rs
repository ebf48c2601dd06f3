use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use jsonwebtoken::{decode, DecodingKey, Validation, Algorithm};

use crate::errors::{AppError, ErrorCode};
use crate::types::auth::{AuthUser, Claims, IdentityResolver};

pub const DEFAULT_JWT_SECRET: &str = "development-secret-change-in-production";

/// Router state that carries the HS256 secret tokens are verified with.
pub trait JwtSecretSource {
    fn jwt_secret(&self) -> &str;
}

impl JwtSecretSource for String {
    fn jwt_secret(&self) -> &str {
        self
    }
}

impl<T: JwtSecretSource + ?Sized> JwtSecretSource for Arc<T> {
    fn jwt_secret(&self) -> &str {
        (**self).jwt_secret()
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: JwtSecretSource + Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)?;
        let claims = validate_jwt(&token, state.jwt_secret())?;

        if claims.is_expired() {
            return Err(AppError::new(ErrorCode::TokenExpired, "token has expired"));
        }

        Ok(AuthUser::from(claims))
    }
}

fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let auth_header = headers
        .get("Authorization")
        .ok_or_else(|| AppError::unauthenticated("missing authorization header"))?
        .to_str()
        .map_err(|_| AppError::unauthenticated("invalid authorization header"))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::unauthenticated("authorization header must use Bearer scheme"))?;

    Ok(token.to_string())
}

fn validate_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            AppError::new(ErrorCode::TokenExpired, "token has expired")
        }
        _ => AppError::new(ErrorCode::TokenInvalid, format!("invalid token: {e}")),
    })?;

    Ok(token_data.claims)
}

/// Optional auth extractor.
///
/// Never rejects: a missing or invalid token yields `None`, and the core
/// operation the identity is handed to reports the authentication error.
pub struct OptionalAuthUser(pub Option<AuthUser>);

#[axum::async_trait]
impl<S> FromRequestParts<S> for OptionalAuthUser
where
    S: JwtSecretSource + Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match AuthUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(Self(Some(user))),
            Err(e) => {
                tracing::debug!(error = %e, "request carries no valid identity");
                Ok(Self(None))
            }
        }
    }
}

impl IdentityResolver for OptionalAuthUser {
    fn identity(&self) -> Option<&str> {
        self.0.as_ref().map(|u| u.identity.as_str())
    }
}
