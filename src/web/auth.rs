//! Bearer-token authentication against the external identity provider.
//!
//! Tokens are issued elsewhere; this module only validates them. Claims
//! carry the profile id and nothing else: role and department are read from
//! the profiles table on every request, so reassignments and demotions take
//! effect immediately instead of living on in old tokens.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use chrono::Utc;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::shared::error::ApiError;
use crate::shared::state::AppState;

/// Extract bearer token from Authorization header
fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|auth| {
            if auth.to_lowercase().starts_with("bearer ") {
                Some(auth[7..].to_string())
            } else {
                None
            }
        })
}

/// JWT claims. `sub` is the profile id assigned by the identity provider.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Clone)]
pub struct AuthConfig {
    jwt_secret: String,
}

impl AuthConfig {
    pub fn new(jwt_secret: String) -> Self {
        Self { jwt_secret }
    }

    pub fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(self.jwt_secret.as_bytes())
    }
}

/// Authenticated caller identity. Handlers still have to resolve the profile
/// row; a valid token whose profile is missing counts as unauthenticated.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub claims: Claims,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
    Arc<AppState>: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = Arc::<AppState>::from_ref(state);

        let token = extract_bearer_token(&parts.headers)
            .ok_or_else(|| ApiError::Unauthenticated("no authentication token".to_string()))?;

        let claims = decode::<Claims>(&token, &state.auth.decoding_key(), &Validation::default())
            .map_err(|_| ApiError::Unauthenticated("invalid token".to_string()))?
            .claims;

        if claims.exp < Utc::now().timestamp() {
            return Err(ApiError::Unauthenticated("token expired".to_string()));
        }

        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| ApiError::Unauthenticated("invalid token subject".to_string()))?;

        Ok(AuthenticatedUser { user_id, claims })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_extraction_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc.def.ghi"),
        );
        assert_eq!(extract_bearer_token(&headers).as_deref(), Some("abc.def.ghi"));

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("bearer xyz"),
        );
        assert_eq!(extract_bearer_token(&headers).as_deref(), Some("xyz"));
    }

    #[test]
    fn non_bearer_schemes_are_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Basic dXNlcjpwYXNz"),
        );
        assert_eq!(extract_bearer_token(&headers), None);
        assert_eq!(extract_bearer_token(&HeaderMap::new()), None);
    }
}
