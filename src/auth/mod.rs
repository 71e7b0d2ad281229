//! Authentication module.
//!
//! The marketplace delegates account management to an external auth provider;
//! this module only validates the provider-issued HMAC-signed bearer tokens
//! and exposes the caller's identity to handlers via the [`AuthUser`]
//! extractor. Token issuance is kept for tests and local tooling.

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Claim structure for JWT tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,           // Subject (user ID)
    pub email: Option<String>, // User's email
    pub name: Option<String>,  // User's display name
    pub jti: String,           // JWT ID
    pub iat: i64,              // Issued at time
    pub exp: i64,              // Expiration time
    pub iss: String,           // Issuer
    pub aud: String,           // Audience
}

/// Authenticated user data extracted from the JWT token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub token_id: String,
}

impl AuthUser {
    /// Email address to attach to checkout metadata; empty when the token
    /// carries none, matching the storefront's behavior.
    pub fn email_or_empty(&self) -> String {
        self.email.clone().unwrap_or_default()
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub access_token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        jwt_issuer: String,
        jwt_audience: String,
        access_token_expiration: Duration,
    ) -> Self {
        Self {
            jwt_secret,
            jwt_issuer,
            jwt_audience,
            access_token_expiration,
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Token has expired")]
    ExpiredToken,
    #[error("Token creation failed: {0}")]
    TokenCreation(String),
    #[error("Authentication service not available")]
    ServiceUnavailable,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_code, error_message) = match &self {
            Self::MissingAuth => (
                StatusCode::UNAUTHORIZED,
                "AUTH_MISSING",
                "Authentication required".to_string(),
            ),
            Self::InvalidToken(msg) => (
                StatusCode::UNAUTHORIZED,
                "AUTH_INVALID_TOKEN",
                msg.clone(),
            ),
            Self::ExpiredToken => (
                StatusCode::UNAUTHORIZED,
                "AUTH_TOKEN_EXPIRED",
                "Token has expired".to_string(),
            ),
            Self::TokenCreation(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_TOKEN_CREATION_FAILED",
                msg.clone(),
            ),
            Self::ServiceUnavailable => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_SERVICE_UNAVAILABLE",
                "Authentication service not available".to_string(),
            ),
        };

        let body = Json(serde_json::json!({
            "error": {
                "code": error_code,
                "message": error_message,
            }
        }));

        (status, body).into_response()
    }
}

/// Validates (and, for tests/tooling, issues) provider-style JWTs.
pub struct AuthService {
    config: AuthConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[config.jwt_audience.clone()]);
        validation.set_issuer(&[config.jwt_issuer.clone()]);

        Self {
            config,
            encoding_key,
            decoding_key,
            validation,
        }
    }

    /// Validates a bearer token and returns its claims.
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken(err.to_string()),
            })
    }

    /// Issues a token the way the auth provider would; used by tests and
    /// local tooling only.
    pub fn issue_token(
        &self,
        user_id: &str,
        email: Option<&str>,
        name: Option<&str>,
    ) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.map(str::to_string),
            name: name.map(str::to_string),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + self.config.access_token_expiration.as_secs() as i64,
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|err| AuthError::TokenCreation(err.to_string()))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Injected into request extensions by middleware at router setup
        let auth_service = parts
            .extensions
            .get::<Arc<AuthService>>()
            .cloned()
            .ok_or(AuthError::ServiceUnavailable)?;

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AuthError::MissingAuth)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::MissingAuth)?
            .trim();

        let claims = auth_service.validate_token(token)?;

        Ok(AuthUser {
            user_id: claims.sub,
            email: claims.email,
            name: claims.name,
            token_id: claims.jti,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_service() -> AuthService {
        AuthService::new(AuthConfig::new(
            "test_secret_key_for_testing_purposes_only_32chars".into(),
            "kidsmarket-auth".into(),
            "kidsmarket-api".into(),
            Duration::from_secs(3600),
        ))
    }

    #[test]
    fn issued_token_round_trips() {
        let service = test_service();
        let token = service
            .issue_token("user-1", Some("u@example.com"), Some("User One"))
            .unwrap();

        let claims = service.validate_token(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.email.as_deref(), Some("u@example.com"));
        assert_eq!(claims.iss, "kidsmarket-auth");
        assert_eq!(claims.aud, "kidsmarket-api");
    }

    #[test]
    fn token_with_wrong_secret_is_rejected() {
        let service = test_service();
        let other = AuthService::new(AuthConfig::new(
            "another_secret_key_entirely_also_32_chars_long!!".into(),
            "kidsmarket-auth".into(),
            "kidsmarket-api".into(),
            Duration::from_secs(3600),
        ));

        let token = other.issue_token("user-1", None, None).unwrap();
        assert!(matches!(
            service.validate_token(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn garbage_token_is_rejected() {
        let service = test_service();
        assert!(matches!(
            service.validate_token("not-a-jwt"),
            Err(AuthError::InvalidToken(_))
        ));
    }
}
