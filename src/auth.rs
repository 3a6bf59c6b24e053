//! Caller identity verification against the identity platform.
//!
//! Handlers never trust identity fields from request bodies; the payer
//! identity on a payment always comes from the verified credential.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: String,
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Missing bearer credential")]
    MissingCredential,
    #[error("Credential rejected")]
    InvalidCredential,
    #[error("Identity provider unavailable: {message}")]
    ProviderUnavailable { message: String },
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify_bearer(&self, token: &str) -> Result<CallerIdentity, AuthError>;
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub introspection_url: String,
    pub timeout_secs: u64,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, AuthError> {
        let introspection_url =
            std::env::var("AUTH_INTROSPECTION_URL").map_err(|_| AuthError::ProviderUnavailable {
                message: "AUTH_INTROSPECTION_URL environment variable is required".to_string(),
            })?;
        Ok(Self {
            introspection_url,
            timeout_secs: std::env::var("AUTH_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(10),
        })
    }
}

/// Verifies session tokens through the identity platform's
/// token-introspection endpoint.
pub struct IntrospectionVerifier {
    http: reqwest::Client,
    url: String,
}

impl IntrospectionVerifier {
    pub fn new(config: AuthConfig) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AuthError::ProviderUnavailable {
                message: format!("failed to initialize HTTP client: {}", e),
            })?;
        Ok(Self {
            http,
            url: config.introspection_url,
        })
    }
}

#[derive(Debug, Deserialize)]
struct IntrospectionResponse {
    user_id: String,
    email: String,
    name: Option<String>,
}

#[async_trait]
impl IdentityVerifier for IntrospectionVerifier {
    async fn verify_bearer(&self, token: &str) -> Result<CallerIdentity, AuthError> {
        if token.trim().is_empty() {
            return Err(AuthError::MissingCredential);
        }

        let response = self
            .http
            .post(&self.url)
            .json(&serde_json::json!({ "token": token }))
            .send()
            .await
            .map_err(|e| AuthError::ProviderUnavailable {
                message: format!("introspection request failed: {}", e),
            })?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            warn!("identity provider rejected credential");
            return Err(AuthError::InvalidCredential);
        }
        if !status.is_success() {
            return Err(AuthError::ProviderUnavailable {
                message: format!("introspection returned HTTP {}", status),
            });
        }

        let identity: IntrospectionResponse =
            response
                .json()
                .await
                .map_err(|e| AuthError::ProviderUnavailable {
                    message: format!("invalid introspection response: {}", e),
                })?;

        Ok(CallerIdentity {
            user_id: identity.user_id,
            email: identity.email,
            name: identity.name.filter(|n| !n.trim().is_empty()),
        })
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header_value: Option<&str>) -> Result<&str, AuthError> {
    let value = header_value.ok_or(AuthError::MissingCredential)?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .ok_or(AuthError::MissingCredential)?
        .trim();
    if token.is_empty() {
        return Err(AuthError::MissingCredential);
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_extraction() {
        assert_eq!(bearer_token(Some("Bearer abc123")).unwrap(), "abc123");
        assert_eq!(bearer_token(Some("bearer abc123")).unwrap(), "abc123");
        assert!(matches!(
            bearer_token(None),
            Err(AuthError::MissingCredential)
        ));
        assert!(matches!(
            bearer_token(Some("Basic abc123")),
            Err(AuthError::MissingCredential)
        ));
        assert!(matches!(
            bearer_token(Some("Bearer ")),
            Err(AuthError::MissingCredential)
        ));
    }
}
