use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{AppError, Result};

/// ExternalIdentity
///
/// What the portal needs from a verified third-party login.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExternalIdentity {
    /// Lowercased, verified email address.
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

// 1. IdentityProvider Contract
/// IdentityProvider
///
/// Verifies an ID token issued to the browser by an OAuth provider. Handlers
/// depend on the trait so tests can swap in `MockIdentityProvider` without any
/// network access.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns the verified identity, `Unauthorized` for a token that is
    /// invalid, expired, for another audience or carries an unverified email.
    async fn verify(&self, id_token: &str) -> Result<ExternalIdentity>;
}

// 2. The Real Implementation (Google)
/// GoogleIdentityProvider
///
/// Validates Google ID tokens through the `tokeninfo` endpoint, which checks the
/// signature and expiry server-side. The audience is checked here.
#[derive(Clone)]
pub struct GoogleIdentityProvider {
    client: reqwest::Client,
    client_id: String,
    tokeninfo_url: String,
}

impl GoogleIdentityProvider {
    pub fn new(client_id: &str, tokeninfo_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id: client_id.to_string(),
            tokeninfo_url: tokeninfo_url.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: String,
    email: Option<String>,
    // Google sends "true"/"false" strings; accept booleans as well.
    #[serde(default)]
    email_verified: Option<serde_json::Value>,
    name: Option<String>,
    picture: Option<String>,
}

impl TokenInfo {
    fn email_verified(&self) -> bool {
        match &self.email_verified {
            Some(serde_json::Value::Bool(b)) => *b,
            Some(serde_json::Value::String(s)) => s == "true",
            _ => false,
        }
    }

    /// Applies the audience and email checks.
    fn into_identity(self, client_id: &str) -> Result<ExternalIdentity> {
        let invalid = || AppError::Unauthorized("Invalid Google token".to_string());

        if self.aud != client_id {
            tracing::warn!(aud = %self.aud, "google token issued for another client");
            return Err(invalid());
        }
        if !self.email_verified() {
            return Err(invalid());
        }
        let email = self
            .email
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .ok_or_else(invalid)?;

        Ok(ExternalIdentity {
            email,
            name: self.name.filter(|n| !n.trim().is_empty()),
            picture: self.picture.filter(|p| !p.trim().is_empty()),
        })
    }
}

#[async_trait]
impl IdentityProvider for GoogleIdentityProvider {
    async fn verify(&self, id_token: &str) -> Result<ExternalIdentity> {
        let response = self
            .client
            .get(&self.tokeninfo_url)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?;

        // tokeninfo answers 400 for bad or expired tokens.
        if response.status().is_client_error() {
            return Err(AppError::Unauthorized("Invalid Google token".to_string()));
        }
        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "tokeninfo returned {}",
                response.status()
            )));
        }

        let info: TokenInfo = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?;

        info.into_identity(&self.client_id)
    }
}

// 3. The Mock Implementation (For Tests)
/// MockIdentityProvider
///
/// Accepts any token and returns a fixed identity, or rejects everything when
/// built with `new_failing`.
#[derive(Clone)]
pub struct MockIdentityProvider {
    pub identity: ExternalIdentity,
    /// When true, every token is rejected as invalid.
    pub should_fail: bool,
}

impl MockIdentityProvider {
    pub fn new(identity: ExternalIdentity) -> Self {
        Self {
            identity,
            should_fail: false,
        }
    }

    pub fn new_failing() -> Self {
        Self {
            identity: ExternalIdentity::default(),
            should_fail: true,
        }
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn verify(&self, _id_token: &str) -> Result<ExternalIdentity> {
        if self.should_fail {
            return Err(AppError::Unauthorized("Invalid Google token".to_string()));
        }
        Ok(self.identity.clone())
    }
}

/// IdentityState
///
/// The concrete type used to share the identity provider across the application state.
pub type IdentityState = Arc<dyn IdentityProvider>;
