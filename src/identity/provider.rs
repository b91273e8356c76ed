//! The identity-provider seam.
//!
//! Both external providers (the password provider behind synthetic addresses and
//! the provider that issues bearer ID tokens) sit behind one trait. Each backend
//! implements the capability it has; the other falls through to the default.
//! Providers are built once at startup and injected into the core components.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::roles::StoreError;

/// Identity as reported by a provider after it accepted a credential.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderIdentity {
    pub subject: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Unix seconds.
    pub issued_at: i64,
    /// Unix seconds.
    pub expires_at: i64,
}

/// Result of a password exchange: the provider's record untouched plus the identity read from it.
#[derive(Debug, Clone, PartialEq)]
pub struct PasswordSession {
    pub record: Value,
    pub identity: ProviderIdentity,
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The provider refused the credentials. `message` and `details` are its own words.
    #[error("{message}")]
    Rejected { message: String, details: Value },
    #[error("provider '{0}' does not support this operation")]
    Unsupported(&'static str),
    #[error("provider unavailable: {0}")]
    Upstream(String),
}

#[derive(Debug, Clone, Error)]
pub enum TokenError {
    #[error("token missing")]
    Missing,
    #[error("token malformed")]
    Malformed,
    #[error("token expired")]
    Expired,
    #[error("token invalid")]
    Invalid,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("verification unavailable: {0}")]
    Upstream(String),
}

impl TokenError {
    pub fn code(&self) -> &'static str {
        match self {
            TokenError::Missing => "token_missing",
            TokenError::Malformed => "token_malformed",
            TokenError::Expired => "token_expired",
            TokenError::Invalid => "token_invalid",
            TokenError::Store(_) => "role_store_unavailable",
            TokenError::Upstream(_) => "verification_unavailable",
        }
    }

    /// Caller-safe text.
    pub fn user_message(&self) -> &'static str {
        match self {
            TokenError::Missing => "No identity token was provided",
            TokenError::Malformed => "The identity token is malformed",
            TokenError::Expired => "The identity token has expired, please sign in again",
            TokenError::Invalid => "The identity token is invalid",
            TokenError::Store(_) | TokenError::Upstream(_) => "Unexpected server error",
        }
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Exchange an e-mail shaped username and secret for a provider session.
    async fn sign_in_with_password(&self, email: &str, secret: &str) -> Result<PasswordSession, ProviderError> {
        let _ = (email, secret);
        Err(ProviderError::Unsupported(self.name()))
    }

    /// Cryptographically verify an ID token issued by this provider.
    async fn verify_id_token(&self, token: &str) -> Result<ProviderIdentity, TokenError> {
        let _ = token;
        Err(TokenError::Upstream(format!("provider '{}' cannot verify tokens", self.name())))
    }
}
