use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::provider::{IdentityProvider, PasswordSession, ProviderError};
use super::synthetic::SyntheticIdentityMapper;

const REQUIRED: &str = "Identifier and password are required";
const INVALID: &str = "Identifier is invalid";

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(&'static str),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Identifier + secret login against the password provider.
///
/// Adds exactly two things on top of the provider: identifier to synthetic address
/// translation, and fail-fast validation before any network call. Provider results
/// and errors are passed through untouched.
#[derive(Clone)]
pub struct CredentialAuthenticator {
    provider: Arc<dyn IdentityProvider>,
    mapper: SyntheticIdentityMapper,
}

impl CredentialAuthenticator {
    pub fn new(provider: Arc<dyn IdentityProvider>, mapper: SyntheticIdentityMapper) -> Self {
        Self { provider, mapper }
    }

    pub async fn authenticate(&self, identifier: &str, secret: &str) -> Result<PasswordSession, AuthError> {
        if identifier.is_empty() || secret.is_empty() {
            return Err(AuthError::Validation(REQUIRED));
        }
        let address = self.mapper.address_for(identifier).ok_or(AuthError::Validation(INVALID))?;
        self.exchange(&address, secret).await
    }

    /// Like [`Self::authenticate`] for an untyped request field. Absent, null and
    /// non-string identifiers fail validation.
    pub async fn authenticate_value(&self, identifier: Option<&Value>, secret: &str) -> Result<PasswordSession, AuthError> {
        let present = matches!(identifier, Some(Value::String(s)) if !s.is_empty());
        if !present || secret.is_empty() {
            return Err(AuthError::Validation(REQUIRED));
        }
        let address = self.mapper.address_for_value(identifier).ok_or(AuthError::Validation(INVALID))?;
        self.exchange(&address, secret).await
    }

    async fn exchange(&self, address: &str, secret: &str) -> Result<PasswordSession, AuthError> {
        debug!(target: "auth", "password sign-in via provider={} address={}", self.provider.name(), address);
        Ok(self.provider.sign_in_with_password(address, secret).await?)
    }
}
