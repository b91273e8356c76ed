use std::sync::Arc;

use tracing::{debug, warn};

use super::claim::IdentityClaim;
use super::provider::{IdentityProvider, TokenError};
use super::roles::RoleDirectory;

/// Verifies provider-issued ID tokens and attaches the subject's role.
///
/// Cryptographic verification is the provider's job. On success the role comes
/// from the role directory, which provisions a default record for unseen subjects.
/// Failures are terminal; nothing is retried.
#[derive(Clone)]
pub struct BearerVerifier {
    provider: Arc<dyn IdentityProvider>,
    directory: RoleDirectory,
}

impl BearerVerifier {
    pub fn new(provider: Arc<dyn IdentityProvider>, directory: RoleDirectory) -> Self {
        Self { provider, directory }
    }

    pub async fn verify(&self, token: &str) -> Result<IdentityClaim, TokenError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(TokenError::Missing);
        }
        let identity = match self.provider.verify_id_token(token).await {
            Ok(identity) => identity,
            Err(e) => {
                warn!(target: "auth", "bearer token rejected by provider={}: {}", self.provider.name(), e);
                return Err(e);
            }
        };
        if identity.expires_at <= chrono::Utc::now().timestamp() {
            warn!(target: "auth", "bearer token for sub={} is past its expiry", identity.subject);
            return Err(TokenError::Expired);
        }
        let claim = self.directory.resolve(&identity).await?;
        debug!(target: "auth", "bearer token verified sub={} role={}", claim.subject(), claim.role());
        Ok(claim)
    }
}
