use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use password_hash::{PasswordHash, SaltString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::identity::provider::{IdentityProvider, PasswordSession, ProviderError, ProviderIdentity};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocalUser {
    pub email: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    /// Stable subject id; the lowercased e-mail when omitted.
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2.hash_password(password.as_bytes(), &salt).map_err(|e| anyhow!(e.to_string()))?.to_string();
    Ok(phc)
}

fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else { false }
}

/// Password provider backed by a JSON file of Argon2-hashed users.
/// Sessions it hands out live for `ttl_secs`.
pub struct LocalPasswordProvider {
    users: HashMap<String, LocalUser>,
    ttl_secs: i64,
}

impl LocalPasswordProvider {
    pub fn new(users: Vec<LocalUser>, ttl_secs: i64) -> Self {
        let users = users.into_iter().map(|u| (u.email.trim().to_lowercase(), u)).collect();
        Self { users, ttl_secs }
    }

    pub fn from_file(path: impl AsRef<Path>, ttl_secs: i64) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading local users file {}", path.display()))?;
        let users: Vec<LocalUser> = serde_json::from_str(&text)
            .with_context(|| format!("parsing local users file {}", path.display()))?;
        info!(target: "auth", "local password provider loaded {} user(s) from {}", users.len(), path.display());
        Ok(Self::new(users, ttl_secs))
    }

    fn rejected() -> ProviderError {
        ProviderError::Rejected {
            message: "Invalid login credentials".into(),
            details: json!({ "error": "invalid_grant" }),
        }
    }
}

#[async_trait]
impl IdentityProvider for LocalPasswordProvider {
    fn name(&self) -> &'static str { "local-password" }

    async fn sign_in_with_password(&self, email: &str, secret: &str) -> Result<PasswordSession, ProviderError> {
        let Some(user) = self.users.get(&email.trim().to_lowercase()).cloned() else {
            return Err(Self::rejected());
        };
        let hash = user.password_hash.clone();
        let secret = secret.to_string();
        let ok = tokio::task::spawn_blocking(move || verify_password(&hash, &secret))
            .await
            .map_err(|e| ProviderError::Upstream(e.to_string()))?;
        if !ok {
            return Err(Self::rejected());
        }
        let now = chrono::Utc::now().timestamp();
        let subject = user.subject.clone().unwrap_or_else(|| user.email.trim().to_lowercase());
        let identity = ProviderIdentity {
            subject: subject.clone(),
            email: Some(user.email.clone()),
            name: user.name.clone(),
            issued_at: now,
            expires_at: now + self.ttl_secs,
        };
        let record = json!({
            "token_type": "session",
            "expires_in": self.ttl_secs,
            "expires_at": identity.expires_at,
            "user": { "id": subject, "email": user.email, "name": user.name },
        });
        Ok(PasswordSession { record, identity })
    }
}
