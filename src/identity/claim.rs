use serde::{Deserialize, Serialize};

/// Role assigned when the role store has nothing better to say.
pub const DEFAULT_ROLE: &str = "default";

/// Verified subject, role and validity window.
///
/// Only produced by verification paths inside this crate (bearer token
/// verification, credential login, session cookie verification).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityClaim {
    sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(default = "default_role")]
    role: String,
    iat: i64,
    exp: i64,
}

fn default_role() -> String { DEFAULT_ROLE.to_string() }

impl IdentityClaim {
    pub(crate) fn new(sub: String, email: Option<String>, role: Option<&str>, iat: i64, exp: i64) -> Self {
        let role = match role.map(str::trim) {
            Some(r) if !r.is_empty() => r.to_string(),
            _ => default_role(),
        };
        Self { sub, email, role, iat, exp }
    }

    pub fn subject(&self) -> &str { &self.sub }
    pub fn email(&self) -> Option<&str> { self.email.as_deref() }
    pub fn role(&self) -> &str { &self.role }
    /// Issued-at, unix seconds.
    pub fn issued_at(&self) -> i64 { self.iat }
    /// Expiry, unix seconds.
    pub fn expires_at(&self) -> i64 { self.exp }

    pub fn is_expired_at(&self, now_secs: i64) -> bool { self.exp <= now_secs }
}
