//! Identifier to synthetic e-mail mapping.
//!
//! Password providers that insist on e-mail shaped usernames get a stable
//! placeholder address built from the trimmed identifier (e.g. a national ID).
//! The mapping is deterministic and not namespaced beyond the configured domain.

use serde_json::Value;

pub const DEFAULT_SYNTHETIC_DOMAIN: &str = "auth.campaign.local";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticIdentityMapper {
    domain: String,
}

impl Default for SyntheticIdentityMapper {
    fn default() -> Self { Self::new(DEFAULT_SYNTHETIC_DOMAIN) }
}

impl SyntheticIdentityMapper {
    pub fn new(domain: impl Into<String>) -> Self {
        let domain = domain.into();
        let domain = domain.trim().trim_start_matches('@').to_string();
        Self { domain }
    }

    pub fn domain(&self) -> &str { &self.domain }

    /// `"<trimmed-identifier>@<domain>"`, or `None` when nothing is left after trimming.
    pub fn address_for(&self, identifier: &str) -> Option<String> {
        let trimmed = identifier.trim();
        if trimmed.is_empty() { return None; }
        Some(format!("{}@{}", trimmed, self.domain))
    }

    /// Same as [`address_for`](Self::address_for) for untyped request input:
    /// null, absent and non-string values map to `None`.
    pub fn address_for_value(&self, identifier: Option<&Value>) -> Option<String> {
        match identifier {
            Some(Value::String(s)) => self.address_for(s),
            _ => None,
        }
    }
}

/// Synthetic address under [`DEFAULT_SYNTHETIC_DOMAIN`].
pub fn make_synthetic_address(identifier: Option<&str>) -> Option<String> {
    identifier.and_then(|id| SyntheticIdentityMapper::default().address_for(id))
}
