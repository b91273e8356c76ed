//! Server configuration read from the environment.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use tracing::{info, warn};

use crate::identity::DEFAULT_SYNTHETIC_DOMAIN;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordProviderConfig {
    Remote { url: String, api_key: String },
    Local { users_file: PathBuf, ttl_secs: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TokenVerifierConfig {
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub public_key_path: Option<PathBuf>,
    pub hs_secret: Option<String>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub http_port: u16,
    /// Cookie signing secret. Absence is reported per request as a configuration error.
    pub session_secret: Option<String>,
    pub production: bool,
    pub synthetic_domain: String,
    pub password_provider: Option<PasswordProviderConfig>,
    pub token_verifier: TokenVerifierConfig,
    pub role_store_path: Option<PathBuf>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("http_port", &self.http_port)
            .field("session_secret", &self.session_secret.as_ref().map(|_| "<set>"))
            .field("production", &self.production)
            .field("synthetic_domain", &self.synthetic_domain)
            .field("password_provider", &self.password_provider.as_ref().map(|p| match p {
                PasswordProviderConfig::Remote { url, .. } => format!("remote({url})"),
                PasswordProviderConfig::Local { users_file, .. } => format!("local({})", users_file.display()),
            }))
            .field("role_store_path", &self.role_store_path)
            .finish()
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn try_load<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = non_empty(lookup(key)).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.parse().map_err(|e| anyhow!("invalid {key} value '{raw}': {e}"))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let http_port: u16 = try_load(&lookup, "CAMPAIGN_HTTP_PORT", "8080")?;
        let session_secret = non_empty(lookup("SESSION_SECRET"));
        if session_secret.is_none() {
            warn!("SESSION_SECRET is not set; session endpoints will answer with a configuration error");
        }
        let app_env: String = try_load(&lookup, "APP_ENV", "development")?;
        let production = app_env.eq_ignore_ascii_case("production");
        let synthetic_domain = non_empty(lookup("SYNTHETIC_EMAIL_DOMAIN")).unwrap_or_else(|| DEFAULT_SYNTHETIC_DOMAIN.to_string());

        let password_provider = match (non_empty(lookup("PASSWORD_PROVIDER_URL")), non_empty(lookup("LOCAL_USERS_FILE"))) {
            (Some(url), _) => {
                let api_key = non_empty(lookup("PASSWORD_PROVIDER_KEY"))
                    .ok_or_else(|| anyhow!("PASSWORD_PROVIDER_KEY is required with PASSWORD_PROVIDER_URL"))?;
                Some(PasswordProviderConfig::Remote { url, api_key })
            }
            (None, Some(file)) => {
                let ttl_secs: i64 = try_load(&lookup, "LOCAL_SESSION_TTL_SECS", "3600")?;
                if ttl_secs <= 0 {
                    return Err(anyhow!("LOCAL_SESSION_TTL_SECS must be positive"));
                }
                Some(PasswordProviderConfig::Local { users_file: PathBuf::from(file), ttl_secs })
            }
            (None, None) => None,
        };

        let token_verifier = TokenVerifierConfig {
            issuer: non_empty(lookup("TOKEN_ISSUER")),
            audience: non_empty(lookup("TOKEN_AUDIENCE")),
            public_key_path: non_empty(lookup("TOKEN_PUBLIC_KEY_PATH")).map(PathBuf::from),
            hs_secret: non_empty(lookup("TOKEN_HS_SECRET")),
        };

        Ok(Self {
            http_port,
            session_secret,
            production,
            synthetic_domain,
            password_provider,
            token_verifier,
            role_store_path: non_empty(lookup("ROLE_STORE_PATH")).map(PathBuf::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config> {
        let m: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(move |k| m.get(k).cloned())
    }

    #[test]
    fn defaults() {
        let c = load(&[]).unwrap();
        assert_eq!(c.http_port, 8080);
        assert_eq!(c.session_secret, None);
        assert!(!c.production);
        assert_eq!(c.synthetic_domain, DEFAULT_SYNTHETIC_DOMAIN);
        assert_eq!(c.password_provider, None);
        assert_eq!(c.token_verifier, TokenVerifierConfig::default());
        assert_eq!(c.role_store_path, None);
    }

    #[test]
    fn remote_provider_wins_and_needs_key() {
        let c = load(&[
            ("PASSWORD_PROVIDER_URL", "https://p.example"),
            ("PASSWORD_PROVIDER_KEY", "anon"),
            ("LOCAL_USERS_FILE", "users.json"),
            ("APP_ENV", "Production"),
            ("SESSION_SECRET", "s3cret"),
        ])
        .unwrap();
        assert!(c.production);
        assert_eq!(
            c.password_provider,
            Some(PasswordProviderConfig::Remote { url: "https://p.example".into(), api_key: "anon".into() })
        );
        assert!(!format!("{c:?}").contains("s3cret"));
        assert!(load(&[("PASSWORD_PROVIDER_URL", "https://p.example")]).is_err());
    }

    #[test]
    fn local_provider_and_bad_values() {
        let c = load(&[("LOCAL_USERS_FILE", "users.json"), ("LOCAL_SESSION_TTL_SECS", "120")]).unwrap();
        assert_eq!(
            c.password_provider,
            Some(PasswordProviderConfig::Local { users_file: "users.json".into(), ttl_secs: 120 })
        );
        assert!(load(&[("CAMPAIGN_HTTP_PORT", "eighty")]).is_err());
        assert!(load(&[("LOCAL_USERS_FILE", "u.json"), ("LOCAL_SESSION_TTL_SECS", "0")]).is_err());
        assert_eq!(load(&[("SESSION_SECRET", "   ")]).unwrap().session_secret, None);
    }
}
