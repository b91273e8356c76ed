use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde_json::Value;
use tracing::{debug, warn};

use crate::identity::provider::{IdentityProvider, PasswordSession, ProviderError, ProviderIdentity};

/// Password-grant exchange against a hosted auth service
/// (`POST {base}/auth/v1/token?grant_type=password`, `apikey` header).
#[derive(Clone)]
pub struct RemotePasswordProvider {
    token_url: Url,
    api_key: String,
    client: reqwest::Client,
}

impl RemotePasswordProvider {
    pub fn new(base: &str, api_key: impl Into<String>) -> Result<Self> {
        let mut base_url = Url::parse(base).with_context(|| format!("invalid password provider URL: {base}"))?;
        // keep any path prefix (e.g. a reverse proxy mount) when joining
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let mut token_url = base_url.join("auth/v1/token")?;
        token_url.set_query(Some("grant_type=password"));
        let client = reqwest::Client::builder().build()?;
        Ok(Self { token_url, api_key: api_key.into(), client })
    }

    pub fn token_url(&self) -> &Url { &self.token_url }
}

fn rejection_message(body: &Value) -> String {
    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|k| body.get(*k).and_then(|v| v.as_str()))
        .unwrap_or("Invalid login credentials")
        .to_string()
}

/// Identity fields out of a successful password-grant response.
fn identity_from_record(record: &Value, now: i64) -> Option<ProviderIdentity> {
    let user = record.get("user")?;
    let subject = user.get("id").and_then(|v| v.as_str()).filter(|s| !s.is_empty())?.to_string();
    let email = user.get("email").and_then(|v| v.as_str()).map(str::to_string);
    let name = user
        .get("user_metadata")
        .and_then(|m| m.get("full_name").or_else(|| m.get("name")))
        .and_then(|v| v.as_str())
        .map(str::to_string);
    let expires_at = record
        .get("expires_at")
        .and_then(|v| v.as_i64())
        .or_else(|| record.get("expires_in").and_then(|v| v.as_i64()).map(|secs| now + secs))?;
    Some(ProviderIdentity { subject, email, name, issued_at: now, expires_at })
}

#[async_trait]
impl IdentityProvider for RemotePasswordProvider {
    fn name(&self) -> &'static str { "remote-password" }

    async fn sign_in_with_password(&self, email: &str, secret: &str) -> Result<PasswordSession, ProviderError> {
        let resp = self
            .client
            .post(self.token_url.clone())
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "email": email, "password": secret }))
            .send()
            .await
            .map_err(|e| ProviderError::Upstream(e.to_string()))?;
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(Value::Null);
        debug!(target: "auth", "password grant status={}", status);
        if status.is_success() {
            let now = chrono::Utc::now().timestamp();
            let Some(identity) = identity_from_record(&body, now) else {
                return Err(ProviderError::Upstream("password provider response is missing user id or expiry".into()));
            };
            return Ok(PasswordSession { record: body, identity });
        }
        match status {
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::UNPROCESSABLE_ENTITY => {
                Err(ProviderError::Rejected { message: rejection_message(&body), details: body })
            }
            other => {
                warn!(target: "auth", "password provider returned HTTP {}", other);
                Err(ProviderError::Upstream(format!("HTTP {other}: {body}")))
            }
        }
    }
}
