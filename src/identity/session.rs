//! Application session cookie.
//!
//! The cookie carries an HS256-signed copy of the [`IdentityClaim`], so later
//! requests can rebuild identity without calling either provider. The cookie's
//! `exp` and `Max-Age` are always taken from the upstream identity's expiry; this
//! layer never extends a session beyond the token it wraps.

use axum::http::HeaderMap;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use crate::tprintln;

use super::claim::IdentityClaim;

pub const SESSION_COOKIE: &str = "__session";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// No signing secret configured. An operator problem, not a client one.
    #[error("session signing secret is not configured")]
    Misconfigured,
    #[error("session expired")]
    Expired,
    #[error("session invalid")]
    Invalid,
    #[error("session encoding failed: {0}")]
    Encode(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedSession {
    pub token: String,
    pub max_age: i64,
    /// Ready-to-send `Set-Cookie` value.
    pub set_cookie: String,
}

#[derive(Debug, Clone)]
pub struct SessionCodec {
    secret: Option<String>,
    secure: bool,
}

/// Remaining lifetime in whole seconds: `max(0, exp*1000 - now_ms) / 1000`.
pub fn max_age_secs(expires_at_secs: i64, now_ms: i64) -> i64 {
    expires_at_secs.saturating_mul(1000).saturating_sub(now_ms).max(0) / 1000
}

impl SessionCodec {
    /// `secure` adds the `Secure` attribute (production deployments).
    pub fn new(secret: Option<String>, secure: bool) -> Self {
        let secret = secret.filter(|s| !s.trim().is_empty());
        Self { secret, secure }
    }

    pub fn is_configured(&self) -> bool { self.secret.is_some() }

    fn secret(&self) -> Result<&[u8], SessionError> {
        self.secret.as_deref().map(str::as_bytes).ok_or(SessionError::Misconfigured)
    }

    pub fn issue(&self, claim: &IdentityClaim) -> Result<IssuedSession, SessionError> {
        self.issue_at(claim, chrono::Utc::now().timestamp_millis())
    }

    /// Issue with an explicit clock. An already-expired claim still yields a cookie, with `Max-Age=0`.
    pub fn issue_at(&self, claim: &IdentityClaim, now_ms: i64) -> Result<IssuedSession, SessionError> {
        let key = EncodingKey::from_secret(self.secret()?);
        let token = encode(&Header::new(Algorithm::HS256), claim, &key)
            .map_err(|e| SessionError::Encode(e.to_string()))?;
        let max_age = max_age_secs(claim.expires_at(), now_ms);
        let set_cookie = self.cookie_attrs(&token, max_age);
        tprintln!("session.issue sub={} role={} max_age={}", claim.subject(), claim.role(), max_age);
        Ok(IssuedSession { token, max_age, set_cookie })
    }

    /// `Ok(None)` when there is no cookie at all: a valid anonymous state.
    pub fn verify(&self, cookie: Option<&str>) -> Result<Option<IdentityClaim>, SessionError> {
        let Some(token) = cookie.map(str::trim).filter(|t| !t.is_empty()) else { return Ok(None); };
        let key = DecodingKey::from_secret(self.secret()?);
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        match decode::<IdentityClaim>(token, &key, &validation) {
            Ok(data) if data.claims.is_expired_at(chrono::Utc::now().timestamp()) => Err(SessionError::Expired),
            Ok(data) => Ok(Some(data.claims)),
            Err(e) => match e.kind() {
                ErrorKind::ExpiredSignature => Err(SessionError::Expired),
                _ => Err(SessionError::Invalid),
            },
        }
    }

    /// `Set-Cookie` value that makes the client drop the session.
    pub fn clear_cookie(&self) -> String {
        format!(
            "{}=; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Path=/; HttpOnly; SameSite=Lax{}",
            SESSION_COOKIE,
            if self.secure { "; Secure" } else { "" }
        )
    }

    fn cookie_attrs(&self, token: &str, max_age: i64) -> String {
        format!(
            "{}={}; Max-Age={}; Path=/; HttpOnly; SameSite=Lax{}",
            SESSION_COOKIE,
            token,
            max_age,
            if self.secure { "; Secure" } else { "" }
        )
    }
}

/// Value of the session cookie from a request's `Cookie` header(s).
pub fn read_session_cookie(headers: &HeaderMap) -> Option<String> {
    for cookie in headers.get_all(axum::http::header::COOKIE).iter() {
        let Ok(s) = cookie.to_str() else { continue; };
        for part in s.split(';') {
            if let Some((k, v)) = part.trim().split_once('=') {
                if k == SESSION_COOKIE && !v.is_empty() { return Some(v.to_string()); }
            }
        }
    }
    None
}
