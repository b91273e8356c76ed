use anyhow::{Context, Result};
use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::identity::provider::{IdentityProvider, ProviderIdentity, TokenError};

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    iat: Option<i64>,
    exp: i64,
}

/// Verifies signed ID tokens: RS256 against a PEM public key, or HS256 against a
/// shared secret for development. Issuer and audience are checked when configured.
pub struct JwtTokenProvider {
    key: DecodingKey,
    validation: Validation,
}

impl JwtTokenProvider {
    pub fn from_rsa_pem(pem: &[u8], issuer: Option<&str>, audience: Option<&str>) -> Result<Self> {
        let key = DecodingKey::from_rsa_pem(pem).context("invalid RS256 public key")?;
        Ok(Self::with_key(key, Algorithm::RS256, issuer, audience))
    }

    pub fn from_secret(secret: &[u8], issuer: Option<&str>, audience: Option<&str>) -> Self {
        Self::with_key(DecodingKey::from_secret(secret), Algorithm::HS256, issuer, audience)
    }

    fn with_key(key: DecodingKey, alg: Algorithm, issuer: Option<&str>, audience: Option<&str>) -> Self {
        let mut validation = Validation::new(alg);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        if let Some(iss) = issuer { validation.set_issuer(&[iss]); }
        match audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }
        Self { key, validation }
    }
}

fn classify(kind: &ErrorKind) -> TokenError {
    match kind {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidToken
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_)
        | ErrorKind::MissingRequiredClaim(_) => TokenError::Malformed,
        _ => TokenError::Invalid,
    }
}

#[async_trait]
impl IdentityProvider for JwtTokenProvider {
    fn name(&self) -> &'static str { "jwt" }

    async fn verify_id_token(&self, token: &str) -> Result<ProviderIdentity, TokenError> {
        let data = decode::<IdTokenClaims>(token, &self.key, &self.validation).map_err(|e| classify(e.kind()))?;
        let c = data.claims;
        if c.sub.trim().is_empty() {
            return Err(TokenError::Malformed);
        }
        // exp must lie strictly in the future
        if c.exp <= chrono::Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(ProviderIdentity {
            subject: c.sub,
            email: c.email,
            name: c.name,
            issued_at: c.iat.unwrap_or_else(|| chrono::Utc::now().timestamp()),
            expires_at: c.exp,
        })
    }
}
