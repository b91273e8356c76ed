//! Unified application error model and mapping helpers.
//! Component errors from the identity layer are folded into `AppError` at the HTTP
//! boundary, which picks the status code and the client-safe message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::identity::{AuthError, ProviderError, SessionError, StoreError, TokenError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    UserInput { code: String, message: String },
    Auth { code: String, message: String },
    Config { code: String, message: String },
    Upstream { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::UserInput { code, .. }
            | AppError::Auth { code, .. }
            | AppError::Config { code, .. }
            | AppError::Upstream { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::UserInput { message, .. }
            | AppError::Auth { message, .. }
            | AppError::Config { message, .. }
            | AppError::Upstream { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn user<S: Into<String>>(code: S, msg: S) -> Self { AppError::UserInput { code: code.into(), message: msg.into() } }
    pub fn auth<S: Into<String>>(code: S, msg: S) -> Self { AppError::Auth { code: code.into(), message: msg.into() } }
    pub fn config<S: Into<String>>(code: S, msg: S) -> Self { AppError::Config { code: code.into(), message: msg.into() } }
    pub fn upstream<S: Into<String>>(code: S, msg: S) -> Self { AppError::Upstream { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::UserInput { .. } => 400,
            AppError::Auth { .. } => 401,
            AppError::Config { .. } => 500,
            AppError::Upstream { .. } => 500,
            AppError::Internal { .. } => 500,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// JSON body handed to clients: `{ "error": <message>, "details": <code> }`.
    pub fn body(&self) -> serde_json::Value {
        serde_json::json!({ "error": self.message(), "details": self.code_str() })
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.body())).into_response()
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Missing => AppError::user("token_missing", err.user_message()),
            TokenError::Malformed | TokenError::Expired | TokenError::Invalid => {
                AppError::auth(err.code(), err.user_message())
            }
            TokenError::Store(inner) => inner.into(),
            TokenError::Upstream(detail) => {
                tracing::error!("token verification upstream failure: {detail}");
                AppError::upstream("verification_unavailable", "Token verification is unavailable")
            }
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Misconfigured => {
                tracing::error!("session signing secret is not configured (SESSION_SECRET)");
                AppError::config("server_misconfigured", "Server configuration error")
            }
            SessionError::Expired => AppError::auth("session_expired", "Session has expired"),
            SessionError::Invalid => AppError::auth("session_invalid", "Session is invalid"),
            SessionError::Encode(detail) => {
                tracing::error!("session encoding failed: {detail}");
                AppError::internal("session_encode_failed", "Unexpected server error")
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        tracing::error!("role store failure: {err}");
        AppError::upstream("role_store_unavailable", "Unexpected server error")
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Rejected { message, .. } => AppError::Auth { code: "invalid_credentials".into(), message },
            ProviderError::Unsupported(provider) => {
                tracing::error!("provider {provider} does not support password sign-in");
                AppError::config("server_misconfigured", "Server configuration error")
            }
            ProviderError::Upstream(detail) => {
                tracing::error!("password provider failure: {detail}");
                AppError::upstream("provider_unavailable", "Unexpected server error")
            }
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Validation(msg) => AppError::user("validation_error", msg),
            AuthError::Provider(inner) => inner.into(),
        }
    }
}
