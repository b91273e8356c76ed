//!
//! campaign-auth HTTP server
//! -------------------------
//! Axum endpoints over the identity layer.
//!
//! Responsibilities:
//! - Credential login (identifier + password through the synthetic address) that mints the session cookie.
//! - Session issuance from a provider-issued ID token.
//! - Session verification and role-based landing route for the current cookie.
//! - Logout, which always succeeds from the client's point of view.
//!
//! Providers, the role store and the cookie codec are built once in [`AppState::from_config`]
//! and shared by every request; nothing here keeps per-request state between calls.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::signal;
use tracing::{error, info, warn};

use crate::config::{Config, PasswordProviderConfig};
use crate::error::{AppError, AppResult};
use crate::identity::backends::{JwtTokenProvider, LocalPasswordProvider, RemotePasswordProvider};
use crate::identity::{
    read_session_cookie, resolve_route, AuthError, BearerVerifier, CredentialAuthenticator, IdentityClaim,
    IdentityProvider, MemoryRoleStore, ProviderError, RoleDirectory, RoleStore, SessionCodec, SessionError,
    SyntheticIdentityMapper, FALLBACK_ROUTE,
};

#[derive(Clone)]
pub struct AppState {
    pub authenticator: CredentialAuthenticator,
    pub bearer: BearerVerifier,
    pub directory: RoleDirectory,
    pub sessions: Arc<SessionCodec>,
}

impl AppState {
    pub fn new(
        password_provider: Arc<dyn IdentityProvider>,
        token_provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn RoleStore>,
        sessions: SessionCodec,
        mapper: SyntheticIdentityMapper,
    ) -> Self {
        let directory = RoleDirectory::new(store);
        Self {
            authenticator: CredentialAuthenticator::new(password_provider, mapper),
            bearer: BearerVerifier::new(token_provider, directory.clone()),
            directory,
            sessions: Arc::new(sessions),
        }
    }

    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let password_provider: Arc<dyn IdentityProvider> = match &cfg.password_provider {
            Some(PasswordProviderConfig::Remote { url, api_key }) => Arc::new(RemotePasswordProvider::new(url, api_key.clone())?),
            Some(PasswordProviderConfig::Local { users_file, ttl_secs }) => {
                Arc::new(LocalPasswordProvider::from_file(users_file, *ttl_secs)?)
            }
            None => anyhow::bail!("no password provider configured (set PASSWORD_PROVIDER_URL or LOCAL_USERS_FILE)"),
        };

        let tv = &cfg.token_verifier;
        let token_provider: Arc<dyn IdentityProvider> = match (&tv.public_key_path, &tv.hs_secret) {
            (Some(path), _) => {
                let pem = std::fs::read(path).with_context(|| format!("reading token public key {}", path.display()))?;
                Arc::new(JwtTokenProvider::from_rsa_pem(&pem, tv.issuer.as_deref(), tv.audience.as_deref())?)
            }
            (None, Some(secret)) => {
                warn!("bearer tokens verified with TOKEN_HS_SECRET; use TOKEN_PUBLIC_KEY_PATH in production");
                Arc::new(JwtTokenProvider::from_secret(secret.as_bytes(), tv.issuer.as_deref(), tv.audience.as_deref()))
            }
            (None, None) => anyhow::bail!("no token verification key configured (set TOKEN_PUBLIC_KEY_PATH or TOKEN_HS_SECRET)"),
        };

        let store: Arc<dyn RoleStore> = match &cfg.role_store_path {
            Some(path) => Arc::new(MemoryRoleStore::with_snapshot(path).context("opening role store snapshot")?),
            None => Arc::new(MemoryRoleStore::new()),
        };

        Ok(Self::new(
            password_provider,
            token_provider,
            store,
            SessionCodec::new(cfg.session_secret.clone(), cfg.production),
            SyntheticIdentityMapper::new(cfg.synthetic_domain.clone()),
        ))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/api/auth/login", post(login))
        .route("/api/auth/session", post(create_session))
        .route("/api/auth/verify", get(verify_session))
        .route("/api/auth/route", get(session_route))
        .route("/api/auth/logout", post(logout))
        .with_state(state)
}

pub async fn run(cfg: Config) -> anyhow::Result<()> {
    info!(target: "startup", "configuration: {:?}", cfg);
    let state = AppState::from_config(&cfg)?;
    let app = router(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", cfg.http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => { s.recv().await; }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn cookie_headers(set_cookie: &str) -> AppResult<HeaderMap> {
    let value = HeaderValue::from_str(set_cookie)
        .map_err(|e| AppError::internal("cookie_header".to_string(), format!("invalid Set-Cookie value: {e}")))?;
    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, value);
    Ok(headers)
}

fn json_body(payload: Result<Json<Value>, JsonRejection>) -> AppResult<Value> {
    payload
        .map(|Json(v)| v)
        .map_err(|e| AppError::user("invalid_body".to_string(), format!("Request body must be JSON: {}", e.body_text())))
}

fn issue_cookie(state: &AppState, claim: &IdentityClaim) -> AppResult<HeaderMap> {
    let issued = state.sessions.issue(claim)?;
    cookie_headers(&issued.set_cookie)
}

/// Session claim plus the raw cookie token, `None` when no cookie was sent.
fn current_session(state: &AppState, headers: &HeaderMap) -> Result<Option<(IdentityClaim, String)>, SessionError> {
    let Some(token) = read_session_cookie(headers) else { return Ok(None); };
    Ok(state.sessions.verify(Some(&token))?.map(|claim| (claim, token)))
}

async fn login(State(state): State<AppState>, payload: Result<Json<Value>, JsonRejection>) -> Response {
    let body = match json_body(payload) {
        Ok(v) => v,
        Err(e) => return e.into_response(),
    };
    if !state.sessions.is_configured() {
        return AppError::from(SessionError::Misconfigured).into_response();
    }
    let secret = body.get("secret").and_then(Value::as_str).unwrap_or_default();

    let session = match state.authenticator.authenticate_value(body.get("identifier"), secret).await {
        Ok(s) => s,
        Err(AuthError::Provider(ProviderError::Rejected { message, details })) => {
            info!(target: "auth", "credential login rejected: {}", message);
            return (StatusCode::UNAUTHORIZED, Json(json!({ "error": message, "details": details }))).into_response();
        }
        Err(e) => return AppError::from(e).into_response(),
    };

    let result = async {
        let claim = state.directory.resolve(&session.identity).await?;
        let headers = issue_cookie(&state, &claim)?;
        info!(target: "auth", "credential login sub={} role={}", claim.subject(), claim.role());
        Ok::<_, AppError>(headers)
    }
    .await;
    match result {
        Ok(headers) => (StatusCode::OK, headers, Json(session.record)).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn create_session(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let body = json_body(payload)?;
    if !state.sessions.is_configured() {
        return Err(SessionError::Misconfigured.into());
    }
    let token = body.get("idToken").and_then(Value::as_str).unwrap_or_default();
    let claim = state.bearer.verify(token).await?;
    let headers = issue_cookie(&state, &claim)?;
    info!(target: "auth", "session issued from id token sub={} role={}", claim.subject(), claim.role());
    Ok((StatusCode::OK, headers, Json(json!({ "status": "ok", "role": claim.role() }))))
}

async fn verify_session(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let unauthenticated = || (StatusCode::UNAUTHORIZED, Json(json!({ "user": null, "idToken": null })));
    match current_session(&state, &headers) {
        Ok(Some((claim, token))) => (StatusCode::OK, Json(json!({ "user": claim, "idToken": token }))).into_response(),
        Ok(None) => unauthenticated().into_response(),
        Err(SessionError::Misconfigured) => AppError::from(SessionError::Misconfigured).into_response(),
        Err(e) => {
            info!(target: "auth", "session cookie rejected: {}", e);
            unauthenticated().into_response()
        }
    }
}

async fn session_route(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match current_session(&state, &headers) {
        Ok(Some((claim, _))) => {
            let path = resolve_route(Some(claim.role()));
            (StatusCode::OK, Json(json!({ "role": claim.role(), "path": path }))).into_response()
        }
        Ok(None) => (StatusCode::UNAUTHORIZED, Json(json!({ "role": null, "path": FALLBACK_ROUTE }))).into_response(),
        Err(SessionError::Misconfigured) => AppError::from(SessionError::Misconfigured).into_response(),
        Err(e) => {
            info!(target: "auth", "session cookie rejected: {}", e);
            (StatusCode::UNAUTHORIZED, Json(json!({ "role": null, "path": FALLBACK_ROUTE }))).into_response()
        }
    }
}

async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    let headers = match cookie_headers(&state.sessions.clear_cookie()) {
        Ok(h) => h,
        Err(e) => {
            error!(target: "auth", "failed to clear session cookie: {}", e);
            HeaderMap::new()
        }
    };
    (StatusCode::OK, headers, Json(json!({ "status": "ok" })))
}
