//! HTTP-level tests: credential login, ID-token sessions, verification, routing and logout.
//! The router is driven in-process with fake providers that count their calls.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use campaign_auth::identity::{
    IdentityProvider, MemoryRoleStore, PasswordSession, ProviderError, ProviderIdentity, RoleRecord, RoleStore,
    SessionCodec, SyntheticIdentityMapper, TokenError, DEFAULT_ROLE,
};
use campaign_auth::server::{router, AppState};

const DOMAIN: &str = "auth.example.org";

fn now() -> i64 { chrono::Utc::now().timestamp() }

#[derive(Default)]
struct FakePasswordProvider {
    calls: AtomicUsize,
}

#[async_trait]
impl IdentityProvider for FakePasswordProvider {
    fn name(&self) -> &'static str { "fake-password" }

    async fn sign_in_with_password(&self, email: &str, secret: &str) -> Result<PasswordSession, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if email != format!("123456789@{DOMAIN}") || secret != "pw" {
            return Err(ProviderError::Rejected {
                message: "Invalid login credentials".into(),
                details: json!({ "error": "invalid_grant" }),
            });
        }
        let expires_at = now() + 3600;
        Ok(PasswordSession {
            record: json!({
                "access_token": "provider-access-token",
                "expires_at": expires_at,
                "user": { "id": "uid-123456789", "email": email }
            }),
            identity: ProviderIdentity {
                subject: "uid-123456789".into(),
                email: Some(email.to_string()),
                name: None,
                issued_at: now(),
                expires_at,
            },
        })
    }
}

struct FakeTokenProvider;

#[async_trait]
impl IdentityProvider for FakeTokenProvider {
    fn name(&self) -> &'static str { "fake-token" }

    async fn verify_id_token(&self, token: &str) -> Result<ProviderIdentity, TokenError> {
        match token.split_once(':') {
            Some(("valid", sub)) => Ok(ProviderIdentity {
                subject: sub.to_string(),
                email: Some(format!("{sub}@mail.example")),
                name: Some("Tamar".into()),
                issued_at: now(),
                expires_at: now() + 600,
            }),
            _ if token == "expired" => Err(TokenError::Expired),
            _ => Err(TokenError::Invalid),
        }
    }
}

struct Harness {
    app: Router,
    password: Arc<FakePasswordProvider>,
    store: Arc<MemoryRoleStore>,
}

fn harness_with_secret(secret: Option<&str>) -> Harness {
    let password = Arc::new(FakePasswordProvider::default());
    let store = Arc::new(MemoryRoleStore::new());
    let state = AppState::new(
        password.clone(),
        Arc::new(FakeTokenProvider),
        store.clone(),
        SessionCodec::new(secret.map(str::to_string), false),
        SyntheticIdentityMapper::new(DOMAIN),
    );
    Harness { app: router(state), password, store }
}

fn harness() -> Harness { harness_with_secret(Some("integration-secret")) }

async fn send(app: &Router, req: Request<Body>) -> Response {
    app.clone().oneshot(req).await.expect("router is infallible")
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_with_cookie(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut b = Request::builder().method("GET").uri(uri);
    if let Some(c) = cookie {
        b = b.header(header::COOKIE, c);
    }
    b.body(Body::empty()).unwrap()
}

async fn body_json(resp: Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// `name=value` part of the response's Set-Cookie header.
fn session_cookie(resp: &Response) -> String {
    let raw = resp.headers().get(header::SET_COOKIE).expect("Set-Cookie").to_str().unwrap();
    raw.split_once(';').map(|(nv, _)| nv).unwrap_or(raw).to_string()
}

async fn login(h: &Harness) -> String {
    let resp = send(&h.app, post_json("/api/auth/login", json!({"identifier": "123456789", "secret": "pw"}))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    session_cookie(&resp)
}

#[tokio::test]
async fn credential_login_sets_session_cookie() {
    let h = harness();
    let resp = send(&h.app, post_json("/api/auth/login", json!({"identifier": " 123456789 ", "secret": "pw"}))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let set_cookie = resp.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap().to_string();
    assert!(set_cookie.starts_with("__session="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));
    assert!(set_cookie.contains("Path=/"));
    let body = body_json(resp).await;
    assert_eq!(body["access_token"], "provider-access-token");
    assert_eq!(body["user"]["email"], format!("123456789@{DOMAIN}"));
    assert_eq!(h.password.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.store.len(), 1);
}

#[tokio::test]
async fn missing_or_non_string_fields_fail_fast() {
    let h = harness();
    for body in [
        json!({}),
        json!({"identifier": "123456789"}),
        json!({"secret": "pw"}),
        json!({"identifier": "", "secret": "pw"}),
        json!({"identifier": 123456789, "secret": "pw"}),
        json!({"identifier": null, "secret": "pw"}),
        json!({"identifier": "   ", "secret": "pw"}),
    ] {
        let resp = send(&h.app, post_json("/api/auth/login", body.clone())).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body {body}");
        let out = body_json(resp).await;
        assert!(out["error"].is_string());
    }
    let resp = send(
        &h.app,
        Request::builder()
            .method("POST")
            .uri("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(h.password.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn bad_credentials_pass_provider_error_through() {
    let h = harness();
    let resp = send(&h.app, post_json("/api/auth/login", json!({"identifier": "123456789", "secret": "nope"}))).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().get(header::SET_COOKIE).is_none());
    let body = body_json(resp).await;
    assert_eq!(body["error"], "Invalid login credentials");
    assert_eq!(body["details"], json!({"error": "invalid_grant"}));
    assert_eq!(h.store.len(), 0);
}

#[tokio::test]
async fn verify_without_cookie_is_unauthorized() {
    let h = harness();
    let resp = send(&h.app, get_with_cookie("/api/auth/verify", None)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await, json!({"user": null, "idToken": null}));
}

#[tokio::test]
async fn login_then_verify_and_route() {
    let h = harness();
    let cookie = login(&h).await;
    let token = cookie.trim_start_matches("__session=").to_string();

    let resp = send(&h.app, get_with_cookie("/api/auth/verify", Some(&format!("theme=dark; {cookie}")))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["user"]["sub"], "uid-123456789");
    assert_eq!(body["user"]["role"], DEFAULT_ROLE);
    assert_eq!(body["idToken"], token);

    // default role has no landing page
    let resp = send(&h.app, get_with_cookie("/api/auth/route", Some(&cookie))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!({"role": DEFAULT_ROLE, "path": "/login"}));

    // promote and log in again
    let mut record: RoleRecord = h.store.get("uid-123456789").await.unwrap().unwrap();
    record.role = Some("manager".into());
    h.store.upsert(record).await.unwrap();
    let cookie = login(&h).await;
    let resp = send(&h.app, get_with_cookie("/api/auth/route", Some(&cookie))).await;
    assert_eq!(body_json(resp).await, json!({"role": "manager", "path": "/manager"}));
}

#[tokio::test]
async fn tampered_cookie_is_rejected() {
    let h = harness();
    let cookie = login(&h).await;
    let mut bytes = cookie.into_bytes();
    let idx = bytes.iter().position(|b| *b == b'.').unwrap() + 3;
    bytes[idx] = if bytes[idx] == b'x' { b'y' } else { b'x' };
    let tampered = String::from_utf8(bytes).unwrap();
    let resp = send(&h.app, get_with_cookie("/api/auth/verify", Some(&tampered))).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await, json!({"user": null, "idToken": null}));
}

#[tokio::test]
async fn id_token_session_provisions_once() {
    let h = harness();
    for _ in 0..2 {
        let resp = send(&h.app, post_json("/api/auth/session", json!({"idToken": "valid:firebase-uid"}))).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(session_cookie(&resp).starts_with("__session="));
        assert_eq!(body_json(resp).await["role"], DEFAULT_ROLE);
    }
    assert_eq!(h.store.len(), 1);
    let rec = h.store.get("firebase-uid").await.unwrap().unwrap();
    assert_eq!(rec.status, "active");
    assert_eq!(rec.name, "Tamar");
}

#[tokio::test]
async fn id_token_failures_are_classified() {
    let h = harness();
    let resp = send(&h.app, post_json("/api/auth/session", json!({"idToken": "expired"}))).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await["details"], "token_expired");

    let resp = send(&h.app, post_json("/api/auth/session", json!({"idToken": "forged"}))).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await["details"], "token_invalid");

    let resp = send(&h.app, post_json("/api/auth/session", json!({}))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn missing_secret_is_a_server_error() {
    let h = harness_with_secret(None);
    let resp = send(&h.app, post_json("/api/auth/login", json!({"identifier": "123456789", "secret": "pw"}))).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(resp.headers().get(header::SET_COOKIE).is_none());
    assert_eq!(body_json(resp).await["details"], "server_misconfigured");

    let resp = send(&h.app, post_json("/api/auth/session", json!({"idToken": "valid:firebase-uid"}))).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(resp.headers().get(header::SET_COOKIE).is_none());
    assert_eq!(body_json(resp).await["details"], "server_misconfigured");

    // nothing upstream is touched and no role record is provisioned
    assert_eq!(h.password.calls.load(Ordering::SeqCst), 0);
    assert!(h.store.is_empty());

    let resp = send(&h.app, get_with_cookie("/api/auth/verify", Some("__session=a.b.c"))).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    // no cookie is still just "not logged in"
    let resp = send(&h.app, get_with_cookie("/api/auth/verify", None)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_always_clears_cookie() {
    let h = harness();
    let resp = send(&h.app, post_json("/api/auth/logout", json!({}))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cleared = resp.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap().to_string();
    assert!(cleared.starts_with("__session=;"));
    assert!(cleared.contains("Max-Age=0"));
    assert!(cleared.contains("Path=/"));

    let resp = send(&h.app, get_with_cookie("/api/auth/verify", Some("__session="))).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_endpoint() {
    let h = harness();
    let resp = send(&h.app, get_with_cookie("/healthz", None)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}
