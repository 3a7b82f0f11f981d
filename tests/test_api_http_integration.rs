use axum::body::{to_bytes, Body};
use hyper::{header, Request, StatusCode};
use rest_mcp_demo::api::auth::{AuthPolicy, DEFAULT_BEARER_TOKEN};
use rest_mcp_demo::infra::http_app::build_app;
use serde_json::{json, Value as J};
use tower::ServiceExt;

const BODY_LIMIT: usize = 1024 * 1024;

async fn get(app: axum::Router, uri: &str, auth: Option<&str>) -> (StatusCode, J) {
    let mut req = Request::builder().method("GET").uri(uri);
    if let Some(auth) = auth {
        req = req.header(header::AUTHORIZATION, auth);
    }
    let resp = app.oneshot(req.body(Body::empty()).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn root_returns_welcome_message() {
    let (status, body) = get(build_app(&AuthPolicy::Open), "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "Welcome to the FastAPI MCP Server!"}));
}

#[tokio::test]
async fn open_greeting_needs_no_credentials() {
    let (status, body) = get(build_app(&AuthPolicy::Open), "/greet/Alice", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Hello, Alice!");
}

#[tokio::test]
async fn guarded_greeting_without_header_is_401() {
    let app = build_app(&AuthPolicy::bearer(DEFAULT_BEARER_TOKEN));
    let (status, body) = get(app, "/greet/Alice", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Not authenticated");
}

#[tokio::test]
async fn guarded_greeting_with_wrong_token_is_403() {
    let app = build_app(&AuthPolicy::bearer(DEFAULT_BEARER_TOKEN));
    let (status, body) = get(app, "/greet/Alice", Some("Bearer wrong")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "Invalid or expired token");
}

#[tokio::test]
async fn guarded_greeting_with_configured_token_is_200() {
    let app = build_app(&AuthPolicy::bearer(DEFAULT_BEARER_TOKEN));
    let (status, body) = get(app, "/greet/Alice", Some("Bearer MY_SECRET_TOKEN")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Hello, Alice!");
}

#[tokio::test]
async fn root_stays_open_when_greeting_is_guarded() {
    let app = build_app(&AuthPolicy::bearer(DEFAULT_BEARER_TOKEN));
    let (status, body) = get(app, "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Welcome to the FastAPI MCP Server!");
}
