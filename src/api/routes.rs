use std::sync::Arc;

use axum::extract::Path;
use axum::{middleware, routing::get, Json, Router};

use crate::api::auth::{require_bearer, AuthPolicy};
use crate::domain::MessageBody;

/// Returns a simple welcome message.
pub async fn read_root() -> Json<MessageBody> {
    Json(MessageBody::welcome())
}

/// Greets the user by name.
pub async fn greet_user(Path(name): Path<String>) -> Json<MessageBody> {
    tracing::debug!(%name, "greet_user");
    Json(MessageBody::greeting(&name))
}

/// REST-only router. With a bearer policy only `/greet/:name` is guarded.
pub fn rest_router(policy: &AuthPolicy) -> Router {
    let greet = Router::new().route("/greet/:name", get(greet_user));
    let greet = match policy {
        AuthPolicy::Open => greet,
        AuthPolicy::Bearer(token) => {
            let expected: Arc<str> = Arc::from(token.as_str());
            greet.route_layer(middleware::from_fn_with_state(expected, require_bearer))
        }
    };
    Router::new().route("/", get(read_root)).merge(greet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::auth::DEFAULT_BEARER_TOKEN;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value as J};
    use tower::ServiceExt;

    const BODY_LIMIT: usize = 1024 * 1024;

    async fn get_json(app: Router, uri: &str, auth: Option<&str>) -> (StatusCode, J) {
        let mut req = Request::builder().method("GET").uri(uri);
        if let Some(a) = auth {
            req = req.header("authorization", a);
        }
        let resp = app.oneshot(req.body(Body::empty()).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn root_returns_welcome() {
        let (status, v) = get_json(rest_router(&AuthPolicy::Open), "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v, json!({"message": "Welcome to the FastAPI MCP Server!"}));
    }

    #[tokio::test]
    async fn open_greet_needs_no_header() {
        let (status, v) = get_json(rest_router(&AuthPolicy::Open), "/greet/Alice", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["message"], "Hello, Alice!");
    }

    #[tokio::test]
    async fn greet_decodes_path_segment() {
        let (_, v) = get_json(rest_router(&AuthPolicy::Open), "/greet/Ada%20Lovelace", None).await;
        assert_eq!(v["message"], "Hello, Ada Lovelace!");
    }

    #[tokio::test]
    async fn guarded_greet_statuses() {
        let app = rest_router(&AuthPolicy::bearer(DEFAULT_BEARER_TOKEN));

        let (status, v) = get_json(app.clone(), "/greet/Alice", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(v["detail"], "Not authenticated");

        let (status, _) = get_json(app.clone(), "/greet/Alice", Some("Bearer wrong")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, v) =
            get_json(app.clone(), "/greet/Alice", Some("Bearer MY_SECRET_TOKEN")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["message"], "Hello, Alice!");
    }

    #[tokio::test]
    async fn guard_leaves_root_open() {
        let app = rest_router(&AuthPolicy::bearer(DEFAULT_BEARER_TOKEN));
        let (status, _) = get_json(app, "/", None).await;
        assert_eq!(status, StatusCode::OK);
    }
}
