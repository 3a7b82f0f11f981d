use axum::{
    routing::{any_service, get},
    Router,
};
use std::sync::Arc;

use crate::api::auth::AuthPolicy;
use crate::api::routes::rest_router;
use crate::infra::mcp::{self, BridgeSvc, LocalSessionManager};

/// REST routes + `/healthz` + streamable MCP (SSE framed) at `/mcp`.
pub fn build_app(policy: &AuthPolicy) -> Router {
    let session_mgr = Arc::new(LocalSessionManager::default());
    let bridge = BridgeSvc::for_policy(policy);
    let mcp_service = mcp::make_streamable_http_service(move || bridge.clone(), session_mgr);

    rest_router(policy)
        .route("/healthz", get(|| async { "ok" }))
        .route_service("/mcp", any_service(mcp_service))
}
