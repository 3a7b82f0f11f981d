//! MCP bridge: exports the REST routes as tools (streamable HTTP + stdio).
//!
//! - `tools/list` is derived from the [`RouteCatalog`]
//! - `tools/call` replays the call as an in-process HTTP request against the
//!   REST router, forwarding the caller's `Authorization` header
//! - Streamable HTTP is mounted at `/mcp` (POST frames, SSE responses, GET stream)

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::request::Parts;
use axum::http::{header, HeaderValue, Request};
use axum::Router;
use tokio::io::{AsyncRead, AsyncWrite};
use tower::ServiceExt;

use rmcp::{
    model::{
        CallToolRequestParam, CallToolResult, Content, Implementation, JsonObject,
        ListToolsResult, PaginatedRequestParam, ServerCapabilities, ServerInfo, Tool,
    },
    serve_server,
    service::RequestContext,
    ErrorData as McpError, RoleServer, ServerHandler,
};

use rmcp::transport::streamable_http_server::tower::{
    StreamableHttpServerConfig, StreamableHttpService,
};

pub use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;

use crate::api::auth::AuthPolicy;
use crate::api::routes::rest_router;
use crate::core::error::BridgeError;
use crate::core::tool::RouteTool;
use crate::tools::registry::RouteCatalog;

const BODY_LIMIT: usize = 1024 * 1024;

/// The MCP server handler. Holds the catalogue of exported routes and the
/// REST router those routes are served by.
#[derive(Clone)]
pub struct BridgeSvc {
    catalog: RouteCatalog,
    app: Router,
}

impl BridgeSvc {
    pub fn new(catalog: RouteCatalog, app: Router) -> Self {
        Self { catalog, app }
    }

    /// Bridge over the default routes guarded by `policy`.
    pub fn for_policy(policy: &AuthPolicy) -> Self {
        Self::new(RouteCatalog::default_routes(), rest_router(policy))
    }

    pub fn tools(&self) -> Vec<Tool> {
        self.catalog.list().iter().map(to_mcp_tool).collect()
    }

    /// Run one tool call against the REST router.
    pub async fn dispatch(
        &self,
        name: &str,
        args: &JsonObject,
        authorization: Option<HeaderValue>,
    ) -> Result<CallToolResult, BridgeError> {
        let route = self
            .catalog
            .get(name)
            .ok_or_else(|| BridgeError::UnknownTool(name.to_string()))?;
        let path = route.render_path(args)?;
        tracing::debug!(tool = name, method = %route.method, %path, "dispatching tool call");

        let mut builder = Request::builder().method(route.method.clone()).uri(&path);
        if let Some(auth) = authorization {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        let req = builder
            .body(Body::empty())
            .map_err(|e| BridgeError::Request(e.to_string()))?;

        let resp = match self.app.clone().oneshot(req).await {
            Ok(resp) => resp,
            Err(never) => match never {},
        };
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), BODY_LIMIT)
            .await
            .map_err(|e| BridgeError::Body(e.to_string()))?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        tracing::trace!(tool = name, %status, body = %text, "tool call finished");

        if status.is_success() {
            Ok(CallToolResult::success(vec![Content::text(text)]))
        } else {
            Ok(CallToolResult::error(vec![Content::text(format!(
                "HTTP {}: {}",
                status.as_u16(),
                text
            ))]))
        }
    }
}

fn to_mcp_tool(route: &RouteTool) -> Tool {
    Tool::new(route.name, route.description, Arc::new(route.input_schema()))
}

impl ServerHandler for BridgeSvc {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some("REST routes of the demo server exported as tools.".into()),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        let tools = self.tools();
        tracing::debug!(count = tools.len(), "listing tools");
        Ok(ListToolsResult {
            tools,
            next_cursor: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        // Only present when the request arrived over HTTP.
        let authorization = context
            .extensions
            .get::<Parts>()
            .and_then(|parts| parts.headers.get(header::AUTHORIZATION))
            .cloned();
        let args = request.arguments.unwrap_or_default();
        self.dispatch(&request.name, &args, authorization)
            .await
            .map_err(McpError::from)
    }
}

/// Serve the bridge over stdin/stdout until the peer disconnects.
pub async fn serve_stdio(
    svc: BridgeSvc,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    serve_io(svc, (tokio::io::stdin(), tokio::io::stdout())).await
}

/// Serve the bridge over a newline-delimited JSON-RPC byte stream.
pub async fn serve_io<R, W>(
    svc: BridgeSvc,
    io: (R, W),
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
{
    let running = serve_server(svc, io).await?;
    let reason = running.waiting().await?;
    tracing::info!(?reason, "io session ended");
    Ok(())
}

pub fn make_streamable_http_service(
    factory: impl Fn() -> BridgeSvc + Send + Sync + Clone + 'static,
    session_mgr: Arc<LocalSessionManager>,
) -> StreamableHttpService<BridgeSvc, LocalSessionManager> {
    let cfg = StreamableHttpServerConfig::default();
    tracing::debug!(stateful_mode = %cfg.stateful_mode, keep_alive = ?cfg.sse_keep_alive, "StreamableHttpServerConfig");
    StreamableHttpService::new(move || Ok(factory()), session_mgr, cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::auth::DEFAULT_BEARER_TOKEN;
    use serde_json::{json, Value as JsonValue};

    fn text_of(result: &CallToolResult) -> String {
        let v = serde_json::to_value(result).unwrap();
        v["content"][0]["text"].as_str().unwrap().to_string()
    }

    fn is_error(result: &CallToolResult) -> bool {
        let v = serde_json::to_value(result).unwrap();
        v["isError"].as_bool().unwrap_or(false)
    }

    fn args(v: JsonValue) -> JsonObject {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn lists_one_tool_per_route() {
        let svc = BridgeSvc::for_policy(&AuthPolicy::Open);
        let tools = serde_json::to_value(svc.tools()).unwrap();
        assert_eq!(tools[0]["name"], "read_root");
        assert_eq!(tools[1]["name"], "greet_user");
        assert_eq!(tools[1]["inputSchema"]["required"], json!(["name"]));
    }

    #[tokio::test]
    async fn read_root_returns_welcome_body_as_text() {
        let svc = BridgeSvc::for_policy(&AuthPolicy::Open);
        let out = svc.dispatch("read_root", &JsonObject::new(), None).await.unwrap();
        assert!(!is_error(&out));
        let body: JsonValue = serde_json::from_str(&text_of(&out)).unwrap();
        assert_eq!(body["message"], "Welcome to the FastAPI MCP Server!");
    }

    #[tokio::test]
    async fn greet_user_renders_path_param() {
        let svc = BridgeSvc::for_policy(&AuthPolicy::Open);
        let out = svc
            .dispatch("greet_user", &args(json!({"name": "LangChain"})), None)
            .await
            .unwrap();
        assert!(text_of(&out).contains("Hello, LangChain!"));
    }

    #[tokio::test]
    async fn guarded_route_without_token_is_tool_error() {
        let svc = BridgeSvc::for_policy(&AuthPolicy::bearer(DEFAULT_BEARER_TOKEN));
        let out = svc
            .dispatch("greet_user", &args(json!({"name": "Alice"})), None)
            .await
            .unwrap();
        assert!(is_error(&out));
        assert!(text_of(&out).starts_with("HTTP 401"));
    }

    #[tokio::test]
    async fn forwarded_token_reaches_guarded_route() {
        let svc = BridgeSvc::for_policy(&AuthPolicy::bearer(DEFAULT_BEARER_TOKEN));
        let auth = HeaderValue::from_static("Bearer MY_SECRET_TOKEN");
        let out = svc
            .dispatch("greet_user", &args(json!({"name": "Alice"})), Some(auth))
            .await
            .unwrap();
        assert!(!is_error(&out));
        assert!(text_of(&out).contains("Hello, Alice!"));

        let wrong = HeaderValue::from_static("Bearer wrong");
        let out = svc
            .dispatch("greet_user", &args(json!({"name": "Alice"})), Some(wrong))
            .await
            .unwrap();
        assert!(text_of(&out).starts_with("HTTP 403"));
    }

    #[tokio::test]
    async fn missing_param_and_unknown_tool_are_bridge_errors() {
        let svc = BridgeSvc::for_policy(&AuthPolicy::Open);
        let err = svc.dispatch("greet_user", &JsonObject::new(), None).await.unwrap_err();
        assert!(matches!(err, BridgeError::MissingParam(ref p) if p == "name"));

        let err = svc.dispatch("nope", &JsonObject::new(), None).await.unwrap_err();
        assert!(matches!(err, BridgeError::UnknownTool(_)));
    }

    #[tokio::test]
    async fn serves_tools_over_a_byte_stream() {
        use rmcp::ServiceExt as _;

        let (server_io, client_io) = tokio::io::duplex(64 * 1024);
        let svc = BridgeSvc::for_policy(&AuthPolicy::bearer(DEFAULT_BEARER_TOKEN));
        tokio::spawn(serve_io(svc, tokio::io::split(server_io)));

        let client = ().serve(tokio::io::split(client_io)).await.unwrap();
        let tools = client.list_all_tools().await.unwrap();
        let names: Vec<String> = tools.iter().map(|t| t.name.to_string()).collect();
        assert_eq!(names, vec!["read_root", "greet_user"]);

        let out = client
            .call_tool(CallToolRequestParam {
                name: "read_root".into(),
                arguments: None,
            })
            .await
            .unwrap();
        assert!(text_of(&out).contains("Welcome to the FastAPI MCP Server!"));

        // No HTTP request behind the call, so there is no token to forward.
        let out = client
            .call_tool(CallToolRequestParam {
                name: "greet_user".into(),
                arguments: Some(args(json!({"name": "Alice"}))),
            })
            .await
            .unwrap();
        assert!(is_error(&out));
        assert!(text_of(&out).starts_with("HTTP 401"), "{}", text_of(&out));

        client.cancel().await.unwrap();
    }

    #[tokio::test]
    async fn open_greeting_over_a_byte_stream() {
        use rmcp::ServiceExt as _;

        let (server_io, client_io) = tokio::io::duplex(64 * 1024);
        tokio::spawn(serve_io(
            BridgeSvc::for_policy(&AuthPolicy::Open),
            tokio::io::split(server_io),
        ));

        let client = ().serve(tokio::io::split(client_io)).await.unwrap();
        let out = client
            .call_tool(CallToolRequestParam {
                name: "greet_user".into(),
                arguments: Some(args(json!({"name": "Alice"}))),
            })
            .await
            .unwrap();
        assert!(!is_error(&out));
        assert_eq!(text_of(&out), r#"{"message":"Hello, Alice!"}"#);

        client.cancel().await.unwrap();
    }

    #[test]
    fn streamable_http_service_builds() {
        let session_mgr = Arc::new(LocalSessionManager::default());
        let _svc = make_streamable_http_service(
            || BridgeSvc::for_policy(&AuthPolicy::Open),
            session_mgr,
        );
    }
}
