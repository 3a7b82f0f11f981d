//! MCP client side: one session per configured server, tools merged into one box.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use rmcp::model::CallToolRequestParam;
use rmcp::service::{Peer, RunningService};
use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;
use rmcp::transport::StreamableHttpClientTransport;
use rmcp::{RoleClient, ServiceExt};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::agent::{ToolSource, ToolSourceError, ToolSpec};
use crate::infra::config::McpServerConfig;
use crate::infra::http::headers::header_map;
use crate::infra::runtime::limits::make_streaming_client;

type Session = RunningService<RoleClient, ()>;

/// Connected MCP sessions plus the tools they expose.
///
/// Sessions stay open until [`McpToolbox::close`]; callers close the box on
/// every exit path.
pub struct McpToolbox {
    sessions: Mutex<Vec<(String, Session)>>,
    peers: Vec<Peer<RoleClient>>,
    /// tool name -> index into `peers`
    routes: HashMap<String, usize>,
    specs: Vec<ToolSpec>,
}

impl McpToolbox {
    pub async fn connect(
        servers: &BTreeMap<String, McpServerConfig>,
    ) -> Result<Self, ToolSourceError> {
        let mut toolbox = Self {
            sessions: Mutex::new(Vec::new()),
            peers: Vec::new(),
            routes: HashMap::new(),
            specs: Vec::new(),
        };
        for (name, server) in servers {
            match connect_one(name, server).await {
                Ok((session, specs)) => toolbox.add(name, session, specs),
                Err(e) => {
                    toolbox.close().await;
                    return Err(e);
                }
            }
        }
        Ok(toolbox)
    }

    fn add(&mut self, server: &str, session: Session, specs: Vec<ToolSpec>) {
        let idx = self.peers.len();
        self.peers.push(session.peer().clone());
        for spec in specs {
            if self.routes.insert(spec.name.clone(), idx).is_some() {
                tracing::warn!(tool = %spec.name, %server, "tool name already registered; later server wins");
                self.specs.retain(|s| s.name != spec.name);
            }
            self.specs.push(spec);
        }
        tracing::info!(%server, tools = self.specs.len(), "MCP server connected");
        self.sessions.get_mut().push((server.to_string(), session));
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.specs.iter().map(|s| s.name.clone()).collect()
    }

    /// Cancel every session. Safe to call more than once.
    pub async fn close(&self) {
        let sessions = std::mem::take(&mut *self.sessions.lock().await);
        for (server, session) in sessions {
            match session.cancel().await {
                Ok(reason) => tracing::debug!(%server, ?reason, "MCP session closed"),
                Err(e) => tracing::warn!(%server, error = %e, "MCP session did not shut down cleanly"),
            }
        }
    }
}

async fn connect_one(
    name: &str,
    server: &McpServerConfig,
) -> Result<(Session, Vec<ToolSpec>), ToolSourceError> {
    let connect_err = |message: String| ToolSourceError::Connect {
        server: name.to_string(),
        message,
    };
    tracing::debug!(server = name, url = %server.url, transport = ?server.transport, "connecting");

    let headers = header_map(&server.headers).map_err(connect_err)?;
    let http = make_streaming_client(headers).map_err(|e| connect_err(e.to_string()))?;
    let transport = StreamableHttpClientTransport::with_client(
        http,
        StreamableHttpClientTransportConfig::with_uri(server.url.clone()),
    );
    let session = ().serve(transport).await.map_err(|e| connect_err(e.to_string()))?;

    let tools = match session.list_all_tools().await {
        Ok(tools) => tools,
        Err(e) => {
            let _ = session.cancel().await;
            return Err(connect_err(e.to_string()));
        }
    };
    let specs = tools
        .iter()
        .filter_map(|t| serde_json::to_value(t).ok())
        .filter_map(|v| spec_from_wire(&v))
        .collect();
    Ok((session, specs))
}

/// Read a `tools/list` entry in its wire shape.
pub fn spec_from_wire(v: &Value) -> Option<ToolSpec> {
    let name = v.get("name")?.as_str()?.to_string();
    let description = v
        .get("description")
        .and_then(|d| d.as_str())
        .map(String::from);
    let input_schema = v
        .get("inputSchema")
        .cloned()
        .unwrap_or_else(|| serde_json::json!({"type": "object", "properties": {}}));
    Some(ToolSpec {
        name,
        description,
        input_schema,
    })
}

/// Join the text items of a `tools/call` result. Non-text items are kept as JSON.
pub fn result_text(result: &Value) -> String {
    let items = result
        .get("content")
        .and_then(|c| c.as_array())
        .cloned()
        .unwrap_or_default();
    let parts: Vec<String> = items
        .iter()
        .map(|item| match item.get("text").and_then(|t| t.as_str()) {
            Some(text) => text.to_string(),
            None => item.to_string(),
        })
        .collect();
    if parts.is_empty() {
        if let Some(structured) = result.get("structuredContent") {
            return structured.to_string();
        }
    }
    parts.join("\n")
}

#[async_trait]
impl ToolSource for McpToolbox {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolSourceError> {
        Ok(self.specs.clone())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String, ToolSourceError> {
        let idx = *self
            .routes
            .get(name)
            .ok_or_else(|| ToolSourceError::UnknownTool(name.to_string()))?;
        let arguments = match arguments {
            Value::Object(map) => Some(map),
            Value::Null => None,
            other => {
                return Err(ToolSourceError::Tool(format!(
                    "arguments for {name} must be an object, got {other}"
                )))
            }
        };
        let result = self.peers[idx]
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments,
            })
            .await
            .map_err(|e| ToolSourceError::Transport(e.to_string()))?;

        let wire = serde_json::to_value(&result)
            .map_err(|e| ToolSourceError::Transport(e.to_string()))?;
        let text = result_text(&wire);
        if wire.get("isError").and_then(|b| b.as_bool()).unwrap_or(false) {
            return Err(ToolSourceError::Tool(text));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_tool_spec_from_wire_shape() {
        let spec = spec_from_wire(&json!({
            "name": "greet_user",
            "description": "Greets the user by name.",
            "inputSchema": {"type": "object", "required": ["name"]}
        }))
        .unwrap();
        assert_eq!(spec.name, "greet_user");
        assert_eq!(spec.description.as_deref(), Some("Greets the user by name."));
        assert_eq!(spec.input_schema["required"], json!(["name"]));

        let bare = spec_from_wire(&json!({"name": "read_root"})).unwrap();
        assert!(bare.description.is_none());
        assert_eq!(bare.input_schema["type"], "object");

        assert!(spec_from_wire(&json!({"description": "no name"})).is_none());
    }

    #[test]
    fn joins_text_content() {
        let v = json!({"content": [
            {"type": "text", "text": "{\"message\":\"Hello, Alice!\"}"},
            {"type": "text", "text": "second"}
        ]});
        assert_eq!(result_text(&v), "{\"message\":\"Hello, Alice!\"}\nsecond");
    }

    #[test]
    fn falls_back_to_structured_content() {
        let v = json!({"content": [], "structuredContent": {"message": "hi"}});
        assert_eq!(result_text(&v), r#"{"message":"hi"}"#);
    }

    #[tokio::test]
    async fn connect_failure_names_the_server() {
        let mut servers = BTreeMap::new();
        servers.insert(
            "local_fastapi".to_string(),
            McpServerConfig {
                url: "http://127.0.0.1:9/mcp".into(),
                transport: Default::default(),
                headers: BTreeMap::new(),
            },
        );
        let err = McpToolbox::connect(&servers).await.err().unwrap();
        assert!(err.to_string().contains("local_fastapi"), "{err}");
    }
}
