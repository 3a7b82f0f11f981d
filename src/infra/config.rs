use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::api::auth::{AuthPolicy, DEFAULT_BEARER_TOKEN};

pub const DEFAULT_MCP_URL: &str = "http://127.0.0.1:8000/mcp";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MAX_ITERATIONS: usize = 25;

pub struct ServerConfig {
    pub mode: String, // "server" or "stdio"
    pub host: String,
    pub port: u16,
    pub require_auth: bool,
    pub auth_token: String,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let mode = std::env::var("MODE").unwrap_or_else(|_| "server".into());
        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into());
        let port = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(8000);
        let require_auth = std::env::var("REQUIRE_AUTH")
            .map(|v| !v.is_empty())
            .unwrap_or(false);
        let auth_token = std::env::var("AUTH_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BEARER_TOKEN.to_string());

        Self {
            mode,
            host,
            port,
            require_auth,
            auth_token,
        }
    }

    pub fn auth_policy(&self) -> AuthPolicy {
        if self.require_auth {
            AuthPolicy::bearer(self.auth_token.clone())
        } else {
            AuthPolicy::Open
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !matches!(self.mode.as_str(), "server" | "stdio") {
            return Err(format!(
                "Invalid MODE: {}. Must be 'server' or 'stdio'",
                self.mode
            ));
        }
        if self.mode == "server" && self.port == 0 {
            return Err("PORT cannot be 0".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum McpTransport {
    /// HTTP POST frames with Server-Sent-Events responses.
    #[default]
    Sse,
    StreamableHttp,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct McpServerConfig {
    pub url: String,
    #[serde(default)]
    pub transport: McpTransport,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// Optional TOML file for the agent command.
#[derive(Debug, Default, Deserialize)]
struct AgentFile {
    model: Option<String>,
    #[serde(default)]
    servers: BTreeMap<String, McpServerConfig>,
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub model: String,
    pub max_iterations: usize,
    pub servers: BTreeMap<String, McpServerConfig>,
}

/// Load `.env` into the process environment. A missing file is not an error.
/// Called once at startup, before logging, so `.env` may set `RUST_LOG`.
pub fn load_dotenv() -> Result<(), dotenvy::Error> {
    match dotenvy::dotenv() {
        Ok(_) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(e),
    }
}

impl AgentConfig {
    /// Process environment, then the optional TOML file on top.
    pub fn load(file: Option<&Path>) -> anyhow::Result<Self> {
        let mut cfg = Self::from_env();
        if let Some(path) = file {
            let raw = std::fs::read_to_string(path)?;
            cfg.apply_toml(&raw)?;
        }
        Ok(cfg)
    }

    pub fn from_env() -> Self {
        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());
        let openai_base_url = std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_OPENAI_BASE_URL.into());
        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());
        let max_iterations = std::env::var("AGENT_MAX_ITERATIONS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_ITERATIONS);

        let url = std::env::var("MCP_SERVER_URL").unwrap_or_else(|_| DEFAULT_MCP_URL.into());
        let mut headers = BTreeMap::new();
        if let Ok(token) = std::env::var("MCP_BEARER_TOKEN") {
            if !token.trim().is_empty() {
                headers.insert("Authorization".to_string(), format!("Bearer {token}"));
            }
        }
        let mut servers = BTreeMap::new();
        servers.insert(
            "local_fastapi".to_string(),
            McpServerConfig {
                url,
                transport: McpTransport::Sse,
                headers,
            },
        );

        Self {
            openai_api_key,
            openai_base_url,
            model,
            max_iterations,
            servers,
        }
    }

    /// Overlay a TOML document. Declared servers replace the env default.
    pub fn apply_toml(&mut self, raw: &str) -> anyhow::Result<()> {
        let file: AgentFile = toml::from_str(raw)?;
        if let Some(model) = file.model {
            self.model = model;
        }
        if !file.servers.is_empty() {
            self.servers = file.servers;
        }
        Ok(())
    }
}
