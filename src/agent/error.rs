use thiserror::Error;

/// Failures of the chat-model client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(
        "The api_key client option must be set either by passing api_key to the client \
         or by setting the OPENAI_API_KEY environment variable"
    )]
    MissingApiKey,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("model API request failed with status {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("stream error: {0}")]
    Stream(String),
    #[error("failed to decode model chunk: {0}")]
    Decode(String),
}

/// Failures of a tool provider.
#[derive(Debug, Error)]
pub enum ToolSourceError {
    #[error("failed to connect to MCP server '{server}': {message}")]
    Connect { server: String, message: String },
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("{0}")]
    Tool(String),
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Model(#[from] ClientError),
    #[error(transparent)]
    Tools(#[from] ToolSourceError),
    #[error("agent stopped after {0} model turns without a final answer")]
    IterationLimit(usize),
}

impl AgentError {
    pub fn is_missing_api_key(&self) -> bool {
        matches!(self, AgentError::Model(ClientError::MissingApiKey))
    }
}

/// Whether any error in the chain is the missing-API-key case.
pub fn is_missing_api_key(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(cause.downcast_ref::<ClientError>(), Some(ClientError::MissingApiKey))
            || cause
                .downcast_ref::<AgentError>()
                .is_some_and(AgentError::is_missing_api_key)
    })
}
