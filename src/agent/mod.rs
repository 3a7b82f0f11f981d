//! Tool-calling agent: contracts for the chat model and the tool provider,
//! the reason/act loop and the streamed events it produces.

pub mod error;
pub mod events;
pub mod react;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;
use serde_json::Value;

pub use error::{AgentError, ClientError, ToolSourceError};
pub use events::{AgentEvent, EventPrinter};
pub use react::{ReactAgent, ROOT_CHAIN};

/// A tool as advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Value,
}

/// A complete tool call requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    System(String),
    User(String),
    Assistant {
        content: String,
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        call_id: String,
        content: String,
    },
}

/// One increment of a streamed model turn.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatDelta {
    Text(String),
    /// Fragment of the tool call at `index`; fields arrive piecemeal.
    ToolCallPart {
        index: usize,
        id: Option<String>,
        name: Option<String>,
        arguments: Option<String>,
    },
    Finish(String),
}

pub type DeltaStream = BoxStream<'static, Result<ChatDelta, ClientError>>;

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn stream(&self, messages: &[Message], tools: &[ToolSpec])
        -> Result<DeltaStream, ClientError>;
}

#[async_trait]
pub trait ToolSource: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolSourceError>;
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String, ToolSourceError>;
}
