//! Streaming chat-completions client for the OpenAI API.

use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::{future, stream, StreamExt, TryStreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agent::{ChatDelta, ChatModel, ClientError, DeltaStream, Message, ToolSpec};
use crate::infra::config::AgentConfig;
use crate::infra::http::headers::{add_standard_headers, bearer};
use crate::infra::runtime::limits::make_http_client;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub struct OpenAiChat {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiChat {
    pub fn new(
        api_key: Option<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, ClientError> {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(ClientError::MissingApiKey)?;
        Ok(Self {
            http: make_http_client(REQUEST_TIMEOUT)?,
            api_key,
            base_url: base_url.into(),
            model: model.into(),
        })
    }

    pub fn from_config(cfg: &AgentConfig) -> Result<Self, ClientError> {
        Self::new(
            cfg.openai_api_key.clone(),
            cfg.openai_base_url.clone(),
            cfg.model.clone(),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn stream(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<DeltaStream, ClientError> {
        let request = ChatRequest {
            model: &self.model,
            messages: messages.iter().map(WireMessage::from).collect(),
            stream: true,
            tools: (!tools.is_empty()).then(|| tools.iter().map(WireTool::from).collect()),
        };

        let url = self.endpoint();
        let (builder, request_id) = add_standard_headers(self.http.post(&url), None);
        tracing::debug!(%url, %request_id, model = %self.model, messages = messages.len(), "chat completion request");
        let response = builder
            .header(reqwest::header::AUTHORIZATION, bearer(&self.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, %request_id, "chat completion rejected");
            return Err(ClientError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let deltas = response
            .bytes_stream()
            .eventsource()
            .take_while(|event| future::ready(!matches!(event, Ok(e) if e.data == "[DONE]")))
            .map(|event| match event {
                Ok(e) => parse_chunk(&e.data),
                Err(e) => Err(ClientError::Stream(e.to_string())),
            })
            .map_ok(|deltas| stream::iter(deltas.into_iter().map(Ok::<ChatDelta, ClientError>)))
            .try_flatten();
        Ok(deltas.boxed())
    }
}

/// Decode one SSE `data:` payload into deltas.
pub fn parse_chunk(data: &str) -> Result<Vec<ChatDelta>, ClientError> {
    let chunk: StreamChunk =
        serde_json::from_str(data).map_err(|e| ClientError::Decode(e.to_string()))?;
    let mut out = Vec::new();
    // Usage-only chunks carry no choices.
    let Some(choice) = chunk.choices.into_iter().next() else {
        return Ok(out);
    };
    for tc in choice.delta.tool_calls.unwrap_or_default() {
        let (name, arguments) = match tc.function {
            Some(f) => (f.name, f.arguments),
            None => (None, None),
        };
        out.push(ChatDelta::ToolCallPart {
            index: tc.index,
            id: tc.id,
            name,
            arguments,
        });
    }
    if let Some(content) = choice.delta.content {
        if !content.is_empty() {
            out.push(ChatDelta::Text(content));
        }
    }
    if let Some(reason) = choice.finish_reason {
        out.push(ChatDelta::Finish(reason));
    }
    Ok(out)
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl From<&Message> for WireMessage {
    fn from(m: &Message) -> Self {
        match m {
            Message::System(s) => WireMessage::plain("system", s),
            Message::User(s) => WireMessage::plain("user", s),
            Message::Assistant {
                content,
                tool_calls,
            } => WireMessage {
                role: "assistant",
                content: (!content.is_empty() || tool_calls.is_empty()).then(|| content.clone()),
                tool_calls: (!tool_calls.is_empty()).then(|| {
                    tool_calls
                        .iter()
                        .map(|tc| WireToolCall {
                            id: tc.id.clone(),
                            r#type: "function",
                            function: WireFunctionCall {
                                name: tc.name.clone(),
                                arguments: tc.arguments.to_string(),
                            },
                        })
                        .collect()
                }),
                tool_call_id: None,
            },
            Message::Tool { call_id, content } => WireMessage {
                role: "tool",
                content: Some(content.clone()),
                tool_calls: None,
                tool_call_id: Some(call_id.clone()),
            },
        }
    }
}

impl WireMessage {
    fn plain(role: &'static str, content: &str) -> Self {
        Self {
            role,
            content: Some(content.to_string()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct WireTool {
    r#type: &'static str,
    function: WireFunction,
}

#[derive(Debug, Serialize)]
struct WireFunction {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    parameters: Value,
}

impl From<&ToolSpec> for WireTool {
    fn from(t: &ToolSpec) -> Self {
        WireTool {
            r#type: "function",
            function: WireFunction {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.input_schema.clone(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct WireToolCall {
    id: String,
    r#type: &'static str,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCall>>,
}

#[derive(Debug, Deserialize)]
struct StreamToolCall {
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<StreamFunction>,
}

#[derive(Debug, Deserialize)]
struct StreamFunction {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}
