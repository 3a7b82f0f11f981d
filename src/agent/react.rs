use std::sync::Arc;

use async_stream::try_stream;
use futures::{Stream, StreamExt};
use serde_json::{json, Value};

use super::{
    AgentError, AgentEvent, ChatDelta, ChatModel, Message, ToolCall, ToolSource, ToolSpec,
};
use crate::infra::config::DEFAULT_MAX_ITERATIONS;

/// Name carried by the `on_chain_end` event that closes a whole run.
pub const ROOT_CHAIN: &str = "agent";

/// Reason/act loop: ask the model, run the tools it asks for, feed the
/// results back, until the model answers without calling a tool.
pub struct ReactAgent {
    model: Arc<dyn ChatModel>,
    tools: Arc<dyn ToolSource>,
    specs: Vec<ToolSpec>,
    max_iterations: usize,
    system_prompt: Option<String>,
}

impl ReactAgent {
    pub fn new(model: Arc<dyn ChatModel>, tools: Arc<dyn ToolSource>, specs: Vec<ToolSpec>) -> Self {
        Self {
            model,
            tools,
            specs,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            system_prompt: None,
        }
    }

    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n.max(1);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Run `query` and stream what happens. Ends with `ChainEnd` for [`ROOT_CHAIN`].
    pub fn stream_events<'a>(
        &'a self,
        query: &'a str,
    ) -> impl Stream<Item = Result<AgentEvent, AgentError>> + Send + 'a {
        try_stream! {
            let mut messages = Vec::new();
            if let Some(prompt) = &self.system_prompt {
                messages.push(Message::System(prompt.clone()));
            }
            messages.push(Message::User(query.to_string()));

            let mut finished = false;
            for turn in 0..self.max_iterations {
                tracing::debug!(turn, messages = messages.len(), "model turn");
                let mut deltas = self
                    .model
                    .stream(&messages, &self.specs)
                    .await
                    .map_err(AgentError::from)?;

                let mut text = String::new();
                let mut calls = ToolCallAccumulator::default();
                while let Some(delta) = deltas.next().await {
                    match delta.map_err(AgentError::from)? {
                        ChatDelta::Text(chunk) => {
                            text.push_str(&chunk);
                            yield AgentEvent::ChatModelStream { chunk };
                        }
                        ChatDelta::ToolCallPart { index, id, name, arguments } => {
                            calls.push(index, id, name, arguments);
                        }
                        ChatDelta::Finish(reason) => {
                            tracing::debug!(turn, %reason, "model turn finished");
                        }
                    }
                }

                let tool_calls = calls.finish();
                messages.push(Message::Assistant {
                    content: text.clone(),
                    tool_calls: tool_calls.clone(),
                });
                if tool_calls.is_empty() {
                    yield AgentEvent::ChainEnd { name: ROOT_CHAIN.to_string(), output: text };
                    finished = true;
                    break;
                }

                for call in tool_calls {
                    yield AgentEvent::ToolStart {
                        name: call.name.clone(),
                        input: call.arguments.clone(),
                    };
                    let output = match self.tools.call_tool(&call.name, call.arguments.clone()).await {
                        Ok(out) => out,
                        Err(e) => {
                            tracing::warn!(tool = %call.name, error = %e, "tool call failed");
                            format!("Error: {e}")
                        }
                    };
                    yield AgentEvent::ToolEnd { name: call.name.clone(), output: output.clone() };
                    messages.push(Message::Tool { call_id: call.id, content: output });
                }
            }

            if !finished {
                Err::<(), AgentError>(AgentError::IterationLimit(self.max_iterations))?;
            }
        }
    }
}

#[derive(Debug, Default)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
}

/// Assembles streamed tool-call fragments, keyed by their index.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    parts: Vec<PartialCall>,
}

impl ToolCallAccumulator {
    pub fn push(
        &mut self,
        index: usize,
        id: Option<String>,
        name: Option<String>,
        arguments: Option<String>,
    ) {
        if self.parts.len() <= index {
            self.parts.resize_with(index + 1, PartialCall::default);
        }
        let part = &mut self.parts[index];
        if let Some(id) = id {
            part.id = id;
        }
        if let Some(name) = name {
            part.name.push_str(&name);
        }
        if let Some(args) = arguments {
            part.arguments.push_str(&args);
        }
    }

    /// Completed calls in index order. Slots that never got a name are dropped;
    /// empty or unparseable arguments become `{}`.
    pub fn finish(self) -> Vec<ToolCall> {
        self.parts
            .into_iter()
            .enumerate()
            .filter(|(_, p)| !p.name.is_empty())
            .map(|(i, p)| ToolCall {
                id: if p.id.is_empty() { format!("call_{i}") } else { p.id },
                name: p.name,
                arguments: parse_arguments(&p.arguments),
            })
            .collect()
    }
}

fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return json!({});
    }
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!(error = %e, raw, "tool arguments are not valid JSON");
        json!({})
    })
}
