use serde::Serialize;
use serde_json::Value;

use super::react::ROOT_CHAIN;

/// Events streamed out of an agent run, tagged the way the console expects them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event")]
pub enum AgentEvent {
    #[serde(rename = "on_chat_model_stream")]
    ChatModelStream { chunk: String },
    #[serde(rename = "on_tool_start")]
    ToolStart { name: String, input: Value },
    #[serde(rename = "on_tool_end")]
    ToolEnd { name: String, output: String },
    #[serde(rename = "on_chain_end")]
    ChainEnd { name: String, output: String },
}

impl AgentEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            AgentEvent::ChatModelStream { .. } => "on_chat_model_stream",
            AgentEvent::ToolStart { .. } => "on_tool_start",
            AgentEvent::ToolEnd { .. } => "on_tool_end",
            AgentEvent::ChainEnd { .. } => "on_chain_end",
        }
    }
}

/// Turns events into console text and keeps the streamed answer.
#[derive(Debug, Default)]
pub struct EventPrinter {
    answer: String,
}

impl EventPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Console text for `event`, newlines included; `None` when nothing is shown.
    pub fn render(&mut self, event: &AgentEvent) -> Option<String> {
        match event {
            AgentEvent::ChatModelStream { chunk } if chunk.is_empty() => None,
            AgentEvent::ChatModelStream { chunk } => {
                self.answer.push_str(chunk);
                Some(format!("{chunk}|"))
            }
            AgentEvent::ToolStart { name, input } => Some(format!(
                "--\nCalling tool '{name}' with args {}\n",
                compact_json(input)
            )),
            AgentEvent::ToolEnd { name, output } => Some(format!(
                "Tool '{name}' finished.\nTool output: {output}\n--\n"
            )),
            AgentEvent::ChainEnd { name, .. } if name == ROOT_CHAIN => {
                Some("\nAgent finished.\n".to_string())
            }
            AgentEvent::ChainEnd { .. } => None,
        }
    }

    /// Text streamed by the model so far, across all turns.
    pub fn final_answer(&self) -> &str {
        &self.answer
    }
}

fn compact_json(v: &Value) -> String {
    serde_json::to_string(v).unwrap_or_else(|_| v.to_string())
}
