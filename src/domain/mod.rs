use serde::{Deserialize, Serialize};

pub const WELCOME_MESSAGE: &str = "Welcome to the FastAPI MCP Server!";

/// Body shared by both endpoints: `{"message": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
}

impl MessageBody {
    pub fn welcome() -> Self {
        Self {
            message: WELCOME_MESSAGE.to_string(),
        }
    }

    pub fn greeting(name: &str) -> Self {
        Self {
            message: format!("Hello, {name}!"),
        }
    }
}

/// Error body in the `{"detail": "..."}` shape clients of the REST surface expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}
