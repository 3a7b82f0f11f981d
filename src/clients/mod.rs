pub mod mcp;
pub mod openai;
