//! LLM client abstraction.
//!
//! The agent talks to the model through [`LlmClient`], passing the whole
//! conversation and the tool definitions on every call. A reply carries
//! text and at most one tool call.

mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::tools::ToolDefinition;

pub use openai::{OpenAiClient, DEFAULT_BASE_URL, DEFAULT_MODEL};

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

/// One entry of the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Turn {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_call: Option<ToolCall>,
    },
    Tool {
        tool_name: String,
        content: String,
    },
}

/// Parsed model reply.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmResponse {
    pub text: String,
    pub tool_call: Option<ToolCall>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API key not set")]
    MissingApiKey,

    #[error("Request to LLM failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("OpenAI API error: {status} - {body}")]
    Api { status: u16, body: String },

    #[error("No choice in response")]
    NoChoice,

    #[error("Invalid LLM response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Ask the model for the next step given the full history.
    async fn generate_response(
        &self,
        history: &[Turn],
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse, LlmError>;

    /// Single-prompt completion without tools.
    async fn generate_text(&self, prompt: &str) -> Result<String, LlmError>;
}
