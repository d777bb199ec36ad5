//! Progress events reported while a query runs.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::llm::ToolCall;

/// Progress reported while a query runs, in the order it happens.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentUpdate {
    /// The model replied.
    Assistant {
        content: String,
        tool_call: Option<ToolCall>,
    },
    /// A tool is about to run with these (possibly repaired) parameters.
    ToolCall {
        tool_name: String,
        params: Map<String, Value>,
    },
    /// A tool finished; `result` is its raw output.
    ToolResult { tool_name: String, result: Value },
    /// The iteration failed and the run is stopping.
    Error { error: String },
}

/// How a query run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The model answered without requesting a tool.
    Completed,
    /// The iteration budget ran out.
    MaxIterations,
    /// An LLM or tool error stopped the run.
    Failed,
}
