//! Core agent loop implementation.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::{json, Value};
use thiserror::Error;

use crate::llm::{LlmClient, LlmError, ToolCall, Turn};
use crate::tools::{ToolDefinition, ToolError, ToolRegistry, API_CALL, FILTER_DATA};
use crate::values::{to_display_string, truthy};

use super::events::{AgentUpdate, RunStatus};
use super::history::{find_recent_data, ConversationHistory};
use super::prompt::build_system_prompt;

pub const DEFAULT_MAX_ITERATIONS: usize = 10;

pub const MAX_ITERATIONS_MESSAGE: &str =
    "Maximum iterations reached. The task may be too complex or stuck in a loop.";

/// Failure of a single iteration. Folded into the [`QueryOutcome`], never
/// returned from [`Agent::process_query`].
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("Tool {tool} panicked: {message}")]
    ToolPanicked { tool: String, message: String },
}

/// Result of one `process_query` call.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub response: String,
    pub history: Vec<Turn>,
    pub iterations: usize,
    pub status: RunStatus,
}

/// Drives the query -> model -> tool -> result cycle.
///
/// History persists across queries until [`Agent::reset`]. `process_query`
/// takes `&mut self`, so one agent runs one query at a time.
pub struct Agent {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    history: ConversationHistory,
    max_iterations: usize,
}

impl Agent {
    pub fn new(llm: Arc<dyn LlmClient>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            llm,
            tools,
            history: ConversationHistory::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn history(&self) -> &[Turn] {
        self.history.turns()
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// Run `query` to completion, reporting each step through `on_update`.
    pub async fn process_query<F>(&mut self, query: &str, mut on_update: F) -> QueryOutcome
    where
        F: FnMut(AgentUpdate) + Send,
    {
        if self.history.is_empty() {
            self.history.push(Turn::System {
                content: build_system_prompt(&self.tools),
            });
        }
        self.history.push(Turn::User {
            content: query.to_string(),
        });

        let definitions = self.tools.definitions();
        let mut iterations = 0;
        let mut finished = None;

        while iterations < self.max_iterations {
            iterations += 1;
            tracing::debug!("Agent iteration {}", iterations);

            match self.run_iteration(&definitions, &mut on_update).await {
                Ok(Some(answer)) => {
                    finished = Some((answer, RunStatus::Completed));
                    break;
                }
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(error = %e, "Agent error");
                    let message = e.to_string();
                    self.history.push(Turn::Assistant {
                        content: format!("Error: {}", message),
                        tool_call: None,
                    });
                    on_update(AgentUpdate::Error {
                        error: message.clone(),
                    });
                    finished = Some((format!("Error occurred: {}", message), RunStatus::Failed));
                    break;
                }
            }
        }

        let (response, status) = finished
            .unwrap_or_else(|| (MAX_ITERATIONS_MESSAGE.to_string(), RunStatus::MaxIterations));

        QueryOutcome {
            response,
            history: self.history.turns().to_vec(),
            iterations,
            status,
        }
    }

    /// One model call plus at most one tool execution. Returns the final
    /// answer when the model requested no tool.
    async fn run_iteration<F>(
        &mut self,
        definitions: &[ToolDefinition],
        on_update: &mut F,
    ) -> Result<Option<String>, AgentError>
    where
        F: FnMut(AgentUpdate) + Send,
    {
        let response = self
            .llm
            .generate_response(self.history.turns(), definitions)
            .await?;

        self.history.push(Turn::Assistant {
            content: response.text.clone(),
            tool_call: response.tool_call.clone(),
        });
        on_update(AgentUpdate::Assistant {
            content: response.text.clone(),
            tool_call: response.tool_call.clone(),
        });

        let Some(ToolCall { name, mut params }) = response.tool_call else {
            return Ok(Some(response.text));
        };

        if let Some(parameter) = self.tools.chained_parameter(&name) {
            if params.get(parameter).map_or(true, Value::is_null) {
                if let Some(recovered) = find_recent_data(self.history.turns()) {
                    tracing::info!(
                        tool = %name,
                        source = %recovered.tool_name,
                        rows = recovered.data.len(),
                        "Auto-extracted data from previous result"
                    );
                    params.insert(parameter.to_string(), Value::Array(recovered.data));
                }
            }
        }

        on_update(AgentUpdate::ToolCall {
            tool_name: name.clone(),
            params: params.clone(),
        });

        let result = AssertUnwindSafe(self.tools.execute(&name, params))
            .catch_unwind()
            .await
            .map_err(|payload| AgentError::ToolPanicked {
                tool: name.clone(),
                message: panic_message(payload.as_ref()),
            })??;

        self.history.push(Turn::Tool {
            tool_name: name.clone(),
            content: format_tool_result(&name, &result),
        });
        on_update(AgentUpdate::ToolResult {
            tool_name: name,
            result,
        });

        Ok(None)
    }

    /// Human-readable dump of the conversation.
    pub fn conversation_log(&self) -> String {
        self.history
            .turns()
            .iter()
            .enumerate()
            .map(|(idx, turn)| match turn {
                Turn::System { content } => format!("[System] {}", content),
                Turn::User { content } => format!("[User {}] {}", idx + 1, content),
                Turn::Assistant { content, tool_call } => {
                    let mut entry = format!("[Assistant {}] {}", idx + 1, content);
                    if let Some(call) = tool_call {
                        let call = serde_json::to_string_pretty(call).unwrap_or_default();
                        entry.push_str(&format!("\n  Tool Call: {}", call));
                    }
                    entry
                }
                Turn::Tool { tool_name, content } => format!("[Tool: {}] {}", tool_name, content),
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Text of the tool turn shown to the model. Successful fetch and filter
/// results are restated with counts and a hint on how to chain them.
fn format_tool_result(tool_name: &str, result: &Value) -> String {
    let succeeded = result.get("success").and_then(Value::as_bool) == Some(true);
    let data = result.get("data").filter(|d| truthy(d));

    match (tool_name, succeeded, data) {
        (API_CALL, true, Some(data)) => {
            let count = data.as_array().map_or(1, Vec::len);
            pretty(&json!({
                "success": true,
                "data": data,
                "itemCount": count,
                "summary": format!("Successfully fetched {} item(s) from the API.", count),
                "instruction": "To filter this data, call filter_data with: {data: <this_result.data>, condition: \"your_condition\"}",
            }))
        }
        (FILTER_DATA, true, Some(data)) => {
            let filtered = result.get("filteredCount").cloned().unwrap_or(Value::Null);
            let total = result.get("totalCount").cloned().unwrap_or(Value::Null);
            pretty(&json!({
                "success": true,
                "data": data,
                "filteredCount": filtered,
                "totalCount": total,
                "summary": format!(
                    "Filtered {} items from {} total.",
                    to_display_string(&filtered),
                    to_display_string(&total)
                ),
                "instruction": "To export this data, call export_excel with: {data: <this_result.data>, filename: \"output.csv\"}",
            }))
        }
        _ => match result {
            Value::String(text) => text.clone(),
            other => pretty(other),
        },
    }
}
