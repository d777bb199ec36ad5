//! Agent module - the tool-calling loop.
//!
//! The agent follows a "tools in a loop" pattern:
//! 1. Seed the history with the system prompt and append the user query
//! 2. Call the LLM with the history and the tool definitions
//! 3. If the LLM requests a tool, run it and append the result
//! 4. Repeat until the LLM answers without a tool call or the iteration
//!    budget is spent

mod agent_loop;
mod events;
mod history;
mod prompt;

pub use agent_loop::{Agent, AgentError, QueryOutcome, DEFAULT_MAX_ITERATIONS, MAX_ITERATIONS_MESSAGE};
pub use events::{AgentUpdate, RunStatus};
pub use history::{find_recent_data, ConversationHistory, RecoveredData};
pub use prompt::build_system_prompt;
