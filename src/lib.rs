//! # data_agent
//!
//! A small tool-calling agent that fetches JSON from HTTP APIs, filters
//! it and exports it to CSV, driven by an OpenAI chat model.
//!
//! This library provides:
//! - A bounded agent loop that sequences model calls and tool executions
//! - Four built-in tools: `api_call`, `filter_data`, `export_excel`, `calculator`
//! - A restricted condition language for filtering rows without `eval`
//! - An OpenAI function-calling client
//!
//! ## Architecture
//!
//! The agent follows the "tools in a loop" pattern:
//! 1. Receive a query
//! 2. Build context with system prompt and available tools
//! 3. Call LLM, parse response, execute the requested tool
//! 4. Feed the result back to the LLM, repeat until it answers
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use data_agent::{agent::Agent, config::Config, llm::OpenAiClient, tools::ToolRegistry};
//!
//! let config = Config::from_env()?;
//! let llm = Arc::new(OpenAiClient::new(config.api_key.clone(), &config.model, &config.api_base_url));
//! let mut agent = Agent::new(llm, Arc::new(ToolRegistry::builtin(&config)));
//! let outcome = agent.process_query("Fetch users and export those with id > 5", |_| {}).await;
//! ```

pub mod agent;
pub mod condition;
pub mod config;
pub mod llm;
pub mod settings;
pub mod tools;
pub mod values;

pub use config::Config;
