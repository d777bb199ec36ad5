//! Tools the agent can call.
//!
//! Each tool declares its parameters, validates its own arguments and
//! returns a free-form JSON result. Chained tools (`filter_data`,
//! `export_excel`) take the `data` array produced by an earlier tool.
//!
//! Two failure channels exist on purpose: malformed arguments raise a
//! [`ToolError`], while business failures such as an unreachable URL come
//! back as a `{"success": false, "error": ...}` value the model can read.

mod api_call;
mod calculator;
mod export;
mod filter;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::config::Config;
use crate::values::type_name;

pub use api_call::{ApiCall, ResponseCache};
pub use calculator::{evaluate_expression, Calculator};
pub use export::{build_csv, export_filename, flatten_row, ExportCsv};
pub use filter::FilterData;

pub const API_CALL: &str = "api_call";
pub const FILTER_DATA: &str = "filter_data";
pub const EXPORT_EXCEL: &str = "export_excel";
pub const CALCULATOR: &str = "calculator";

/// Errors raised for calls the tool cannot even attempt.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("{tool} requires a '{parameter}' parameter. {hint}")]
    MissingParameter {
        tool: String,
        parameter: String,
        hint: String,
    },

    #[error("{tool} requires an array for '{parameter}', but received: {found}. Make sure you're passing the 'data' field from a previous tool result.")]
    NotAnArray {
        tool: String,
        parameter: String,
        found: &'static str,
    },

    #[error("{0} requires a non-empty array")]
    EmptyData(String),

    #[error("Invalid '{parameter}' for {tool}: {reason}")]
    InvalidParameter {
        tool: String,
        parameter: String,
        reason: String,
    },
}

/// JSON type of a declared parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterKind {
    String,
    Number,
    Boolean,
    Object,
    Array(Box<ParameterKind>),
}

impl ParameterKind {
    fn json_schema(&self) -> Value {
        match self {
            Self::String => json!({ "type": "string" }),
            Self::Number => json!({ "type": "number" }),
            Self::Boolean => json!({ "type": "boolean" }),
            Self::Object => json!({ "type": "object" }),
            Self::Array(items) => json!({ "type": "array", "items": items.json_schema() }),
        }
    }
}

/// One entry of a tool's parameter schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub kind: ParameterKind,
    pub description: String,
    pub required: bool,
    /// Closed set of accepted values, if any.
    pub allowed_values: Option<Vec<String>>,
}

impl Parameter {
    pub fn new(name: &str, kind: ParameterKind, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            required: false,
            allowed_values: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn one_of(mut self, values: &[&str]) -> Self {
        self.allowed_values = Some(values.iter().map(|v| v.to_string()).collect());
        self
    }
}

/// Declarative description of a tool, sent to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Vec<Parameter>,
}

impl ToolDefinition {
    /// The parameter list as a JSON Schema object.
    pub fn json_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.parameters {
            let mut schema = param.kind.json_schema();
            schema["description"] = Value::String(param.description.clone());
            if let Some(values) = &param.allowed_values {
                schema["enum"] = json!(values);
            }
            properties.insert(param.name.clone(), schema);
        }

        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// Summary used when listing tools in prompts and logs.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters(&self) -> Vec<Parameter>;

    /// Name of the array parameter this tool expects from an earlier tool.
    fn chained_parameter(&self) -> Option<&str> {
        None
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<Value, ToolError>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// The set of tools available to one agent, keyed by name.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::empty()
    }
}

impl ToolRegistry {
    pub fn empty() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// The four built-in tools, configured from `config`.
    pub fn builtin(config: &Config) -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(ApiCall::new(ResponseCache::new(config.api_cache_ttl))));
        registry.register(Arc::new(FilterData));
        registry.register(Arc::new(ExportCsv::new(config.export_dir.clone())));
        registry.register(Arc::new(Calculator));
        registry
    }

    /// Add a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn list_tools(&self) -> Vec<ToolInfo> {
        self.iter()
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
            })
            .collect()
    }

    /// Definitions in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.iter().map(|t| t.definition()).collect()
    }

    pub fn chained_parameter(&self, name: &str) -> Option<&str> {
        self.tools.get(name).and_then(|t| t.chained_parameter())
    }

    pub async fn execute(&self, name: &str, args: Map<String, Value>) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        tracing::info!(tool = name, "Executing tool");
        tool.execute(args).await
    }

    fn iter(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.order.iter().filter_map(|name| self.tools.get(name))
    }
}

/// A required string argument. Empty strings count as missing.
fn required_str<'a>(
    tool: &str,
    args: &'a Map<String, Value>,
    parameter: &str,
    hint: &str,
) -> Result<&'a str, ToolError> {
    match args.get(parameter) {
        None | Some(Value::Null) => Err(missing(tool, parameter, hint)),
        Some(Value::String(s)) if s.trim().is_empty() => Err(missing(tool, parameter, hint)),
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(ToolError::InvalidParameter {
            tool: tool.to_string(),
            parameter: parameter.to_string(),
            reason: format!("expected a string, got {}", type_name(other)),
        }),
    }
}

/// A required array argument, taken by value.
fn required_array(
    tool: &str,
    args: &mut Map<String, Value>,
    parameter: &str,
    hint: &str,
) -> Result<Vec<Value>, ToolError> {
    match args.remove(parameter) {
        None | Some(Value::Null) => Err(missing(tool, parameter, hint)),
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(ToolError::NotAnArray {
            tool: tool.to_string(),
            parameter: parameter.to_string(),
            found: type_name(&other),
        }),
    }
}

fn missing(tool: &str, parameter: &str, hint: &str) -> ToolError {
    ToolError::MissingParameter {
        tool: tool.to_string(),
        parameter: parameter.to_string(),
        hint: hint.to_string(),
    }
}

/// Result value for a business failure.
fn failure(error: impl Into<String>) -> Value {
    json!({ "success": false, "error": error.into() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn registry() -> ToolRegistry {
        let config = Config::new(None, "gpt-4o-mini".to_string(), PathBuf::from("."));
        ToolRegistry::builtin(&config)
    }

    #[test]
    fn builtin_tools_in_registration_order() {
        let names: Vec<String> = registry().definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec![API_CALL, FILTER_DATA, EXPORT_EXCEL, CALCULATOR]);
    }

    #[test]
    fn only_filter_and_export_are_chained() {
        let registry = registry();
        assert_eq!(registry.chained_parameter(FILTER_DATA), Some("data"));
        assert_eq!(registry.chained_parameter(EXPORT_EXCEL), Some("data"));
        assert_eq!(registry.chained_parameter(API_CALL), None);
        assert_eq!(registry.chained_parameter(CALCULATOR), None);
        assert_eq!(registry.chained_parameter("nope"), None);
    }

    #[test]
    fn api_call_schema() {
        let definition = registry().get(API_CALL).unwrap().definition();
        let schema = definition.json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["url"]));
        assert_eq!(schema["properties"]["method"]["enum"], json!(["GET", "POST", "PUT", "DELETE"]));
        assert_eq!(schema["properties"]["headers"]["type"], "object");
    }

    #[test]
    fn array_parameters_declare_items() {
        let definition = registry().get(EXPORT_EXCEL).unwrap().definition();
        let schema = definition.json_schema();
        assert_eq!(schema["properties"]["data"]["items"]["type"], "object");
        assert_eq!(schema["properties"]["columns"]["items"]["type"], "string");
        assert_eq!(schema["required"], json!(["data", "filename"]));
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error() {
        let err = registry().execute("delete_everything", Map::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(ref name) if name == "delete_everything"));
        assert_eq!(err.to_string(), "Unknown tool: delete_everything");
    }

    #[test]
    fn register_replaces_by_name() {
        let mut registry = ToolRegistry::empty();
        assert!(registry.is_empty());
        registry.register(Arc::new(Calculator));
        registry.register(Arc::new(Calculator));
        assert_eq!(registry.list_tools().len(), 1);
    }
}
