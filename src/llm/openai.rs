//! OpenAI chat-completions client using the single `function_call` API.
//!
//! Only one call per assistant message can be expressed in this API, so
//! only the first queued call of an assistant turn is forwarded and at most
//! one call is read back from a reply.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::tools::ToolDefinition;

use super::{LlmClient, LlmError, LlmResponse, ToolCall, Turn};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Client for OpenAI-compatible chat-completion endpoints.
pub struct OpenAiClient {
    api_key: Option<String>,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    functions: Vec<FunctionSchema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Serialize)]
struct FunctionSchema {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    function_call: Option<FunctionCall>,
}

impl OpenAiClient {
    pub fn new(api_key: Option<String>, model: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn send(&self, request: &ChatRequest<'_>) -> Result<Choice, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::MissingApiKey)?;

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let parsed: ChatResponse = serde_json::from_str(&body)?;
        parsed.choices.into_iter().next().ok_or(LlmError::NoChoice)
    }
}

/// Map the internal history onto wire messages.
fn to_wire_messages(history: &[Turn]) -> Vec<WireMessage> {
    history
        .iter()
        .map(|turn| match turn {
            Turn::System { content } => WireMessage {
                role: "system",
                content: Some(content.clone()),
                name: None,
                function_call: None,
            },
            Turn::User { content } => WireMessage {
                role: "user",
                content: Some(content.clone()),
                name: None,
                function_call: None,
            },
            Turn::Assistant { content, tool_call } => WireMessage {
                role: "assistant",
                content: (!content.is_empty()).then(|| content.clone()),
                name: None,
                function_call: tool_call.as_ref().map(|call| FunctionCall {
                    name: call.name.clone(),
                    arguments: Value::Object(call.params.clone()).to_string(),
                }),
            },
            Turn::Tool { tool_name, content } => WireMessage {
                role: "function",
                content: Some(content.clone()),
                name: Some(tool_name.clone()),
                function_call: None,
            },
        })
        .collect()
}

fn to_function_schemas(tools: &[ToolDefinition]) -> Vec<FunctionSchema> {
    tools
        .iter()
        .map(|tool| FunctionSchema {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.json_schema(),
        })
        .collect()
}

/// Read the function call out of a reply. Arguments that are not a JSON
/// object are logged and the call is dropped.
fn parse_function_call(call: FunctionCall) -> Option<ToolCall> {
    let arguments = if call.arguments.trim().is_empty() {
        "{}"
    } else {
        call.arguments.as_str()
    };

    match serde_json::from_str::<Value>(arguments) {
        Ok(Value::Object(params)) => Some(ToolCall {
            name: call.name,
            params,
        }),
        Ok(other) => {
            tracing::warn!(function = %call.name, arguments = %other, "Function arguments are not an object");
            None
        }
        Err(e) => {
            tracing::warn!(function = %call.name, error = %e, "Error parsing function arguments");
            None
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn generate_response(
        &self,
        history: &[Turn],
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse, LlmError> {
        let functions = to_function_schemas(tools);
        let request = ChatRequest {
            model: &self.model,
            messages: to_wire_messages(history),
            function_call: (!functions.is_empty()).then_some("auto"),
            functions,
        };

        tracing::debug!(model = %self.model, messages = request.messages.len(), "Calling chat completion");
        let choice = self.send(&request).await?;

        Ok(LlmResponse {
            text: choice.message.content.unwrap_or_default(),
            tool_call: choice.message.function_call.and_then(parse_function_call),
            finish_reason: choice.finish_reason,
        })
    }

    async fn generate_text(&self, prompt: &str) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: &self.model,
            messages: to_wire_messages(&[Turn::User {
                content: prompt.to_string(),
            }]),
            functions: Vec::new(),
            function_call: None,
        };

        let choice = self.send(&request).await?;
        Ok(choice.message.content.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn history_maps_onto_roles() {
        let mut params = Map::new();
        params.insert("url".to_string(), json!("https://example.com"));
        let history = vec![
            Turn::System { content: "rules".into() },
            Turn::User { content: "fetch".into() },
            Turn::Assistant {
                content: String::new(),
                tool_call: Some(ToolCall { name: "api_call".into(), params }),
            },
            Turn::Tool { tool_name: "api_call".into(), content: "{\"success\":true}".into() },
            Turn::Assistant { content: "done".into(), tool_call: None },
        ];

        let wire = serde_json::to_value(to_wire_messages(&history)).unwrap();
        assert_eq!(
            wire,
            json!([
                {"role": "system", "content": "rules"},
                {"role": "user", "content": "fetch"},
                {
                    "role": "assistant",
                    "content": null,
                    "function_call": {"name": "api_call", "arguments": "{\"url\":\"https://example.com\"}"}
                },
                {"role": "function", "name": "api_call", "content": "{\"success\":true}"},
                {"role": "assistant", "content": "done"}
            ])
        );
    }

    #[test]
    fn malformed_arguments_drop_the_call() {
        let call = FunctionCall { name: "filter_data".into(), arguments: "{not json".into() };
        assert_eq!(parse_function_call(call), None);

        let call = FunctionCall { name: "filter_data".into(), arguments: "[1]".into() };
        assert_eq!(parse_function_call(call), None);
    }

    #[test]
    fn empty_arguments_are_an_empty_object() {
        let call = FunctionCall { name: "calculator".into(), arguments: String::new() };
        assert_eq!(
            parse_function_call(call),
            Some(ToolCall { name: "calculator".into(), params: Map::new() })
        );
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let client = OpenAiClient::new(Some("  ".into()), DEFAULT_MODEL, "http://127.0.0.1:1");
        let err = client.generate_response(&[], &[]).await.unwrap_err();
        assert!(matches!(err, LlmError::MissingApiKey));
        assert_eq!(err.to_string(), "API key not set");
    }
}
