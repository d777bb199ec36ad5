//! HTTP fetch tool with a short-lived GET cache.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde_json::{json, Map, Value};
use tokio::sync::RwLock;

use crate::values::to_display_string;

use super::{required_str, Parameter, ParameterKind, Tool, ToolError, API_CALL};

const UNREACHABLE_HINT: &str = " Possible causes: URL not reachable (e.g. server down, wrong host, or firewall), invalid SSL, or use a working API like https://jsonplaceholder.typicode.com/users or https://fakestoreapi.com/products for testing.";

#[derive(Debug, Clone)]
struct CachedResponse {
    data: Value,
    status: u16,
    status_text: String,
    stored_at: Instant,
}

/// Successful GET responses keyed by URL, valid for a fixed TTL.
#[derive(Debug)]
pub struct ResponseCache {
    entries: RwLock<HashMap<String, CachedResponse>>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    async fn get(&self, url: &str) -> Option<CachedResponse> {
        let entries = self.entries.read().await;
        entries
            .get(url)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .cloned()
    }

    async fn insert(&self, url: &str, data: Value, status: u16, status_text: String) {
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.stored_at.elapsed() < self.ttl);
        entries.insert(
            url.to_string(),
            CachedResponse {
                data,
                status,
                status_text,
                stored_at: Instant::now(),
            },
        );
    }
}

/// Fetch JSON from an HTTP(S) endpoint.
pub struct ApiCall {
    client: reqwest::Client,
    cache: ResponseCache,
}

impl ApiCall {
    pub fn new(cache: ResponseCache) -> Self {
        Self {
            client: reqwest::Client::new(),
            cache,
        }
    }
}

struct ApiCallParams {
    url: String,
    method: Method,
    headers: HeaderMap,
    body: Option<Value>,
}

impl ApiCallParams {
    fn parse(args: &Map<String, Value>) -> Result<Self, ToolError> {
        let url = required_str(API_CALL, args, "url", "Provide the endpoint URL to fetch.")?;

        let method = match args.get("method") {
            None | Some(Value::Null) => Method::GET,
            Some(Value::String(m)) => match m.to_ascii_uppercase().as_str() {
                "GET" => Method::GET,
                "POST" => Method::POST,
                "PUT" => Method::PUT,
                "DELETE" => Method::DELETE,
                other => return Err(invalid("method", format!("unsupported method {}", other))),
            },
            Some(other) => return Err(invalid("method", format!("expected a string, got {}", other))),
        };

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        match args.get("headers") {
            None | Some(Value::Null) => {}
            Some(Value::Object(map)) => {
                for (name, value) in map {
                    let name = HeaderName::from_bytes(name.as_bytes())
                        .map_err(|e| invalid("headers", format!("{}: {}", name, e)))?;
                    let value = HeaderValue::from_str(&to_display_string(value))
                        .map_err(|e| invalid("headers", format!("{}: {}", name, e)))?;
                    headers.insert(name, value);
                }
            }
            Some(_) => return Err(invalid("headers", "expected an object".to_string())),
        }

        let body = args.get("body").filter(|b| !b.is_null()).cloned();

        Ok(Self {
            url: url.to_string(),
            method,
            headers,
            body,
        })
    }
}

fn invalid(parameter: &str, reason: String) -> ToolError {
    ToolError::InvalidParameter {
        tool: API_CALL.to_string(),
        parameter: parameter.to_string(),
        reason,
    }
}

fn fetch_failure(url: &str, error: String) -> Value {
    json!({ "success": false, "error": error, "url": url })
}

#[async_trait]
impl Tool for ApiCall {
    fn name(&self) -> &str {
        API_CALL
    }

    fn description(&self) -> &str {
        "Fetch data from any HTTP/HTTPS endpoint. Works with any URL (http:// or https://). Returns the JSON response."
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![
            Parameter::new(
                "url",
                ParameterKind::String,
                "Any HTTP/HTTPS API endpoint URL (e.g., 'https://api.example.com/data', 'http://localhost:3000/api', 'https://jsonplaceholder.typicode.com/users')",
            )
            .required(),
            Parameter::new(
                "method",
                ParameterKind::String,
                "HTTP method (GET, POST, PUT, DELETE). Default: GET",
            )
            .one_of(&["GET", "POST", "PUT", "DELETE"]),
            Parameter::new(
                "headers",
                ParameterKind::Object,
                "Optional HTTP headers as key-value pairs (e.g., {'Authorization': 'Bearer token', 'X-API-Key': 'key'})",
            ),
            Parameter::new(
                "body",
                ParameterKind::Object,
                "Optional request body for POST/PUT requests (will be JSON stringified)",
            ),
        ]
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<Value, ToolError> {
        let params = ApiCallParams::parse(&args)?;
        let url = params.url.as_str();

        let parsed = match url::Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => parsed,
            Ok(parsed) => {
                return Ok(fetch_failure(
                    url,
                    format!("Unsupported URL scheme '{}'; only http and https are allowed.", parsed.scheme()),
                ))
            }
            Err(e) => return Ok(fetch_failure(url, format!("Invalid URL: {}", e))),
        };

        let is_get = params.method == Method::GET;
        if is_get {
            if let Some(cached) = self.cache.get(url).await {
                tracing::debug!(url, "Using cached response");
                return Ok(json!({
                    "success": true,
                    "data": cached.data,
                    "status": cached.status,
                    "statusText": cached.status_text,
                    "fromCache": true,
                }));
            }
        }

        let mut request = self
            .client
            .request(params.method.clone(), parsed)
            .headers(params.headers);
        if let Some(body) = &params.body {
            if params.method == Method::POST || params.method == Method::PUT {
                request = request.json(body);
            }
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(url, error = %e, "Request failed");
                return Ok(fetch_failure(
                    url,
                    format!("Failed to fetch: {}.{}", e, UNREACHABLE_HINT),
                ));
            }
        };

        let status = response.status();
        let status_text = status.canonical_reason().unwrap_or("").to_string();
        if !status.is_success() {
            return Ok(fetch_failure(
                url,
                format!("API call failed: {} {}", status.as_u16(), status_text),
            ));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => return Ok(fetch_failure(url, format!("Failed to read response body: {}", e))),
        };

        let data: Value = match serde_json::from_str(&text) {
            Ok(data) => data,
            Err(e) if content_type.contains("application/json") => {
                return Ok(fetch_failure(url, format!("Invalid JSON in response: {}", e)))
            }
            Err(_) => {
                let preview: String = text.chars().take(100).collect();
                return Ok(fetch_failure(
                    url,
                    format!(
                        "API returned non-JSON response. Content-Type: {}. Response preview: {}...",
                        content_type, preview
                    ),
                ));
            }
        };

        if is_get {
            self.cache
                .insert(url, data.clone(), status.as_u16(), status_text.clone())
                .await;
        }

        Ok(json!({
            "success": true,
            "data": data,
            "status": status.as_u16(),
            "statusText": status_text,
        }))
    }
}
