use std::path::PathBuf;

use data_agent::config::Config;
use data_agent::llm::{LlmClient, LlmError, OpenAiClient, ToolCall, Turn};
use data_agent::tools::ToolRegistry;
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn text_body(text: &str) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": text },
            "finish_reason": "stop"
        }]
    })
}

fn function_body(name: &str, arguments: &str) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": null,
                "function_call": { "name": name, "arguments": arguments }
            },
            "finish_reason": "function_call"
        }]
    })
}

fn client(server: &MockServer) -> OpenAiClient {
    OpenAiClient::new(
        Some("test-key".to_string()),
        "gpt-4o-mini",
        format!("{}/v1", server.uri()),
    )
}

fn user(text: &str) -> Turn {
    Turn::User {
        content: text.to_string(),
    }
}

async fn last_request_body(server: &MockServer) -> Value {
    let requests = server.received_requests().await.unwrap();
    serde_json::from_slice(&requests.last().unwrap().body).unwrap()
}

#[tokio::test]
async fn text_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_body("Hello!")))
        .expect(1)
        .mount(&server)
        .await;

    let response = client(&server)
        .generate_response(&[user("hi")], &[])
        .await
        .unwrap();

    assert_eq!(response.text, "Hello!");
    assert_eq!(response.tool_call, None);
    assert_eq!(response.finish_reason.as_deref(), Some("stop"));
}

#[tokio::test]
async fn function_call_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(function_body(
            "filter_data",
            r#"{"condition": "id > 5"}"#,
        )))
        .mount(&server)
        .await;

    let response = client(&server)
        .generate_response(&[user("filter")], &[])
        .await
        .unwrap();

    assert_eq!(response.text, "");
    let ToolCall { name, params } = response.tool_call.unwrap();
    assert_eq!(name, "filter_data");
    assert_eq!(params["condition"], "id > 5");
}

#[tokio::test]
async fn request_carries_functions_in_auto_mode() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_body("ok")))
        .mount(&server)
        .await;

    let config = Config::new(None, "gpt-4o-mini".to_string(), PathBuf::from("."));
    let tools = ToolRegistry::builtin(&config).definitions();
    client(&server)
        .generate_response(&[user("hi")], &tools)
        .await
        .unwrap();

    let body = last_request_body(&server).await;
    assert_eq!(body["model"], "gpt-4o-mini");
    assert_eq!(body["function_call"], "auto");
    assert_eq!(body["messages"], json!([{ "role": "user", "content": "hi" }]));

    let functions = body["functions"].as_array().unwrap();
    let names: Vec<&str> = functions.iter().map(|f| f["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["api_call", "filter_data", "export_excel", "calculator"]);
    assert_eq!(functions[1]["parameters"]["required"], json!(["data", "condition"]));
}

#[tokio::test]
async fn plain_text_generation_sends_no_functions() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_body("a poem")))
        .mount(&server)
        .await;

    let text = client(&server).generate_text("write a poem").await.unwrap();

    assert_eq!(text, "a poem");
    let body = last_request_body(&server).await;
    assert!(body.get("functions").is_none());
    assert!(body.get("function_call").is_none());
}

#[tokio::test]
async fn error_status_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let err = client(&server)
        .generate_response(&[user("hi")], &[])
        .await
        .unwrap_err();

    assert!(matches!(err, LlmError::Api { status: 500, ref body } if body == "upstream down"));
    assert_eq!(err.to_string(), "OpenAI API error: 500 - upstream down");
}

#[tokio::test]
async fn empty_choices_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let err = client(&server)
        .generate_response(&[user("hi")], &[])
        .await
        .unwrap_err();

    assert!(matches!(err, LlmError::NoChoice));
}

#[tokio::test]
async fn missing_key_never_reaches_the_server() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_body("unused")))
        .expect(0)
        .mount(&server)
        .await;

    let client = OpenAiClient::new(None, "gpt-4o-mini", server.uri());
    let err = client.generate_response(&[user("hi")], &[]).await.unwrap_err();

    assert!(matches!(err, LlmError::MissingApiKey));
}
