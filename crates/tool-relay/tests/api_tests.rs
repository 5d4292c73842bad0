//! Integration tests for the relay API against mocked model and tool servers.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tool_relay::{
    api::{create_router, AppState},
    ConfigProfileSource, ToolFailurePolicy, ToolInvoker,
};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GENERIC_MESSAGE: &str = "An unexpected error occurred";

fn create_app(model: &MockServer, api_key: Option<&str>, policy: ToolFailurePolicy) -> Router {
    let profiles = Arc::new(ConfigProfileSource::new(
        api_key.map(|k| SecretString::new(k.to_string())),
        None,
    ));
    let invoker = ToolInvoker::new(reqwest::Client::new(), Duration::from_secs(5)).with_policy(policy);
    let state = AppState::new(profiles, model.uri(), Duration::from_secs(5), invoker).unwrap();
    create_router(state)
}

fn openapi_doc(server_url: &str, paths: Value) -> String {
    json!({
        "openapi": "3.0.0",
        "info": { "title": "Tools", "description": "Test tools", "version": "1.0" },
        "servers": [{ "url": server_url }],
        "paths": paths
    })
    .to_string()
}

fn weather_doc(server_url: &str) -> String {
    openapi_doc(
        server_url,
        json!({
            "/weather": {
                "get": {
                    "operationId": "getWeather",
                    "description": "Current weather",
                    "parameters": [
                        { "name": "city", "in": "query", "required": true, "schema": { "type": "string" } }
                    ]
                }
            },
            "/time": {
                "get": { "operationId": "getTime", "summary": "Current time" }
            }
        }),
    )
}

fn completion(message: Value) -> Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "created": 1700000000,
        "model": "gpt-test",
        "choices": [{ "index": 0, "message": message, "finish_reason": "stop" }]
    })
}

fn tool_call(id: &str, name: &str, arguments: &str) -> Value {
    json!({ "id": id, "type": "function", "function": { "name": name, "arguments": arguments } })
}

fn sse(tokens: &[&str]) -> String {
    let mut body = String::new();
    for token in tokens {
        body.push_str(&format!(
            "data: {}\n\n",
            json!({ "choices": [{ "index": 0, "delta": { "content": token }, "finish_reason": null }] })
        ));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

async fn mount_first_round(model: &MockServer, message: Value) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({ "stream": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(message)))
        .expect(1)
        .mount(model)
        .await;
}

async fn mount_second_round(model: &MockServer, tokens: &[&str], expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({ "stream": true })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(sse(tokens)),
        )
        .expect(expected_calls)
        .mount(model)
        .await;
}

fn chat_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat/tools")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn chat_body(schemas: Vec<String>, custom_headers: &str, in_body: bool) -> Value {
    json!({
        "chatSettings": { "model": "gpt-test", "temperature": 0.5 },
        "messages": [
            { "role": "system", "content": "You are helpful." },
            { "role": "user", "content": "What's the weather in Paris?" }
        ],
        "toolSchemas": schemas,
        "customHeaders": custom_headers,
        "isRequestInBody": in_body
    })
}

async fn read_body(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

/// Messages sent with the streaming (second) model request.
async fn second_round_messages(model: &MockServer) -> Vec<Value> {
    let requests = model.received_requests().await.unwrap();
    let streamed = requests
        .iter()
        .map(|r| serde_json::from_slice::<Value>(&r.body).unwrap())
        .find(|body| body["stream"] == true)
        .expect("no streaming request was made");
    streamed["messages"].as_array().unwrap().clone()
}

#[tokio::test]
async fn test_health_endpoint() {
    let model = MockServer::start().await;
    let app = create_app(&model, Some("sk-test"), ToolFailurePolicy::Abort);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json: Value = serde_json::from_slice(&read_body(response).await).unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_direct_answer_skips_tools_and_streams() {
    let model = MockServer::start().await;
    let tools = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&tools)
        .await;

    mount_first_round(&model, json!({ "role": "assistant", "content": "No tools needed." })).await;
    mount_second_round(&model, &["It is ", "sunny."], 1).await;

    let app = create_app(&model, Some("sk-test"), ToolFailurePolicy::Abort);
    let response = app
        .oneshot(chat_request(chat_body(vec![weather_doc(&tools.uri())], "", false)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        "text/plain; charset=utf-8"
    );
    assert_eq!(read_body(response).await, b"It is sunny.");

    let messages = second_round_messages(&model).await;
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[2]["role"], "assistant");
    assert_eq!(messages[2]["content"], "No tools needed.");
    assert!(messages[2].get("tool_calls").is_none());
}

#[tokio::test]
async fn test_first_round_offers_registered_functions() {
    let model = MockServer::start().await;
    let tools = MockServer::start().await;

    mount_first_round(&model, json!({ "role": "assistant", "content": "ok" })).await;
    mount_second_round(&model, &["done"], 1).await;

    let app = create_app(&model, Some("sk-test"), ToolFailurePolicy::Abort);
    let response = app
        .oneshot(chat_request(chat_body(vec![weather_doc(&tools.uri())], "", false)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let requests = model.received_requests().await.unwrap();
    let first: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(first["model"], "gpt-test");
    let names: Vec<_> = first["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["function"]["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["getWeather", "getTime"]);
    assert_eq!(
        first["tools"][0]["function"]["parameters"]["required"],
        json!(["city"])
    );
}

#[tokio::test]
async fn test_query_mode_tool_calls_in_order() {
    let model = MockServer::start().await;
    let tools = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/weather"))
        .and(query_param("city", "Paris"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "temp": 21 })))
        .expect(1)
        .mount(&tools)
        .await;
    Mock::given(method("GET"))
        .and(path("/time"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "time": "12:00" })))
        .expect(1)
        .mount(&tools)
        .await;

    mount_first_round(
        &model,
        json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [
                tool_call("call_1", "getWeather", r#"{"city":"Paris"}"#),
                tool_call("call_2", "getTime", "{}")
            ]
        }),
    )
    .await;
    mount_second_round(&model, &["21 degrees at noon."], 1).await;

    let app = create_app(&model, Some("sk-test"), ToolFailurePolicy::Abort);
    let response = app
        .oneshot(chat_request(chat_body(
            vec![weather_doc(&tools.uri())],
            r#"{"X-Api-Key":"secret"}"#,
            false,
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_body(response).await, b"21 degrees at noon.");

    let messages = second_round_messages(&model).await;
    assert_eq!(messages.len(), 5);
    assert_eq!(messages[2]["tool_calls"].as_array().unwrap().len(), 2);
    assert_eq!(messages[3]["role"], "tool");
    assert_eq!(messages[3]["tool_call_id"], "call_1");
    assert_eq!(messages[3]["name"], "getWeather");
    assert_eq!(messages[3]["content"], r#"{"temp":21}"#);
    assert_eq!(messages[4]["tool_call_id"], "call_2");
    assert_eq!(messages[4]["content"], r#"{"time":"12:00"}"#);

    // Query mode sends no custom headers.
    let tool_requests = tools.received_requests().await.unwrap();
    assert!(tool_requests.iter().all(|r| !r
        .headers
        .iter()
        .any(|(name, _)| name.as_str().eq_ignore_ascii_case("x-api-key"))));
}

#[tokio::test]
async fn test_body_mode_posts_json_with_custom_headers() {
    let model = MockServer::start().await;
    let tools = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/weather"))
        .and(header("content-type", "application/json"))
        .and(header("x-api-key", "secret"))
        .and(body_partial_json(json!({ "city": "Paris", "days": 2 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "temp": 19 })))
        .expect(1)
        .mount(&tools)
        .await;

    mount_first_round(
        &model,
        json!({
            "role": "assistant",
            "tool_calls": [tool_call("call_1", "getWeather", r#"{"city":"Paris","days":2}"#)]
        }),
    )
    .await;
    mount_second_round(&model, &["19 degrees."], 1).await;

    let app = create_app(&model, Some("sk-test"), ToolFailurePolicy::Abort);
    let response = app
        .oneshot(chat_request(chat_body(
            vec![weather_doc(&tools.uri())],
            r#"{"X-Api-Key":"secret"}"#,
            true,
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_body(response).await, b"19 degrees.");
}

#[tokio::test]
async fn test_shared_function_name_uses_later_document() {
    let model = MockServer::start().await;
    let first_tools = MockServer::start().await;
    let second_tools = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "from": "first" })))
        .expect(0)
        .mount(&first_tools)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "from": "second" })))
        .expect(1)
        .mount(&second_tools)
        .await;

    let search = |url: &str| {
        openapi_doc(url, json!({ "/search": { "get": { "operationId": "search" } } }))
    };

    mount_first_round(
        &model,
        json!({ "role": "assistant", "tool_calls": [tool_call("call_1", "search", "{}")] }),
    )
    .await;
    mount_second_round(&model, &["found"], 1).await;

    let app = create_app(&model, Some("sk-test"), ToolFailurePolicy::Abort);
    let response = app
        .oneshot(chat_request(chat_body(
            vec![search(&first_tools.uri()), search(&second_tools.uri())],
            "",
            false,
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let messages = second_round_messages(&model).await;
    assert_eq!(messages[3]["content"], r#"{"from":"second"}"#);
}

#[tokio::test]
async fn test_unknown_function_aborts_without_streaming() {
    let model = MockServer::start().await;
    let tools = MockServer::start().await;

    mount_first_round(
        &model,
        json!({ "role": "assistant", "tool_calls": [tool_call("call_1", "deleteEverything", "{}")] }),
    )
    .await;
    mount_second_round(&model, &["never"], 0).await;

    let app = create_app(&model, Some("sk-test"), ToolFailurePolicy::Report);
    let response = app
        .oneshot(chat_request(chat_body(vec![weather_doc(&tools.uri())], "", false)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json: Value = serde_json::from_slice(&read_body(response).await).unwrap();
    assert_eq!(json, json!({ "message": GENERIC_MESSAGE }));
}

#[tokio::test]
async fn test_malformed_arguments_abort_before_tool_calls() {
    let model = MockServer::start().await;
    let tools = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&tools)
        .await;

    mount_first_round(
        &model,
        json!({
            "role": "assistant",
            "tool_calls": [
                tool_call("call_1", "getWeather", "{\"city\": "),
                tool_call("call_2", "getTime", "{}")
            ]
        }),
    )
    .await;
    mount_second_round(&model, &["never"], 0).await;

    let app = create_app(&model, Some("sk-test"), ToolFailurePolicy::Abort);
    let response = app
        .oneshot(chat_request(chat_body(vec![weather_doc(&tools.uri())], "", false)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_tool_endpoint_failure_aborts_by_default() {
    let model = MockServer::start().await;
    let tools = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&tools)
        .await;

    mount_first_round(
        &model,
        json!({ "role": "assistant", "tool_calls": [tool_call("call_1", "getTime", "{}")] }),
    )
    .await;
    mount_second_round(&model, &["never"], 0).await;

    let app = create_app(&model, Some("sk-test"), ToolFailurePolicy::Abort);
    let response = app
        .oneshot(chat_request(chat_body(vec![weather_doc(&tools.uri())], "", false)))
        .await
        .unwrap();

    // The tool's own status is not propagated.
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_tool_endpoint_failure_reported_to_model() {
    let model = MockServer::start().await;
    let tools = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&tools)
        .await;

    mount_first_round(
        &model,
        json!({ "role": "assistant", "tool_calls": [tool_call("call_1", "getTime", "{}")] }),
    )
    .await;
    mount_second_round(&model, &["The clock service is down."], 1).await;

    let app = create_app(&model, Some("sk-test"), ToolFailurePolicy::Report);
    let response = app
        .oneshot(chat_request(chat_body(vec![weather_doc(&tools.uri())], "", false)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_body(response).await, b"The clock service is down.");

    let messages = second_round_messages(&model).await;
    let content: Value = serde_json::from_str(messages[3]["content"].as_str().unwrap()).unwrap();
    assert!(content["error"].as_str().unwrap().contains("503"));
}

#[tokio::test]
async fn test_missing_api_key_fails_before_model_call() {
    let model = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&model)
        .await;

    let app = create_app(&model, None, ToolFailurePolicy::Abort);
    let response = app
        .oneshot(chat_request(chat_body(vec![], "", false)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json: Value = serde_json::from_slice(&read_body(response).await).unwrap();
    assert_eq!(json["message"], GENERIC_MESSAGE);
}

#[tokio::test]
async fn test_provider_error_is_passed_through() {
    let model = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "message": "Incorrect API key provided", "type": "invalid_request_error" }
        })))
        .mount(&model)
        .await;

    let app = create_app(&model, Some("sk-bad"), ToolFailurePolicy::Abort);
    let response = app
        .oneshot(chat_request(chat_body(vec![], "", false)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json: Value = serde_json::from_slice(&read_body(response).await).unwrap();
    assert_eq!(json["message"], "Incorrect API key provided");
}

#[tokio::test]
async fn test_invalid_schema_fails_before_model_call() {
    let model = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&model)
        .await;

    let app = create_app(&model, Some("sk-test"), ToolFailurePolicy::Abort);
    let response = app
        .oneshot(chat_request(chat_body(vec!["{\"info\": {}}".to_string()], "", false)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_malformed_custom_headers_rejected() {
    let model = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&model)
        .await;

    let app = create_app(&model, Some("sk-test"), ToolFailurePolicy::Abort);
    let response = app
        .oneshot(chat_request(chat_body(vec![], "{not json", true)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_malformed_request_body() {
    let model = MockServer::start().await;
    let app = create_app(&model, Some("sk-test"), ToolFailurePolicy::Abort);

    let response = app
        .oneshot(chat_request(json!({ "messages": [] })))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
    let json: Value = serde_json::from_slice(&read_body(response).await).unwrap();
    assert_eq!(json["message"], GENERIC_MESSAGE);
}
