use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use docinject::{
    AgentContext, InMemoryHistoryStore, MemorySink, PipelineOptions, Resolver, StaticSource,
    TelemetryRecorder,
};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::{core::state::AppState, create_app};

fn source() -> StaticSource {
    StaticSource::new()
        .with_library("fastapi", &["/fastapi/fastapi", "/tiangolo/fastapi-users"])
        .with_document("/fastapi/fastapi", "FastAPI routes are declared with decorators.")
        .with_library("ghost", &["/ghost/ghost"])
}

fn server(telemetry: TelemetryRecorder) -> TestServer {
    let context = AgentContext::from_parts(
        Arc::new(source()),
        Arc::new(InMemoryHistoryStore::new()),
        Resolver::new(),
        telemetry,
        PipelineOptions::default(),
    );
    TestServer::new(create_app(AppState::new(context))).unwrap()
}

fn server_with_sink() -> (TestServer, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new("api-tests"));
    (server(TelemetryRecorder::new(sink.clone())), sink)
}

#[tokio::test]
async fn test_health() {
    let server = server(TelemetryRecorder::disabled());
    let response = server.get("/health").await;
    response.assert_status_ok();
    response.assert_text("OK");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let server = server(TelemetryRecorder::disabled());
    let response = server
        .get("/health")
        .add_header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_static("req-42"),
        )
        .await;
    assert_eq!(response.header("x-request-id"), "req-42");

    let minted = server.get("/health").await;
    assert!(!minted.header("x-request-id").is_empty());
}

#[tokio::test]
async fn test_docs_success() {
    let (server, sink) = server_with_sink();
    let response = server
        .post("/v1/docs")
        .json(&json!({"library_name": "fastapi", "topic": "routing"}))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["library_id"], json!("/fastapi/fastapi"));
    assert_eq!(body["resolution_method"], json!("exact_fallback"));
    assert!(body["text"].as_str().unwrap().contains("Topic: routing"));

    let session = sink.events().await.pop().unwrap();
    assert!(session.tags.contains("user:zed_user"));
    assert_eq!(session.trace_id, body["run_id"].as_str().unwrap());
}

#[tokio::test]
async fn test_docs_not_found_is_a_regular_response() {
    let server = server(TelemetryRecorder::disabled());

    let missing = server
        .post("/v1/docs")
        .json(&json!({"library_name": "nope"}))
        .await;
    missing.assert_status_ok();
    let body: Value = missing.json();
    assert_eq!(body["success"], json!(false));
    assert!(body["text"].as_str().unwrap().contains("Library 'nope' not found"));

    let empty = server
        .post("/v1/docs")
        .json(&json!({"library_name": "ghost"}))
        .await;
    let body: Value = empty.json();
    assert_eq!(body["library_id"], json!("/ghost/ghost"));
    assert!(body["text"].as_str().unwrap().contains("No documentation found"));
}

#[tokio::test]
async fn test_docs_rejects_blank_name() {
    let server = server(TelemetryRecorder::disabled());
    let response = server
        .post("/v1/docs")
        .json(&json!({"library_name": "  "}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["type"], json!("invalid_request_error"));
    assert_eq!(body["error"]["param"], json!("library_name"));
}

#[tokio::test]
async fn test_memory_search_after_retrieval() {
    let server = server(TelemetryRecorder::disabled());

    let before: Value = server
        .post("/v1/memory/search")
        .json(&json!({"query": "fastapi", "user_id": "alice"}))
        .await
        .json();
    assert_eq!(before["has_context"], json!(false));

    server
        .post("/v1/docs")
        .json(&json!({"library_name": "fastapi", "user_id": "alice"}))
        .await
        .assert_status_ok();

    let after: Value = server
        .post("/v1/memory/search")
        .json(&json!({"query": "fastapi", "user_id": "alice"}))
        .await
        .json();
    assert_eq!(after["found"], json!(1));

    let history: Value = server
        .get("/v1/memory/libraries/fastapi")
        .add_query_param("user_id", "alice")
        .await
        .json();
    assert_eq!(history["episodes"][0]["library_id"], json!("/fastapi/fastapi"));
}

#[tokio::test]
async fn test_analytics_requires_telemetry() {
    let disabled = server(TelemetryRecorder::disabled());
    let response = disabled.get("/v1/analytics").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    assert_eq!(body["error"]["type"], json!("service_unavailable"));
    assert!(body["error"]["message"].as_str().unwrap().contains("opik"));

    let (enabled, _sink) = server_with_sink();
    let stats: Value = enabled.get("/v1/analytics").await.json();
    assert_eq!(stats["project_name"], json!("api-tests"));
    assert_eq!(stats["status"], json!("active"));
}

#[tokio::test]
async fn test_feedback() {
    let (with_sink, sink) = server_with_sink();
    let response = with_sink
        .post("/v1/feedback")
        .json(&json!({"trace_id": "run-1", "score": 1.0, "comment": "spot on"}))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["logged"], json!(true));

    let feedback = sink.feedback().await;
    assert_eq!(feedback[0].0, "run-1");
    assert_eq!(feedback[0].1.feedback_type, "thumbs");
    assert_eq!(feedback[0].1.comment.as_deref(), Some("spot on"));

    server(TelemetryRecorder::disabled())
        .post("/v1/feedback")
        .json(&json!({"trace_id": "run-1", "score": 0.0}))
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_status() {
    let server = server(TelemetryRecorder::disabled());
    let status: Value = server.get("/status").await.json();
    assert_eq!(status["agent"], json!("Documentation Injection Agent"));
    assert_eq!(status["services"]["context7"], json!(true));
    assert_eq!(status["services"]["memmachine"], json!(true));
    assert_eq!(status["services"]["opik"], json!(false));
}
