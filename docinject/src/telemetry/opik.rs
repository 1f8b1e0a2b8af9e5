//! Opik REST sink
//!
//! Session events become traces whose id is the run id; every other event
//! becomes a `tool` span attached to that trace.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use super::{Feedback, TelemetrySink, TraceEvent};
use crate::config::TelemetryConfig;
use crate::errors::{AgentError, Result};

const SERVICE: &str = "opik";
const DASHBOARD_URL: &str = "https://www.comet.com/opik";

/// Sink posting events to an Opik instance
pub struct OpikSink {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    workspace: Option<String>,
    project_name: String,
    timeout: Duration,
    recorded: AtomicU64,
}

#[derive(Serialize)]
struct TracePayload<'a> {
    id: &'a str,
    project_name: &'a str,
    name: &'a str,
    start_time: String,
    end_time: String,
    input: &'a Value,
    output: &'a Value,
    tags: &'a BTreeSet<String>,
    metadata: &'a Map<String, Value>,
}

#[derive(Serialize)]
struct SpanPayload<'a> {
    id: String,
    trace_id: &'a str,
    project_name: &'a str,
    name: &'a str,
    #[serde(rename = "type")]
    span_type: &'a str,
    start_time: String,
    end_time: String,
    input: &'a Value,
    output: &'a Value,
    tags: &'a BTreeSet<String>,
    metadata: &'a Map<String, Value>,
}

#[derive(Serialize)]
struct FeedbackPayload<'a> {
    name: &'a str,
    value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
    source: &'a str,
}

impl OpikSink {
    /// Create a sink from configuration and an API key
    pub fn new(config: &TelemetryConfig, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            workspace: config.workspace.clone(),
            project_name: config.project_name.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            recorded: AtomicU64::new(0),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .timeout(self.timeout)
            .header("authorization", &self.api_key);
        if let Some(workspace) = &self.workspace {
            builder = builder.header("Comet-Workspace", workspace);
        }
        builder
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<()> {
        let response = builder
            .send()
            .await
            .map_err(|e| AgentError::from_http(SERVICE, e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::transport(
                SERVICE,
                format!("HTTP {status}: {body}"),
            ));
        }
        Ok(())
    }

    fn span_payload<'a>(&'a self, event: &'a TraceEvent, id: String) -> SpanPayload<'a> {
        let time = event.timestamp.to_rfc3339();
        SpanPayload {
            id,
            trace_id: &event.trace_id,
            project_name: &self.project_name,
            name: &event.name,
            span_type: "tool",
            start_time: time.clone(),
            end_time: time,
            input: &event.input,
            output: &event.output,
            tags: &event.tags,
            metadata: &event.metadata,
        }
    }
}

#[async_trait]
impl TelemetrySink for OpikSink {
    async fn emit(&self, event: &TraceEvent) -> Result<String> {
        let id = if event.kind.is_trace() {
            let time = event.timestamp.to_rfc3339();
            let payload = TracePayload {
                id: &event.trace_id,
                project_name: &self.project_name,
                name: &event.name,
                start_time: time.clone(),
                end_time: time,
                input: &event.input,
                output: &event.output,
                tags: &event.tags,
                metadata: &event.metadata,
            };
            self.send(self.request(reqwest::Method::POST, "/v1/private/traces").json(&payload))
                .await?;
            event.trace_id.clone()
        } else {
            let id = Uuid::now_v7().to_string();
            let payload = self.span_payload(event, id.clone());
            self.send(self.request(reqwest::Method::POST, "/v1/private/spans").json(&payload))
                .await?;
            id
        };

        self.recorded.fetch_add(1, Ordering::Relaxed);
        debug!("Sent {} event to Opik as {}", event.kind, id);
        Ok(id)
    }

    async fn flush(&self) -> Result<()> {
        // Events are posted as they are emitted
        Ok(())
    }

    async fn log_feedback(&self, trace_id: &str, feedback: &Feedback) -> Result<()> {
        let payload = FeedbackPayload {
            name: &feedback.feedback_type,
            value: feedback.score,
            reason: feedback.comment.as_deref(),
            source: "sdk",
        };
        let path = format!("/v1/private/traces/{trace_id}/feedback-scores");
        self.send(self.request(reqwest::Method::PUT, &path).json(&payload))
            .await
    }

    fn project_name(&self) -> &str {
        &self.project_name
    }

    fn events_recorded(&self) -> u64 {
        self.recorded.load(Ordering::Relaxed)
    }

    fn dashboard_url(&self) -> Option<String> {
        Some(DASHBOARD_URL.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::EventKind;
    use mockito::Matcher;
    use serde_json::json;

    fn sink(server_url: &str) -> OpikSink {
        let config = TelemetryConfig {
            base_url: server_url.to_string(),
            workspace: Some("docs-team".into()),
            timeout_secs: 1,
            ..TelemetryConfig::default()
        };
        OpikSink::new(&config, "opik-key")
    }

    #[test]
    fn test_span_payload_links_to_trace() {
        let sink = OpikSink::new(&TelemetryConfig::default(), "key");
        let event =
            TraceEvent::memory_operation("run-1", EventKind::MemoryStore, "fastapi", true, 0, 2.0);
        let payload = serde_json::to_value(sink.span_payload(&event, "span-1".into())).unwrap();

        assert_eq!(payload["trace_id"], json!("run-1"));
        assert_eq!(payload["type"], json!("tool"));
        assert_eq!(payload["project_name"], json!("doc-injection-agent"));
        assert_eq!(payload["tags"], json!(["memmachine", "memory", "store"]));
    }

    #[test]
    fn test_feedback_payload_omits_missing_reason() {
        let payload = FeedbackPayload {
            name: "thumbs",
            value: 1.0,
            reason: None,
            source: "sdk",
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("reason").is_none());
        assert_eq!(json["value"], json!(1.0));
    }

    #[test]
    fn test_base_url_is_trimmed() {
        let config = TelemetryConfig {
            base_url: "http://localhost:5173/api/".into(),
            ..TelemetryConfig::default()
        };
        let sink = OpikSink::new(&config, "key");
        assert_eq!(sink.base_url, "http://localhost:5173/api");
        assert_eq!(sink.dashboard_url().as_deref(), Some(DASHBOARD_URL));
    }

    #[tokio::test]
    async fn test_session_event_posts_trace_with_run_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/private/traces")
            .match_header("authorization", "opik-key")
            .match_header("comet-workspace", "docs-team")
            .match_body(Matcher::PartialJson(json!({
                "id": "run-1",
                "project_name": "doc-injection-agent",
                "name": "Doc Retrieval: fastapi",
                "output": {"success": true}
            })))
            .with_status(201)
            .create_async()
            .await;

        let sink = sink(&server.url());
        let event = TraceEvent::session(
            "run-1",
            "fastapi routing",
            "fastapi",
            "u1",
            "/fastapi/fastapi",
            "Use APIRouter.",
            Map::new(),
        );
        let id = sink.emit(&event).await.unwrap();

        assert_eq!(id, "run-1");
        assert_eq!(sink.events_recorded(), 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_stage_event_posts_tool_span() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/private/spans")
            .match_header("authorization", "opik-key")
            .match_body(Matcher::PartialJson(json!({
                "trace_id": "run-1",
                "type": "tool",
                "name": "MemMachine Search"
            })))
            .with_status(201)
            .create_async()
            .await;

        let event =
            TraceEvent::memory_operation("run-1", EventKind::MemorySearch, "fastapi", true, 2, 4.0);
        let id = sink(&server.url()).emit(&event).await.unwrap();

        assert_ne!(id, "run-1");
        assert!(Uuid::parse_str(&id).is_ok());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_feedback_is_put_on_the_trace() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/v1/private/traces/run-1/feedback-scores")
            .match_body(Matcher::PartialJson(json!({
                "name": "thumbs",
                "value": 1.0,
                "reason": "spot on",
                "source": "sdk"
            })))
            .with_status(204)
            .create_async()
            .await;

        let mut feedback = Feedback::thumbs(1.0);
        feedback.comment = Some("spot on".into());
        sink(&server.url())
            .log_feedback("run-1", &feedback)
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejected_event_is_not_counted() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/private/spans")
            .with_status(401)
            .with_body("bad key")
            .create_async()
            .await;

        let sink = sink(&server.url());
        let event =
            TraceEvent::memory_operation("run-1", EventKind::MemoryStore, "fastapi", true, 0, 1.0);
        let err = sink.emit(&event).await.unwrap_err();

        assert!(matches!(err, AgentError::Transport { .. }));
        assert!(err.to_string().contains("bad key"));
        assert_eq!(sink.events_recorded(), 0);
    }
}
