//! Context7 client over the MCP JSON-RPC endpoint
//!
//! Both operations are `tools/call` requests. The endpoint may answer with a
//! plain JSON body or with a one-shot server-sent-event stream whose `data:`
//! line carries the JSON-RPC envelope.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{SourceService, clamp_tokens};
use crate::config::SourceConfig;
use crate::errors::{AgentError, Result};

const SERVICE: &str = "context7";
const TOOL_RESOLVE: &str = "resolve-library-id";
const TOOL_DOCS: &str = "get-library-docs";

/// Client for the Context7 documentation service
pub struct Context7Client {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    resolve_timeout: Duration,
    fetch_timeout: Duration,
}

impl Context7Client {
    /// Create a new client
    pub fn new(config: &SourceConfig, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            api_key: api_key.into(),
            resolve_timeout: Duration::from_secs(config.resolve_timeout_secs),
            fetch_timeout: Duration::from_secs(config.fetch_timeout_secs),
        }
    }

    async fn call_tool(
        &self,
        id: u64,
        tool: &str,
        arguments: Value,
        timeout: Duration,
    ) -> Result<String> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": "tools/call",
            "params": {
                "name": tool,
                "arguments": arguments,
            },
            "id": id,
        });

        let response = self
            .client
            .post(&self.base_url)
            .header("CONTEXT7_API_KEY", &self.api_key)
            .header("Accept", "application/json, text/event-stream")
            .timeout(timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AgentError::from_http(SERVICE, e))?;

        if !response.status().is_success() {
            return Err(AgentError::transport(
                SERVICE,
                format!("HTTP {} from {}", response.status(), tool),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AgentError::from_http(SERVICE, e))?;

        let envelope = decode_envelope(&body)?;
        Ok(content_text(&envelope))
    }
}

#[async_trait]
impl SourceService for Context7Client {
    async fn resolve(&self, name: &str) -> Result<String> {
        let text = self
            .call_tool(
                1,
                TOOL_RESOLVE,
                json!({ "libraryName": name }),
                self.resolve_timeout,
            )
            .await?;
        debug!("Context7 listing for '{}': {} chars", name, text.len());
        Ok(text)
    }

    async fn fetch(&self, identifier: &str, topic: Option<&str>, tokens: u32) -> Result<String> {
        let mut arguments = json!({
            "context7CompatibleLibraryID": identifier,
            "tokens": clamp_tokens(tokens),
        });
        if let Some(topic) = topic.filter(|t| !t.is_empty()) {
            arguments["topic"] = json!(topic);
        }

        let text = self
            .call_tool(2, TOOL_DOCS, arguments, self.fetch_timeout)
            .await?;

        if text.is_empty() {
            warn!("No documentation found for library: {}", identifier);
        } else {
            info!("Retrieved {} chars of docs for '{}'", text.len(), identifier);
        }
        Ok(text)
    }
}

/// Parse a JSON-RPC envelope from a JSON or SSE body.
fn decode_envelope(body: &str) -> Result<Value> {
    let trimmed = body.trim_start();
    if trimmed.starts_with('{') {
        return Ok(serde_json::from_str(trimmed)?);
    }

    // SSE: take the last data line that parses
    trimmed
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .filter_map(|data| serde_json::from_str::<Value>(data.trim()).ok())
        .last()
        .ok_or_else(|| AgentError::protocol(SERVICE, "response carried no JSON-RPC payload"))
}

/// Join the text items of `result.content`. JSON-RPC errors yield "".
fn content_text(envelope: &Value) -> String {
    if let Some(error) = envelope.get("error") {
        warn!("Context7 returned an error: {}", error);
        return String::new();
    }

    envelope
        .pointer("/result/content")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("text").and_then(Value::as_str))
                .filter(|text| !text.is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default()
}
