//! MemMachine REST client
//!
//! - `POST /v1/memories/search`: episodic and profile memory for a session
//! - `POST /v1/memories`: add one episode
//! - `GET /health`: `{"status": "healthy"}` when up

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info};

use super::episode::{AGENT_ID, EPISODE_TYPE};
use super::{EpisodeFilter, EpisodeRecord, HistoryStore, SessionDescriptor};
use crate::config::HistoryConfig;
use crate::errors::{AgentError, Result};
use crate::types::MemoryRecord;

const SERVICE: &str = "memmachine";

/// Client for a MemMachine instance
pub struct MemMachineClient {
    client: reqwest::Client,
    base_url: String,
    search_timeout: Duration,
    store_timeout: Duration,
    health_timeout: Duration,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    session: &'a SessionDescriptor,
    query: &'a str,
    limit: usize,
    filter: &'a EpisodeFilter,
}

#[derive(Serialize)]
struct AddMemoryRequest<'a> {
    session: &'a SessionDescriptor,
    producer: &'a str,
    produced_for: &'a str,
    episode_content: String,
    episode_type: &'a str,
    metadata: Map<String, Value>,
}

impl MemMachineClient {
    /// Create a new client
    pub fn new(config: &HistoryConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            search_timeout: Duration::from_secs(config.search_timeout_secs),
            store_timeout: Duration::from_secs(config.store_timeout_secs),
            health_timeout: Duration::from_secs(config.health_timeout_secs),
        }
    }
}

/// Pull the two memory lists out of a search response body.
fn parse_search_response(body: &Value) -> MemoryRecord {
    let list = |key: &str| {
        body.pointer(&format!("/content/{key}"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    };
    MemoryRecord::new(list("episodic_memory"), list("profile_memory"))
}

#[async_trait]
impl HistoryStore for MemMachineClient {
    async fn search(
        &self,
        session: &SessionDescriptor,
        query: &str,
        limit: usize,
        filter: &EpisodeFilter,
    ) -> Result<MemoryRecord> {
        let url = format!("{}/v1/memories/search", self.base_url);
        let request = SearchRequest {
            session,
            query,
            limit,
            filter,
        };

        let response = self
            .client
            .post(&url)
            .timeout(self.search_timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::from_http(SERVICE, e))?;

        if !response.status().is_success() {
            return Err(AgentError::transport(
                SERVICE,
                format!("search returned HTTP {}", response.status()),
            ));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AgentError::protocol(SERVICE, e.to_string()))?;
        Ok(parse_search_response(&body))
    }

    async fn store(&self, session: &SessionDescriptor, episode: &EpisodeRecord) -> Result<()> {
        let url = format!("{}/v1/memories", self.base_url);
        let request = AddMemoryRequest {
            session,
            producer: &episode.user_id,
            produced_for: AGENT_ID,
            episode_content: episode.content().to_string(),
            episode_type: EPISODE_TYPE,
            metadata: episode.metadata_map(),
        };

        let response = self
            .client
            .post(&url)
            .timeout(self.store_timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::from_http(SERVICE, e))?;

        if !response.status().is_success() {
            return Err(AgentError::transport(
                SERVICE,
                format!("store returned HTTP {}", response.status()),
            ));
        }
        debug!("Stored episode for {}", session.session_id);
        Ok(())
    }

    async fn health(&self) -> Result<bool> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(self.health_timeout)
            .send()
            .await
            .map_err(|e| AgentError::from_http(SERVICE, e))?;

        if !response.status().is_success() {
            return Ok(false);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AgentError::protocol(SERVICE, e.to_string()))?;
        info!("MemMachine health: {}", body);
        Ok(body.get("status").and_then(Value::as_str) == Some("healthy"))
    }
}
