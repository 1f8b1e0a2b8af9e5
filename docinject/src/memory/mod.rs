//! # Memory gateway
//!
//! Reads and writes retrieval episodes against a history store, scoped by a
//! [`SessionDescriptor`] derived from the user id.
//!
//! ## Components
//!
//! - `HistoryStore`: the store contract (search, store, health)
//! - `MemoryGateway`: failure-absorbing facade used by the pipeline
//! - `build_context`: pure rendering of a search result into a prompt block
//! - `MemMachineClient`: REST-backed store
//! - `InMemoryHistoryStore`: process-local store for tests and offline runs

mod context;
mod episode;
mod in_memory;
#[cfg(feature = "http")]
mod memmachine;

pub use context::build_context;
pub use episode::{EpisodeRecord, SessionDescriptor};
pub use in_memory::InMemoryHistoryStore;
#[cfg(feature = "http")]
pub use memmachine::MemMachineClient;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::errors::Result;
use crate::types::MemoryRecord;

/// Optional field filter applied by the store (e.g. `library_name`)
pub type EpisodeFilter = serde_json::Map<String, Value>;

/// Trait for history store backends
///
/// Implementations must be thread-safe (Send + Sync) as they are shared by
/// concurrent pipeline runs.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Episodes and profile records relevant to `query`
    async fn search(
        &self,
        session: &SessionDescriptor,
        query: &str,
        limit: usize,
        filter: &EpisodeFilter,
    ) -> Result<MemoryRecord>;

    /// Persist one episode
    async fn store(&self, session: &SessionDescriptor, episode: &EpisodeRecord) -> Result<()>;

    /// Whether the store is up
    async fn health(&self) -> Result<bool>;
}

/// Failure-absorbing access to the history store.
#[derive(Clone)]
pub struct MemoryGateway {
    store: Arc<dyn HistoryStore>,
}

impl MemoryGateway {
    /// Wrap a store
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }

    /// Search past episodes. Never fails: errors yield an empty record.
    pub async fn search(&self, query_text: &str, user_id: &str, limit: usize) -> MemoryRecord {
        let session = SessionDescriptor::for_user(user_id);
        match self
            .store
            .search(&session, query_text, limit, &EpisodeFilter::new())
            .await
        {
            Ok(record) => {
                info!(
                    "Found {} similar queries for: {}",
                    record.episodic.len(),
                    query_text
                );
                MemoryRecord::new(record.episodic, record.profile)
            },
            Err(e) => {
                error!("Error searching similar queries: {}", e);
                MemoryRecord::empty()
            },
        }
    }

    /// Past episodes for one library, most relevant first. Empty on failure.
    pub async fn library_history(
        &self,
        library_name: &str,
        user_id: &str,
        limit: usize,
    ) -> Vec<Value> {
        let session = SessionDescriptor::for_user(user_id);
        let mut filter = EpisodeFilter::new();
        filter.insert("library_name".into(), Value::String(library_name.to_string()));

        match self.store.search(&session, library_name, limit, &filter).await {
            Ok(record) => {
                info!(
                    "Found {} past interactions with {}",
                    record.episodic.len(),
                    library_name
                );
                record.episodic
            },
            Err(e) => {
                error!("Error getting library context for {}: {}", library_name, e);
                Vec::new()
            },
        }
    }

    /// Persist an episode. Best effort: returns false on failure.
    pub async fn store(&self, episode: &EpisodeRecord) -> bool {
        let session = SessionDescriptor::for_user(&episode.user_id);
        match self.store.store(&session, episode).await {
            Ok(()) => {
                info!(
                    "Stored retrieval session for library '{}' and query: {}",
                    episode.library_name,
                    truncate(&episode.user_query, 100)
                );
                true
            },
            Err(e) => {
                warn!("Error storing retrieval session: {}", e);
                false
            },
        }
    }

    /// Whether the store answers its health probe
    pub async fn health(&self) -> bool {
        match self.store.health().await {
            Ok(healthy) => healthy,
            Err(e) => {
                error!("History store health check failed: {}", e);
                false
            },
        }
    }

    /// Render a search result for a prompt. See [`build_context`].
    pub fn build_context(record: &MemoryRecord, current_query: &str) -> String {
        build_context(record, current_query)
    }
}

/// Truncate on a character boundary, appending "..." when shortened.
pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
