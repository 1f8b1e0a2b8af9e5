//! Process-local history store.
//!
//! Keeps episodes in memory and ranks them by keyword overlap with the
//! query. Used for offline runs and tests; nothing survives a restart.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use super::{EpisodeFilter, EpisodeRecord, HistoryStore, SessionDescriptor};
use crate::errors::{AgentError, Result};
use crate::types::MemoryRecord;

#[derive(Debug, Clone)]
struct StoredEpisode {
    content: Value,
    metadata: Map<String, Value>,
    keywords: Vec<String>,
    sequence: u64,
}

#[derive(Default)]
struct Inner {
    episodes: HashMap<String, Vec<StoredEpisode>>,
    profiles: HashMap<String, Vec<Value>>,
    next_sequence: u64,
}

/// In-memory [`HistoryStore`]
#[derive(Default)]
pub struct InMemoryHistoryStore {
    inner: RwLock<Inner>,
    outage: AtomicBool,
}

impl InMemoryHistoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an unreachable store: every call fails with a timeout
    pub fn set_outage(&self, down: bool) {
        self.outage.store(down, Ordering::SeqCst);
    }

    /// Attach a profile record to a user
    pub async fn add_profile(&self, user_id: &str, profile: Value) {
        let session = SessionDescriptor::for_user(user_id);
        self.inner
            .write()
            .await
            .profiles
            .entry(session.session_id)
            .or_default()
            .push(profile);
    }

    /// Number of episodes stored for a user
    pub async fn episode_count(&self, user_id: &str) -> usize {
        let session = SessionDescriptor::for_user(user_id);
        self.inner
            .read()
            .await
            .episodes
            .get(&session.session_id)
            .map_or(0, Vec::len)
    }

    fn check_outage(&self) -> Result<()> {
        if self.outage.load(Ordering::SeqCst) {
            return Err(AgentError::Timeout {
                service: "in-memory history".to_string(),
            });
        }
        Ok(())
    }
}

fn keywords(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn matches_filter(metadata: &Map<String, Value>, filter: &EpisodeFilter) -> bool {
    filter
        .iter()
        .all(|(key, wanted)| metadata.get(key) == Some(wanted))
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn search(
        &self,
        session: &SessionDescriptor,
        query: &str,
        limit: usize,
        filter: &EpisodeFilter,
    ) -> Result<MemoryRecord> {
        self.check_outage()?;
        let wanted = keywords(query);
        let inner = self.inner.read().await;

        let mut scored: Vec<(usize, u64, &StoredEpisode)> = inner
            .episodes
            .get(&session.session_id)
            .into_iter()
            .flatten()
            .filter(|episode| matches_filter(&episode.metadata, filter))
            .map(|episode| {
                let overlap = wanted
                    .iter()
                    .filter(|w| episode.keywords.contains(w))
                    .count();
                (overlap, episode.sequence, episode)
            })
            .filter(|(overlap, _, _)| *overlap > 0)
            .collect();

        // Best overlap first, newest first among equals
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));

        let episodic = scored
            .into_iter()
            .take(limit)
            .map(|(_, _, episode)| episode.content.clone())
            .collect();
        let profile = inner
            .profiles
            .get(&session.session_id)
            .cloned()
            .unwrap_or_default();

        Ok(MemoryRecord::new(episodic, profile))
    }

    async fn store(&self, session: &SessionDescriptor, episode: &EpisodeRecord) -> Result<()> {
        self.check_outage()?;
        let mut inner = self.inner.write().await;
        inner.next_sequence += 1;
        let stored = StoredEpisode {
            content: episode.content(),
            metadata: episode.metadata_map(),
            keywords: keywords(&format!("{} {}", episode.user_query, episode.library_name)),
            sequence: inner.next_sequence,
        };
        inner
            .episodes
            .entry(session.session_id.clone())
            .or_default()
            .push(stored);
        Ok(())
    }

    async fn health(&self) -> Result<bool> {
        Ok(!self.outage.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn episode(query: &str, library: &str) -> EpisodeRecord {
        EpisodeRecord::new("u1", query, library, format!("/{library}/{library}"), "docs", true)
    }

    #[tokio::test]
    async fn test_ranking_and_limit() {
        let store = InMemoryHistoryStore::new();
        let session = SessionDescriptor::for_user("u1");
        store.store(&session, &episode("fastapi routing", "fastapi")).await.unwrap();
        store.store(&session, &episode("django orm", "django")).await.unwrap();
        store.store(&session, &episode("fastapi", "fastapi")).await.unwrap();

        let record = store
            .search(&session, "fastapi routing", 10, &EpisodeFilter::new())
            .await
            .unwrap();
        assert_eq!(record.episodic.len(), 2);
        assert_eq!(record.episodic[0]["user_query"], json!("fastapi routing"));

        let limited = store
            .search(&session, "fastapi", 1, &EpisodeFilter::new())
            .await
            .unwrap();
        assert_eq!(limited.episodic.len(), 1);
        // Newest wins the tie
        assert_eq!(limited.episodic[0]["user_query"], json!("fastapi"));
    }

    #[tokio::test]
    async fn test_profiles_and_outage() {
        let store = InMemoryHistoryStore::new();
        store.add_profile("u1", json!("prefers short examples")).await;
        let session = SessionDescriptor::for_user("u1");

        let record = store
            .search(&session, "nothing stored", 3, &EpisodeFilter::new())
            .await
            .unwrap();
        assert!(record.episodic.is_empty());
        assert!(record.has_context);

        store.set_outage(true);
        assert!(!store.health().await.unwrap());
        assert!(store.search(&session, "x", 3, &EpisodeFilter::new()).await.is_err());
        assert!(store.store(&session, &episode("x", "x")).await.is_err());
        assert_eq!(store.episode_count("u1").await, 0);
    }
}
