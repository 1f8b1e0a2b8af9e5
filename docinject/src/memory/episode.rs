//! Session descriptors and episode records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::truncate;

/// Agent name recorded as the consumer of every episode
pub const AGENT_ID: &str = "doc_injection_agent";

/// Episode type of documentation retrievals
pub const EPISODE_TYPE: &str = "doc_retrieval";

/// Characters of documentation kept in an episode
const DOCS_PREVIEW_CHARS: usize = 500;

/// Scope of history-store reads and writes, derived from a user id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescriptor {
    /// Grouping key, one group per user
    pub group_id: String,
    /// Agents taking part in the session
    pub agent_id: Vec<String>,
    /// Users taking part in the session
    pub user_id: Vec<String>,
    /// Session key, one session per user
    pub session_id: String,
}

impl SessionDescriptor {
    /// Deterministic descriptor for `user_id`
    pub fn for_user(user_id: &str) -> Self {
        Self {
            group_id: format!("doc_agent_{user_id}"),
            agent_id: vec![AGENT_ID.to_string()],
            user_id: vec![user_id.to_string()],
            session_id: format!("doc_session_{user_id}"),
        }
    }
}

/// One documentation retrieval, as written to the history store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    /// User the retrieval was made for
    pub user_id: String,
    /// Library name and topic as searched
    pub user_query: String,
    /// Free-text library name
    pub library_name: String,
    /// Resolved identifier
    pub library_id: String,
    /// Leading part of the documentation
    pub docs_preview: String,
    /// Length of the full documentation in characters
    pub docs_length: usize,
    /// Whether documentation was retrieved
    pub success: bool,
    /// When the retrieval happened
    pub timestamp: DateTime<Utc>,
    /// Extra fields merged into the stored metadata (topic, timings)
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl EpisodeRecord {
    /// Summarize a retrieval; only a preview of the documentation is kept
    pub fn new(
        user_id: impl Into<String>,
        user_query: impl Into<String>,
        library_name: impl Into<String>,
        library_id: impl Into<String>,
        docs: &str,
        success: bool,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            user_query: user_query.into(),
            library_name: library_name.into(),
            library_id: library_id.into(),
            docs_preview: truncate(docs, DOCS_PREVIEW_CHARS),
            docs_length: docs.chars().count(),
            success,
            timestamp: Utc::now(),
            metadata: Map::new(),
        }
    }

    /// Attach extra metadata
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata.extend(metadata);
        self
    }

    /// Content body of the episode
    pub fn content(&self) -> Value {
        json!({
            "type": EPISODE_TYPE,
            "user_query": self.user_query,
            "library_name": self.library_name,
            "library_id": self.library_id,
            "docs_preview": self.docs_preview,
            "docs_length": self.docs_length,
            "success": self.success,
            "timestamp": self.timestamp.to_rfc3339(),
        })
    }

    /// Filterable metadata of the episode, including the extra fields
    pub fn metadata_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("library_name".into(), json!(self.library_name));
        map.insert("library_id".into(), json!(self.library_id));
        map.insert("success".into(), json!(self.success));
        map.insert("docs_length".into(), json!(self.docs_length));
        map.insert("timestamp".into(), json!(self.timestamp.to_rfc3339()));
        map.insert("type".into(), json!(EPISODE_TYPE));
        map.extend(self.metadata.clone());
        map
    }
}
