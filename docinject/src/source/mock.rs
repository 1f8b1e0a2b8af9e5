//! In-memory source service for tests and offline runs
use super::SourceService;
use crate::errors::{AgentError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

/// A source service answering from fixed tables.
///
/// Unknown names resolve to an empty listing and unknown identifiers fetch
/// to an empty document. Either operation can be switched to fail with a
/// transport error.
#[derive(Default)]
pub struct StaticSource {
    listings: HashMap<String, String>,
    documents: HashMap<String, String>,
    fail_resolve: bool,
    fail_fetch: bool,
    fetches: Mutex<Vec<FetchCall>>,
}

/// One recorded `fetch` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCall {
    /// Requested identifier
    pub identifier: String,
    /// Requested topic
    pub topic: Option<String>,
    /// Requested token budget
    pub tokens: u32,
}

impl StaticSource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `name` lookups with a listing announcing `identifiers`
    pub fn with_library(mut self, name: &str, identifiers: &[&str]) -> Self {
        let listing = identifiers
            .iter()
            .map(|id| format!("- Title: {id}\n- Context7-compatible library ID: {id}\n----------\n"))
            .collect::<String>();
        self.listings.insert(name.to_string(), listing);
        self
    }

    /// Answer `name` lookups with a raw listing
    pub fn with_listing(mut self, name: &str, raw: impl Into<String>) -> Self {
        self.listings.insert(name.to_string(), raw.into());
        self
    }

    /// Serve `text` for `identifier`
    pub fn with_document(mut self, identifier: &str, text: impl Into<String>) -> Self {
        self.documents.insert(identifier.to_string(), text.into());
        self
    }

    /// Make every lookup fail
    pub fn failing_resolve(mut self) -> Self {
        self.fail_resolve = true;
        self
    }

    /// Make every fetch fail
    pub fn failing_fetch(mut self) -> Self {
        self.fail_fetch = true;
        self
    }

    /// Fetch calls observed so far
    pub fn fetch_calls(&self) -> Vec<FetchCall> {
        self.fetches.lock().clone()
    }
}

#[async_trait]
impl SourceService for StaticSource {
    async fn resolve(&self, name: &str) -> Result<String> {
        if self.fail_resolve {
            return Err(AgentError::transport("static", "resolve disabled"));
        }
        Ok(self.listings.get(name).cloned().unwrap_or_default())
    }

    async fn fetch(&self, identifier: &str, topic: Option<&str>, tokens: u32) -> Result<String> {
        self.fetches.lock().push(FetchCall {
            identifier: identifier.to_string(),
            topic: topic.map(str::to_string),
            tokens,
        });
        if self.fail_fetch {
            return Err(AgentError::Timeout {
                service: "static".to_string(),
            });
        }
        Ok(self.documents.get(identifier).cloned().unwrap_or_default())
    }
}
