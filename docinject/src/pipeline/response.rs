//! Plain-text rendering of pipeline results.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::memory::build_context;
use crate::types::{
    FailureReason, MemoryRecord, ResolutionMethod, RetrievalSession, Stage, StageTimings,
};

/// Caller-facing result of one retrieval
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResponse {
    /// Trace id of the run, usable for feedback
    pub run_id: String,
    /// Whether documentation was delivered
    pub success: bool,
    /// Resolved identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_id: Option<String>,
    /// How the identifier was chosen
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_method: Option<ResolutionMethod>,
    /// Retrieved documentation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    /// Rendered history context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_context: Option<String>,
    /// Per-stage durations in milliseconds
    pub timings: StageTimings,
    /// Everything above as display text
    pub text: String,
    /// When the response was produced
    pub retrieved_at: DateTime<Utc>,
}

impl RetrievalResponse {
    /// Build the response for a finished session
    pub fn from_session(session: &RetrievalSession) -> Self {
        let retrieved_at = Utc::now();
        Self {
            run_id: session.run_id.clone(),
            success: session.success,
            library_id: session.identifier().map(str::to_string),
            resolution_method: session.resolution.as_ref().map(|r| r.method),
            documentation: session.document_text.clone(),
            memory_context: session.memory_context.clone(),
            timings: session.timings.clone(),
            text: render(session, retrieved_at),
            retrieved_at,
        }
    }
}

fn render(session: &RetrievalSession, retrieved_at: DateTime<Utc>) -> String {
    let name = &session.query.library_name;

    match (&session.failure, &session.document_text) {
        (Some(FailureReason::LibraryNotFound), _) => {
            format!("Library '{name}' not found in the documentation source.")
        },
        (Some(FailureReason::NoDocumentation { identifier }), _) => {
            format!("No documentation found for '{name}' (ID: {identifier})")
        },
        (None, Some(docs)) => {
            let mut text = String::new();
            if let Some(context) = &session.memory_context {
                text.push_str(&format!(
                    "**Memory Context Found** ({} similar queries)\n\n{context}\n\n---\n\n",
                    session.memory_hits
                ));
            }
            let timings = &session.timings;
            let source_ms = timings.millis(Stage::Resolving) + timings.millis(Stage::Fetching);
            text.push_str(&format!(
                "**Latest Documentation: {name}**\n\
                 Source: Context7 ID `{id}`\n\
                 Topic: {topic}\n\
                 Retrieved: {when}\n\n\
                 {docs}\n\n\
                 ---\n\
                 Performance: Context7: {source_ms:.0}ms | Memory: {memory_ms:.0}ms | Total: {total_ms:.0}ms",
                id = session.identifier().unwrap_or(""),
                topic = session.query.topic.as_deref().unwrap_or("General"),
                when = retrieved_at.format("%Y-%m-%d %H:%M:%S UTC"),
                memory_ms = timings.millis(Stage::MemoryLookup),
                total_ms = timings.total_millis(),
            ));
            text
        },
        (None, None) => format!("No documentation retrieved for '{name}'"),
    }
}

/// Result of the memory-only search tool
#[derive(Debug, Clone, Serialize)]
pub struct MemorySearchResponse {
    /// Query that was searched
    pub query: String,
    /// Number of episodes found
    pub found: usize,
    /// Whether anything matched
    pub has_context: bool,
    /// Display text
    pub text: String,
}

impl MemorySearchResponse {
    /// Render a search result
    pub fn new(query: &str, record: &MemoryRecord) -> Self {
        let text = if record.has_context {
            format!(
                "**Memory Search Results**\nQuery: {query}\nFound: {} relevant memories\n\n{}",
                record.episodic.len(),
                build_context(record, query)
            )
        } else {
            format!("No memory context found for query: '{query}'")
        };
        Self {
            query: query.to_string(),
            found: record.episodic.len(),
            has_context: record.has_context,
            text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Query, ResolutionResult};
    use serde_json::json;
    use std::time::Duration;

    fn session() -> RetrievalSession {
        RetrievalSession::new("run-1", Query::new("fastapi", None, "u1"))
    }

    #[test]
    fn test_not_found_messages() {
        let mut missing = session();
        missing.resolution = Some(ResolutionResult::none());
        missing.failure = Some(FailureReason::LibraryNotFound);
        let response = RetrievalResponse::from_session(&missing);
        assert_eq!(
            response.text,
            "Library 'fastapi' not found in the documentation source."
        );
        assert_eq!(response.library_id, None);

        let mut empty = session();
        empty.resolution = Some(ResolutionResult::new(
            "/fastapi/fastapi",
            ResolutionMethod::Single,
        ));
        empty.failure = Some(FailureReason::NoDocumentation {
            identifier: "/fastapi/fastapi".into(),
        });
        let response = RetrievalResponse::from_session(&empty);
        assert!(response.text.contains("No documentation found for 'fastapi'"));
        assert!(response.text.contains("(ID: /fastapi/fastapi)"));
        assert!(!response.success);
    }

    #[test]
    fn test_success_layout() {
        let mut done = session();
        done.resolution = Some(ResolutionResult::new(
            "/fastapi/fastapi",
            ResolutionMethod::ExactFallback,
        ));
        done.document_text = Some("Routes use decorators.".into());
        done.memory_context = Some("Query: fastapi".into());
        done.memory_hits = 2;
        done.success = true;
        done.timings.record(Stage::MemoryLookup, Duration::from_millis(5));
        done.timings.record(Stage::Resolving, Duration::from_millis(100));
        done.timings.record(Stage::Fetching, Duration::from_millis(200));
        done.timings.set_total(Duration::from_millis(320));

        let response = RetrievalResponse::from_session(&done);
        assert!(response.text.starts_with("**Memory Context Found** (2 similar queries)"));
        assert!(response.text.contains("Source: Context7 ID `/fastapi/fastapi`"));
        assert!(response.text.contains("Topic: General"));
        assert!(response.text.contains("Routes use decorators."));
        assert!(
            response
                .text
                .ends_with("Performance: Context7: 300ms | Memory: 5ms | Total: 320ms")
        );

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["resolution_method"], json!("exact_fallback"));
        assert_eq!(json["timings"]["total_time_ms"], json!(320.0));
    }

    #[test]
    fn test_memory_search_response() {
        let empty = MemorySearchResponse::new("react", &MemoryRecord::empty());
        assert_eq!(empty.text, "No memory context found for query: 'react'");
        assert_eq!(empty.found, 0);

        let record = MemoryRecord::new(vec![json!("react hooks")], vec![]);
        let found = MemorySearchResponse::new("react", &record);
        assert!(found.text.contains("Found: 1 relevant memories"));
        assert!(found.text.contains("Past Query 1: react hooks"));
    }
}
