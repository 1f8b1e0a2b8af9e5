//! Trace event vocabulary.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::collections::BTreeSet;
use std::fmt;

use crate::memory::truncate;

/// Characters of free text kept in event input/output previews
pub const PREVIEW_CHARS: usize = 200;

/// Kind of a trace event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// One whole retrieval run; the parent of every other event
    Session,
    /// A call to the documentation source service
    SourceCall,
    /// A history search
    MemorySearch,
    /// A history write-back
    MemoryStore,
}

impl EventKind {
    /// Wire name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::SourceCall => "source_call",
            Self::MemorySearch => "memory_search",
            Self::MemoryStore => "memory_store",
        }
    }

    /// Whether the event is a top-level trace rather than a span
    pub fn is_trace(&self) -> bool {
        matches!(self, Self::Session)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One write-once telemetry record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEvent {
    /// Kind of the event
    pub kind: EventKind,
    /// Run the event belongs to
    pub trace_id: String,
    /// Display name
    pub name: String,
    /// Input payload
    pub input: Value,
    /// Output payload
    pub output: Value,
    /// Free-form tags
    pub tags: BTreeSet<String>,
    /// Additional metadata
    pub metadata: Map<String, Value>,
    /// Creation time
    pub timestamp: DateTime<Utc>,
}

fn tags<const N: usize>(values: [&str; N]) -> BTreeSet<String> {
    values.into_iter().map(str::to_string).collect()
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

impl TraceEvent {
    fn new(kind: EventKind, trace_id: &str, name: String) -> Self {
        Self {
            kind,
            trace_id: trace_id.to_string(),
            name,
            input: Value::Null,
            output: Value::Null,
            tags: BTreeSet::new(),
            metadata: Map::new(),
            timestamp: Utc::now(),
        }
    }

    /// History search or write-back
    pub fn memory_operation(
        trace_id: &str,
        kind: EventKind,
        query: &str,
        success: bool,
        result_count: usize,
        elapsed_ms: f64,
    ) -> Self {
        let operation = match kind {
            EventKind::MemoryStore => "store",
            _ => "search",
        };
        let mut event = Self::new(kind, trace_id, format!("MemMachine {}", title(operation)));
        event.input = json!({
            "operation": operation,
            "query": truncate(query, PREVIEW_CHARS),
        });
        event.output = json!({
            "success": success,
            "result_count": result_count,
        });
        event.tags = tags(["memmachine", operation, "memory"]);
        event.metadata = object(json!({
            "provider": "memmachine",
            "operation_type": operation,
            "response_time_ms": elapsed_ms,
            "success": success,
        }));
        event
    }

    /// Source-service resolution and fetch
    pub fn source_call(
        trace_id: &str,
        library_name: &str,
        identifier: Option<&str>,
        docs: &str,
        elapsed_ms: f64,
        error: Option<String>,
    ) -> Self {
        let success = !docs.is_empty();
        let mut event = Self::new(EventKind::SourceCall, trace_id, "Context7 API Call".into());
        event.input = json!({
            "library_name": library_name,
            "request_type": "get_library_docs",
        });
        event.output = json!({
            "success": success,
            "library_id": identifier,
            "docs_length": docs.chars().count(),
            "error": error,
        });
        event.tags = tags(["context7", "api-call", library_name]);
        event.metadata = object(json!({
            "provider": "context7",
            "response_time_ms": elapsed_ms,
            "success": success,
        }));
        event
    }

    /// Summary of a whole run
    pub fn session(
        trace_id: &str,
        query_text: &str,
        library_name: &str,
        user_id: &str,
        identifier: &str,
        docs: &str,
        metadata: Map<String, Value>,
    ) -> Self {
        let success = !docs.is_empty();
        let mut event = Self::new(
            EventKind::Session,
            trace_id,
            format!("Doc Retrieval: {library_name}"),
        );
        event.input = json!({
            "user_query": query_text,
            "library_requested": library_name,
            "user_id": user_id,
        });
        event.output = json!({
            "library_resolved": identifier,
            "docs_retrieved": success,
            "docs_preview": truncate(docs, PREVIEW_CHARS),
            "success": success,
        });
        let user_tag = format!("user:{user_id}");
        event.tags = tags(["doc-retrieval", library_name, user_tag.as_str()]);
        event.metadata = object(json!({
            "user_id": user_id,
            "library_name": library_name,
            "library_id": identifier,
            "context7_success": success,
            "docs_length": docs.chars().count(),
            "timestamp": event.timestamp.to_rfc3339(),
        }));
        event.metadata.extend(metadata);
        event
    }
}

fn title(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
