//! Type definitions shared by the retrieval pipeline
//!
//! Everything here is plain data: queries, resolution outcomes, memory
//! records, per-stage timings and the session aggregate returned by a
//! pipeline run.

use serde::{Deserialize, Serialize};

use crate::errors::AgentError;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Identifier prefix of crawled-website entries, trusted less than repositories
pub const LOW_TRUST_PREFIX: &str = "/websites/";

/// Default user when the caller does not identify itself
pub const DEFAULT_USER_ID: &str = "zed_user";

/// One documentation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// Free-text library name as typed by the user (e.g. "fastapi")
    pub library_name: String,
    /// Optional topic to focus the documentation on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// User the request is made for
    pub user_id: String,
}

impl Query {
    /// Create a query. A blank topic is treated as no topic.
    pub fn new(
        library_name: impl Into<String>,
        topic: Option<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            library_name: library_name.into().trim().to_string(),
            topic: topic
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            user_id: user_id.into(),
        }
    }

    /// Text used to search and store history: library name and topic
    pub fn search_text(&self) -> String {
        match &self.topic {
            Some(topic) => format!("{} {}", self.library_name, topic),
            None => self.library_name.clone(),
        }
    }
}

/// One identifier proposed by the source service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Candidate {
    /// Slash-delimited identifier, e.g. "/org/repo"
    pub identifier: String,
}

impl Candidate {
    /// Create a candidate
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
        }
    }

    /// Whether the identifier lives under the low-trust namespace
    pub fn is_low_trust(&self) -> bool {
        self.identifier.starts_with(LOW_TRUST_PREFIX)
    }

    /// Last non-empty path segment ("/tiangolo/fastapi" -> "fastapi")
    pub fn trailing_segment(&self) -> &str {
        self.identifier
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or("")
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier)
    }
}

/// How an identifier was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    /// Only one plausible candidate
    Single,
    /// Arbitration pick confirmed by normalized comparison
    LlmVerified,
    /// Arbitration pick kept although it does not match the name
    LlmUnverified,
    /// Normalized exact match on the trailing segment
    ExactFallback,
    /// First candidate in source order
    FirstFallback,
    /// No candidate at all
    None,
}

impl ResolutionMethod {
    /// Wire/log name of the method
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::LlmVerified => "llm_verified",
            Self::LlmUnverified => "llm_unverified",
            Self::ExactFallback => "exact_fallback",
            Self::FirstFallback => "first_fallback",
            Self::None => "none",
        }
    }
}

impl fmt::Display for ResolutionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of resolving one free-text name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionResult {
    /// Chosen identifier, empty when nothing could be chosen
    pub identifier: String,
    /// Rule that produced the identifier
    pub method: ResolutionMethod,
}

impl ResolutionResult {
    /// A successful resolution
    pub fn new(identifier: impl Into<String>, method: ResolutionMethod) -> Self {
        Self {
            identifier: identifier.into(),
            method,
        }
    }

    /// The terminal "nothing matched" result
    pub fn none() -> Self {
        Self {
            identifier: String::new(),
            method: ResolutionMethod::None,
        }
    }

    /// Whether an identifier was produced
    pub fn is_found(&self) -> bool {
        self.method != ResolutionMethod::None && !self.identifier.is_empty()
    }
}

/// Records returned by the history store for one search
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Past retrieval episodes, most relevant first
    pub episodic: Vec<serde_json::Value>,
    /// User-level preference records
    pub profile: Vec<serde_json::Value>,
    /// Whether either list carries anything
    pub has_context: bool,
}

impl MemoryRecord {
    /// Build a record, deriving `has_context` from the lists
    pub fn new(episodic: Vec<serde_json::Value>, profile: Vec<serde_json::Value>) -> Self {
        let has_context = !episodic.is_empty() || !profile.is_empty();
        Self {
            episodic,
            profile,
            has_context,
        }
    }

    /// The record returned when the store could not be reached
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Pipeline stage, used as the key of timing maps
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// History search
    MemoryLookup,
    /// Candidate lookup and resolution
    Resolving,
    /// Document download
    Fetching,
    /// History write-back
    Storing,
}

impl Stage {
    /// Name used in telemetry metadata
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MemoryLookup => "memory_lookup",
            Self::Resolving => "resolving",
            Self::Fetching => "fetching",
            Self::Storing => "storing",
        }
    }
}

/// Wall-clock duration of each stage that ran, plus the whole run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageTimings {
    stages: BTreeMap<Stage, Duration>,
    total: Duration,
}

impl StageTimings {
    /// Record the duration of one stage
    pub fn record(&mut self, stage: Stage, elapsed: Duration) {
        self.stages.insert(stage, elapsed);
    }

    /// Record the duration of the whole run
    pub fn set_total(&mut self, elapsed: Duration) {
        self.total = elapsed;
    }

    /// Duration of one stage, if it ran
    pub fn get(&self, stage: Stage) -> Option<Duration> {
        self.stages.get(&stage).copied()
    }

    /// Duration of one stage in milliseconds, 0 if it did not run
    pub fn millis(&self, stage: Stage) -> f64 {
        self.get(stage).map(as_millis).unwrap_or(0.0)
    }

    /// Duration of the whole run
    pub fn total(&self) -> Duration {
        self.total
    }

    /// Duration of the whole run in milliseconds
    pub fn total_millis(&self) -> f64 {
        as_millis(self.total)
    }

    /// Stages that ran, in pipeline order
    pub fn iter(&self) -> impl Iterator<Item = (Stage, Duration)> + '_ {
        self.stages.iter().map(|(stage, elapsed)| (*stage, *elapsed))
    }

    /// Millisecond map suitable for telemetry metadata
    pub fn to_json(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut map = serde_json::Map::new();
        for (stage, elapsed) in self.iter() {
            map.insert(
                format!("{}_time_ms", stage.as_str()),
                serde_json::json!(as_millis(elapsed)),
            );
        }
        map.insert("total_time_ms".into(), serde_json::json!(self.total_millis()));
        map
    }
}

impl Serialize for StageTimings {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

fn as_millis(elapsed: Duration) -> f64 {
    elapsed.as_micros() as f64 / 1000.0
}

/// Why a run ended in the failed state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// No identifier could be resolved for the name
    LibraryNotFound,
    /// The identifier was resolved but no document came back
    NoDocumentation {
        /// Identifier that produced no text
        identifier: String,
    },
}

/// Aggregate of one pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalSession {
    /// Trace id shared by every telemetry record of this run
    pub run_id: String,
    /// The request
    pub query: Query,
    /// Resolution outcome, absent only if the run never reached resolution
    pub resolution: Option<ResolutionResult>,
    /// Retrieved documentation, absent on failure
    pub document_text: Option<String>,
    /// Prompt-ready rendering of matching history, when there was any
    pub memory_context: Option<String>,
    /// Number of past episodes the history search returned
    pub memory_hits: usize,
    /// Whether the write-back to the history store succeeded
    pub stored: bool,
    /// Per-stage durations
    pub timings: StageTimings,
    /// Whether documentation was delivered
    pub success: bool,
    /// Set when `success` is false
    pub failure: Option<FailureReason>,
}

impl RetrievalSession {
    /// Start a session for a query
    pub fn new(run_id: impl Into<String>, query: Query) -> Self {
        Self {
            run_id: run_id.into(),
            query,
            resolution: None,
            document_text: None,
            memory_context: None,
            memory_hits: 0,
            stored: false,
            timings: StageTimings::default(),
            success: false,
            failure: None,
        }
    }

    /// Resolved identifier, if any
    pub fn identifier(&self) -> Option<&str> {
        self.resolution
            .as_ref()
            .filter(|r| r.is_found())
            .map(|r| r.identifier.as_str())
    }

    /// The not-found error describing a failed run
    pub fn error(&self) -> Option<AgentError> {
        let what = match self.failure.as_ref()? {
            FailureReason::LibraryNotFound => format!("library '{}'", self.query.library_name),
            FailureReason::NoDocumentation { identifier } => {
                format!("documentation for '{}' ({identifier})", self.query.library_name)
            },
        };
        Some(AgentError::NotFound(what))
    }
}
