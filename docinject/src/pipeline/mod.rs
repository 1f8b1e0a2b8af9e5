//! # Retrieval pipeline
//!
//! One run walks `START → MEMORY_LOOKUP → RESOLVING → FETCHING → STORING →
//! DONE`, or stops in `FAILED` after `RESOLVING` or `FETCHING`. Collaborator
//! failures are absorbed where they happen: a dead history store means no
//! memory context, a dead source service means "not found".
//!
//! Stages return [`StageReport`] values; telemetry is emitted from those once
//! the stages are done, so the stages themselves never see the recorder.

mod report;
mod response;

pub use report::{PipelineState, RunReport, StageReport};
pub use response::{MemorySearchResponse, RetrievalResponse};

use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{DEFAULT_TOKENS, HistoryConfig};
use crate::memory::{EpisodeRecord, MemoryGateway, build_context};
use crate::resolver::{CandidateExtractor, Resolver};
use crate::source::{SourceService, clamp_tokens};
use crate::telemetry::{EventKind, TelemetryRecorder, TraceEvent};
use crate::types::{FailureReason, Query, ResolutionResult, RetrievalSession, Stage};

/// History entries returned by the memory-only search tool
pub const MEMORY_SEARCH_LIMIT: usize = 5;

/// Per-run knobs
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    /// Let the resolver consult its arbiter for ambiguous names
    pub allow_arbitration: bool,
    /// Token budget requested from the source service
    pub tokens: u32,
    /// Past episodes fetched during the memory lookup
    pub search_limit: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            allow_arbitration: true,
            tokens: DEFAULT_TOKENS,
            search_limit: HistoryConfig::default().search_limit,
        }
    }
}

/// Sequences memory lookup, resolution, fetch and write-back.
#[derive(Clone)]
pub struct RetrievalPipeline {
    source: Arc<dyn SourceService>,
    memory: MemoryGateway,
    resolver: Resolver,
    telemetry: TelemetryRecorder,
    options: PipelineOptions,
}

impl RetrievalPipeline {
    /// Assemble a pipeline from its collaborators
    pub fn new(
        source: Arc<dyn SourceService>,
        memory: MemoryGateway,
        resolver: Resolver,
        telemetry: TelemetryRecorder,
    ) -> Self {
        Self {
            source,
            memory,
            resolver,
            telemetry,
            options: PipelineOptions::default(),
        }
    }

    /// Replace the run options
    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Current run options
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Memory gateway used by the pipeline
    pub fn memory(&self) -> &MemoryGateway {
        &self.memory
    }

    /// Telemetry recorder used by the pipeline
    pub fn telemetry(&self) -> &TelemetryRecorder {
        &self.telemetry
    }

    /// Run one retrieval and emit its telemetry.
    ///
    /// Never fails; the returned session carries `success = false` and a
    /// [`FailureReason`] when no documentation could be delivered.
    pub async fn run(&self, query: Query) -> RetrievalSession {
        self.run_with_report(query).await.0
    }

    /// Like [`Self::run`], also returning the states visited and stage results
    pub async fn run_with_report(&self, query: Query) -> (RetrievalSession, RunReport) {
        let run_id = Uuid::now_v7().to_string();
        let (session, report) = self.execute(run_id, query).await;
        if let Some(err) = session.error() {
            warn!("Run {} failed: {}", session.run_id, err);
        }
        self.emit(&session, &report).await;
        (session, report)
    }

    async fn execute(&self, run_id: String, query: Query) -> (RetrievalSession, RunReport) {
        let started = Instant::now();
        let mut session = RetrievalSession::new(run_id, query);
        let mut report = RunReport::new();
        let query_text = session.query.search_text();

        // MEMORY_LOOKUP
        report.enter(PipelineState::MemoryLookup);
        let stage_start = Instant::now();
        let record = self
            .memory
            .search(&query_text, &session.query.user_id, self.options.search_limit)
            .await;
        let memory_elapsed = stage_start.elapsed();
        session.timings.record(Stage::MemoryLookup, memory_elapsed);
        session.memory_hits = record.episodic.len();
        if record.has_context {
            session.memory_context = Some(build_context(&record, &query_text));
        }
        report.stages.push(StageReport::MemoryLookup {
            query_text: query_text.clone(),
            hits: record.episodic.len(),
            has_context: record.has_context,
            elapsed: memory_elapsed,
        });

        // RESOLVING
        report.enter(PipelineState::Resolving);
        let stage_start = Instant::now();
        let resolution = self.resolve(&session.query.library_name).await;
        let resolve_elapsed = stage_start.elapsed();
        session.timings.record(Stage::Resolving, resolve_elapsed);
        session.resolution = Some(resolution.clone());

        if !resolution.is_found() {
            report.stages.push(StageReport::SourceCall {
                identifier: None,
                elapsed: resolve_elapsed,
                error: Some(format!("Library not found: {}", session.query.library_name)),
            });
            session.failure = Some(FailureReason::LibraryNotFound);
            report.enter(PipelineState::Failed);
            session.timings.set_total(started.elapsed());
            return (session, report);
        }

        // FETCHING
        report.enter(PipelineState::Fetching);
        let stage_start = Instant::now();
        let docs = self
            .fetch(&resolution.identifier, session.query.topic.as_deref())
            .await;
        let fetch_elapsed = stage_start.elapsed();
        session.timings.record(Stage::Fetching, fetch_elapsed);

        if docs.is_empty() {
            report.stages.push(StageReport::SourceCall {
                identifier: Some(resolution.identifier.clone()),
                elapsed: resolve_elapsed + fetch_elapsed,
                error: Some(format!("No documentation for {}", resolution.identifier)),
            });
            session.failure = Some(FailureReason::NoDocumentation {
                identifier: resolution.identifier.clone(),
            });
            report.enter(PipelineState::Failed);
            session.timings.set_total(started.elapsed());
            return (session, report);
        }

        report.stages.push(StageReport::SourceCall {
            identifier: Some(resolution.identifier.clone()),
            elapsed: resolve_elapsed + fetch_elapsed,
            error: None,
        });

        // STORING
        report.enter(PipelineState::Storing);
        let stage_start = Instant::now();
        let episode = self.episode(&session, &query_text, &resolution, &docs);
        session.stored = self.memory.store(&episode).await;
        let store_elapsed = stage_start.elapsed();
        session.timings.record(Stage::Storing, store_elapsed);
        if !session.stored {
            warn!("Retrieval of {} was not written to history", resolution.identifier);
        }
        report.stages.push(StageReport::Store {
            query_text: format!("Store: {query_text}"),
            stored: session.stored,
            elapsed: store_elapsed,
        });

        // DONE
        report.enter(PipelineState::Done);
        session.document_text = Some(docs);
        session.success = true;
        session.timings.set_total(started.elapsed());
        info!(
            "Retrieved {} via {} in {:.0}ms",
            resolution.identifier,
            resolution.method,
            session.timings.total_millis()
        );
        (session, report)
    }

    async fn resolve(&self, library_name: &str) -> ResolutionResult {
        let raw = match self.source.resolve(library_name).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Error resolving library '{}': {}", library_name, e);
                String::new()
            },
        };
        let candidates = CandidateExtractor::extract(&raw);
        self.resolver
            .resolve(library_name, &candidates, self.options.allow_arbitration)
            .await
    }

    async fn fetch(&self, identifier: &str, topic: Option<&str>) -> String {
        match self
            .source
            .fetch(identifier, topic, clamp_tokens(self.options.tokens))
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!("Error fetching documentation for {}: {}", identifier, e);
                String::new()
            },
        }
    }

    fn episode(
        &self,
        session: &RetrievalSession,
        query_text: &str,
        resolution: &ResolutionResult,
        docs: &str,
    ) -> EpisodeRecord {
        let mut metadata = Map::new();
        metadata.insert(
            "topic".into(),
            json!(session.query.topic.clone().unwrap_or_default()),
        );
        metadata.insert("resolution_method".into(), json!(resolution.method));
        metadata.extend(session.timings.to_json());
        metadata.remove("total_time_ms");

        EpisodeRecord::new(
            &session.query.user_id,
            query_text,
            &session.query.library_name,
            &resolution.identifier,
            docs,
            true,
        )
        .with_metadata(metadata)
    }

    async fn emit(&self, session: &RetrievalSession, report: &RunReport) {
        if !self.telemetry.is_configured() {
            return;
        }
        let trace_id = session.run_id.as_str();
        let docs = session.document_text.as_deref().unwrap_or("");

        for stage in &report.stages {
            let event = match stage {
                StageReport::MemoryLookup {
                    query_text,
                    hits,
                    has_context,
                    elapsed,
                } => TraceEvent::memory_operation(
                    trace_id,
                    EventKind::MemorySearch,
                    query_text,
                    *has_context,
                    *hits,
                    millis(*elapsed),
                ),
                StageReport::SourceCall {
                    identifier,
                    elapsed,
                    error,
                } => TraceEvent::source_call(
                    trace_id,
                    &session.query.library_name,
                    identifier.as_deref(),
                    docs,
                    millis(*elapsed),
                    error.clone(),
                ),
                StageReport::Store {
                    query_text,
                    stored,
                    elapsed,
                } => TraceEvent::memory_operation(
                    trace_id,
                    EventKind::MemoryStore,
                    query_text,
                    *stored,
                    0,
                    millis(*elapsed),
                ),
            };
            self.telemetry.record(event).await;
        }

        let mut metadata: Map<String, Value> = session.timings.to_json();
        metadata.insert("topic".into(), json!(session.query.topic.clone().unwrap_or_default()));
        metadata.insert("has_memory_context".into(), json!(session.memory_context.is_some()));
        metadata.insert("final_state".into(), json!(report.final_state()));
        if let Some(resolution) = &session.resolution {
            metadata.insert("resolution_method".into(), json!(resolution.method));
        }
        if let Some(failure) = &session.failure {
            metadata.insert("failure".into(), json!(failure));
        }

        self.telemetry
            .record(TraceEvent::session(
                trace_id,
                &session.query.search_text(),
                &session.query.library_name,
                &session.query.user_id,
                session.identifier().unwrap_or(""),
                docs,
                metadata,
            ))
            .await;
    }

    /// Memory-only search, rendered for display
    pub async fn search_memory(&self, query: &str, user_id: &str) -> MemorySearchResponse {
        let record = self.memory.search(query, user_id, MEMORY_SEARCH_LIMIT).await;
        MemorySearchResponse::new(query, &record)
    }
}

fn millis(elapsed: Duration) -> f64 {
    elapsed.as_micros() as f64 / 1000.0
}
