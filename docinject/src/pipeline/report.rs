//! Stage results of one pipeline run.
//!
//! Stages hand these values back instead of talking to telemetry
//! themselves; [`super::RetrievalPipeline::run`] turns them into events once
//! the run is over.

use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// States of the retrieval state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    /// Nothing has run yet
    Start,
    /// Searching history
    MemoryLookup,
    /// Listing candidates and choosing one
    Resolving,
    /// Downloading documentation
    Fetching,
    /// Writing the episode back
    Storing,
    /// Documentation delivered
    Done,
    /// No identifier or no documentation
    Failed,
}

impl PipelineState {
    /// Whether the run stops in this state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether `next` is a legal successor of `self`
    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Start, MemoryLookup)
                | (MemoryLookup, Resolving)
                | (Resolving, Fetching)
                | (Resolving, Failed)
                | (Fetching, Storing)
                | (Fetching, Failed)
                | (Storing, Done)
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "START",
            Self::MemoryLookup => "MEMORY_LOOKUP",
            Self::Resolving => "RESOLVING",
            Self::Fetching => "FETCHING",
            Self::Storing => "STORING",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// What one stage did, as far as telemetry is concerned
#[derive(Debug, Clone, PartialEq)]
pub enum StageReport {
    /// History search finished (possibly absorbing a failure)
    MemoryLookup {
        /// Text that was searched
        query_text: String,
        /// Episodes returned
        hits: usize,
        /// Whether anything came back
        has_context: bool,
        /// Time spent
        elapsed: Duration,
    },
    /// Source service was consulted (resolution, and the fetch if reached)
    SourceCall {
        /// Identifier chosen, if any
        identifier: Option<String>,
        /// Time spent across resolution and fetch
        elapsed: Duration,
        /// Why nothing was delivered
        error: Option<String>,
    },
    /// Episode write-back finished
    Store {
        /// Text that was stored
        query_text: String,
        /// Whether the store acknowledged it
        stored: bool,
        /// Time spent
        elapsed: Duration,
    },
}

/// Everything a run did: states visited, in order, and the stage results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    /// States entered, starting with [`PipelineState::Start`]
    pub states: Vec<PipelineState>,
    /// Stage results, in execution order
    pub stages: Vec<StageReport>,
}

impl RunReport {
    pub(crate) fn new() -> Self {
        Self {
            states: vec![PipelineState::Start],
            stages: Vec::new(),
        }
    }

    pub(crate) fn enter(&mut self, next: PipelineState) {
        if let Some(current) = self.states.last() {
            debug_assert!(
                current.can_transition_to(next),
                "illegal transition {current} -> {next}"
            );
        }
        tracing::debug!("Pipeline state -> {}", next);
        self.states.push(next);
    }

    /// State the run ended in
    pub fn final_state(&self) -> PipelineState {
        self.states.last().copied().unwrap_or(PipelineState::Start)
    }
}
