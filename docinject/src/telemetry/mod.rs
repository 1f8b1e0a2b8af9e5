//! # Telemetry
//!
//! Fire-and-forget trace records for each pipeline stage. A
//! [`TelemetryRecorder`] without a sink is a valid, silent recorder; every
//! method absorbs sink failures so telemetry never changes a run's outcome.

mod event;
mod memory_sink;
#[cfg(feature = "http")]
mod opik;

pub use event::{EventKind, PREVIEW_CHARS, TraceEvent};
pub use memory_sink::MemorySink;
#[cfg(feature = "http")]
pub use opik::OpikSink;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::errors::Result;

/// User feedback on one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    /// Score, 0.0 to 1.0 for thumbs feedback
    pub score: f64,
    /// Feedback family ("thumbs", "numeric")
    #[serde(default = "default_feedback_type")]
    pub feedback_type: String,
    /// Free-text comment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

fn default_feedback_type() -> String {
    "thumbs".to_string()
}

impl Feedback {
    /// Thumbs feedback without comment
    pub fn thumbs(score: f64) -> Self {
        Self {
            score,
            feedback_type: default_feedback_type(),
            comment: None,
        }
    }
}

/// Project-level summary reported by the recorder
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectStats {
    /// Project the events are filed under
    pub project_name: String,
    /// "active" when a sink is attached
    pub status: String,
    /// Events accepted by the sink since startup
    pub events_recorded: u64,
    /// Where to look at the traces, if the sink has a dashboard
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dashboard_url: Option<String>,
}

/// Destination of trace events
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    /// Deliver one event, returning the id the sink assigned to it
    async fn emit(&self, event: &TraceEvent) -> Result<String>;

    /// Push out anything buffered
    async fn flush(&self) -> Result<()>;

    /// Attach feedback to a run
    async fn log_feedback(&self, trace_id: &str, feedback: &Feedback) -> Result<()>;

    /// Project the events are filed under
    fn project_name(&self) -> &str;

    /// Events accepted so far
    fn events_recorded(&self) -> u64;

    /// Dashboard location, if any
    fn dashboard_url(&self) -> Option<String> {
        None
    }
}

/// Failure-absorbing front of an optional [`TelemetrySink`]
#[derive(Clone, Default)]
pub struct TelemetryRecorder {
    sink: Option<Arc<dyn TelemetrySink>>,
}

impl TelemetryRecorder {
    /// Recorder backed by `sink`
    pub fn new(sink: Arc<dyn TelemetrySink>) -> Self {
        Self { sink: Some(sink) }
    }

    /// Recorder that drops everything
    pub fn disabled() -> Self {
        Self { sink: None }
    }

    /// Whether a sink is attached
    pub fn is_configured(&self) -> bool {
        self.sink.is_some()
    }

    /// Emit one event. Returns the sink's id, or `None` on any failure.
    pub async fn record(&self, event: TraceEvent) -> Option<String> {
        let sink = self.sink.as_ref()?;
        match sink.emit(&event).await {
            Ok(id) => {
                debug!("Recorded {} event {} for run {}", event.kind, id, event.trace_id);
                Some(id)
            },
            Err(e) => {
                error!("Error recording {} event: {}", event.kind, e);
                None
            },
        }
    }

    /// Flush the sink, logging failures
    pub async fn flush(&self) {
        let Some(sink) = &self.sink else {
            return;
        };
        match sink.flush().await {
            Ok(()) => info!("Flushed all traces to {}", sink.project_name()),
            Err(e) => error!("Error flushing traces: {}", e),
        }
    }

    /// Attach feedback to a run. Returns false when it could not be delivered.
    pub async fn log_feedback(&self, trace_id: &str, feedback: &Feedback) -> bool {
        let Some(sink) = &self.sink else {
            warn!("Telemetry not configured, dropping feedback for {}", trace_id);
            return false;
        };
        match sink.log_feedback(trace_id, feedback).await {
            Ok(()) => {
                info!("Logged user feedback for trace {}: {}", trace_id, feedback.score);
                true
            },
            Err(e) => {
                error!("Error logging user feedback: {}", e);
                false
            },
        }
    }

    /// Project summary, `None` when telemetry is disabled
    pub fn project_stats(&self) -> Option<ProjectStats> {
        self.sink.as_ref().map(|sink| ProjectStats {
            project_name: sink.project_name().to_string(),
            status: "active".to_string(),
            events_recorded: sink.events_recorded(),
            dashboard_url: sink.dashboard_url(),
        })
    }
}
