//! Trace sink that keeps events in process memory, for tests and offline runs

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Feedback, TelemetrySink, TraceEvent};
use crate::errors::{AgentError, Result};

/// Sink keeping every event in process memory
#[derive(Default)]
pub struct MemorySink {
    project_name: String,
    events: Mutex<Vec<TraceEvent>>,
    feedback: Mutex<Vec<(String, Feedback)>>,
    recorded: AtomicU64,
    flushes: AtomicUsize,
    failing: AtomicBool,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            ..Self::default()
        }
    }

    /// Make every call fail with a transport error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Events received so far, in emission order
    pub async fn events(&self) -> Vec<TraceEvent> {
        self.events.lock().await.clone()
    }

    /// Feedback received so far
    pub async fn feedback(&self) -> Vec<(String, Feedback)> {
        self.feedback.lock().await.clone()
    }

    /// Number of flush calls
    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AgentError::transport("memory sink", "sink unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl TelemetrySink for MemorySink {
    async fn emit(&self, event: &TraceEvent) -> Result<String> {
        self.check()?;
        self.events.lock().await.push(event.clone());
        self.recorded.fetch_add(1, Ordering::SeqCst);
        Ok(Uuid::new_v4().to_string())
    }

    async fn flush(&self) -> Result<()> {
        self.check()?;
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn log_feedback(&self, trace_id: &str, feedback: &Feedback) -> Result<()> {
        self.check()?;
        self.feedback
            .lock()
            .await
            .push((trace_id.to_string(), feedback.clone()));
        Ok(())
    }

    fn project_name(&self) -> &str {
        &self.project_name
    }

    fn events_recorded(&self) -> u64 {
        self.recorded.load(Ordering::SeqCst)
    }
}
