//! # docinject
//!
//! Retrieves up-to-date library documentation for a caller, enriches the
//! request with the caller's retrieval history, and records telemetry about
//! every run.
//!
//! ## Features
//!
//! - **Tiered resolution**: free-text names are resolved to source identifiers
//!   with low-trust filtering, optional LLM arbitration, verification and
//!   deterministic fallbacks
//! - **Memory**: past retrievals are searched before and stored after each run
//! - **Telemetry**: each stage produces a trace record, best effort
//! - **Partial-failure tolerance**: only "not found" reaches the caller
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docinject::{AgentConfig, AgentContext, Query, RetrievalResponse, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let context = AgentContext::connect(&AgentConfig::default()).await?;
//!     let session = context
//!         .pipeline()
//!         .run(Query::new("fastapi", Some("routing".into()), "zed_user"))
//!         .await;
//!
//!     println!("{}", RetrievalResponse::from_session(&session).text);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
mod context;
mod errors;
pub mod memory;
pub mod pipeline;
pub mod resolver;
pub mod source;
pub mod telemetry;
mod types;

pub use config::{AgentConfig, ArbiterConfig, HistoryConfig, SourceConfig, TelemetryConfig};
pub use context::{AGENT_NAME, AgentContext, ServiceFlags, ServiceStatus};
pub use errors::{AgentError, Result};
pub use memory::{
    EpisodeRecord, HistoryStore, InMemoryHistoryStore, MemoryGateway, SessionDescriptor,
    build_context,
};
pub use pipeline::{
    MemorySearchResponse, PipelineOptions, PipelineState, RetrievalPipeline, RetrievalResponse,
};
pub use resolver::{Arbiter, CandidateExtractor, FixedArbiter, Resolver, Verdict};
pub use source::{SourceService, StaticSource};
pub use telemetry::{EventKind, Feedback, MemorySink, TelemetryRecorder, TelemetrySink, TraceEvent};
pub use types::{
    Candidate, DEFAULT_USER_ID, FailureReason, LOW_TRUST_PREFIX, MemoryRecord, Query,
    ResolutionMethod, ResolutionResult, RetrievalSession, Stage, StageTimings,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        AgentConfig, AgentContext, AgentError, MemoryGateway, Query, Resolver, Result,
        RetrievalPipeline, RetrievalResponse, TelemetryRecorder,
    };
}
