//! Collaborator wiring
//!
//! An [`AgentContext`] is built once at startup and owns every collaborator
//! handle. Required collaborators that are missing or unhealthy make
//! construction fail with [`AgentError::NotConfigured`]; optional ones are
//! simply left out.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::errors::{AgentError, Result};
use crate::memory::{HistoryStore, MemoryGateway};
use crate::pipeline::{PipelineOptions, RetrievalPipeline};
use crate::resolver::Resolver;
use crate::source::SourceService;
use crate::telemetry::TelemetryRecorder;

#[cfg(feature = "http")]
use crate::config::AgentConfig;

/// Name reported by [`AgentContext::status`]
pub const AGENT_NAME: &str = "Documentation Injection Agent";

/// Which collaborators are available
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceStatus {
    /// Agent name
    pub agent: String,
    /// When the status was taken
    pub timestamp: DateTime<Utc>,
    /// Per-collaborator availability
    pub services: ServiceFlags,
}

/// Availability of each collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServiceFlags {
    /// Documentation source
    pub context7: bool,
    /// History store, probed live
    pub memmachine: bool,
    /// Trace sink
    pub opik: bool,
    /// Arbitration backend
    pub arbiter: bool,
}

/// Handles to every collaborator, shared by all requests
#[derive(Clone)]
pub struct AgentContext {
    pipeline: RetrievalPipeline,
    has_arbiter: bool,
}

impl AgentContext {
    /// Assemble a context from ready-made collaborators
    pub fn from_parts(
        source: Arc<dyn SourceService>,
        history: Arc<dyn HistoryStore>,
        resolver: Resolver,
        telemetry: TelemetryRecorder,
        options: PipelineOptions,
    ) -> Self {
        let has_arbiter = resolver.has_arbiter();
        let pipeline =
            RetrievalPipeline::new(source, MemoryGateway::new(history), resolver, telemetry)
                .with_options(options);
        Self {
            pipeline,
            has_arbiter,
        }
    }

    /// Build the HTTP-backed collaborators described by `config`.
    ///
    /// Fails when the source service has no API key or the history store
    /// does not report healthy. Telemetry and arbitration are optional.
    #[cfg(feature = "http")]
    pub async fn connect(config: &AgentConfig) -> Result<Self> {
        use crate::memory::MemMachineClient;
        use crate::resolver::OpenAiArbiter;
        use crate::source::Context7Client;
        use crate::telemetry::OpikSink;
        use tracing::{error, info, warn};

        let source_key = non_empty(&config.source.api_key).ok_or_else(|| {
            error!("CONTEXT7_API_KEY not found in environment");
            AgentError::not_configured("context7", "CONTEXT7_API_KEY is not set")
        })?;
        let source = Arc::new(Context7Client::new(&config.source, source_key));
        info!("Context7 client initialized");

        let history = Arc::new(MemMachineClient::new(&config.history));
        match history.health().await {
            Ok(true) => info!("MemMachine client initialized at {}", config.history.base_url),
            Ok(false) => {
                return Err(AgentError::not_configured(
                    "memmachine",
                    format!("{} is not healthy", config.history.base_url),
                ));
            },
            Err(e) => {
                return Err(AgentError::not_configured("memmachine", e.to_string()));
            },
        }

        let telemetry = match (config.telemetry.enabled, non_empty(&config.telemetry.api_key)) {
            (true, Some(key)) => {
                info!("Opik client initialized for project: {}", config.telemetry.project_name);
                TelemetryRecorder::new(Arc::new(OpikSink::new(&config.telemetry, key)))
            },
            (true, None) => {
                warn!("Opik client not configured - analytics will be disabled");
                TelemetryRecorder::disabled()
            },
            (false, _) => TelemetryRecorder::disabled(),
        };

        let resolver = match (config.arbiter.enabled, non_empty(&config.arbiter.api_key)) {
            (true, Some(key)) => {
                info!("Arbitration enabled with model {}", config.arbiter.model);
                Resolver::with_arbiter(Arc::new(OpenAiArbiter::new(&config.arbiter, key)))
            },
            _ => {
                warn!("No arbitration backend, resolving deterministically");
                Resolver::new()
            },
        };

        let options = PipelineOptions {
            allow_arbitration: resolver.has_arbiter(),
            tokens: config.source.default_tokens,
            search_limit: config.history.search_limit,
        };

        Ok(Self::from_parts(source, history, resolver, telemetry, options))
    }

    /// The retrieval pipeline
    pub fn pipeline(&self) -> &RetrievalPipeline {
        &self.pipeline
    }

    /// The memory gateway
    pub fn memory(&self) -> &MemoryGateway {
        self.pipeline.memory()
    }

    /// The telemetry recorder
    pub fn telemetry(&self) -> &TelemetryRecorder {
        self.pipeline.telemetry()
    }

    /// The telemetry recorder, or `NotConfigured` when no sink is attached
    pub fn require_telemetry(&self) -> Result<&TelemetryRecorder> {
        let telemetry = self.telemetry();
        if telemetry.is_configured() {
            Ok(telemetry)
        } else {
            Err(AgentError::not_configured("opik", "telemetry is disabled"))
        }
    }

    /// Probe the collaborators
    pub async fn status(&self) -> ServiceStatus {
        ServiceStatus {
            agent: AGENT_NAME.to_string(),
            timestamp: Utc::now(),
            services: ServiceFlags {
                context7: true,
                memmachine: self.memory().health().await,
                opik: self.telemetry().is_configured(),
                arbiter: self.has_arbiter,
            },
        }
    }
}

#[cfg(feature = "http")]
fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
