//! Collaborator configuration.
//!
//! Every struct deserializes with defaults so that a partial config file or
//! environment overlay is enough. Credentials are optional here; whether a
//! missing credential is fatal is decided in [`crate::AgentContext`].

use serde::{Deserialize, Serialize};

/// Project name used when none is configured
pub const DEFAULT_PROJECT_NAME: &str = "doc-injection-agent";

/// Smallest token budget the source service accepts
pub const MIN_TOKENS: u32 = 1000;

/// Token budget used when the caller does not ask for one
pub const DEFAULT_TOKENS: u32 = 3000;

/// Everything needed to build an [`crate::AgentContext`]
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AgentConfig {
    /// Documentation source service
    #[serde(default)]
    pub source: SourceConfig,
    /// History store
    #[serde(default)]
    pub history: HistoryConfig,
    /// Trace sink
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    /// Arbitration backend
    #[serde(default)]
    pub arbiter: ArbiterConfig,
}

/// Documentation source service (Context7)
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
    /// JSON-RPC endpoint
    pub base_url: String,
    /// API key, required at startup
    pub api_key: Option<String>,
    /// Time budget of a name lookup
    pub resolve_timeout_secs: u64,
    /// Time budget of a document download
    pub fetch_timeout_secs: u64,
    /// Token budget requested per document
    pub default_tokens: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://mcp.context7.com/mcp".to_string(),
            api_key: None,
            resolve_timeout_secs: 10,
            fetch_timeout_secs: 15,
            default_tokens: DEFAULT_TOKENS,
        }
    }
}

/// History store (MemMachine)
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// REST base URL
    pub base_url: String,
    /// Time budget of a search
    pub search_timeout_secs: u64,
    /// Time budget of an episode write
    pub store_timeout_secs: u64,
    /// Time budget of the health probe
    pub health_timeout_secs: u64,
    /// Episodes requested per pipeline run
    pub search_limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            search_timeout_secs: 10,
            store_timeout_secs: 15,
            health_timeout_secs: 5,
            search_limit: 3,
        }
    }
}

/// Trace sink (Opik)
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Set to false to drop every event
    pub enabled: bool,
    /// REST base URL
    pub base_url: String,
    /// API key; telemetry is disabled without one
    pub api_key: Option<String>,
    /// Workspace the project belongs to
    pub workspace: Option<String>,
    /// Project traces are filed under
    pub project_name: String,
    /// Time budget of one emission
    pub timeout_secs: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://www.comet.com/opik/api".to_string(),
            api_key: None,
            workspace: None,
            project_name: DEFAULT_PROJECT_NAME.to_string(),
            timeout_secs: 5,
        }
    }
}

/// Arbitration backend (OpenAI-compatible chat completions)
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ArbiterConfig {
    /// Set to false to resolve deterministically only
    pub enabled: bool,
    /// Base URL of the chat completion API
    pub endpoint: String,
    /// API key; arbitration is disabled without one
    pub api_key: Option<String>,
    /// Model name
    pub model: String,
    /// Time budget of one arbitration call
    pub timeout_secs: u64,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 10,
        }
    }
}
