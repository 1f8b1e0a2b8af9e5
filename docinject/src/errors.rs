//! Error types for documentation retrieval
//!
//! Collaborator failures (source service, history store, trace sink,
//! arbitration backend) are expressed with this enum at the client boundary
//! and recovered locally by the gateway, resolver and pipeline. Only
//! [`AgentError::NotConfigured`] escapes to the caller, at startup.

use thiserror::Error;

/// Main error type for the documentation agent
#[derive(Error, Debug)]
pub enum AgentError {
    /// A required collaborator is missing credentials or is unreachable at startup
    #[error("{service} is not configured: {reason}")]
    NotConfigured {
        /// Collaborator name
        service: String,
        /// What is missing
        reason: String,
    },

    /// A collaborator call failed at the transport level
    #[error("Transport error ({service}): {message}")]
    Transport {
        /// Collaborator name
        service: String,
        /// Underlying failure
        message: String,
    },

    /// A collaborator call exceeded its time budget
    #[error("Timeout calling {service}")]
    Timeout {
        /// Collaborator name
        service: String,
    },

    /// Resolution produced no identifier or the fetch produced no document
    #[error("Not found: {0}")]
    NotFound(String),

    /// The arbitration backend failed or answered with something unusable
    #[error("Arbitration failed: {0}")]
    Arbitration(String),

    /// A collaborator answered with a payload of the wrong shape
    #[error("Unexpected response from {service}: {message}")]
    Protocol {
        /// Collaborator name
        service: String,
        /// Description of the mismatch
        message: String,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

impl AgentError {
    /// Create a new NotConfigured error
    pub fn not_configured(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NotConfigured {
            service: service.into(),
            reason: reason.into(),
        }
    }

    /// Create a new Transport error
    pub fn transport(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create a new Protocol error
    pub fn protocol(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Protocol {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Convert a reqwest failure, keeping timeouts distinguishable
    #[cfg(feature = "http")]
    pub fn from_http(service: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                service: service.to_string(),
            }
        } else {
            Self::transport(service, err.to_string())
        }
    }

    /// Check if the error is recoverable by re-issuing the request
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Transport { .. })
    }

    /// Check if the error is a configuration issue
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::NotConfigured { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AgentError::not_configured("context7", "CONTEXT7_API_KEY not set");
        let msg = err.to_string();
        assert!(msg.contains("context7"));
        assert!(msg.contains("CONTEXT7_API_KEY"));
    }

    #[test]
    fn test_is_recoverable() {
        assert!(
            AgentError::Timeout {
                service: "memmachine".into()
            }
            .is_recoverable()
        );
        assert!(AgentError::transport("opik", "connection refused").is_recoverable());
        assert!(!AgentError::NotFound("fastapi".into()).is_recoverable());
        assert!(!AgentError::Arbitration("no index".into()).is_recoverable());
    }

    #[test]
    fn test_is_config_error() {
        assert!(AgentError::not_configured("memmachine", "unhealthy").is_config_error());
        assert!(!AgentError::protocol("context7", "missing result").is_config_error());
    }

    #[test]
    fn test_json_error_conversion() {
        let original = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: AgentError = original.into();
        assert!(err.to_string().starts_with("JSON error"));
    }
}
