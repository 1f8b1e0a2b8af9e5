//! Arbitration backends for ambiguous library names.
//!
//! An arbiter sees the free-text name and a numbered list of identifiers and
//! answers with a 1-based pick, or "none of these". The resolver never trusts
//! the answer blindly; see [`super::Resolver`].

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::{AgentError, Result};
use crate::types::Candidate;

/// Answer of an arbitration backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// 1-based index into the candidate list that was presented
    Pick(usize),
    /// The backend judged that no candidate matches
    NoMatch,
}

impl Verdict {
    /// Interpret a raw numeric answer: 0 means no match
    pub fn from_index(index: usize) -> Self {
        if index == 0 {
            Self::NoMatch
        } else {
            Self::Pick(index)
        }
    }
}

/// Semantic arbitration between several candidate identifiers.
#[async_trait]
pub trait Arbiter: Send + Sync {
    /// Choose among `candidates` (already truncated and ordered) for `name`
    async fn arbitrate(&self, name: &str, candidates: &[Candidate]) -> Result<Verdict>;
}

static INDEX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-?\d+").unwrap());

/// Parse the first integer in a free-text answer ("3", "Answer: 3.", ...).
///
/// Negative numbers are rejected like any other unusable answer.
pub fn parse_verdict(answer: &str) -> Result<Verdict> {
    let digits = INDEX_RE
        .find(answer)
        .ok_or_else(|| AgentError::Arbitration(format!("no index in answer {answer:?}")))?;

    digits
        .as_str()
        .parse::<usize>()
        .map(Verdict::from_index)
        .map_err(|e| AgentError::Arbitration(format!("bad index {:?}: {e}", digits.as_str())))
}

/// Build the prompt shown to a language-model arbiter.
pub fn build_prompt(name: &str, candidates: &[Candidate]) -> String {
    let mut prompt = format!(
        "A user asked for documentation of the library \"{name}\".\n\
         Pick the identifier below that is the official project for that library.\n\n"
    );
    for (i, candidate) in candidates.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, candidate.identifier));
    }
    prompt.push_str(
        "\nReply with only the number of the best match, or 0 if none of them is that library.",
    );
    prompt
}

/// Deterministic arbiter that always gives the same answer.
#[derive(Debug, Clone, Copy)]
pub struct FixedArbiter {
    verdict: Verdict,
}

impl FixedArbiter {
    /// Always answer with `index` (0 means no match)
    pub fn new(index: usize) -> Self {
        Self {
            verdict: Verdict::from_index(index),
        }
    }
}

#[async_trait]
impl Arbiter for FixedArbiter {
    async fn arbitrate(&self, _name: &str, _candidates: &[Candidate]) -> Result<Verdict> {
        Ok(self.verdict)
    }
}

/// Arbiter whose backend is always down.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableArbiter;

#[async_trait]
impl Arbiter for UnavailableArbiter {
    async fn arbitrate(&self, _name: &str, _candidates: &[Candidate]) -> Result<Verdict> {
        Err(AgentError::transport("arbiter", "backend unavailable"))
    }
}

#[cfg(feature = "http")]
pub use openai::OpenAiArbiter;

#[cfg(feature = "http")]
mod openai {
    use super::*;
    use crate::config::ArbiterConfig;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;
    use tracing::debug;

    const SERVICE: &str = "arbiter";

    /// Arbiter backed by an OpenAI-compatible chat completion endpoint
    pub struct OpenAiArbiter {
        client: reqwest::Client,
        endpoint: String,
        api_key: String,
        model: String,
        timeout: Duration,
    }

    #[derive(Serialize)]
    struct ChatRequest<'a> {
        model: &'a str,
        messages: Vec<ChatMessage>,
        temperature: f32,
        max_tokens: u32,
    }

    #[derive(Serialize, Deserialize)]
    struct ChatMessage {
        role: String,
        content: String,
    }

    #[derive(Deserialize)]
    struct ChatResponse {
        choices: Vec<ChatChoice>,
    }

    #[derive(Deserialize)]
    struct ChatChoice {
        message: ChatMessage,
    }

    impl OpenAiArbiter {
        /// Create an arbiter from configuration
        pub fn new(config: &ArbiterConfig, api_key: impl Into<String>) -> Self {
            Self {
                client: reqwest::Client::new(),
                endpoint: config.endpoint.trim_end_matches('/').to_string(),
                api_key: api_key.into(),
                model: config.model.clone(),
                timeout: Duration::from_secs(config.timeout_secs),
            }
        }
    }

    #[async_trait]
    impl Arbiter for OpenAiArbiter {
        async fn arbitrate(&self, name: &str, candidates: &[Candidate]) -> Result<Verdict> {
            let request = ChatRequest {
                model: &self.model,
                messages: vec![
                    ChatMessage {
                        role: "system".to_string(),
                        content: "You match library names to documentation identifiers. \
                                  Answer with a single integer."
                            .to_string(),
                    },
                    ChatMessage {
                        role: "user".to_string(),
                        content: build_prompt(name, candidates),
                    },
                ],
                temperature: 0.0,
                max_tokens: 10,
            };

            let url = format!("{}/chat/completions", self.endpoint);
            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .timeout(self.timeout)
                .json(&request)
                .send()
                .await
                .map_err(|e| AgentError::from_http(SERVICE, e))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(AgentError::transport(SERVICE, format!("HTTP {status}: {body}")));
            }

            let body: ChatResponse = response
                .json()
                .await
                .map_err(|e| AgentError::protocol(SERVICE, e.to_string()))?;

            let answer = body
                .choices
                .first()
                .map(|c| c.message.content.trim().to_string())
                .ok_or_else(|| AgentError::Arbitration("no choices in response".into()))?;

            debug!("Arbiter answered {:?} for '{}'", answer, name);
            parse_verdict(&answer)
        }
    }
}
