//! Documentation source service abstraction
//!
//! The source service knows two things: which identifiers exist for a name,
//! and the documentation text behind an identifier. Implementations report
//! transport problems as errors; the pipeline turns those into empty results.

use async_trait::async_trait;

use crate::config::MIN_TOKENS;
use crate::errors::Result;

#[cfg(feature = "http")]
mod context7;
pub mod mock;

#[cfg(feature = "http")]
pub use context7::Context7Client;
pub use mock::StaticSource;

/// Trait for documentation sources
#[async_trait]
pub trait SourceService: Send + Sync {
    /// Raw listing of identifiers that may match `name`
    async fn resolve(&self, name: &str) -> Result<String>;

    /// Documentation for `identifier`, optionally focused on `topic`.
    ///
    /// Returns an empty string when the service has nothing for it.
    async fn fetch(&self, identifier: &str, topic: Option<&str>, tokens: u32) -> Result<String>;
}

/// Raise a token budget to the minimum the service accepts
pub fn clamp_tokens(tokens: u32) -> u32 {
    tokens.max(MIN_TOKENS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_tokens() {
        assert_eq!(clamp_tokens(0), 1000);
        assert_eq!(clamp_tokens(999), 1000);
        assert_eq!(clamp_tokens(3000), 3000);
    }
}
