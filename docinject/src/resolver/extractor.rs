//! Candidate extraction from raw source-service text.
//!
//! The source service answers a name lookup with a free-form listing. Each
//! library it knows about is announced on a line of the form
//! `- Context7-compatible library ID: /org/repo`; everything else (titles,
//! descriptions, trust scores, snippet counts) is ignored.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::types::Candidate;

static ID_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"-\s*Context7-compatible library ID:\s*(/[\w\-./]+)").unwrap()
});

/// Parses source-service listings into candidates.
#[derive(Debug, Clone, Copy, Default)]
pub struct CandidateExtractor;

impl CandidateExtractor {
    /// Extract identifiers in source order, dropping duplicates.
    ///
    /// Malformed lines are skipped. An empty result means "not found" and is
    /// not an error.
    pub fn extract(raw_text: &str) -> Vec<Candidate> {
        let mut seen = HashSet::new();

        ID_LINE_RE
            .captures_iter(raw_text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim_end_matches(['.', '/']))
            .filter(|id| id.len() > 1)
            .filter(|id| seen.insert(id.to_string()))
            .map(Candidate::new)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "Available Libraries (top matches):

Each result includes:
- Library ID: Context7-compatible identifier (format: /org/project)

----------

- Title: FastAPI
- Context7-compatible library ID: /fastapi/fastapi
- Description: FastAPI framework, high performance, easy to learn
- Code Snippets: 1236
- Trust Score: 9.9
----------
- Title: FastAPI Users
- Context7-compatible library ID: /fastapi-users/fastapi-users
- Description: Ready-to-use and customizable users management for FastAPI
----------
- Title: FastAPI docs
- Context7-compatible library ID: /websites/fastapi_tiangolo
";

    fn ids(candidates: &[Candidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.identifier.as_str()).collect()
    }

    #[test]
    fn test_extract_preserves_source_order() {
        let candidates = CandidateExtractor::extract(LISTING);
        assert_eq!(
            ids(&candidates),
            vec![
                "/fastapi/fastapi",
                "/fastapi-users/fastapi-users",
                "/websites/fastapi_tiangolo"
            ]
        );
    }

    #[test]
    fn test_extract_empty_and_garbage() {
        assert!(CandidateExtractor::extract("").is_empty());
        assert!(CandidateExtractor::extract("No libraries found matching 'zzz'").is_empty());
        // Announcement without an identifier is skipped
        assert!(CandidateExtractor::extract("- Context7-compatible library ID: n/a").is_empty());
        assert!(CandidateExtractor::extract("- Context7-compatible library ID: /").is_empty());
    }

    #[test]
    fn test_extract_deduplicates() {
        let text = "- Context7-compatible library ID: /a/b\n\
                    - Context7-compatible library ID: /c/d\n\
                    - Context7-compatible library ID: /a/b\n";
        assert_eq!(ids(&CandidateExtractor::extract(text)), vec!["/a/b", "/c/d"]);
    }

    #[test]
    fn test_extract_versioned_identifier() {
        let text = "- Context7-compatible library ID: /vercel/next.js/v14.3.0-canary.87.";
        assert_eq!(
            ids(&CandidateExtractor::extract(text)),
            vec!["/vercel/next.js/v14.3.0-canary.87"]
        );
    }
}
