//! Library-name resolution.
//!
//! Free-text names ("fastapi", "MemMachine", "react router") are ambiguous
//! against the hierarchical identifier namespace of the source service. The
//! [`Resolver`] picks exactly one identifier with a tiered decision:
//!
//! 1. drop low-trust `/websites/` entries when anything else is available
//! 2. a single remaining candidate wins outright
//! 3. several candidates go to the optional [`Arbiter`], whose pick is
//!    re-verified against a normalized exact match
//! 4. otherwise a unique normalized exact match on the trailing segment
//! 5. otherwise the first candidate in source order
//!
//! The arbiter can only improve the result: an unavailable or confused
//! backend yields the same answer as running without one.

mod arbiter;
mod extractor;

pub use arbiter::{Arbiter, FixedArbiter, UnavailableArbiter, Verdict, build_prompt, parse_verdict};
#[cfg(feature = "http")]
pub use arbiter::OpenAiArbiter;
pub use extractor::CandidateExtractor;

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::types::{Candidate, ResolutionMethod, ResolutionResult};

/// Maximum number of candidates shown to an arbiter
pub const MAX_ARBITRATION_CANDIDATES: usize = 15;

/// Case-fold and strip `-` / `_` so "Fast_API" and "fastapi" compare equal.
pub fn normalize(text: &str) -> String {
    text.trim()
        .chars()
        .filter(|c| *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Tiered resolver from free-text names to identifiers.
#[derive(Clone, Default)]
pub struct Resolver {
    arbiter: Option<Arc<dyn Arbiter>>,
}

impl Resolver {
    /// Resolver without an arbitration backend
    pub fn new() -> Self {
        Self { arbiter: None }
    }

    /// Resolver that may consult `arbiter` for ambiguous names
    pub fn with_arbiter(arbiter: Arc<dyn Arbiter>) -> Self {
        Self {
            arbiter: Some(arbiter),
        }
    }

    /// Whether an arbitration backend is attached
    pub fn has_arbiter(&self) -> bool {
        self.arbiter.is_some()
    }

    /// Pick one identifier for `library_name` among `candidates`.
    ///
    /// Never fails: arbitration errors are demoted to the deterministic
    /// rules, and an empty candidate list yields [`ResolutionResult::none`].
    pub async fn resolve(
        &self,
        library_name: &str,
        candidates: &[Candidate],
        allow_arbitration: bool,
    ) -> ResolutionResult {
        let working = working_set(candidates);

        let result = match working.as_slice() {
            [] => ResolutionResult::none(),
            [only] => ResolutionResult::new(&only.identifier, ResolutionMethod::Single),
            _ => {
                let arbitrated = match (&self.arbiter, allow_arbitration) {
                    (Some(arbiter), true) => {
                        self.arbitrate(arbiter.as_ref(), library_name, &working, candidates)
                            .await
                    },
                    _ => None,
                };
                arbitrated.unwrap_or_else(|| deterministic(library_name, &working))
            },
        };

        info!(
            "Resolved '{}' -> '{}' ({})",
            library_name, result.identifier, result.method
        );
        result
    }

    /// Run the arbitration tier. `None` means "fall through to step 4".
    async fn arbitrate(
        &self,
        arbiter: &dyn Arbiter,
        library_name: &str,
        working: &[&Candidate],
        all: &[Candidate],
    ) -> Option<ResolutionResult> {
        let shown: Vec<Candidate> = working
            .iter()
            .take(MAX_ARBITRATION_CANDIDATES)
            .map(|c| (*c).clone())
            .collect();

        let verdict = match arbiter.arbitrate(library_name, &shown).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!("Arbitration for '{}' failed, using fallback: {}", library_name, e);
                return None;
            },
        };

        match verdict {
            Verdict::NoMatch => {
                debug!("Arbiter found no match for '{}'", library_name);
                let all_refs: Vec<&Candidate> = all.iter().collect();
                Some(
                    unique_exact_match(library_name, &all_refs)
                        .map(|c| ResolutionResult::new(&c.identifier, ResolutionMethod::ExactFallback))
                        .unwrap_or_else(|| {
                            ResolutionResult::new(&working[0].identifier, ResolutionMethod::FirstFallback)
                        }),
                )
            },
            Verdict::Pick(index) if (1..=shown.len()).contains(&index) => {
                let picked = &shown[index - 1];
                if normalize(picked.trailing_segment()) == normalize(library_name) {
                    return Some(ResolutionResult::new(
                        &picked.identifier,
                        ResolutionMethod::LlmVerified,
                    ));
                }

                match first_exact_match(library_name, all) {
                    Some(exact) => {
                        info!(
                            "Arbiter picked '{}' for '{}' but '{}' matches exactly",
                            picked.identifier, library_name, exact.identifier
                        );
                        Some(ResolutionResult::new(
                            &exact.identifier,
                            ResolutionMethod::ExactFallback,
                        ))
                    },
                    None => Some(ResolutionResult::new(
                        &picked.identifier,
                        ResolutionMethod::LlmUnverified,
                    )),
                }
            },
            Verdict::Pick(index) => {
                warn!(
                    "Arbiter answered out-of-range index {} of {} for '{}'",
                    index,
                    shown.len(),
                    library_name
                );
                None
            },
        }
    }
}

/// Preferred (non low-trust) candidates, or all of them if none is preferred.
fn working_set(candidates: &[Candidate]) -> Vec<&Candidate> {
    let preferred: Vec<&Candidate> = candidates.iter().filter(|c| !c.is_low_trust()).collect();
    if preferred.is_empty() {
        candidates.iter().collect()
    } else {
        preferred
    }
}

/// The one candidate whose normalized trailing segment equals the normalized name.
fn unique_exact_match<'a>(library_name: &str, candidates: &[&'a Candidate]) -> Option<&'a Candidate> {
    let wanted = normalize(library_name);
    let mut matches = candidates
        .iter()
        .copied()
        .filter(|c| normalize(c.trailing_segment()) == wanted);

    match (matches.next(), matches.next()) {
        (Some(only), None) => Some(only),
        _ => None,
    }
}

/// The first candidate, in source order, whose normalized trailing segment
/// equals the normalized name.
fn first_exact_match<'a>(library_name: &str, candidates: &'a [Candidate]) -> Option<&'a Candidate> {
    let wanted = normalize(library_name);
    candidates
        .iter()
        .find(|c| normalize(c.trailing_segment()) == wanted)
}

/// Steps 4 and 5: unique exact match, else first in source order.
fn deterministic(library_name: &str, working: &[&Candidate]) -> ResolutionResult {
    match unique_exact_match(library_name, working) {
        Some(exact) => ResolutionResult::new(&exact.identifier, ResolutionMethod::ExactFallback),
        None => match working.first() {
            Some(first) => ResolutionResult::new(&first.identifier, ResolutionMethod::FirstFallback),
            None => ResolutionResult::none(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(ids: &[&str]) -> Vec<Candidate> {
        ids.iter().map(|id| Candidate::new(*id)).collect()
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("Fast_API"), "fastapi");
        assert_eq!(normalize("react-router"), "reactrouter");
        assert_eq!(normalize(" MemMachine "), "memmachine");
    }

    #[tokio::test]
    async fn test_empty_candidates_yield_none() {
        let resolver = Resolver::with_arbiter(Arc::new(FixedArbiter::new(1)));
        let result = resolver.resolve("anything", &[], true).await;
        assert_eq!(result, ResolutionResult::none());
    }

    #[tokio::test]
    async fn test_single_candidate_ignores_arbitration_flag() {
        let set = candidates(&["/pallets/flask"]);
        for allow in [true, false] {
            let resolver = Resolver::with_arbiter(Arc::new(FixedArbiter::new(0)));
            let result = resolver.resolve("flask", &set, allow).await;
            assert_eq!(result.identifier, "/pallets/flask");
            assert_eq!(result.method, ResolutionMethod::Single);
        }
    }

    #[tokio::test]
    async fn test_low_trust_entries_dropped_when_preferred_exist() {
        let set = candidates(&["/websites/foo", "/foo/foo"]);
        let result = Resolver::new().resolve("foo", &set, false).await;
        assert_eq!(result.identifier, "/foo/foo");
        assert_eq!(result.method, ResolutionMethod::Single);
    }

    #[tokio::test]
    async fn test_only_low_trust_entries_are_kept() {
        let set = candidates(&["/websites/react_dev", "/websites/legacy_reactjs"]);
        let result = Resolver::new().resolve("vue", &set, false).await;
        assert_eq!(result.identifier, "/websites/react_dev");
        assert_eq!(result.method, ResolutionMethod::FirstFallback);
    }

    #[tokio::test]
    async fn test_exact_fallback_without_arbiter() {
        let set = candidates(&["/tiangolo/fastapi-users", "/fastapi/fastapi"]);
        let result = Resolver::new().resolve("fastapi", &set, true).await;
        assert_eq!(result.identifier, "/fastapi/fastapi");
        assert_eq!(result.method, ResolutionMethod::ExactFallback);
    }

    #[tokio::test]
    async fn test_ambiguous_exact_matches_fall_to_first() {
        let set = candidates(&["/x/other", "/a/fastapi", "/b/fastapi"]);
        let result = Resolver::new().resolve("fastapi", &set, false).await;
        assert_eq!(result.identifier, "/x/other");
        assert_eq!(result.method, ResolutionMethod::FirstFallback);
    }

    #[tokio::test]
    async fn test_arbiter_pick_verified() {
        let set = candidates(&["/someone/memmachine-docs", "/MemMachine/MemMachine"]);
        let resolver = Resolver::with_arbiter(Arc::new(FixedArbiter::new(2)));
        let result = resolver.resolve("MemMachine", &set, true).await;
        assert_eq!(result.identifier, "/MemMachine/MemMachine");
        assert_eq!(result.method, ResolutionMethod::LlmVerified);
    }

    #[tokio::test]
    async fn test_arbiter_pick_overridden_by_exact_match() {
        let set = candidates(&["/fastapi/fastapi", "/tiangolo/fastapi-users"]);
        let resolver = Resolver::with_arbiter(Arc::new(FixedArbiter::new(2)));
        let result = resolver.resolve("fastapi", &set, true).await;
        assert_eq!(result.identifier, "/fastapi/fastapi");
        assert_eq!(result.method, ResolutionMethod::ExactFallback);
    }

    #[tokio::test]
    async fn test_mismatched_pick_overridden_by_first_of_several_exact_matches() {
        let set = candidates(&["/x/other", "/a/fastapi", "/b/fastapi"]);
        let resolver = Resolver::with_arbiter(Arc::new(FixedArbiter::new(1)));
        let result = resolver.resolve("fastapi", &set, true).await;
        assert_eq!(result.identifier, "/a/fastapi");
        assert_eq!(result.method, ResolutionMethod::ExactFallback);
    }

    #[tokio::test]
    async fn test_arbiter_pick_kept_when_nothing_matches() {
        let set = candidates(&["/remix-run/react-router", "/reach/router"]);
        let resolver = Resolver::with_arbiter(Arc::new(FixedArbiter::new(1)));
        let result = resolver.resolve("react router v6", &set, true).await;
        assert_eq!(result.identifier, "/remix-run/react-router");
        assert_eq!(result.method, ResolutionMethod::LlmUnverified);
    }

    #[tokio::test]
    async fn test_arbiter_no_match_searches_full_set() {
        // The exact match only exists among the low-trust entries
        let set = candidates(&["/a/alpha", "/b/beta", "/websites/gamma"]);
        let resolver = Resolver::with_arbiter(Arc::new(FixedArbiter::new(0)));
        let result = resolver.resolve("gamma", &set, true).await;
        assert_eq!(result.identifier, "/websites/gamma");
        assert_eq!(result.method, ResolutionMethod::ExactFallback);

        let result = resolver.resolve("delta", &set, true).await;
        assert_eq!(result.identifier, "/a/alpha");
        assert_eq!(result.method, ResolutionMethod::FirstFallback);
    }

    #[tokio::test]
    async fn test_out_of_range_pick_matches_disabled_arbitration() {
        let set = candidates(&["/tiangolo/fastapi-users", "/fastapi/fastapi"]);
        let disabled = Resolver::new().resolve("fastapi", &set, false).await;

        for arbiter in [
            Arc::new(FixedArbiter::new(7)) as Arc<dyn Arbiter>,
            Arc::new(UnavailableArbiter),
        ] {
            let result = Resolver::with_arbiter(arbiter)
                .resolve("fastapi", &set, true)
                .await;
            assert_eq!(result, disabled);
        }
    }

    #[tokio::test]
    async fn test_arbiter_sees_at_most_fifteen() {
        use crate::errors::Result;
        use async_trait::async_trait;
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct CountingArbiter(AtomicUsize);

        #[async_trait]
        impl Arbiter for CountingArbiter {
            async fn arbitrate(&self, _name: &str, candidates: &[Candidate]) -> Result<Verdict> {
                self.0.store(candidates.len(), Ordering::SeqCst);
                Ok(Verdict::Pick(candidates.len()))
            }
        }

        let ids: Vec<String> = (0..20).map(|i| format!("/org/lib{i}")).collect();
        let set: Vec<Candidate> = ids.iter().map(Candidate::new).collect();
        let arbiter = Arc::new(CountingArbiter(AtomicUsize::new(0)));
        let result = Resolver::with_arbiter(arbiter.clone())
            .resolve("something", &set, true)
            .await;

        assert_eq!(arbiter.0.load(Ordering::SeqCst), MAX_ARBITRATION_CANDIDATES);
        assert_eq!(result.identifier, "/org/lib14");
        assert_eq!(result.method, ResolutionMethod::LlmUnverified);
    }
}
