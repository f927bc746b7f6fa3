//! Unique slug assignment.
//!
//! A title is normalised into a URL-safe base candidate, then the store is
//! probed for `base`, `base-1`, `base-2`, ... until a free one turns up.
//! Every probe goes through the [`RetryExecutor`].
//!
//! Two callers creating the same title at the same time can both pick the
//! same candidate. This module does not guard against that; the store's
//! unique constraint is the final word and the caller re-runs assignment on
//! a conflict.

use std::fmt;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::classify::Classify;
use crate::retry::{Connector, RetryExecutor};

/// Highest numeric suffix tried before giving up.
pub const MAX_SUFFIX_PROBES: u32 = 5_000;

static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9-]+$").expect("invalid slug regex"));

/// Whether `s` is a well-formed slug (`^[a-z0-9-]+$`).
pub fn is_valid_slug(s: &str) -> bool {
    SLUG_RE.is_match(s)
}

/// Normalise free text into a slug: transliterate to ASCII, lowercase,
/// collapse everything outside `[a-z0-9]` into single hyphens and trim them
/// from both ends. May return an empty string.
pub fn slugify(title: &str) -> String {
    ::slug::slugify(title)
}

/// Point lookup against the records that own slugs.
#[async_trait]
pub trait SlugLookup: Send + Sync {
    type Error: Classify + fmt::Display + Send;

    /// Whether some record already uses `slug`.
    async fn slug_taken(&self, slug: &str) -> Result<bool, Self::Error>;
}

#[derive(Debug, Error)]
pub enum SlugError<E> {
    /// The lookup failed (after retries, if it was transient).
    #[error("slug lookup failed: {0}")]
    Store(E),

    /// The title contains nothing that survives normalisation.
    #[error("title {title:?} does not produce a usable slug")]
    EmptyCandidate { title: String },

    /// Every suffix up to the cap is taken.
    #[error("no free slug for {base:?} after {probes} suffixes")]
    Exhausted { base: String, probes: u32 },
}

impl<E> SlugError<E> {
    /// The underlying store error, if that is what failed.
    pub fn into_store(self) -> Option<E> {
        match self {
            SlugError::Store(err) => Some(err),
            _ => None,
        }
    }
}

/// Derives store-unique slugs.
pub struct SlugAssigner<'a, L, C> {
    lookup: &'a L,
    executor: &'a RetryExecutor<C>,
    max_probes: u32,
}

impl<'a, L, C> SlugAssigner<'a, L, C>
where
    L: SlugLookup,
    C: Connector,
{
    pub fn new(lookup: &'a L, executor: &'a RetryExecutor<C>) -> Self {
        Self {
            lookup,
            executor,
            max_probes: MAX_SUFFIX_PROBES,
        }
    }

    pub fn with_max_probes(mut self, max_probes: u32) -> Self {
        self.max_probes = max_probes;
        self
    }

    /// Assign a slug for `title`.
    ///
    /// `existing` is the slug the record already owns (updates). A candidate
    /// equal to it is returned without probing, since the only record holding
    /// it is the one being updated.
    pub async fn assign(
        &self,
        title: &str,
        existing: Option<&str>,
    ) -> Result<String, SlugError<L::Error>> {
        let base = slugify(title);
        if base.is_empty() {
            return Err(SlugError::EmptyCandidate {
                title: title.to_owned(),
            });
        }

        if self.is_free(&base, existing).await? {
            return Ok(base);
        }

        for counter in 1..=self.max_probes {
            let candidate = format!("{base}-{counter}");
            if self.is_free(&candidate, existing).await? {
                debug!(base = %base, slug = %candidate, "slug taken, using suffix");
                return Ok(candidate);
            }
        }

        Err(SlugError::Exhausted {
            base,
            probes: self.max_probes,
        })
    }

    async fn is_free(
        &self,
        candidate: &str,
        existing: Option<&str>,
    ) -> Result<bool, SlugError<L::Error>> {
        if existing == Some(candidate) {
            return Ok(true);
        }

        let lookup = self.lookup;
        let taken = self
            .executor
            .execute(move || lookup.slug_taken(candidate))
            .await
            .map_err(SlugError::Store)?;
        Ok(!taken)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::classify::{classify_signature, RetryClass};
    use crate::retry::NoReconnect;

    #[derive(Debug, Clone, PartialEq)]
    struct LookupError(&'static str);

    impl fmt::Display for LookupError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.0)
        }
    }

    impl Classify for LookupError {
        fn retry_class(&self) -> RetryClass {
            classify_signature(None, self.0)
        }
    }

    /// In-memory slug table with a probe log.
    #[derive(Default)]
    struct MemoryStore {
        taken: HashSet<String>,
        probes: Mutex<Vec<String>>,
        calls: AtomicU32,
        /// Number of leading calls that fail with `failure`.
        failing_calls: u32,
        failure: Option<LookupError>,
    }

    impl MemoryStore {
        fn with(slugs: &[&str]) -> Self {
            Self {
                taken: slugs.iter().map(|s| s.to_string()).collect(),
                ..Self::default()
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }

        fn probes(&self) -> Vec<String> {
            self.probes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SlugLookup for MemoryStore {
        type Error = LookupError;

        async fn slug_taken(&self, slug: &str) -> Result<bool, LookupError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(failure) = &self.failure {
                if n < self.failing_calls {
                    return Err(failure.clone());
                }
            }
            self.probes.lock().unwrap().push(slug.to_owned());
            Ok(self.taken.contains(slug))
        }
    }

    #[test]
    fn slugify_normalises_titles() {
        assert_eq!(slugify("Hello World!"), "hello-world");
        assert_eq!(slugify("  Rust -- and   SQL  "), "rust-and-sql");
        assert_eq!(slugify("Crème Brûlée"), "creme-brulee");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn slug_validation() {
        assert!(is_valid_slug("hello-world-2"));
        assert!(!is_valid_slug("Hello"));
        assert!(!is_valid_slug("hello world"));
        assert!(!is_valid_slug(""));
    }

    #[tokio::test]
    async fn free_base_is_used() {
        let store = MemoryStore::default();
        let executor = RetryExecutor::new(NoReconnect);

        let slug = SlugAssigner::new(&store, &executor)
            .assign("Hello World!", None)
            .await
            .unwrap();

        assert_eq!(slug, "hello-world");
        assert_eq!(store.probes(), vec!["hello-world"]);
    }

    #[tokio::test]
    async fn first_free_suffix_wins() {
        let store = MemoryStore::with(&["hello-world", "hello-world-1", "hello-world-3"]);
        let executor = RetryExecutor::new(NoReconnect);

        let slug = SlugAssigner::new(&store, &executor)
            .assign("Hello World!", None)
            .await
            .unwrap();

        assert_eq!(slug, "hello-world-2");
        assert_eq!(
            store.probes(),
            vec!["hello-world", "hello-world-1", "hello-world-2"]
        );
    }

    #[tokio::test]
    async fn unchanged_slug_skips_the_store() {
        let store = MemoryStore::with(&["my-post"]);
        let executor = RetryExecutor::new(NoReconnect);

        let slug = SlugAssigner::new(&store, &executor)
            .assign("My Post", Some("my-post"))
            .await
            .unwrap();

        assert_eq!(slug, "my-post");
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn own_suffixed_slug_is_kept() {
        let store = MemoryStore::with(&["my-post", "my-post-1"]);
        let executor = RetryExecutor::new(NoReconnect);

        let slug = SlugAssigner::new(&store, &executor)
            .assign("My Post", Some("my-post-1"))
            .await
            .unwrap();

        assert_eq!(slug, "my-post-1");
        assert_eq!(store.probes(), vec!["my-post"]);
    }

    #[tokio::test]
    async fn same_state_gives_same_probe_sequence() {
        let store = MemoryStore::with(&["release-notes", "release-notes-1"]);
        let executor = RetryExecutor::new(NoReconnect);
        let assigner = SlugAssigner::new(&store, &executor);

        let first = assigner.assign("Release Notes", None).await.unwrap();
        let first_probes = store.probes();
        store.probes.lock().unwrap().clear();
        let second = assigner.assign("Release Notes", None).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first_probes, store.probes());
    }

    #[tokio::test]
    async fn empty_candidate_is_rejected_without_probing() {
        let store = MemoryStore::default();
        let executor = RetryExecutor::new(NoReconnect);

        let err = SlugAssigner::new(&store, &executor)
            .assign("???", None)
            .await
            .unwrap_err();

        assert!(matches!(err, SlugError::EmptyCandidate { .. }));
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn probe_cap_is_enforced() {
        let store = MemoryStore::with(&["busy", "busy-1", "busy-2", "busy-3"]);
        let executor = RetryExecutor::new(NoReconnect);

        let err = SlugAssigner::new(&store, &executor)
            .with_max_probes(3)
            .assign("Busy", None)
            .await
            .unwrap_err();

        match err {
            SlugError::Exhausted { base, probes } => {
                assert_eq!(base, "busy");
                assert_eq!(probes, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_lookup_failures_are_retried() {
        let store = MemoryStore {
            failing_calls: 1,
            failure: Some(LookupError("Connection terminated unexpectedly")),
            ..MemoryStore::default()
        };
        let executor = RetryExecutor::new(NoReconnect);

        let slug = SlugAssigner::new(&store, &executor)
            .assign("Flaky Network", None)
            .await
            .unwrap();

        assert_eq!(slug, "flaky-network");
        assert_eq!(store.calls(), 2);
    }

    #[tokio::test]
    async fn permanent_lookup_failure_propagates_unchanged() {
        let store = MemoryStore {
            failing_calls: u32::MAX,
            failure: Some(LookupError("permission denied for table blogs")),
            ..MemoryStore::default()
        };
        let executor = RetryExecutor::new(NoReconnect);

        let err = SlugAssigner::new(&store, &executor)
            .assign("Locked Out", None)
            .await
            .unwrap_err();

        assert_eq!(
            err.into_store(),
            Some(LookupError("permission denied for table blogs"))
        );
        assert_eq!(store.calls(), 1);
    }
}
