/*
    filter.rs - Offensive-term content filter

    Checks user-entered text against a ciphered lexicon. The candidate is
    lowercased and ciphered, then searched for any entry as a substring,
    so padding and punctuation around a term do not hide it.

    Enabling is idempotent. An empty remote lexicon still enables the
    filter (with nothing to match) rather than blocking input.
*/

use super::cipher::Cipher;
use super::errors::FilterResult;
use super::lexicon::{normalize_entries, BUNDLED_LEXICON};
use super::source::LexiconSource;
use crate::metrics::{record_counter, Timer};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info, warn};

/// Where the active lexicon came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexiconOrigin {
    Remote,
    Bundled,
}

#[derive(Debug)]
enum FilterState {
    Disabled,
    Enabled {
        entries: Vec<String>,
        origin: LexiconOrigin,
    },
}

/// Substring filter over a ciphered lexicon
#[derive(Debug)]
pub struct ContentFilter {
    cipher: Cipher,
    state: RwLock<FilterState>,
    /// Checks made while disabled
    unready_checks: AtomicU64,
}

impl Default for ContentFilter {
    fn default() -> Self {
        Self::new(Cipher::default())
    }
}

impl ContentFilter {
    pub fn new(cipher: Cipher) -> Self {
        ContentFilter {
            cipher,
            state: RwLock::new(FilterState::Disabled),
            unready_checks: AtomicU64::new(0),
        }
    }

    pub fn cipher(&self) -> &Cipher {
        &self.cipher
    }

    /// Load the lexicon from `source`. Returns the entry count.
    pub async fn enable(&self, source: &dyn LexiconSource) -> FilterResult<usize> {
        if let Some(count) = self.entry_count() {
            debug!(count, "Content filter already enabled");
            return Ok(count);
        }

        let entries = match source.fetch_entries().await {
            Ok(entries) => normalize_entries(entries),
            Err(e) => {
                error!(error = %e, "Failed to fetch lexicon; filter stays disabled");
                return Err(e.into());
            }
        };

        if entries.is_empty() {
            warn!("Remote lexicon is empty; filter enabled with no entries");
        }

        Ok(self.install(entries, LexiconOrigin::Remote))
    }

    /// Enable with the lexicon compiled into the binary
    pub fn enable_with_bundled(&self) -> usize {
        if let Some(count) = self.entry_count() {
            debug!(count, "Content filter already enabled");
            return count;
        }
        self.install(normalize_entries(BUNDLED_LEXICON), LexiconOrigin::Bundled)
    }

    /// Number of `contains` calls made before the filter was enabled
    pub fn unready_checks(&self) -> u64 {
        self.unready_checks.load(Ordering::Relaxed)
    }

    /// True if `candidate` contains any lexicon term
    pub fn contains(&self, candidate: &str) -> bool {
        let state = self.state.read();
        let entries = match &*state {
            FilterState::Enabled { entries, .. } => entries,
            FilterState::Disabled => {
                error!("Content filter checked before it was enabled");
                self.unready_checks.fetch_add(1, Ordering::Relaxed);
                record_counter("filter.checks.unready", 1);
                return false;
            }
        };

        let timer = Timer::new("filter.check.duration_ms");
        let ciphered = self.cipher.encode(candidate);
        let matched = entries.iter().any(|entry| ciphered.contains(entry.as_str()));
        timer.stop();

        record_counter("filter.checks", 1);
        if matched {
            record_counter("filter.matches", 1);
        }
        matched
    }

    pub fn is_enabled(&self) -> bool {
        matches!(&*self.state.read(), FilterState::Enabled { .. })
    }

    /// Number of active entries, or `None` while disabled
    pub fn entry_count(&self) -> Option<usize> {
        match &*self.state.read() {
            FilterState::Enabled { entries, .. } => Some(entries.len()),
            FilterState::Disabled => None,
        }
    }

    pub fn origin(&self) -> Option<LexiconOrigin> {
        match &*self.state.read() {
            FilterState::Enabled { origin, .. } => Some(*origin),
            FilterState::Disabled => None,
        }
    }

    fn install(&self, entries: Vec<String>, origin: LexiconOrigin) -> usize {
        let mut state = self.state.write();
        if let FilterState::Enabled { entries: existing, .. } = &*state {
            // Lost a race with a concurrent enable
            return existing.len();
        }

        let count = entries.len();
        *state = FilterState::Enabled { entries, origin };
        info!(count, ?origin, "Content filter enabled");
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_filter::errors::FilterError;
    use crate::core_loadable::TransportError;
    use async_trait::async_trait;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedSource {
        result: Result<Vec<String>, TransportError>,
        calls: AtomicUsize,
    }

    impl FixedSource {
        fn new(result: Result<Vec<String>, TransportError>) -> Self {
            FixedSource {
                result,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LexiconSource for FixedSource {
        async fn fetch_entries(&self) -> Result<Vec<String>, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    fn bundled() -> ContentFilter {
        let filter = ContentFilter::default();
        filter.enable_with_bundled();
        filter
    }

    #[test]
    fn test_disabled_filter_never_matches() {
        let filter = ContentFilter::default();
        assert!(!filter.is_enabled());
        assert!(!filter.contains("bozo"));
        assert_eq!(filter.entry_count(), None);
        assert_eq!(filter.unready_checks(), 1);
    }

    #[test]
    fn test_matches_with_padding_and_case() {
        let filter = bundled();
        assert!(filter.contains("bozo"));
        assert!(filter.contains("what a BoZo!!"));
        assert!(filter.contains("xxbozoxx"));
        assert!(!filter.contains("bonzo"));
        assert!(!filter.contains("a friendly note"));
    }

    #[test]
    fn test_truncated_terms_do_not_match() {
        let filter = bundled();
        let cipher = Cipher::default();
        for entry in BUNDLED_LEXICON {
            let plain = cipher.decode(entry);
            let truncated = &plain[..plain.len() - 1];
            assert!(!filter.contains(truncated), "{} should not match", truncated);
        }
    }

    #[tokio::test]
    async fn test_enable_is_idempotent() {
        let filter = ContentFilter::default();
        let source = FixedSource::new(Ok(vec!["ylal".to_string()]));

        assert_eq!(filter.enable(&source).await.unwrap(), 1);
        assert_eq!(filter.enable(&source).await.unwrap(), 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(filter.origin(), Some(LexiconOrigin::Remote));
    }

    #[tokio::test]
    async fn test_empty_lexicon_fails_open() {
        let filter = ContentFilter::default();
        let source = FixedSource::new(Ok(vec![]));

        assert_eq!(filter.enable(&source).await.unwrap(), 0);
        assert!(filter.is_enabled());
        assert!(!filter.contains("bozo"));
    }

    #[tokio::test]
    async fn test_source_error_leaves_filter_disabled() {
        let filter = ContentFilter::default();
        let source = FixedSource::new(Err(TransportError::Unavailable("offline".to_string())));

        let err = filter.enable(&source).await.unwrap_err();
        assert!(matches!(err, FilterError::Source(_)));
        assert!(!filter.is_enabled());

        // Bundled fallback still works afterwards
        assert!(filter.enable_with_bundled() > 0);
    }

    #[tokio::test]
    async fn test_bundled_then_remote_keeps_bundled() {
        let filter = bundled();
        let source = FixedSource::new(Ok(vec!["abc".to_string()]));

        let count = filter.enable(&source).await.unwrap();
        assert_eq!(count, BUNDLED_LEXICON.len());
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    proptest! {
        #[test]
        fn prop_padded_term_matches(
            prefix in "[a-z0-9 ]{0,12}",
            suffix in "[a-z0-9 ]{0,12}",
            index in 0usize..12,
        ) {
            let filter = bundled();
            let plain = Cipher::default().decode(BUNDLED_LEXICON[index % BUNDLED_LEXICON.len()]);
            let candidate = format!("{}{}{}", prefix, plain.to_uppercase(), suffix);
            prop_assert!(filter.contains(&candidate));
        }
    }
}
