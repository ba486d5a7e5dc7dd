use quarry_tools::{WebSearch, format_digest};

use crate::error::StageError;
use crate::intent::{contains_phrase, normalized_words};
use crate::state::TurnState;

const TIME_SENSITIVE_WORDS: &[&str] = &[
    "current", "recent", "latest", "news", "today", "2024", "2025", "weather", "stock", "price",
    "now",
];

/// Whether a query asks about something that changes over time.
#[must_use]
pub fn is_time_sensitive(query: &str) -> bool {
    contains_phrase(&normalized_words(query), TIME_SENSITIVE_WORDS)
}

/// Open web search used when the knowledge base had nothing.
#[derive(Debug, Clone)]
pub struct WebFallbackAgent<W> {
    search: W,
    max_results: usize,
    excerpt_chars: usize,
    freshness_gate: bool,
}

impl<W: WebSearch> WebFallbackAgent<W> {
    #[must_use]
    pub fn new(search: W, max_results: usize, excerpt_chars: usize) -> Self {
        Self {
            search,
            max_results,
            excerpt_chars,
            freshness_gate: false,
        }
    }

    /// Only search for time-sensitive queries.
    #[must_use]
    pub fn with_freshness_gate(mut self, enabled: bool) -> Self {
        self.freshness_gate = enabled;
        self
    }

    #[must_use]
    pub fn admits(&self, query: &str) -> bool {
        !self.freshness_gate || is_time_sensitive(query)
    }

    /// Search the web and store the result digest in `search_results`.
    ///
    /// # Errors
    ///
    /// The search failed on both the primary and the alternate path. The
    /// state is left untouched.
    pub async fn fallback_search(&self, state: &mut TurnState) -> Result<(), StageError> {
        let results = self.search.search(state.query(), self.max_results).await?;
        let digest = format_digest(&results, self.excerpt_chars);
        state.note(format!(
            "Web Fallback: {} results via {}",
            results.len(),
            self.search.name()
        ));
        tracing::info!(
            provider = self.search.name(),
            results = results.len(),
            "web fallback complete"
        );
        state.search_results = Some(digest);
        Ok(())
    }
}
