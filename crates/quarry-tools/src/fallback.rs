use crate::error::ToolError;
use crate::search::{WebResult, WebSearch};

/// A primary search path with an optional alternate tried once when the
/// primary fails.
///
/// An empty but successful primary result is returned as-is; only errors
/// trigger the alternate.
#[derive(Debug, Clone)]
pub struct FallbackSearch<P, A> {
    primary: P,
    alternate: Option<A>,
}

impl<P: WebSearch, A: WebSearch> FallbackSearch<P, A> {
    #[must_use]
    pub fn new(primary: P, alternate: Option<A>) -> Self {
        Self { primary, alternate }
    }
}

impl<P: WebSearch, A: WebSearch> WebSearch for FallbackSearch<P, A> {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebResult>, ToolError> {
        let primary_err = match self.primary.search(query, max_results).await {
            Ok(results) => return Ok(results),
            Err(e) => e,
        };
        let Some(alternate) = &self.alternate else {
            return Err(primary_err);
        };
        tracing::warn!(
            primary = self.primary.name(),
            alternate = alternate.name(),
            error = %primary_err,
            "web search failed, retrying via alternate"
        );
        alternate.search(query, max_results).await
    }

    fn name(&self) -> &'static str {
        self.primary.name()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Scripted {
        name: &'static str,
        results: Option<Vec<WebResult>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn ok(name: &'static str, titles: &[&str]) -> Self {
            Self {
                name,
                results: Some(
                    titles
                        .iter()
                        .map(|t| WebResult {
                            title: (*t).into(),
                            url: format!("https://{t}.example"),
                            content: String::new(),
                        })
                        .collect(),
                ),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(name: &'static str) -> Self {
            Self {
                name,
                results: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl WebSearch for Scripted {
        async fn search(&self, _query: &str, _max: usize) -> Result<Vec<WebResult>, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.results.clone().ok_or(ToolError::Status {
                provider: self.name,
                status: 500,
            })
        }

        fn name(&self) -> &'static str {
            self.name
        }
    }

    #[tokio::test]
    async fn primary_success_skips_alternate() {
        let search = FallbackSearch::new(Scripted::ok("p", &["a"]), Some(Scripted::ok("alt", &["b"])));
        let results = search.search("q", 5).await.unwrap();
        assert_eq!(results[0].title, "a");
        assert_eq!(search.alternate.as_ref().unwrap().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn primary_failure_uses_alternate_once() {
        let search = FallbackSearch::new(Scripted::failing("p"), Some(Scripted::ok("alt", &["b"])));
        let results = search.search("q", 5).await.unwrap();
        assert_eq!(results[0].title, "b");
        assert_eq!(search.primary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(search.alternate.as_ref().unwrap().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn both_failing_returns_alternate_error() {
        let search = FallbackSearch::new(Scripted::failing("p"), Some(Scripted::failing("alt")));
        let err = search.search("q", 5).await.unwrap_err();
        assert!(matches!(err, ToolError::Status { provider: "alt", .. }));
    }

    #[tokio::test]
    async fn no_alternate_returns_primary_error() {
        let search: FallbackSearch<Scripted, Scripted> = FallbackSearch::new(Scripted::failing("p"), None);
        let err = search.search("q", 5).await.unwrap_err();
        assert!(matches!(err, ToolError::Status { provider: "p", .. }));
    }
}
