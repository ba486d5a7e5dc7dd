use std::sync::{Arc, Mutex};

use crate::error::ToolError;
use crate::search::{WebResult, WebSearch};

/// Scripted search engine for tests. Clones share the query log.
#[derive(Debug, Clone, Default)]
pub struct MockWebSearch {
    pub results: Vec<WebResult>,
    pub fail: bool,
    queries: Arc<Mutex<Vec<String>>>,
}

impl MockWebSearch {
    #[must_use]
    pub fn with_results(results: Vec<WebResult>) -> Self {
        Self {
            results,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

impl WebSearch for MockWebSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebResult>, ToolError> {
        self.queries.lock().unwrap().push(query.to_owned());
        if self.fail {
            return Err(ToolError::Status {
                provider: "mock",
                status: 500,
            });
        }
        Ok(self.results.iter().take(max_results).cloned().collect())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
