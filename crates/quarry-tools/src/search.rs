use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// One hit from an external search engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebResult {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub content: String,
}

pub trait WebSearch: Send + Sync {
    /// Search the web for `query`, returning at most `max_results` hits.
    ///
    /// # Errors
    ///
    /// Transport, HTTP status, parsing, or configuration failures.
    fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> impl Future<Output = Result<Vec<WebResult>, ToolError>> + Send;

    fn name(&self) -> &'static str;
}
