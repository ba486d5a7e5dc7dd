use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ToolError;
use crate::search::{WebResult, WebSearch};

pub const DEFAULT_TAVILY_URL: &str = "https://api.tavily.com";

const PROVIDER: &str = "tavily";

/// Tavily search API client. The API key travels in the JSON body.
#[derive(Clone)]
pub struct TavilySearch {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl std::fmt::Debug for TavilySearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TavilySearch")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'a str,
    max_results: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<WebResult>,
}

impl TavilySearch {
    #[must_use]
    pub fn new(api_key: Option<String>, base_url: &str, timeout: Duration) -> Self {
        Self {
            client: crate::http::client(timeout),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    #[must_use]
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

impl WebSearch for TavilySearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebResult>, ToolError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ToolError::MissingApiKey { provider: PROVIDER })?;

        let body = SearchRequest {
            api_key,
            query,
            search_depth: "advanced",
            max_results,
        };
        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Status {
                provider: PROVIDER,
                status: status.as_u16(),
            });
        }

        let parsed: SearchResponse = response.json().await.map_err(|e| ToolError::Parse {
            provider: PROVIDER,
            message: e.to_string(),
        })?;
        let mut results = parsed.results;
        results.truncate(max_results);
        tracing::debug!(results = results.len(), "tavily search");
        Ok(results)
    }

    fn name(&self) -> &'static str {
        PROVIDER
    }
}
