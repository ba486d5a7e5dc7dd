use std::time::Duration;

use url::Url;

use crate::error::ToolError;
use crate::search::{WebResult, WebSearch};

pub const DEFAULT_DUCKDUCKGO_URL: &str = "https://html.duckduckgo.com";

const PROVIDER: &str = "duckduckgo";

/// Keyless search through DuckDuckGo's HTML endpoint.
#[derive(Debug, Clone)]
pub struct DuckDuckGoSearch {
    client: reqwest::Client,
    base_url: String,
}

impl DuckDuckGoSearch {
    #[must_use]
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: crate::http::client(timeout),
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }
}

impl WebSearch for DuckDuckGoSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebResult>, ToolError> {
        let url = Url::parse_with_params(&format!("{}/html/", self.base_url), &[("q", query)])?;
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Status {
                provider: PROVIDER,
                status: status.as_u16(),
            });
        }

        let html = response.text().await?;
        let results = tokio::task::spawn_blocking(move || parse_results(&html, max_results))
            .await
            .map_err(|e| ToolError::Parse {
                provider: PROVIDER,
                message: e.to_string(),
            })??;
        tracing::debug!(results = results.len(), "duckduckgo search");
        Ok(results)
    }

    fn name(&self) -> &'static str {
        PROVIDER
    }
}

fn parse_results(html: &str, max_results: usize) -> Result<Vec<WebResult>, ToolError> {
    let soup = scrape_core::Soup::parse(html);
    let invalid = |e: &dyn std::fmt::Display| ToolError::Parse {
        provider: PROVIDER,
        message: format!("invalid selector: {e}"),
    };
    let links = soup.find_all("a.result__a").map_err(|e| invalid(&e))?;
    let snippets: Vec<String> = soup
        .find_all(".result__snippet")
        .map_err(|e| invalid(&e))?
        .into_iter()
        .map(|s| s.text().trim().to_owned())
        .collect();

    let mut results = Vec::new();
    for (i, link) in links.into_iter().enumerate() {
        if results.len() >= max_results {
            break;
        }
        let title = link.text().trim().to_owned();
        let url = resolve_href(link.get("href").unwrap_or_default());
        if title.is_empty() || url.is_empty() {
            continue;
        }
        let content = snippets.get(i).cloned().unwrap_or_default();
        results.push(WebResult {
            title,
            url,
            content,
        });
    }
    Ok(results)
}

/// Result links are redirects carrying the target in the `uddg` parameter.
fn resolve_href(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_owned()
    };
    Url::parse(&absolute)
        .ok()
        .and_then(|u| {
            u.query_pairs()
                .find(|(k, _)| k == "uddg")
                .map(|(_, v)| v.into_owned())
        })
        .unwrap_or(absolute)
}
