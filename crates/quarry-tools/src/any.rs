use crate::duckduckgo::DuckDuckGoSearch;
use crate::error::ToolError;
#[cfg(feature = "mock")]
use crate::mock::MockWebSearch;
use crate::search::{WebResult, WebSearch};
use crate::tavily::TavilySearch;

#[derive(Debug, Clone)]
pub enum AnyWebSearch {
    Tavily(TavilySearch),
    DuckDuckGo(DuckDuckGoSearch),
    /// Every search fails with [`ToolError::Disabled`].
    Disabled,
    #[cfg(feature = "mock")]
    Mock(MockWebSearch),
}

impl WebSearch for AnyWebSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebResult>, ToolError> {
        match self {
            Self::Tavily(s) => s.search(query, max_results).await,
            Self::DuckDuckGo(s) => s.search(query, max_results).await,
            Self::Disabled => Err(ToolError::Disabled),
            #[cfg(feature = "mock")]
            Self::Mock(s) => s.search(query, max_results).await,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Tavily(s) => s.name(),
            Self::DuckDuckGo(s) => s.name(),
            Self::Disabled => "disabled",
            #[cfg(feature = "mock")]
            Self::Mock(s) => s.name(),
        }
    }
}
