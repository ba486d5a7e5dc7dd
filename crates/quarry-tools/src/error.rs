#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} returned HTTP {status}")]
    Status { provider: &'static str, status: u16 },

    #[error("{provider} requires an API key")]
    MissingApiKey { provider: &'static str },

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("failed to parse {provider} response: {message}")]
    Parse {
        provider: &'static str,
        message: String,
    },

    #[error("web search is disabled")]
    Disabled,
}
