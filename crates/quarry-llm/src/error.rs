/// Failure of a chat or embedding call against an LLM backend.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed response body: {0}")]
    Json(#[from] serde_json::Error),

    /// Every retry after a 429 was used up.
    #[error("rate limited")]
    RateLimited,

    /// The backend is configured but could not be reached.
    #[error("LLM backend unavailable")]
    Unavailable,

    #[error("{provider} returned status {status}")]
    Status { provider: &'static str, status: u16 },

    #[error("{provider} returned no content")]
    EmptyResponse { provider: &'static str },

    #[error("{provider} has no embedding model configured")]
    EmbedUnsupported { provider: &'static str },

    #[error("{0}")]
    Other(String),
}
