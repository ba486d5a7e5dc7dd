#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("embedding capability is not configured")]
    EmbeddingUnavailable,

    #[error("embedding timed out after {seconds}s")]
    EmbeddingTimeout { seconds: u64 },

    #[error("{texts} texts but {ids} ids supplied")]
    LengthMismatch { texts: usize, ids: usize },

    #[error("embedding has {actual} dimensions, domain expects {expected}")]
    DimensionMismatch { expected: u64, actual: u64 },

    #[error("invalid domain id: {0}")]
    InvalidDomain(String),

    #[error("database error: {0}")]
    Sqlite(#[from] sqlx::Error),

    #[error("vector store error: {0}")]
    VectorStore(#[from] crate::vector_store::VectorStoreError),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("LLM error: {0}")]
    Llm(#[from] quarry_llm::LlmError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}
