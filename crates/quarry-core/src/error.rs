use quarry_llm::LlmError;
use quarry_memory::MemoryError;
use quarry_tools::ToolError;

/// Failure of a single pipeline stage.
///
/// Stages return these to the orchestrator, which alone decides whether a
/// failure degrades the turn or is recorded and skipped.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("web search error: {0}")]
    Tool(#[from] ToolError),

    #[error("{stage} timed out after {seconds}s")]
    Timeout { stage: &'static str, seconds: u64 },

    #[error("turn task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("LLM returned an empty answer")]
    EmptyAnswer,
}
