//! Pipeline stages. Each mutates only its own fields of [`crate::state::TurnState`]
//! and reports failure to the orchestrator instead of recovering on its own.

pub mod retrieval;
pub mod synthesis;
pub mod web_fallback;

pub use retrieval::RetrievalAgent;
pub use synthesis::{NOT_FOUND_ANSWER, SynthesisAgent, canned_response};
pub use web_fallback::WebFallbackAgent;
