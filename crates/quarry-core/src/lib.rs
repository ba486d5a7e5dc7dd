//! Turn orchestration, intent classification, agents, and configuration.
//!
//! A turn flows `Coordinator -> Retrieval -> (WebFallback) -> Synthesis`
//! through [`Orchestrator`]; [`ChatService`] wraps it with a persisted
//! transcript so follow-ups can refer back to earlier answers.

pub mod agents;
pub mod bootstrap;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod intent;
pub mod orchestrator;
pub mod session;
pub mod state;

pub use agents::{NOT_FOUND_ANSWER, RetrievalAgent, SynthesisAgent, WebFallbackAgent};
pub use checkpoint::{Checkpoint, Checkpointer, InMemoryCheckpointer};
pub use config::Config;
pub use error::StageError;
pub use intent::{Intent, IntentClassifier};
pub use orchestrator::{Node, Orchestrator, TurnRequest};
pub use session::{ChatRequest, ChatService};
pub use state::{TurnOutcome, TurnState};
