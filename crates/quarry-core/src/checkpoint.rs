use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::orchestrator::Node;
use crate::state::TurnState;

/// Turn state as of the last completed node, with the node that runs next.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub next: Node,
    pub state: TurnState,
}

/// Per-chat snapshot of the most recent turn.
pub trait Checkpointer: Send + Sync {
    fn save(&self, state: &TurnState, next: Node);

    fn load(&self, chat_id: &str) -> Option<Checkpoint>;

    /// Returns `true` if a checkpoint was removed.
    fn clear(&self, chat_id: &str) -> bool;
}

/// Process-local checkpoints; lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointer {
    checkpoints: Mutex<HashMap<String, Checkpoint>>,
}

impl InMemoryCheckpointer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Checkpointer for InMemoryCheckpointer {
    fn save(&self, state: &TurnState, next: Node) {
        let checkpoint = Checkpoint {
            next,
            state: state.clone(),
        };
        self.checkpoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(state.chat_id.clone(), checkpoint);
    }

    fn load(&self, chat_id: &str) -> Option<Checkpoint> {
        self.checkpoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(chat_id)
            .cloned()
    }

    fn clear(&self, chat_id: &str) -> bool {
        self.checkpoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(chat_id)
            .is_some()
    }
}
