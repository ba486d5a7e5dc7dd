use std::sync::Arc;

use quarry_llm::{LlmProvider, Role};
use quarry_memory::{MemoryError, SessionSummary, TranscriptEntry, TranscriptStore};
use quarry_tools::WebSearch;
use serde::{Deserialize, Serialize};

use crate::error::StageError;
use crate::orchestrator::{Orchestrator, TurnRequest};
use crate::state::TurnOutcome;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    #[serde(default)]
    pub domain: Option<String>,
    /// A new chat id is generated when absent.
    #[serde(default)]
    pub chat_id: Option<String>,
}

/// Render transcript entries as `User: …`/`Assistant: …` lines.
#[must_use]
pub fn render_history(entries: &[TranscriptEntry]) -> String {
    entries
        .iter()
        .filter_map(|e| match e.role {
            Role::User => Some(format!("User: {}", e.text)),
            Role::Assistant => Some(format!("Assistant: {}", e.text)),
            Role::System => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Runs turns against a transcript so follow-up questions see the conversation.
pub struct ChatService<P, W> {
    orchestrator: Arc<Orchestrator<P, W>>,
    transcripts: Arc<dyn TranscriptStore>,
    history_limit: u32,
}

impl<P, W> Clone for ChatService<P, W> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: Arc::clone(&self.orchestrator),
            transcripts: Arc::clone(&self.transcripts),
            history_limit: self.history_limit,
        }
    }
}

impl<P, W> ChatService<P, W>
where
    P: LlmProvider + 'static,
    W: WebSearch + 'static,
{
    #[must_use]
    pub fn new(
        orchestrator: Arc<Orchestrator<P, W>>,
        transcripts: Arc<dyn TranscriptStore>,
        history_limit: u32,
    ) -> Self {
        Self {
            orchestrator,
            transcripts,
            history_limit,
        }
    }

    /// Answer one message and record both sides of the exchange.
    ///
    /// Transcript failures are logged and never fail the turn.
    ///
    /// # Errors
    ///
    /// `StageError::Join` if the turn task panicked.
    pub async fn handle(&self, request: ChatRequest) -> Result<TurnOutcome, StageError> {
        let chat_id = request
            .chat_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let previous_context = match self.transcripts.recent(&chat_id, self.history_limit).await {
            Ok(entries) => Some(render_history(&entries)),
            Err(e) => {
                tracing::warn!(chat_id = %chat_id, error = %e, "failed to load chat history");
                None
            }
        };

        self.record(&chat_id, Role::User, &request.query).await;

        let orchestrator = Arc::clone(&self.orchestrator);
        let turn = TurnRequest {
            query: request.query,
            domain: request.domain,
            chat_id: chat_id.clone(),
            previous_context,
        };
        let outcome = tokio::spawn(async move { orchestrator.run_turn(turn).await }).await?;

        self.record(&chat_id, Role::Assistant, &outcome.answer).await;
        Ok(outcome)
    }

    async fn record(&self, chat_id: &str, role: Role, text: &str) {
        if let Err(e) = self.transcripts.append(chat_id, role, text).await {
            tracing::warn!(chat_id, role = role.as_str(), error = %e, "failed to save chat message");
        }
    }

    /// Every chat, most recently active first.
    ///
    /// # Errors
    ///
    /// Transcript store failures.
    pub async fn sessions(&self) -> Result<Vec<SessionSummary>, MemoryError> {
        self.transcripts.sessions().await
    }

    /// # Errors
    ///
    /// Transcript store failures.
    pub async fn history(&self, chat_id: &str) -> Result<Vec<TranscriptEntry>, MemoryError> {
        self.transcripts.history(chat_id).await
    }

    /// Delete a chat's transcript and checkpoint. Returns the number of messages removed.
    ///
    /// # Errors
    ///
    /// Transcript store failures.
    pub async fn delete_session(&self, chat_id: &str) -> Result<u64, MemoryError> {
        let removed = self.transcripts.delete_session(chat_id).await?;
        self.orchestrator.checkpointer().clear(chat_id);
        tracing::info!(chat_id, removed, "deleted chat session");
        Ok(removed)
    }
}
