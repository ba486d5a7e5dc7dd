use serde::{Deserialize, Serialize};

use crate::intent::Intent;

/// One conversational turn's record, owned by the orchestrator and lent
/// mutably to one stage at a time.
///
/// Mutation rights: the coordinator sets `intent`, retrieval sets
/// `document_context`, `sources` and `document_found`, web fallback sets
/// `search_results`, and synthesis (or the canned branch) sets `answer`.
/// Every stage may append to `reasoning_chain`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnState {
    query: String,
    pub domain: String,
    pub chat_id: String,
    pub previous_context: Option<String>,
    pub intent: Option<Intent>,
    pub document_context: Option<String>,
    pub search_results: Option<String>,
    pub answer: Option<String>,
    pub sources: Vec<String>,
    pub reasoning_chain: Vec<String>,
    pub document_found: bool,
}

impl TurnState {
    #[must_use]
    pub fn new(query: impl Into<String>, domain: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            domain: domain.into(),
            chat_id: chat_id.into(),
            previous_context: None,
            intent: None,
            document_context: None,
            search_results: None,
            answer: None,
            sources: Vec::new(),
            reasoning_chain: Vec::new(),
            document_found: false,
        }
    }

    #[must_use]
    pub fn with_previous_context(mut self, context: Option<String>) -> Self {
        self.previous_context = context.filter(|c| !c.trim().is_empty());
        self
    }

    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn note(&mut self, entry: impl Into<String>) {
        self.reasoning_chain.push(entry.into());
    }

    /// A non-empty answer ends the turn.
    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.answer.as_deref().is_some_and(|a| !a.is_empty())
    }

    /// Document context, if any survived trimming.
    #[must_use]
    pub fn document_text(&self) -> Option<&str> {
        self.document_context
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    #[must_use]
    pub fn web_text(&self) -> Option<&str> {
        self.search_results
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    #[must_use]
    pub fn into_outcome(self) -> TurnOutcome {
        TurnOutcome {
            chat_id: self.chat_id,
            answer: self.answer.unwrap_or_default(),
            sources: self.sources,
            reasoning_chain: self.reasoning_chain,
        }
    }
}

/// What a turn hands back to its caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub chat_id: String,
    pub answer: String,
    pub sources: Vec<String>,
    pub reasoning_chain: Vec<String>,
}
