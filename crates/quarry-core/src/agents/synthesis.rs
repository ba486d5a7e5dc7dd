use std::sync::Arc;
use std::time::Duration;

use quarry_llm::{LlmProvider, Message};
use quarry_tools::excerpt;

use crate::error::StageError;
use crate::intent::{
    ACK_WORDS, FAREWELL_WORDS, GREETING_WORDS, THANKS_WORDS, contains_phrase, normalized_words,
};
use crate::state::TurnState;

/// Returned verbatim whenever there is neither document nor web context.
pub const NOT_FOUND_ANSWER: &str = "I couldn’t find relevant information in the knowledge base.";

const SYSTEM_PROMPT: &str = "You are a helpful assistant that gives clear and concise answers.\n\
Use ONLY the provided context to answer. Focus on the most important information.\n\n\
Rules:\n\
- Never use general or world knowledge.\n\
- If the context does not contain the answer, respond exactly with:\n  \
\"I couldn’t find relevant information in the knowledge base.\"";

const GREETING_REPLIES: &[&str] = &[
    "Hello! How can I help you today?",
    "Hi there! What can I assist you with?",
    "Hello! Feel free to ask me any questions.",
    "Hi! I'm here to help. What would you like to know?",
];

const THANKS_REPLIES: &[&str] = &[
    "You're welcome!",
    "My pleasure!",
    "Happy to help!",
    "Glad I could assist!",
    "Anytime!",
];

const FAREWELL_REPLIES: &[&str] = &[
    "Goodbye! Feel free to ask if you have more questions.",
    "See you! Have a great day!",
    "Bye! Come back anytime you need help.",
    "Take care!",
];

const ACK_REPLIES: &[&str] = &["Great!", "Alright!", "Okay!", "Sure thing!", "Got it!"];

const DEFAULT_REPLIES: &[&str] = &[
    "Hello! How can I help you?",
    "Hi there! What can I do for you?",
    "Hello! I'm here to assist.",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversational {
    Greeting,
    Thanks,
    Farewell,
    Acknowledgment,
    Other,
}

impl Conversational {
    #[must_use]
    pub fn detect(query: &str) -> Self {
        let words = normalized_words(query);
        if contains_phrase(&words, GREETING_WORDS) {
            Self::Greeting
        } else if contains_phrase(&words, THANKS_WORDS) {
            Self::Thanks
        } else if contains_phrase(&words, FAREWELL_WORDS) {
            Self::Farewell
        } else if contains_phrase(&words, ACK_WORDS) {
            Self::Acknowledgment
        } else {
            Self::Other
        }
    }

    fn replies(self) -> &'static [&'static str] {
        match self {
            Self::Greeting => GREETING_REPLIES,
            Self::Thanks => THANKS_REPLIES,
            Self::Farewell => FAREWELL_REPLIES,
            Self::Acknowledgment => ACK_REPLIES,
            Self::Other => DEFAULT_REPLIES,
        }
    }
}

/// Canned reply for a conversational query. The same query always gets the same reply.
#[must_use]
pub fn canned_response(query: &str) -> &'static str {
    let replies = Conversational::detect(query).replies();
    let seed: usize = query.trim().bytes().map(usize::from).sum();
    replies[seed % replies.len()]
}

/// Produces the turn's final answer from the accumulated context only.
pub struct SynthesisAgent<P> {
    llm: Option<Arc<P>>,
    timeout: Duration,
    fallback_context_chars: usize,
}

impl<P> Clone for SynthesisAgent<P> {
    fn clone(&self) -> Self {
        Self {
            llm: self.llm.clone(),
            timeout: self.timeout,
            fallback_context_chars: self.fallback_context_chars,
        }
    }
}

impl<P> std::fmt::Debug for SynthesisAgent<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesisAgent")
            .field("llm", &self.llm.is_some())
            .field("timeout", &self.timeout)
            .field("fallback_context_chars", &self.fallback_context_chars)
            .finish()
    }
}

impl<P: LlmProvider> SynthesisAgent<P> {
    #[must_use]
    pub fn new(llm: Option<Arc<P>>, timeout: Duration, fallback_context_chars: usize) -> Self {
        Self {
            llm,
            timeout,
            fallback_context_chars,
        }
    }

    /// Labelled document and web context, or `None` when both are empty.
    #[must_use]
    pub fn context_block(state: &TurnState) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(doc) = state.document_text() {
            parts.push(format!("Document Context:\n{doc}"));
        }
        if let Some(web) = state.web_text() {
            parts.push(format!("Web Search Results:\n{web}"));
        }
        (!parts.is_empty()).then(|| parts.join("\n\n"))
    }

    /// Deterministic answer quoting the raw context, used when no LLM answer is available.
    #[must_use]
    pub fn fallback_answer(&self, state: &TurnState) -> String {
        match Self::context_block(state) {
            Some(context) => format!(
                "Based on the available information:\n\n{}...",
                excerpt(&context, self.fallback_context_chars)
            ),
            None => NOT_FOUND_ANSWER.to_owned(),
        }
    }

    /// Answer a conversational turn without retrieval or an LLM call.
    pub fn respond_canned(state: &mut TurnState) {
        state.answer = Some(canned_response(state.query()).to_owned());
        state.sources.clear();
        state.note("Synthesis: responded to conversational message");
    }

    /// Set `answer` from the turn's context.
    ///
    /// Without context the answer is [`NOT_FOUND_ANSWER`]; without an LLM it
    /// is [`SynthesisAgent::fallback_answer`].
    ///
    /// # Errors
    ///
    /// The LLM failed, timed out, or answered with nothing. The state is
    /// left unanswered so the caller can pick a fallback.
    pub async fn synthesize(&self, state: &mut TurnState) -> Result<(), StageError> {
        let Some(context) = Self::context_block(state) else {
            state.answer = Some(NOT_FOUND_ANSWER.to_owned());
            state.sources.clear();
            state.note("Synthesis: no context, answered not found");
            return Ok(());
        };

        let Some(llm) = &self.llm else {
            state.answer = Some(self.fallback_answer(state));
            state.note("Synthesis: no LLM configured, quoted raw context");
            return Ok(());
        };

        let messages = [
            Message::system(SYSTEM_PROMPT),
            Message::user(format!(
                "Question: \"{}\"\n\n{context}\n\nAnswer ONLY using the context above. If it is not there, say:\n\"{NOT_FOUND_ANSWER}\"",
                state.query()
            )),
        ];
        let answer = tokio::time::timeout(self.timeout, llm.chat(&messages))
            .await
            .map_err(|_| StageError::Timeout {
                stage: "synthesis",
                seconds: self.timeout.as_secs(),
            })??;
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(StageError::EmptyAnswer);
        }

        state.answer = Some(answer.to_owned());
        state.note(format!("Synthesis: answered from context via {}", llm.name()));
        Ok(())
    }
}
