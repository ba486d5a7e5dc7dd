//! Query intent classification.
//!
//! Layered: a vague query borrows the conversation's subject, shallow
//! linguistic signals are extracted, an LLM picks the label with those signals
//! as evidence, and keyword lists decide whenever the LLM is unavailable or
//! fails. [`IntentClassifier::classify`] always returns a label.

use std::fmt;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use quarry_llm::LlmProvider;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::StageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Intent {
    /// Informational query answered from the knowledge base.
    Document,
    /// Greeting, thanks, farewell or acknowledgment.
    Greeting,
    /// No clear intent; routed like `Document`.
    None,
}

impl Intent {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Document => "DOCUMENT",
            Self::Greeting => "GREETING",
            Self::None => "NONE",
        }
    }

    /// Parse a classifier label. Anything outside the label set is `None`.
    #[must_use]
    pub fn parse_label(raw: &str) -> Self {
        let label = raw
            .trim()
            .trim_matches(|c: char| !c.is_ascii_alphabetic())
            .to_ascii_uppercase();
        match label.as_str() {
            "DOCUMENT" => Self::Document,
            "GREETING" => Self::Greeting,
            _ => Self::None,
        }
    }

    #[must_use]
    pub fn is_conversational(self) -> bool {
        self == Self::Greeting
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static VAGUE_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(there|that place|that city|this place|it|its|their|they|those|what about|tell me about|places there|things there|attractions there|sites there|visit there)\b",
    )
    .expect("vague reference regex is valid")
});

static DOCUMENT_QUESTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(what\s+(are|is)\s+|tell\s+me\s+about|how\s+(many|much|does|do|can)\s+|famous\s+\w+\s+in|places\s+in|things\s+to\s+do|attractions\s+in|sites\s+in|(best|popular|interesting)\s+\w+\s+in)",
    )
    .expect("document question regex is valid")
});

const DOCUMENT_KEYWORDS: &[&str] = &[
    "policy",
    "procedure",
    "document",
    "manual",
    "guide",
    "regulation",
    "specification",
    "requirement",
    "standard",
    "report",
    "analysis",
    "data",
    "information",
    "details",
    "explain",
    "what is",
    "how does",
    "definition",
    "overview",
    "summary",
    "places",
    "attractions",
    "sites",
    "things to do",
    "visit",
    "famous",
    "popular",
    "best",
    "top",
    "interesting",
    "culture",
    "history",
    "food",
    "restaurants",
    "temples",
    "museums",
    "shopping",
    "activities",
    "events",
    "festivals",
    "weather",
    "about",
    "regarding",
    "tell me",
    "what are",
    "list",
    "show me",
    "recommend",
    "suggest",
];

pub(crate) const GREETING_WORDS: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "greetings",
    "good morning",
    "good afternoon",
    "good evening",
];

pub(crate) const THANKS_WORDS: &[&str] = &["thanks", "thank you", "thank", "thx", "appreciate"];

pub(crate) const FAREWELL_WORDS: &[&str] = &["bye", "goodbye", "see you", "farewell"];

pub(crate) const ACK_WORDS: &[&str] = &["ok", "okay", "alright", "sure", "got it", "cool", "nice"];

/// Words that may pad a purely conversational utterance ("hi there", "thanks a lot").
const FILLER_WORDS: &[&str] = &[
    "there", "a", "lot", "so", "much", "very", "again", "all", "everyone", "you", "for", "the",
    "help", "later", "soon", "great", "quarry",
];

const SUBJECT_STOPWORDS: &[&str] = &[
    "i", "we", "you", "it", "he", "she", "they", "the", "a", "an", "what", "how", "where", "when",
    "which", "who", "why", "is", "are", "can", "could", "please", "tell", "this", "that", "there",
    "these", "those", "my", "our", "your", "hello", "hi", "hey", "thanks", "user", "assistant",
    "based", "yes", "no", "ok", "okay", "sure",
];

/// Lowercase words of `text` wrapped in single spaces, so phrases can be
/// matched on word boundaries with `contains(" phrase ")`.
pub(crate) fn normalized_words(text: &str) -> String {
    let words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    format!(" {} ", words.join(" "))
}

pub(crate) fn contains_phrase(normalized: &str, phrases: &[&str]) -> bool {
    phrases
        .iter()
        .any(|p| normalized.contains(&format!(" {p} ")))
}

#[must_use]
pub fn is_vague_reference(query: &str) -> bool {
    VAGUE_REFERENCE.is_match(query)
}

/// Append the conversation's subject to a query that only refers to it indirectly.
#[must_use]
pub fn resolve_reference(query: &str, context_hint: Option<&str>) -> String {
    match context_hint.map(str::trim).filter(|h| !h.is_empty()) {
        Some(hint) if is_vague_reference(query) && !query.contains(hint) => {
            tracing::debug!(query, hint, "resolving vague reference");
            format!("{query} {hint}")
        }
        _ => query.to_owned(),
    }
}

/// Most recent capitalized, non-stopword token in a `User: …`/`Assistant: …` transcript.
#[must_use]
pub fn extract_subject(previous_context: &str) -> Option<String> {
    previous_context.lines().rev().find_map(|line| {
        let body = line
            .strip_prefix("User:")
            .or_else(|| line.strip_prefix("Assistant:"))
            .unwrap_or(line);
        body.split_whitespace().rev().find_map(|raw| {
            let word = raw.trim_matches(|c: char| !c.is_alphanumeric());
            let starts_upper = word.chars().next().is_some_and(char::is_uppercase);
            let is_stopword = SUBJECT_STOPWORDS.contains(&word.to_lowercase().as_str());
            (starts_upper && word.chars().count() > 1 && !is_stopword).then(|| word.to_owned())
        })
    })
}

/// Shallow evidence handed to the LLM alongside the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Signals {
    pub document_keywords: bool,
    pub document_patterns: bool,
    pub question_form: bool,
    pub conversational: bool,
    /// Every word is a greeting, thanks, farewell, acknowledgment or filler.
    pub conversational_only: bool,
}

impl Signals {
    #[must_use]
    pub fn extract(query: &str) -> Self {
        let normalized = normalized_words(query);
        let lower = query.to_lowercase();
        let conversational = [GREETING_WORDS, THANKS_WORDS, FAREWELL_WORDS, ACK_WORDS]
            .iter()
            .any(|list| contains_phrase(&normalized, list));
        Self {
            document_keywords: contains_phrase(&normalized, DOCUMENT_KEYWORDS),
            document_patterns: DOCUMENT_QUESTION.is_match(&lower),
            question_form: lower.trim_end().ends_with('?'),
            conversational,
            conversational_only: conversational && only_conversational(&normalized),
        }
    }

    #[must_use]
    pub fn favors_document(self) -> bool {
        self.document_keywords || self.document_patterns
    }
}

fn only_conversational(normalized: &str) -> bool {
    let mut rest = normalized.to_owned();
    for list in [GREETING_WORDS, THANKS_WORDS, FAREWELL_WORDS, ACK_WORDS] {
        let mut phrases: Vec<&str> = list.to_vec();
        phrases.sort_by_key(|p| std::cmp::Reverse(p.len()));
        for phrase in phrases {
            let needle = format!(" {phrase} ");
            while rest.contains(&needle) {
                rest = rest.replacen(&needle, " ", 1);
            }
        }
    }
    rest.split_whitespace().all(|w| FILLER_WORDS.contains(&w))
}

/// Classification from keyword lists alone. Defaults to `None`.
#[must_use]
pub fn classify_by_keywords(query: &str) -> Intent {
    let signals = Signals::extract(query);
    if signals.favors_document() {
        Intent::Document
    } else if signals.conversational {
        Intent::Greeting
    } else {
        Intent::None
    }
}

fn classification_prompt(query: &str, signals: Signals) -> String {
    format!(
        "Classify the user's intent into one of these categories:\n\
         - DOCUMENT: the user asks for information, details, facts, policies, places, or general knowledge\n\
         - GREETING: the user greets, thanks, says goodbye, or acknowledges without asking anything\n\
         - NONE: neither applies\n\n\
         Linguistic analysis:\n\
         - Query: \"{query}\"\n\
         - Document keywords: {}\n\
         - Document question patterns: {}\n\
         - Phrased as a question: {}\n\
         - Conversational phrases: {}\n\n\
         Examples:\n\
         - \"what is the vacation policy\" -> DOCUMENT\n\
         - \"things to do there\" -> DOCUMENT\n\
         - \"thanks, that helps\" -> GREETING\n\n\
         Answer with only one label: DOCUMENT, GREETING, or NONE.",
        signals.document_keywords,
        signals.document_patterns,
        signals.question_form,
        signals.conversational,
    )
}

/// Labels queries as [`Intent::Document`], [`Intent::Greeting`] or [`Intent::None`].
pub struct IntentClassifier<P> {
    llm: Option<Arc<P>>,
    timeout: Duration,
}

impl<P> Clone for IntentClassifier<P> {
    fn clone(&self) -> Self {
        Self {
            llm: self.llm.clone(),
            timeout: self.timeout,
        }
    }
}

impl<P> fmt::Debug for IntentClassifier<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntentClassifier")
            .field("llm", &self.llm.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl<P: LlmProvider> IntentClassifier<P> {
    #[must_use]
    pub fn new(llm: Option<Arc<P>>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    #[must_use]
    pub fn keyword_only() -> Self {
        Self {
            llm: None,
            timeout: Duration::from_secs(1),
        }
    }

    /// Label `query`, resolving vague references against `context_hint` first.
    ///
    /// Never fails: any LLM problem degrades to keyword matching.
    pub async fn classify(&self, query: &str, context_hint: Option<&str>) -> Intent {
        let query = resolve_reference(query, context_hint);
        if query.trim().is_empty() {
            return Intent::None;
        }

        let signals = Signals::extract(&query);
        if signals.conversational_only {
            tracing::debug!(query = %query, "purely conversational query");
            return Intent::Greeting;
        }

        let Some(llm) = &self.llm else {
            return classify_by_keywords(&query);
        };
        match self.classify_with_llm(llm, &query, signals).await {
            Ok(intent) => {
                tracing::info!(query = %query, intent = %intent, "intent classified");
                intent
            }
            Err(e) => {
                let intent = classify_by_keywords(&query);
                tracing::warn!(error = %e, intent = %intent, "LLM intent classification failed, using keywords");
                intent
            }
        }
    }

    async fn classify_with_llm(
        &self,
        llm: &P,
        query: &str,
        signals: Signals,
    ) -> Result<Intent, StageError> {
        let prompt = classification_prompt(query, signals);
        let raw = tokio::time::timeout(self.timeout, llm.complete(&prompt))
            .await
            .map_err(|_| StageError::Timeout {
                stage: "intent",
                seconds: self.timeout.as_secs(),
            })??;
        Ok(Intent::parse_label(&raw))
    }
}
