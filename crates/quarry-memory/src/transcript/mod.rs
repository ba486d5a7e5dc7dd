//! Append-only chat transcript: `(chat_id, role, text, timestamp)` records read
//! back in insertion order.

mod sqlite;

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{SecondsFormat, Utc};
use quarry_llm::Role;
use serde::Serialize;

use crate::error::MemoryError;
use crate::vector_store::BoxFuture;

pub use sqlite::SqliteStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptEntry {
    pub chat_id: String,
    pub role: Role,
    pub text: String,
    /// RFC 3339, UTC, millisecond precision.
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub chat_id: String,
    pub first_at: String,
    pub last_at: String,
    pub message_count: u64,
}

pub trait TranscriptStore: Send + Sync {
    fn append(
        &self,
        chat_id: &str,
        role: Role,
        text: &str,
    ) -> BoxFuture<'_, Result<TranscriptEntry, MemoryError>>;

    /// The last `limit` entries of a chat, oldest first.
    fn recent(
        &self,
        chat_id: &str,
        limit: u32,
    ) -> BoxFuture<'_, Result<Vec<TranscriptEntry>, MemoryError>>;

    /// Every entry of a chat, oldest first.
    fn history(&self, chat_id: &str) -> BoxFuture<'_, Result<Vec<TranscriptEntry>, MemoryError>>;

    /// One summary per chat, most recently active first.
    fn sessions(&self) -> BoxFuture<'_, Result<Vec<SessionSummary>, MemoryError>>;

    /// Remove a chat's entries and return how many were removed.
    fn delete_session(&self, chat_id: &str) -> BoxFuture<'_, Result<u64, MemoryError>>;
}

pub(crate) fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_role(s: &str) -> Role {
    match s {
        "assistant" => Role::Assistant,
        "system" => Role::System,
        _ => Role::User,
    }
}

/// Process-local transcript, lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryTranscriptStore {
    entries: RwLock<Vec<TranscriptEntry>>,
}

impl InMemoryTranscriptStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned(e: impl std::fmt::Display) -> MemoryError {
    MemoryError::Other(format!("transcript lock poisoned: {e}"))
}

impl TranscriptStore for InMemoryTranscriptStore {
    fn append(
        &self,
        chat_id: &str,
        role: Role,
        text: &str,
    ) -> BoxFuture<'_, Result<TranscriptEntry, MemoryError>> {
        let entry = TranscriptEntry {
            chat_id: chat_id.to_owned(),
            role,
            text: text.to_owned(),
            timestamp: now_timestamp(),
        };
        Box::pin(async move {
            self.entries.write().map_err(poisoned)?.push(entry.clone());
            Ok(entry)
        })
    }

    fn recent(
        &self,
        chat_id: &str,
        limit: u32,
    ) -> BoxFuture<'_, Result<Vec<TranscriptEntry>, MemoryError>> {
        let chat_id = chat_id.to_owned();
        Box::pin(async move {
            let entries = self.entries.read().map_err(poisoned)?;
            let mut recent: Vec<TranscriptEntry> = entries
                .iter()
                .rev()
                .filter(|e| e.chat_id == chat_id)
                .take(limit as usize)
                .cloned()
                .collect();
            recent.reverse();
            Ok(recent)
        })
    }

    fn history(&self, chat_id: &str) -> BoxFuture<'_, Result<Vec<TranscriptEntry>, MemoryError>> {
        let chat_id = chat_id.to_owned();
        Box::pin(async move {
            let entries = self.entries.read().map_err(poisoned)?;
            Ok(entries
                .iter()
                .filter(|e| e.chat_id == chat_id)
                .cloned()
                .collect())
        })
    }

    fn sessions(&self) -> BoxFuture<'_, Result<Vec<SessionSummary>, MemoryError>> {
        Box::pin(async move {
            let entries = self.entries.read().map_err(poisoned)?;
            // chat_id -> (summary, position of its latest entry)
            let mut by_chat: HashMap<&str, (SessionSummary, usize)> = HashMap::new();
            for (pos, e) in entries.iter().enumerate() {
                by_chat
                    .entry(e.chat_id.as_str())
                    .and_modify(|(s, last)| {
                        s.last_at.clone_from(&e.timestamp);
                        s.message_count += 1;
                        *last = pos;
                    })
                    .or_insert_with(|| {
                        (
                            SessionSummary {
                                chat_id: e.chat_id.clone(),
                                first_at: e.timestamp.clone(),
                                last_at: e.timestamp.clone(),
                                message_count: 1,
                            },
                            pos,
                        )
                    });
            }
            let mut sessions: Vec<_> = by_chat.into_values().collect();
            sessions.sort_by(|a, b| b.1.cmp(&a.1));
            Ok(sessions.into_iter().map(|(s, _)| s).collect())
        })
    }

    fn delete_session(&self, chat_id: &str) -> BoxFuture<'_, Result<u64, MemoryError>> {
        let chat_id = chat_id.to_owned();
        Box::pin(async move {
            let mut entries = self.entries.write().map_err(poisoned)?;
            let before = entries.len();
            entries.retain(|e| e.chat_id != chat_id);
            Ok((before - entries.len()) as u64)
        })
    }
}
