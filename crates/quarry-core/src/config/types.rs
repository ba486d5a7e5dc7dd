use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub intent: IntentConfig,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub transcript: TranscriptConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

/// Wrapper for sensitive strings with redacted Debug/Display.
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Credentials read from the environment only.
#[derive(Debug, Default)]
pub struct ResolvedSecrets {
    pub llm_api_key: Option<Secret>,
    pub tavily_api_key: Option<Secret>,
}

/// LLM provider backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Ollama,
    OpenAi,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Empty disables embeddings, and with them indexing and retrieval.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_provider() -> ProviderKind {
    ProviderKind::Ollama
}

fn default_llm_base_url() -> String {
    "http://localhost:11434".into()
}

fn default_llm_model() -> String {
    "mistral:7b".into()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".into()
}

fn default_max_tokens() -> u32 {
    1024
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            embedding_model: default_embedding_model(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    Qdrant,
    Memory,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct IndexConfig {
    #[serde(default = "default_index_backend")]
    pub backend: IndexBackend,
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,
    #[serde(default = "default_vector_size")]
    pub vector_size: u64,
    #[serde(default = "default_domain")]
    pub default_domain: String,
    #[serde(default = "default_search_limit")]
    pub search_limit: u64,
    #[serde(default = "default_scroll_page_size")]
    pub scroll_page_size: u32,
}

fn default_index_backend() -> IndexBackend {
    IndexBackend::Qdrant
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".into()
}

fn default_vector_size() -> u64 {
    768
}

fn default_domain() -> String {
    "default".into()
}

fn default_search_limit() -> u64 {
    5
}

fn default_scroll_page_size() -> u32 {
    100
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: default_index_backend(),
            qdrant_url: default_qdrant_url(),
            vector_size: default_vector_size(),
            default_domain: default_domain(),
            search_limit: default_search_limit(),
            scroll_page_size: default_scroll_page_size(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WebProvider {
    Tavily,
    DuckDuckGo,
    Disabled,
}

impl WebProvider {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tavily => "tavily",
            Self::DuckDuckGo => "duckduckgo",
            Self::Disabled => "disabled",
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct WebConfig {
    #[serde(default = "default_web_provider")]
    pub provider: WebProvider,
    /// Alternate access path tried once when `provider` fails.
    #[serde(default = "default_web_fallback")]
    pub fallback: WebProvider,
    #[serde(default = "default_tavily_url")]
    pub tavily_url: String,
    #[serde(default = "default_duckduckgo_url")]
    pub duckduckgo_url: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
    /// Only search the web for time-sensitive queries ("latest", "news", ...).
    #[serde(default)]
    pub freshness_gate: bool,
}

fn default_web_provider() -> WebProvider {
    WebProvider::Tavily
}

fn default_web_fallback() -> WebProvider {
    WebProvider::DuckDuckGo
}

fn default_tavily_url() -> String {
    quarry_tools::tavily::DEFAULT_TAVILY_URL.into()
}

fn default_duckduckgo_url() -> String {
    quarry_tools::duckduckgo::DEFAULT_DUCKDUCKGO_URL.into()
}

fn default_max_results() -> usize {
    5
}

fn default_excerpt_chars() -> usize {
    300
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            provider: default_web_provider(),
            fallback: default_web_fallback(),
            tavily_url: default_tavily_url(),
            duckduckgo_url: default_duckduckgo_url(),
            max_results: default_max_results(),
            excerpt_chars: default_excerpt_chars(),
            freshness_gate: false,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct IntentConfig {
    #[serde(default = "default_true")]
    pub llm_enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self { llm_enabled: true }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SynthesisConfig {
    /// Characters of raw context quoted when no LLM answer is available.
    #[serde(default = "default_fallback_context_chars")]
    pub fallback_context_chars: usize,
}

fn default_fallback_context_chars() -> usize {
    1000
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            fallback_context_chars: default_fallback_context_chars(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_llm_timeout")]
    pub llm_seconds: u64,
    #[serde(default = "default_embedding_timeout")]
    pub embedding_seconds: u64,
    #[serde(default = "default_web_timeout")]
    pub web_seconds: u64,
    /// Deadline for a whole pipeline stage.
    #[serde(default = "default_stage_timeout")]
    pub stage_seconds: u64,
}

fn default_llm_timeout() -> u64 {
    60
}

fn default_embedding_timeout() -> u64 {
    30
}

fn default_web_timeout() -> u64 {
    15
}

fn default_stage_timeout() -> u64 {
    90
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            llm_seconds: default_llm_timeout(),
            embedding_seconds: default_embedding_timeout(),
            web_seconds: default_web_timeout(),
            stage_seconds: default_stage_timeout(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TranscriptConfig {
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
    /// Most recent messages fed back as conversational context.
    #[serde(default = "default_history_limit")]
    pub history_limit: u32,
}

fn default_sqlite_path() -> String {
    "data/quarry.db".into()
}

fn default_history_limit() -> u32 {
    10
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            sqlite_path: default_sqlite_path(),
            history_limit: default_history_limit(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct IngestConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}
