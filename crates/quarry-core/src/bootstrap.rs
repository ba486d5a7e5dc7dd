//! Application bootstrap: config resolution, provider/index/search/transcript construction.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use quarry_llm::AnyProvider;
use quarry_llm::LlmProvider;
use quarry_llm::ollama::OllamaProvider;
use quarry_llm::openai::OpenAiProvider;
use quarry_memory::{
    DomainIndex, EmbeddingGateway, InMemoryVectorStore, QdrantOps, SplitterConfig, SqliteStore,
    TextSplitter, TranscriptStore, VectorStore,
};
use quarry_tools::{AnyWebSearch, DuckDuckGoSearch, FallbackSearch, TavilySearch};

use crate::agents::{RetrievalAgent, SynthesisAgent, WebFallbackAgent};
use crate::checkpoint::InMemoryCheckpointer;
use crate::config::{Config, IndexBackend, ProviderKind, WebProvider};
use crate::intent::IntentClassifier;
use crate::orchestrator::Orchestrator;
use crate::session::ChatService;

pub type AppSearch = FallbackSearch<AnyWebSearch, AnyWebSearch>;
pub type AppOrchestrator = Orchestrator<AnyProvider, AppSearch>;
pub type AppChatService = ChatService<AnyProvider, AppSearch>;

pub struct AppBuilder {
    config: Config,
    config_path: PathBuf,
}

impl AppBuilder {
    /// Load and validate the file at `path`.
    ///
    /// # Errors
    ///
    /// Unreadable or invalid configuration.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let config = Config::load(path)?;
        config.validate()?;
        Ok(Self {
            config,
            config_path: path.to_path_buf(),
        })
    }

    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self {
            config,
            config_path: PathBuf::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// The configured LLM, or `None` when its credentials are missing.
    ///
    /// # Errors
    ///
    /// The HTTP client cannot be constructed.
    pub async fn build_provider(&self) -> anyhow::Result<Option<AnyProvider>> {
        let provider = create_provider(&self.config)?;
        if let Some(provider) = &provider {
            health_check(provider).await;
        }
        Ok(provider)
    }

    /// # Errors
    ///
    /// The vector store backend cannot be reached.
    pub fn build_index(&self, provider: Option<&AnyProvider>) -> anyhow::Result<DomainIndex<AnyProvider>> {
        let store = create_vector_store(&self.config)?;
        let timeout = Duration::from_secs(self.config.timeouts.embedding_seconds);
        let embeddings = match provider {
            Some(p) if p.supports_embeddings() => EmbeddingGateway::new(Arc::new(p.clone()), timeout),
            _ => {
                tracing::warn!("no embedding model configured, indexing and retrieval are disabled");
                EmbeddingGateway::unconfigured()
            }
        };
        Ok(DomainIndex::new(store, embeddings, self.config.index.vector_size)
            .with_scroll_page(self.config.index.scroll_page_size))
    }

    #[must_use]
    pub fn build_search(&self) -> AppSearch {
        let primary = create_web_search(&self.config, self.config.web.provider);
        let alternate = match self.config.web.fallback {
            WebProvider::Disabled => None,
            kind if kind == self.config.web.provider => None,
            kind => Some(create_web_search(&self.config, kind)),
        };
        FallbackSearch::new(primary, alternate)
    }

    #[must_use]
    pub fn build_splitter(&self) -> TextSplitter {
        TextSplitter::new(SplitterConfig {
            chunk_size: self.config.ingest.chunk_size,
            chunk_overlap: self.config.ingest.chunk_overlap,
            sentence_aware: true,
        })
    }

    #[must_use]
    pub fn build_orchestrator(
        &self,
        provider: Option<AnyProvider>,
        index: DomainIndex<AnyProvider>,
    ) -> AppOrchestrator {
        let cfg = &self.config;
        let llm = provider.map(Arc::new);
        let llm_timeout = Duration::from_secs(cfg.timeouts.llm_seconds);
        let classifier_llm = if cfg.intent.llm_enabled { llm.clone() } else { None };

        Orchestrator::new(
            IntentClassifier::new(classifier_llm, llm_timeout),
            RetrievalAgent::new(index, cfg.index.search_limit),
            WebFallbackAgent::new(self.build_search(), cfg.web.max_results, cfg.web.excerpt_chars)
                .with_freshness_gate(cfg.web.freshness_gate),
            SynthesisAgent::new(llm, llm_timeout, cfg.synthesis.fallback_context_chars),
            Arc::new(InMemoryCheckpointer::new()),
        )
        .with_default_domain(cfg.index.default_domain.clone())
        .with_stage_timeout(Duration::from_secs(cfg.timeouts.stage_seconds))
    }

    /// # Errors
    ///
    /// The transcript database cannot be opened or migrated.
    pub async fn build_transcripts(&self) -> anyhow::Result<Arc<dyn TranscriptStore>> {
        let path = &self.config.transcript.sqlite_path;
        if path != ":memory:"
            && let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let store = SqliteStore::new(path)
            .await
            .with_context(|| format!("failed to open transcript database {path}"))?;
        Ok(Arc::new(store))
    }

    /// # Errors
    ///
    /// The transcript database cannot be opened or migrated.
    pub async fn build_chat_service(&self, orchestrator: AppOrchestrator) -> anyhow::Result<AppChatService> {
        let transcripts = self.build_transcripts().await?;
        Ok(ChatService::new(
            Arc::new(orchestrator),
            transcripts,
            self.config.transcript.history_limit,
        ))
    }
}

/// Build the configured provider. Returns `None` for an OpenAI-compatible
/// provider without `QUARRY_LLM_API_KEY`.
///
/// # Errors
///
/// The HTTP client cannot be constructed.
pub fn create_provider(config: &Config) -> anyhow::Result<Option<AnyProvider>> {
    let llm = &config.llm;
    match llm.provider {
        ProviderKind::Ollama => Ok(Some(AnyProvider::Ollama(OllamaProvider::new(
            &llm.base_url,
            llm.model.clone(),
            llm.embedding_model.clone(),
        )))),
        ProviderKind::OpenAi => {
            let Some(api_key) = config.secrets.llm_api_key.as_ref() else {
                tracing::warn!("QUARRY_LLM_API_KEY not set, answers will quote raw context");
                return Ok(None);
            };
            let client = quarry_llm::http::build_client(Duration::from_secs(config.timeouts.llm_seconds))
                .context("failed to build HTTP client")?;
            let embedding_model =
                Some(llm.embedding_model.clone()).filter(|m| !m.trim().is_empty());
            Ok(Some(AnyProvider::OpenAi(OpenAiProvider::new(
                client,
                api_key.expose().to_owned(),
                llm.base_url.clone(),
                llm.model.clone(),
                llm.max_tokens,
                embedding_model,
            ))))
        }
    }
}

/// # Errors
///
/// The Qdrant client cannot be constructed.
pub fn create_vector_store(config: &Config) -> anyhow::Result<Arc<dyn VectorStore>> {
    match config.index.backend {
        IndexBackend::Qdrant => {
            let ops = QdrantOps::new(&config.index.qdrant_url)
                .with_context(|| format!("failed to connect to Qdrant at {}", config.index.qdrant_url))?;
            Ok(Arc::new(ops))
        }
        IndexBackend::Memory => {
            tracing::info!("using in-process vector store, domains are lost on exit");
            Ok(Arc::new(InMemoryVectorStore::new()))
        }
    }
}

#[must_use]
pub fn create_web_search(config: &Config, kind: WebProvider) -> AnyWebSearch {
    let timeout = Duration::from_secs(config.timeouts.web_seconds);
    match kind {
        WebProvider::Tavily => AnyWebSearch::Tavily(TavilySearch::new(
            config
                .secrets
                .tavily_api_key
                .as_ref()
                .map(|k| k.expose().to_owned()),
            &config.web.tavily_url,
            timeout,
        )),
        WebProvider::DuckDuckGo => {
            AnyWebSearch::DuckDuckGo(DuckDuckGoSearch::new(&config.web.duckduckgo_url, timeout))
        }
        WebProvider::Disabled => AnyWebSearch::Disabled,
    }
}

/// Log whether the provider is reachable. Never fails.
pub async fn health_check(provider: &AnyProvider) {
    if let AnyProvider::Ollama(ollama) = provider {
        match ollama.health_check().await {
            Ok(()) => tracing::info!("ollama health check passed"),
            Err(e) => tracing::warn!("ollama health check failed: {e:#}"),
        }
    }
}

/// Build every component a pipeline turn needs.
///
/// # Errors
///
/// Any backend that cannot be constructed.
pub async fn build_app(builder: &AppBuilder) -> anyhow::Result<(DomainIndex<AnyProvider>, AppChatService)> {
    let provider = builder.build_provider().await?;
    let index = builder.build_index(provider.as_ref())?;
    let orchestrator = builder.build_orchestrator(provider, index.clone());
    let chat = builder.build_chat_service(orchestrator).await?;
    Ok((index, chat))
}

/// Chat service for transcript management. Skips the provider health check,
/// since listing or deleting sessions never reaches the LLM.
///
/// # Errors
///
/// Any backend that cannot be constructed.
pub async fn build_session_service(builder: &AppBuilder) -> anyhow::Result<AppChatService> {
    let provider = create_provider(builder.config())?;
    let index = builder.build_index(provider.as_ref())?;
    builder
        .build_chat_service(builder.build_orchestrator(provider, index))
        .await
}

/// Check a domain id before any backend is touched.
///
/// # Errors
///
/// The id normalizes to nothing, is too long, or contains characters other than
/// alphanumerics, `_`, `-` and `.`.
pub fn check_domain(raw: &str) -> anyhow::Result<String> {
    match quarry_memory::DomainId::parse(raw) {
        Ok(id) => Ok(id.to_string()),
        Err(e) => bail!("{e}"),
    }
}
