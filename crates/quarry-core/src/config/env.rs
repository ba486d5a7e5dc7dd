use super::{Config, Secret};

fn parse_enum<T: serde::de::DeserializeOwned>(key: &str, value: String) -> Option<T> {
    if let Ok(parsed) = serde_json::from_value(serde_json::Value::String(value.clone())) {
        Some(parsed)
    } else {
        tracing::warn!("ignoring invalid {key} value: {value}");
        None
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Option<T> {
    if let Ok(parsed) = value.trim().parse() {
        Some(parsed)
    } else {
        tracing::warn!("ignoring invalid {key} value: {value}");
        None
    }
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_llm();
        self.apply_env_overrides_index();
        self.apply_env_overrides_web();
        self.apply_env_overrides_runtime();
    }

    fn apply_env_overrides_llm(&mut self) {
        if let Ok(v) = std::env::var("QUARRY_LLM_PROVIDER")
            && let Some(kind) = parse_enum("QUARRY_LLM_PROVIDER", v)
        {
            self.llm.provider = kind;
        }
        if let Ok(v) = std::env::var("QUARRY_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("QUARRY_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("QUARRY_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Ok(v) = std::env::var("QUARRY_LLM_MAX_TOKENS")
            && let Some(n) = parse_number("QUARRY_LLM_MAX_TOKENS", &v)
        {
            self.llm.max_tokens = n;
        }
        if let Ok(v) = std::env::var("QUARRY_INTENT_LLM_ENABLED")
            && let Ok(enabled) = v.parse::<bool>()
        {
            self.intent.llm_enabled = enabled;
        }
    }

    fn apply_env_overrides_index(&mut self) {
        if let Ok(v) = std::env::var("QUARRY_INDEX_BACKEND")
            && let Some(backend) = parse_enum("QUARRY_INDEX_BACKEND", v)
        {
            self.index.backend = backend;
        }
        if let Ok(v) = std::env::var("QUARRY_QDRANT_URL") {
            self.index.qdrant_url = v;
        }
        if let Ok(v) = std::env::var("QUARRY_INDEX_VECTOR_SIZE")
            && let Some(n) = parse_number("QUARRY_INDEX_VECTOR_SIZE", &v)
        {
            self.index.vector_size = n;
        }
        if let Ok(v) = std::env::var("QUARRY_DEFAULT_DOMAIN") {
            self.index.default_domain = v;
        }
        if let Ok(v) = std::env::var("QUARRY_INDEX_SEARCH_LIMIT")
            && let Some(n) = parse_number("QUARRY_INDEX_SEARCH_LIMIT", &v)
        {
            self.index.search_limit = n;
        }
    }

    fn apply_env_overrides_web(&mut self) {
        if let Ok(v) = std::env::var("QUARRY_WEB_PROVIDER")
            && let Some(provider) = parse_enum("QUARRY_WEB_PROVIDER", v)
        {
            self.web.provider = provider;
        }
        if let Ok(v) = std::env::var("QUARRY_WEB_FALLBACK")
            && let Some(provider) = parse_enum("QUARRY_WEB_FALLBACK", v)
        {
            self.web.fallback = provider;
        }
        if let Ok(v) = std::env::var("QUARRY_WEB_MAX_RESULTS")
            && let Some(n) = parse_number("QUARRY_WEB_MAX_RESULTS", &v)
        {
            self.web.max_results = n;
        }
        if let Ok(v) = std::env::var("QUARRY_WEB_FRESHNESS_GATE")
            && let Ok(enabled) = v.parse::<bool>()
        {
            self.web.freshness_gate = enabled;
        }
    }

    fn apply_env_overrides_runtime(&mut self) {
        if let Ok(v) = std::env::var("QUARRY_TIMEOUT_LLM")
            && let Some(secs) = parse_number("QUARRY_TIMEOUT_LLM", &v)
        {
            self.timeouts.llm_seconds = secs;
        }
        if let Ok(v) = std::env::var("QUARRY_TIMEOUT_EMBEDDING")
            && let Some(secs) = parse_number("QUARRY_TIMEOUT_EMBEDDING", &v)
        {
            self.timeouts.embedding_seconds = secs;
        }
        if let Ok(v) = std::env::var("QUARRY_TIMEOUT_WEB")
            && let Some(secs) = parse_number("QUARRY_TIMEOUT_WEB", &v)
        {
            self.timeouts.web_seconds = secs;
        }
        if let Ok(v) = std::env::var("QUARRY_TIMEOUT_STAGE")
            && let Some(secs) = parse_number("QUARRY_TIMEOUT_STAGE", &v)
        {
            self.timeouts.stage_seconds = secs;
        }
        if let Ok(v) = std::env::var("QUARRY_SQLITE_PATH") {
            self.transcript.sqlite_path = v;
        }
        if let Ok(v) = std::env::var("QUARRY_HISTORY_LIMIT")
            && let Some(n) = parse_number("QUARRY_HISTORY_LIMIT", &v)
        {
            self.transcript.history_limit = n;
        }
    }

    /// Secrets come from the environment only; blank values count as unset.
    pub(crate) fn resolve_secrets(&mut self) {
        let read = |key: &str| {
            std::env::var(key)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(Secret::new)
        };
        self.secrets.llm_api_key = read("QUARRY_LLM_API_KEY");
        self.secrets.tavily_api_key = read("QUARRY_TAVILY_API_KEY");
    }
}
