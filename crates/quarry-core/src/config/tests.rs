use std::io::Write;

use serial_test::serial;

use super::*;

const ENV_KEYS: [&str; 24] = [
    "QUARRY_CONFIG",
    "QUARRY_LLM_PROVIDER",
    "QUARRY_LLM_BASE_URL",
    "QUARRY_LLM_MODEL",
    "QUARRY_LLM_EMBEDDING_MODEL",
    "QUARRY_LLM_MAX_TOKENS",
    "QUARRY_LLM_API_KEY",
    "QUARRY_TAVILY_API_KEY",
    "QUARRY_INTENT_LLM_ENABLED",
    "QUARRY_INDEX_BACKEND",
    "QUARRY_QDRANT_URL",
    "QUARRY_INDEX_VECTOR_SIZE",
    "QUARRY_DEFAULT_DOMAIN",
    "QUARRY_INDEX_SEARCH_LIMIT",
    "QUARRY_WEB_PROVIDER",
    "QUARRY_WEB_FALLBACK",
    "QUARRY_WEB_MAX_RESULTS",
    "QUARRY_WEB_FRESHNESS_GATE",
    "QUARRY_TIMEOUT_LLM",
    "QUARRY_TIMEOUT_EMBEDDING",
    "QUARRY_TIMEOUT_WEB",
    "QUARRY_TIMEOUT_STAGE",
    "QUARRY_SQLITE_PATH",
    "QUARRY_HISTORY_LIMIT",
];

fn clear_env() {
    for key in ENV_KEYS {
        unsafe { std::env::remove_var(key) };
    }
}

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn defaults_when_file_missing() {
    let config = Config::default();
    assert_eq!(config.llm.provider, ProviderKind::Ollama);
    assert_eq!(config.llm.base_url, "http://localhost:11434");
    assert_eq!(config.llm.embedding_model, "nomic-embed-text");
    assert_eq!(config.index.backend, IndexBackend::Qdrant);
    assert_eq!(config.index.vector_size, 768);
    assert_eq!(config.index.default_domain, "default");
    assert_eq!(config.index.search_limit, 5);
    assert_eq!(config.web.provider, WebProvider::Tavily);
    assert_eq!(config.web.fallback, WebProvider::DuckDuckGo);
    assert_eq!(config.web.max_results, 5);
    assert_eq!(config.web.excerpt_chars, 300);
    assert!(!config.web.freshness_gate);
    assert!(config.intent.llm_enabled);
    assert_eq!(config.synthesis.fallback_context_chars, 1000);
    assert_eq!(config.transcript.history_limit, 10);
    assert_eq!(config.ingest.chunk_size, 1000);
    assert_eq!(config.ingest.chunk_overlap, 200);
    assert!(config.validate().is_ok());
}

#[test]
fn shipped_config_matches_builtin_defaults() {
    let shipped = std::fs::read_to_string(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../config/default.toml"
    ))
    .unwrap();
    let parsed: Config = toml::from_str(&shipped).unwrap();
    assert_eq!(
        toml::to_string(&parsed).unwrap(),
        toml::to_string(&Config::default()).unwrap()
    );
}

#[test]
#[serial]
fn load_missing_file_uses_defaults() {
    clear_env();
    let config = Config::load(Path::new("/nonexistent/quarry.toml")).unwrap();
    assert_eq!(config.llm.model, "mistral:7b");
    assert!(config.secrets.llm_api_key.is_none());
}

#[test]
#[serial]
fn load_partial_file_fills_defaults() {
    clear_env();
    let file = write_config(
        r#"
[llm]
provider = "openai"
base_url = "https://generativelanguage.googleapis.com/v1beta/openai"
model = "gemini-2.0-flash"

[index]
backend = "memory"
default_domain = "hr"

[web]
provider = "duckduckgo"
fallback = "disabled"
freshness_gate = true
"#,
    );
    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.llm.provider, ProviderKind::OpenAi);
    assert_eq!(config.llm.model, "gemini-2.0-flash");
    assert_eq!(config.llm.max_tokens, 1024);
    assert_eq!(config.index.backend, IndexBackend::Memory);
    assert_eq!(config.index.default_domain, "hr");
    assert_eq!(config.index.vector_size, 768);
    assert_eq!(config.web.provider, WebProvider::DuckDuckGo);
    assert_eq!(config.web.fallback, WebProvider::Disabled);
    assert!(config.web.freshness_gate);
    assert_eq!(config.timeouts.stage_seconds, 90);
}

#[test]
#[serial]
fn load_rejects_malformed_toml() {
    clear_env();
    let file = write_config("[llm\nprovider = ");
    let err = Config::load(file.path()).unwrap_err();
    assert!(err.to_string().contains("failed to parse config file"));
}

#[test]
#[serial]
fn env_overrides_file_values() {
    clear_env();
    let file = write_config("[index]\nsearch_limit = 3\n");
    unsafe {
        std::env::set_var("QUARRY_LLM_PROVIDER", "openai");
        std::env::set_var("QUARRY_INDEX_BACKEND", "memory");
        std::env::set_var("QUARRY_INDEX_SEARCH_LIMIT", "8");
        std::env::set_var("QUARRY_WEB_FRESHNESS_GATE", "true");
        std::env::set_var("QUARRY_TIMEOUT_STAGE", "12");
        std::env::set_var("QUARRY_HISTORY_LIMIT", "4");
    }
    let config = Config::load(file.path()).unwrap();
    clear_env();

    assert_eq!(config.llm.provider, ProviderKind::OpenAi);
    assert_eq!(config.index.backend, IndexBackend::Memory);
    assert_eq!(config.index.search_limit, 8);
    assert!(config.web.freshness_gate);
    assert_eq!(config.timeouts.stage_seconds, 12);
    assert_eq!(config.transcript.history_limit, 4);
}

#[test]
#[serial]
fn invalid_env_values_are_ignored() {
    clear_env();
    unsafe {
        std::env::set_var("QUARRY_LLM_PROVIDER", "watsonx");
        std::env::set_var("QUARRY_INDEX_VECTOR_SIZE", "wide");
        std::env::set_var("QUARRY_WEB_PROVIDER", "altavista");
    }
    let config = Config::load(Path::new("/nonexistent/quarry.toml")).unwrap();
    clear_env();

    assert_eq!(config.llm.provider, ProviderKind::Ollama);
    assert_eq!(config.index.vector_size, 768);
    assert_eq!(config.web.provider, WebProvider::Tavily);
}

#[test]
#[serial]
fn secrets_come_from_env_and_stay_redacted() {
    clear_env();
    unsafe {
        std::env::set_var("QUARRY_LLM_API_KEY", "sk-live-123");
        std::env::set_var("QUARRY_TAVILY_API_KEY", "   ");
    }
    let config = Config::load(Path::new("/nonexistent/quarry.toml")).unwrap();
    clear_env();

    let key = config.secrets.llm_api_key.as_ref().unwrap();
    assert_eq!(key.expose(), "sk-live-123");
    assert_eq!(format!("{key:?}"), "[REDACTED]");
    assert_eq!(key.to_string(), "[REDACTED]");
    assert!(config.secrets.tavily_api_key.is_none());
    assert!(!format!("{config:?}").contains("sk-live-123"));
}

#[test]
fn secrets_are_never_serialized() {
    let mut config = Config::default();
    config.secrets.llm_api_key = Some(Secret::new("sk-live-123"));
    let rendered = toml::to_string(&config).unwrap();
    assert!(!rendered.contains("sk-live-123"));
}

#[test]
fn validate_rejects_overlap_not_smaller_than_chunk() {
    let mut config = Config::default();
    config.ingest.chunk_overlap = config.ingest.chunk_size;
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("chunk_overlap"));
}

#[test]
fn validate_rejects_zero_values() {
    let mut config = Config::default();
    config.index.vector_size = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.web.max_results = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.index.search_limit = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.timeouts.web_seconds = 0;
    assert!(config.validate().is_err());
}

#[test]
#[serial]
fn config_path_prefers_env_over_default() {
    clear_env();
    assert_eq!(resolve_config_path(), PathBuf::from(DEFAULT_CONFIG_PATH));

    unsafe { std::env::set_var("QUARRY_CONFIG", "/etc/quarry/prod.toml") };
    assert_eq!(resolve_config_path(), PathBuf::from("/etc/quarry/prod.toml"));
    clear_env();
}
