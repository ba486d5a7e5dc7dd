mod env;
mod types;

#[cfg(test)]
mod tests;

pub use types::*;

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.resolve_secrets();
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid setting found.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.index.vector_size == 0 {
            bail!("index.vector_size must be greater than 0");
        }
        if self.index.search_limit == 0 {
            bail!("index.search_limit must be greater than 0");
        }
        if self.ingest.chunk_size == 0 {
            bail!("ingest.chunk_size must be greater than 0");
        }
        if self.ingest.chunk_overlap >= self.ingest.chunk_size {
            bail!(
                "ingest.chunk_overlap ({}) must be smaller than ingest.chunk_size ({})",
                self.ingest.chunk_overlap,
                self.ingest.chunk_size
            );
        }
        if self.web.max_results == 0 {
            bail!("web.max_results must be greater than 0");
        }
        let t = &self.timeouts;
        if t.llm_seconds == 0 || t.embedding_seconds == 0 || t.web_seconds == 0 || t.stage_seconds == 0 {
            bail!("timeouts must be greater than 0 seconds");
        }
        Ok(())
    }
}

/// Config file when `--config` is not given: `QUARRY_CONFIG`, then `config/default.toml`.
#[must_use]
pub fn resolve_config_path() -> PathBuf {
    std::env::var_os("QUARRY_CONFIG").map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}
