use std::sync::Arc;
use std::time::Duration;

use quarry_llm::{LlmError, LlmProvider};

use crate::error::MemoryError;

/// Text-to-vector conversion shared by indexing and querying.
///
/// An unconfigured gateway (no provider, or a provider without an embedding
/// model) fails every call with [`MemoryError::EmbeddingUnavailable`].
pub struct EmbeddingGateway<P> {
    provider: Option<Arc<P>>,
    timeout: Duration,
}

impl<P> Clone for EmbeddingGateway<P> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
            timeout: self.timeout,
        }
    }
}

impl<P> std::fmt::Debug for EmbeddingGateway<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingGateway")
            .field("configured", &self.provider.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl<P: LlmProvider> EmbeddingGateway<P> {
    #[must_use]
    pub fn new(provider: Arc<P>, timeout: Duration) -> Self {
        Self {
            provider: Some(provider),
            timeout,
        }
    }

    #[must_use]
    pub fn unconfigured() -> Self {
        Self {
            provider: None,
            timeout: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.provider
            .as_ref()
            .is_some_and(|p| p.supports_embeddings())
    }

    fn provider(&self) -> Result<&P, MemoryError> {
        match &self.provider {
            Some(p) if p.supports_embeddings() => Ok(p),
            _ => Err(MemoryError::EmbeddingUnavailable),
        }
    }

    /// Embed one query string.
    ///
    /// # Errors
    ///
    /// `EmbeddingUnavailable` when unconfigured, `EmbeddingTimeout` past the deadline,
    /// or the provider's error.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        let provider = self.provider()?;
        let result = tokio::time::timeout(self.timeout, provider.embed(text))
            .await
            .map_err(|_| self.timed_out())?;
        result.map_err(map_llm_error)
    }

    /// Embed a batch of chunk texts, one vector per text in input order.
    ///
    /// # Errors
    ///
    /// Same as [`EmbeddingGateway::embed_query`]; also fails if the provider returns
    /// a different number of vectors than texts.
    pub async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, MemoryError> {
        let provider = self.provider()?;
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = tokio::time::timeout(self.timeout, provider.embed_batch(texts))
            .await
            .map_err(|_| self.timed_out())?
            .map_err(map_llm_error)?;
        if vectors.len() != texts.len() {
            return Err(MemoryError::Other(format!(
                "embedding provider returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }
        Ok(vectors)
    }

    fn timed_out(&self) -> MemoryError {
        tracing::warn!(timeout_secs = self.timeout.as_secs(), "embedding request timed out");
        MemoryError::EmbeddingTimeout {
            seconds: self.timeout.as_secs(),
        }
    }
}

fn map_llm_error(e: LlmError) -> MemoryError {
    match e {
        LlmError::EmbedUnsupported { .. } => MemoryError::EmbeddingUnavailable,
        other => MemoryError::Llm(other),
    }
}

#[cfg(test)]
mod tests {
    use quarry_llm::mock::MockProvider;

    use super::*;

    fn gateway(mock: MockProvider) -> EmbeddingGateway<MockProvider> {
        EmbeddingGateway::new(Arc::new(mock), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn unconfigured_gateway_is_unavailable() {
        let gw = EmbeddingGateway::<MockProvider>::unconfigured();
        assert!(!gw.is_available());
        let err = gw.embed_query("q").await.unwrap_err();
        assert!(matches!(err, MemoryError::EmbeddingUnavailable));
    }

    #[tokio::test]
    async fn provider_without_embeddings_is_unavailable() {
        let gw = gateway(MockProvider::default());
        let err = gw.embed_documents(&["a".into()]).await.unwrap_err();
        assert!(matches!(err, MemoryError::EmbeddingUnavailable));
    }

    #[tokio::test]
    async fn embeds_one_vector_per_text() {
        let gw = gateway(MockProvider::embedder(16));
        let vectors = gw
            .embed_documents(&["alpha".into(), "beta".into()])
            .await
            .unwrap();
        assert_eq!(vectors.len(), 2);
        assert!(vectors.iter().all(|v| v.len() == 16));
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let gw = EmbeddingGateway::new(
            Arc::new(MockProvider::embedder(4).with_delay(200)),
            Duration::from_millis(20),
        );
        let err = gw.embed_query("q").await.unwrap_err();
        assert!(matches!(err, MemoryError::EmbeddingTimeout { .. }));
    }
}
