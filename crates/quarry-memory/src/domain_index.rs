//! Per-domain collection lifecycle, chunk indexing, and similarity search.

use std::collections::BTreeMap;
use std::sync::Arc;

use quarry_llm::LlmProvider;
use serde::Serialize;

use crate::domain::DomainId;
use crate::embedding::EmbeddingGateway;
use crate::error::MemoryError;
use crate::vector_store::{CollectionStatus, Payload, VectorPoint, VectorStore};

pub const TEXT_FIELD: &str = "text";
pub const DOMAIN_FIELD: &str = "domain";
pub const CHUNK_ID_FIELD: &str = "chunk_id";

pub const DEFAULT_SEARCH_LIMIT: u64 = 5;
pub const DEFAULT_SCROLL_PAGE: u32 = 100;

/// Steady-state description of an existing domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainStatus {
    pub domain: DomainId,
    pub point_count: u64,
    pub vector_size: u64,
    pub status: CollectionStatus,
}

/// Statistics for a domain that may not exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainStats {
    pub exists: bool,
    pub domain: DomainId,
    pub collection_name: String,
    pub points_count: u64,
    pub vector_size: Option<u64>,
    pub status: Option<CollectionStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub payload: Payload,
}

impl SearchHit {
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        payload_text(&self.payload)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredChunk {
    pub id: String,
    pub payload: Payload,
}

impl StoredChunk {
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        payload_text(&self.payload)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpsertReport {
    pub domain: DomainId,
    pub ids: Vec<String>,
}

fn payload_text(payload: &Payload) -> Option<&str> {
    payload.get(TEXT_FIELD).and_then(serde_json::Value::as_str)
}

/// The caller's chunk id survives backends that rewrite point ids.
fn chunk_id(point_id: String, payload: &Payload) -> String {
    payload
        .get(CHUNK_ID_FIELD)
        .and_then(serde_json::Value::as_str)
        .map_or(point_id, ToOwned::to_owned)
}

/// One similarity-searchable collection per knowledge domain.
///
/// Every entry point normalizes its domain argument through [`DomainId`], so
/// `"HR"` and `"hr"` address the same collection.
pub struct DomainIndex<P> {
    store: Arc<dyn VectorStore>,
    embeddings: EmbeddingGateway<P>,
    vector_size: u64,
    scroll_page: u32,
}

impl<P> Clone for DomainIndex<P> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            embeddings: self.embeddings.clone(),
            vector_size: self.vector_size,
            scroll_page: self.scroll_page,
        }
    }
}

impl<P> std::fmt::Debug for DomainIndex<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainIndex")
            .field("embeddings", &self.embeddings)
            .field("vector_size", &self.vector_size)
            .finish_non_exhaustive()
    }
}

impl<P: LlmProvider> DomainIndex<P> {
    #[must_use]
    pub fn new(store: Arc<dyn VectorStore>, embeddings: EmbeddingGateway<P>, vector_size: u64) -> Self {
        Self {
            store,
            embeddings,
            vector_size,
            scroll_page: DEFAULT_SCROLL_PAGE,
        }
    }

    /// Page size [`DomainIndex::list_chunks`] falls back to when called with `limit == 0`.
    #[must_use]
    pub fn with_scroll_page(mut self, page: u32) -> Self {
        self.scroll_page = page.max(1);
        self
    }

    #[must_use]
    pub fn vector_size(&self) -> u64 {
        self.vector_size
    }

    async fn status_of(&self, domain: &DomainId) -> Result<Option<DomainStatus>, MemoryError> {
        let info = self.store.collection_info(domain.as_str()).await?;
        Ok(info.map(|info| DomainStatus {
            domain: domain.clone(),
            point_count: info.points_count,
            vector_size: info.vector_size.unwrap_or(self.vector_size),
            status: info.status,
        }))
    }

    async fn ensure(&self, domain: &DomainId) -> Result<DomainStatus, MemoryError> {
        if self
            .store
            .ensure_collection(domain.as_str(), self.vector_size)
            .await?
        {
            tracing::info!(domain = %domain, vector_size = self.vector_size, "created domain collection");
        }
        self.status_of(domain).await?.ok_or_else(|| {
            MemoryError::Other(format!("domain {domain} vanished right after creation"))
        })
    }

    /// Create the domain's collection if absent and return its status.
    ///
    /// Idempotent: an existing domain is left untouched.
    ///
    /// # Errors
    ///
    /// `InvalidDomain` for a bad id, or a backend error.
    pub async fn ensure_domain(&self, domain: &str) -> Result<DomainStatus, MemoryError> {
        let domain = DomainId::parse(domain)?;
        self.ensure(&domain).await
    }

    /// Embed `texts` and write one point per text into the domain, creating it if needed.
    ///
    /// Ids are generated (UUIDv4) when `ids` is `None`. Each point's payload is
    /// `{text, domain, chunk_id}`. Returns the ids in input order.
    ///
    /// # Errors
    ///
    /// `LengthMismatch` when `ids` and `texts` differ in length, `EmbeddingUnavailable`
    /// when no embedding capability is configured, `DimensionMismatch` when the embedder's
    /// vectors do not fit the domain, `InvalidDomain`, or a backend error.
    pub async fn upsert_chunks(
        &self,
        domain: &str,
        texts: &[String],
        ids: Option<&[String]>,
    ) -> Result<UpsertReport, MemoryError> {
        let domain = DomainId::parse(domain)?;
        if let Some(ids) = ids
            && ids.len() != texts.len()
        {
            return Err(MemoryError::LengthMismatch {
                texts: texts.len(),
                ids: ids.len(),
            });
        }
        if !self.embeddings.is_available() {
            return Err(MemoryError::EmbeddingUnavailable);
        }

        let status = self.ensure(&domain).await?;
        if texts.is_empty() {
            return Ok(UpsertReport {
                domain,
                ids: Vec::new(),
            });
        }

        let vectors = self.embeddings.embed_documents(texts).await?;
        if let Some(bad) = vectors.iter().find(|v| v.len() as u64 != status.vector_size) {
            return Err(MemoryError::DimensionMismatch {
                expected: status.vector_size,
                actual: bad.len() as u64,
            });
        }

        let ids: Vec<String> = match ids {
            Some(ids) => ids.to_vec(),
            None => texts
                .iter()
                .map(|_| uuid::Uuid::new_v4().to_string())
                .collect(),
        };

        let points = texts
            .iter()
            .zip(vectors)
            .zip(&ids)
            .map(|((text, vector), id)| {
                let mut payload = Payload::new();
                payload.insert(TEXT_FIELD.into(), serde_json::Value::String(text.clone()));
                payload.insert(
                    DOMAIN_FIELD.into(),
                    serde_json::Value::String(domain.to_string()),
                );
                payload.insert(CHUNK_ID_FIELD.into(), serde_json::Value::String(id.clone()));
                VectorPoint {
                    id: id.clone(),
                    vector,
                    payload,
                }
            })
            .collect();

        self.store.upsert(domain.as_str(), points).await?;
        tracing::info!(domain = %domain, chunks = ids.len(), "upserted chunks");

        Ok(UpsertReport { domain, ids })
    }

    /// Top-`limit` chunks by cosine similarity to `query`, best first.
    ///
    /// A domain that does not exist (or whose id is invalid) yields an empty list.
    ///
    /// # Errors
    ///
    /// Embedding failures and backend errors on an existing domain.
    pub async fn search(
        &self,
        domain: &str,
        query: &str,
        limit: u64,
    ) -> Result<Vec<SearchHit>, MemoryError> {
        let Ok(domain) = DomainId::parse(domain) else {
            tracing::warn!(domain, "search on invalid domain id, treating as empty");
            return Ok(Vec::new());
        };
        if limit == 0 || !self.store.collection_exists(domain.as_str()).await? {
            tracing::debug!(domain = %domain, "search on absent domain");
            return Ok(Vec::new());
        }
        let vector = self.embeddings.embed_query(query).await?;
        self.search_vector(&domain, vector, limit).await
    }

    async fn search_vector(
        &self,
        domain: &DomainId,
        vector: Vec<f32>,
        limit: u64,
    ) -> Result<Vec<SearchHit>, MemoryError> {
        let hits: Vec<SearchHit> = self
            .store
            .search(domain.as_str(), vector, limit)
            .await?
            .into_iter()
            .map(|p| SearchHit {
                id: chunk_id(p.id, &p.payload),
                score: p.score,
                payload: p.payload,
            })
            .collect();
        tracing::debug!(domain = %domain, hits = hits.len(), "domain search");
        Ok(hits)
    }

    /// Search several domains with a single query embedding.
    ///
    /// Domains that are invalid, absent, or return no hits are omitted from the result.
    ///
    /// # Errors
    ///
    /// Embedding failures and backend errors.
    pub async fn search_across_domains(
        &self,
        query: &str,
        domains: &[String],
        limit_per_domain: u64,
    ) -> Result<BTreeMap<DomainId, Vec<SearchHit>>, MemoryError> {
        let mut targets = Vec::new();
        for raw in domains {
            let id = match DomainId::parse(raw) {
                Ok(id) => id,
                Err(e) => {
                    tracing::warn!(domain = %raw, error = %e, "skipping domain");
                    continue;
                }
            };
            if targets.contains(&id) || !self.store.collection_exists(id.as_str()).await? {
                continue;
            }
            targets.push(id);
        }

        let mut results = BTreeMap::new();
        if targets.is_empty() || limit_per_domain == 0 {
            return Ok(results);
        }

        let vector = self.embeddings.embed_query(query).await?;
        for domain in targets {
            let hits = self
                .search_vector(&domain, vector.clone(), limit_per_domain)
                .await?;
            if !hits.is_empty() {
                results.insert(domain, hits);
            }
        }
        Ok(results)
    }

    /// Every chunk in the domain, fetched `limit` points per page until the
    /// backend reports no further offset.
    ///
    /// # Errors
    ///
    /// `InvalidDomain` or a backend error. An absent domain yields an empty list.
    pub async fn list_chunks(&self, domain: &str, limit: u32) -> Result<Vec<StoredChunk>, MemoryError> {
        let domain = DomainId::parse(domain)?;
        if !self.store.collection_exists(domain.as_str()).await? {
            return Ok(Vec::new());
        }

        let page_size = if limit == 0 { self.scroll_page } else { limit };
        let mut chunks = Vec::new();
        let mut offset = None;
        loop {
            let page = self
                .store
                .scroll_page(domain.as_str(), page_size, offset)
                .await?;
            chunks.extend(page.points.into_iter().map(|p| StoredChunk {
                id: chunk_id(p.id, &p.payload),
                payload: p.payload,
            }));
            match page.next_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }
        tracing::debug!(domain = %domain, chunks = chunks.len(), "listed chunks");
        Ok(chunks)
    }

    /// Irreversibly drop the domain and all its chunks. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// `InvalidDomain` or a backend error.
    pub async fn delete_domain(&self, domain: &str) -> Result<bool, MemoryError> {
        let domain = DomainId::parse(domain)?;
        if !self.store.collection_exists(domain.as_str()).await? {
            return Ok(false);
        }
        self.store.delete_collection(domain.as_str()).await?;
        tracing::info!(domain = %domain, "deleted domain");
        Ok(true)
    }

    /// All domains known to the backend, sorted by id.
    ///
    /// # Errors
    ///
    /// Backend errors.
    pub async fn list_domains(&self) -> Result<Vec<DomainStatus>, MemoryError> {
        let mut domains = Vec::new();
        for name in self.store.list_collections().await? {
            let domain = match DomainId::parse(&name) {
                Ok(id) if id.as_str() == name => id,
                _ => {
                    tracing::debug!(collection = %name, "collection is not a domain, skipping");
                    continue;
                }
            };
            if let Some(status) = self.status_of(&domain).await? {
                domains.push(status);
            }
        }
        Ok(domains)
    }

    /// Size and health of a domain; `exists == false` rather than an error when absent.
    ///
    /// # Errors
    ///
    /// `InvalidDomain` or a backend error.
    pub async fn domain_stats(&self, domain: &str) -> Result<DomainStats, MemoryError> {
        let domain = DomainId::parse(domain)?;
        let collection_name = domain.to_string();
        Ok(match self.status_of(&domain).await? {
            Some(status) => DomainStats {
                exists: true,
                domain,
                collection_name,
                points_count: status.point_count,
                vector_size: Some(status.vector_size),
                status: Some(status.status),
            },
            None => DomainStats {
                exists: false,
                domain,
                collection_name,
                points_count: 0,
                vector_size: None,
                status: None,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use quarry_llm::mock::MockProvider;

    use super::*;
    use crate::in_memory_store::InMemoryVectorStore;

    fn index(mock: MockProvider, dim: u64) -> DomainIndex<MockProvider> {
        DomainIndex::new(
            Arc::new(InMemoryVectorStore::new()),
            EmbeddingGateway::new(Arc::new(mock), Duration::from_secs(5)),
            dim,
        )
    }

    #[test]
    fn chunk_id_prefers_payload() {
        let mut payload = Payload::new();
        assert_eq!(chunk_id("p1".into(), &payload), "p1");
        payload.insert(CHUNK_ID_FIELD.into(), serde_json::json!("doc-7"));
        assert_eq!(chunk_id("p1".into(), &payload), "doc-7");
    }

    #[tokio::test]
    async fn length_mismatch_rejected_before_embedding() {
        let idx = DomainIndex::<MockProvider>::new(
            Arc::new(InMemoryVectorStore::new()),
            EmbeddingGateway::unconfigured(),
            8,
        );
        let err = idx
            .upsert_chunks("hr", &["a".into(), "b".into()], Some(&["1".into()]))
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::LengthMismatch { texts: 2, ids: 1 }));
    }

    #[tokio::test]
    async fn upsert_without_embedder_is_unavailable_and_creates_nothing() {
        let idx = DomainIndex::<MockProvider>::new(
            Arc::new(InMemoryVectorStore::new()),
            EmbeddingGateway::unconfigured(),
            8,
        );
        let err = idx.upsert_chunks("hr", &["a".into()], None).await.unwrap_err();
        assert!(matches!(err, MemoryError::EmbeddingUnavailable));
        assert!(!idx.domain_stats("hr").await.unwrap().exists);
    }

    #[tokio::test]
    async fn dimension_mismatch_rejected() {
        let idx = index(MockProvider::embedder(4), 8);
        let err = idx.upsert_chunks("hr", &["a".into()], None).await.unwrap_err();
        assert!(matches!(
            err,
            MemoryError::DimensionMismatch {
                expected: 8,
                actual: 4
            }
        ));
    }

    #[tokio::test]
    async fn generated_ids_are_unique_and_returned_by_search() {
        let idx = index(MockProvider::embedder(32), 32);
        let report = idx
            .upsert_chunks("hr", &["alpha".into(), "beta".into()], None)
            .await
            .unwrap();
        assert_eq!(report.ids.len(), 2);
        assert_ne!(report.ids[0], report.ids[1]);

        let hits = idx.search("hr", "alpha", 5).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| report.ids.contains(&h.id)));
    }

    #[tokio::test]
    async fn search_limit_zero_is_empty() {
        let idx = index(MockProvider::embedder(8), 8);
        idx.upsert_chunks("hr", &["a".into()], None).await.unwrap();
        assert!(idx.search("hr", "a", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_invalid_domain_is_empty() {
        let idx = index(MockProvider::embedder(8), 8);
        assert!(idx.search("   ", "q", 5).await.unwrap().is_empty());
        assert!(idx.search("a/b", "q", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn management_ops_reject_invalid_domain() {
        let idx = index(MockProvider::embedder(8), 8);
        assert!(matches!(
            idx.ensure_domain("").await,
            Err(MemoryError::InvalidDomain(_))
        ));
        assert!(matches!(
            idx.delete_domain("a/b").await,
            Err(MemoryError::InvalidDomain(_))
        ));
    }
}
