use quarry_llm::LlmProvider;
use quarry_memory::DomainIndex;

use crate::error::StageError;
use crate::state::TurnState;

/// Pulls the turn's document context out of its domain.
pub struct RetrievalAgent<P> {
    index: DomainIndex<P>,
    limit: u64,
}

impl<P> Clone for RetrievalAgent<P> {
    fn clone(&self) -> Self {
        Self {
            index: self.index.clone(),
            limit: self.limit,
        }
    }
}

impl<P> std::fmt::Debug for RetrievalAgent<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalAgent")
            .field("index", &self.index)
            .field("limit", &self.limit)
            .finish()
    }
}

impl<P: LlmProvider> RetrievalAgent<P> {
    #[must_use]
    pub fn new(index: DomainIndex<P>, limit: u64) -> Self {
        Self { index, limit }
    }

    /// Search the turn's domain and record what was found.
    ///
    /// Zero hits is a normal outcome: `document_found` stays `false` and
    /// `document_context` stays unset.
    ///
    /// # Errors
    ///
    /// Embedding or backend failures. The state is left untouched.
    pub async fn retrieve(&self, state: &mut TurnState) -> Result<(), StageError> {
        let hits = self
            .index
            .search(&state.domain, state.query(), self.limit)
            .await?;

        if hits.is_empty() {
            state.document_found = false;
            state.note(format!("Retrieval: no chunks found in domain '{}'", state.domain));
            return Ok(());
        }

        // Only chunks that contribute text are cited.
        let (sources, texts): (Vec<String>, Vec<&str>) = hits
            .iter()
            .filter_map(|h| {
                h.text()
                    .filter(|t| !t.trim().is_empty())
                    .map(|t| (h.id.clone(), t))
            })
            .unzip();
        let context = texts.join("\n\n");
        state.sources = sources;
        state.document_found = !texts.is_empty();
        state.note(format!(
            "Retrieval: {} chunks from domain '{}'",
            texts.len(),
            state.domain
        ));
        tracing::info!(
            domain = %state.domain,
            hits = hits.len(),
            found = state.document_found,
            "retrieval complete"
        );
        state.document_context = Some(context);
        Ok(())
    }
}
