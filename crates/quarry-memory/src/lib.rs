//! Domain-scoped vector retrieval and chat transcript storage.
//!
//! One vector collection per knowledge domain ([`DomainIndex`]), backed by
//! Qdrant or an in-process store, plus an append-only transcript of chat
//! turns ([`transcript`]).

pub mod domain;
pub mod domain_index;
pub mod embedding;
pub mod error;
pub mod in_memory_store;
pub mod qdrant_ops;
pub mod splitter;
pub mod transcript;
pub mod vector_store;

pub use domain::DomainId;
pub use domain_index::{DomainIndex, DomainStats, DomainStatus, SearchHit, StoredChunk, UpsertReport};
pub use embedding::EmbeddingGateway;
pub use error::MemoryError;
pub use in_memory_store::InMemoryVectorStore;
pub use qdrant_ops::QdrantOps;
pub use splitter::{SplitterConfig, TextSplitter};
pub use transcript::{
    InMemoryTranscriptStore, SessionSummary, SqliteStore, TranscriptEntry, TranscriptStore,
};
pub use vector_store::{
    CollectionInfo, CollectionStatus, Payload, ScoredVectorPoint, ScrollPage, StoredPoint,
    VectorPoint, VectorStore, VectorStoreError,
};
