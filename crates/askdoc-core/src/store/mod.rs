//! Storage abstraction for askdoc.
//!
//! The [`DocumentStore`] trait covers everything the ingestion
//! pipeline writes and the retrieval engine reads: the catalog, the
//! per-document chunk store, and the per-document vector index.
//! Implementations must be `Send + Sync`; the filesystem store lives
//! in the app crate and [`memory::InMemoryStore`] backs the tests.
//!
//! # Contracts
//!
//! - `load_catalog` treats an absent catalog as empty, never an error.
//! - `register` performs the whole load → upsert → recompute → persist
//!   cycle as one serialized unit, so two ingestions finishing close
//!   together cannot lose a registration.
//! - `save_document` keeps the binary and human-readable chunk forms
//!   in sync; artifacts become visible to readers only once complete.
//! - `load_chunks`/`load_index` fail clearly on missing or corrupt
//!   artifacts; the retrieval engine logs and skips that document.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::index::VectorIndex;
use crate::models::{Catalog, Chunk, DocumentRecord};

/// Abstract storage backend.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Load the catalog, or an empty one if none has been persisted.
    async fn load_catalog(&self) -> Result<Catalog>;

    /// Register a document: load the catalog, insert the record,
    /// recompute totals, persist atomically. Returns the updated
    /// catalog. Serialized against concurrent registrations.
    async fn register(&self, record: DocumentRecord) -> Result<Catalog>;

    /// Persist all artifacts for one document: the vector index over
    /// normalized embeddings, the raw embedding vectors, the tagged
    /// chunk list (binary and human-readable forms), and the raw
    /// extracted text.
    async fn save_document(
        &self,
        record: &DocumentRecord,
        chunks: &[Chunk],
        raw_vectors: &[Vec<f32>],
        index: &VectorIndex,
        raw_text: &str,
    ) -> Result<()>;

    /// Load the ordered chunk list for a document.
    async fn load_chunks(&self, fingerprint: &str) -> Result<Vec<Chunk>>;

    /// Load the vector index for a document.
    async fn load_index(&self, fingerprint: &str) -> Result<VectorIndex>;

    /// Store location of a document's vector index, for the record.
    fn index_location(&self, fingerprint: &str) -> String;

    /// Store location of a document's binary chunk list, for the record.
    fn chunks_location(&self, fingerprint: &str) -> String;

    /// Whether a fingerprint is already registered.
    async fn is_registered(&self, fingerprint: &str) -> Result<bool> {
        Ok(self.load_catalog().await?.contains(fingerprint))
    }
}
