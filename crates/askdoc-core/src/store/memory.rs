//! In-memory [`DocumentStore`] implementation for tests.
//!
//! Uses `HashMap`s behind `std::sync::RwLock` for thread safety. The
//! registration cycle holds the catalog write lock for its duration,
//! which gives the same lost-update protection the filesystem store
//! gets from its mutex.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::index::VectorIndex;
use crate::models::{Catalog, Chunk, DocumentRecord};

use super::DocumentStore;

#[derive(Default)]
pub struct InMemoryStore {
    catalog: RwLock<Catalog>,
    chunks: RwLock<HashMap<String, Vec<Chunk>>>,
    indexes: RwLock<HashMap<String, VectorIndex>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop a document's artifacts while leaving its catalog entry in
    /// place. Simulates a missing or corrupt store for skip-path tests.
    pub fn corrupt_document(&self, fingerprint: &str) {
        self.chunks.write().unwrap().remove(fingerprint);
        self.indexes.write().unwrap().remove(fingerprint);
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn load_catalog(&self) -> Result<Catalog> {
        Ok(self.catalog.read().unwrap().clone())
    }

    async fn register(&self, record: DocumentRecord) -> Result<Catalog> {
        let mut catalog = self.catalog.write().unwrap();
        catalog.upsert(record);
        Ok(catalog.clone())
    }

    async fn save_document(
        &self,
        record: &DocumentRecord,
        chunks: &[Chunk],
        _raw_vectors: &[Vec<f32>],
        index: &VectorIndex,
        _raw_text: &str,
    ) -> Result<()> {
        self.chunks
            .write()
            .unwrap()
            .insert(record.fingerprint.clone(), chunks.to_vec());
        self.indexes
            .write()
            .unwrap()
            .insert(record.fingerprint.clone(), index.clone());
        Ok(())
    }

    async fn load_chunks(&self, fingerprint: &str) -> Result<Vec<Chunk>> {
        self.chunks
            .read()
            .unwrap()
            .get(fingerprint)
            .cloned()
            .ok_or_else(|| anyhow!("no chunk store for {}", fingerprint))
    }

    async fn load_index(&self, fingerprint: &str) -> Result<VectorIndex> {
        self.indexes
            .read()
            .unwrap()
            .get(fingerprint)
            .cloned()
            .ok_or_else(|| anyhow!("no vector index for {}", fingerprint))
    }

    fn index_location(&self, fingerprint: &str) -> String {
        format!("memory://indexes/{}", fingerprint)
    }

    fn chunks_location(&self, fingerprint: &str) -> String {
        format!("memory://chunks/{}", fingerprint)
    }
}
