//! The ingestion pipeline.
//!
//! One document moves through: fingerprint → duplicate short-circuit →
//! extract → chunk → tag → embed → normalize → index → persist →
//! register. The catalog registration comes last, so a document is
//! either fully queryable or absent; a failure at any stage leaves no
//! catalog entry behind.
//!
//! Concurrent ingestions of the *same* content serialize on a
//! per-fingerprint lock (the second caller short-circuits as a
//! duplicate); ingestions of different documents run freely in
//! parallel.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::Mutex;
use tracing::{debug, info};

use askdoc_core::chunk::chunk_text;
use askdoc_core::embedding::Embedder;
use askdoc_core::error::IngestError;
use askdoc_core::index::{l2_normalize, VectorIndex};
use askdoc_core::models::{fingerprint, Chunk, DocumentRecord};
use askdoc_core::store::DocumentStore;
use askdoc_core::tag::tag_chunk;

use crate::config::ChunkingConfig;
use crate::extract::extract;

/// Outcome of one ingestion attempt.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub fingerprint: String,
    pub filename: String,
    /// True when the content was already in the catalog and the
    /// pipeline short-circuited.
    pub already_processed: bool,
    pub chunk_count: usize,
    pub pages: usize,
}

pub struct Ingestor<'a> {
    store: &'a dyn DocumentStore,
    embedder: &'a dyn Embedder,
    chunking: ChunkingConfig,
    /// Per-fingerprint ingestion locks, created on first use.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<'a> Ingestor<'a> {
    pub fn new(
        store: &'a dyn DocumentStore,
        embedder: &'a dyn Embedder,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            chunking,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Ingest a file from disk. The stored filename is the path's
    /// final component.
    pub async fn ingest_file(&self, path: &Path) -> Result<IngestOutcome, IngestError> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))
            .map_err(IngestError::Other)?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document")
            .to_string();
        self.ingest_bytes(&filename, &bytes).await
    }

    /// Ingest a document from raw bytes.
    pub async fn ingest_bytes(
        &self,
        filename: &str,
        bytes: &[u8],
    ) -> Result<IngestOutcome, IngestError> {
        let fp = fingerprint(bytes);

        // Two callers racing on identical content serialize here; the
        // loser sees the registration and short-circuits.
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(fp.clone()).or_default())
        };
        let guard = lock.lock().await;
        let result = self.ingest_under_lock(filename, bytes, &fp).await;
        drop(guard);
        drop(lock);

        // Forget the lock unless another ingestion of the same content
        // still holds a handle, so the map doesn't grow with every
        // document ever seen.
        let mut locks = self.locks.lock().await;
        if locks.get(&fp).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(&fp);
        }
        result
    }

    async fn ingest_under_lock(
        &self,
        filename: &str,
        bytes: &[u8],
        fp: &str,
    ) -> Result<IngestOutcome, IngestError> {
        let catalog = self.store.load_catalog().await.map_err(IngestError::Other)?;
        if let Some(existing) = catalog.documents.get(fp) {
            info!(fingerprint = %fp, filename = %filename, "duplicate content, skipping");
            return Ok(IngestOutcome {
                fingerprint: fp.to_string(),
                filename: existing.filename.clone(),
                already_processed: true,
                chunk_count: existing.num_chunks,
                pages: existing.pages,
            });
        }

        let extracted = extract(filename, bytes).map_err(|e| IngestError::ExtractionFailed {
            filename: filename.to_string(),
            reason: e.to_string(),
        })?;

        let pieces = chunk_text(
            &extracted.text,
            self.chunking.chunk_size,
            self.chunking.overlap,
            self.chunking.min_chunk,
        );
        if pieces.is_empty() {
            return Err(IngestError::NoChunks {
                filename: filename.to_string(),
            });
        }

        let chunks: Vec<Chunk> = pieces
            .into_iter()
            .enumerate()
            .map(|(i, text)| {
                let tags = tag_chunk(&text);
                Chunk {
                    id: format!("chunk_{i}"),
                    index: i,
                    text,
                    category: tags.category,
                    sub_topics: tags.sub_topics,
                    section: tags.section,
                    clause: None,
                    fingerprint: fp.to_string(),
                }
            })
            .collect();
        debug!(fingerprint = %fp, chunks = chunks.len(), "chunked and tagged");

        let inputs: Vec<String> = chunks.iter().map(embedding_input).collect();
        let raw_vectors = self
            .embedder
            .embed(&inputs)
            .await
            .context("embedding the chunks failed")
            .map_err(IngestError::Other)?;
        if raw_vectors.len() != chunks.len() {
            return Err(IngestError::EmbeddingCountMismatch {
                chunks: chunks.len(),
                embeddings: raw_vectors.len(),
            });
        }

        let mut normalized = raw_vectors.clone();
        for v in &mut normalized {
            l2_normalize(v);
        }
        let index = VectorIndex::build(&normalized).map_err(IngestError::Other)?;

        let record = DocumentRecord {
            fingerprint: fp.to_string(),
            filename: filename.to_string(),
            pages: extracted.pages,
            size_bytes: bytes.len() as u64,
            processed_at: chrono::Utc::now(),
            num_chunks: chunks.len(),
            index_path: self.store.index_location(fp),
            chunks_path: self.store.chunks_location(fp),
        };

        self.store
            .save_document(&record, &chunks, &raw_vectors, &index, &extracted.text)
            .await
            .map_err(IngestError::Other)?;
        self.store
            .register(record)
            .await
            .map_err(IngestError::Other)?;

        info!(
            fingerprint = %fp,
            filename = %filename,
            chunks = chunks.len(),
            pages = extracted.pages,
            "document ingested"
        );
        Ok(IngestOutcome {
            fingerprint: fp.to_string(),
            filename: filename.to_string(),
            already_processed: false,
            chunk_count: chunks.len(),
            pages: extracted.pages,
        })
    }
}

/// The labeled text actually sent to the embedding model. The tags
/// lead so category and section context shape the vector, not just
/// the raw chunk text.
pub fn embedding_input(chunk: &Chunk) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Category: {}", chunk.category);
    let _ = writeln!(out, "Section: {}", chunk.section);
    let _ = writeln!(out, "Clause: {}", chunk.clause.as_deref().unwrap_or("N/A"));
    let _ = writeln!(out, "Topics: {}", chunk.sub_topics.join(", "));
    let _ = write!(out, "Content: {}", chunk.text);
    out
}
