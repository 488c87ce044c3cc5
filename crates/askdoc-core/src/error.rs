//! Error taxonomy for ingestion and retrieval.
//!
//! Ingestion errors are always surfaced to the caller; a failed
//! ingestion leaves no partial catalog registration behind. Retrieval
//! swallows per-document read failures (logging and skipping the
//! document) and only fails outright when there is nothing to search
//! or an external call breaks.

use thiserror::Error;

/// Fatal ingestion failures. Each aborts the ingestion attempt for
/// that document cleanly.
#[derive(Debug, Error)]
pub enum IngestError {
    /// No usable text could be extracted from the document.
    #[error("text extraction failed for {filename}: {reason}")]
    ExtractionFailed { filename: String, reason: String },

    /// Chunking produced zero chunks.
    #[error("chunking produced no chunks for {filename}")]
    NoChunks { filename: String },

    /// The embedding provider returned a different number of vectors
    /// than chunks. Never truncated or padded over.
    #[error("embedding count mismatch: {chunks} chunks but {embeddings} vectors")]
    EmbeddingCountMismatch { chunks: usize, embeddings: usize },

    /// Storage or provider failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Retrieval failures that cannot be answered with an empty result.
///
/// An exhausted fallback cascade is *not* an error: it yields
/// `Ok(vec![])`, the explicit "no results" outcome.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The catalog is empty; there is nothing to search.
    #[error("no documents registered; ingest a document first")]
    NoDocumentsRegistered,

    /// Catalog read or embedding failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
