//! Core data types shared across ingestion and retrieval.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Compute the content fingerprint of a document: the SHA-256 of its
/// raw bytes, hex-encoded.
///
/// Byte-identical content always resolves to the same fingerprint,
/// which is how duplicate ingestion is detected.
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// One retrievable window of a document's text.
///
/// Chunks are immutable after ingestion; a re-ingestion under a new
/// fingerprint supersedes them wholesale. `index` is the position the
/// chunk occupies in both the chunk store and the vector index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable identifier within the document (`chunk_0`, `chunk_1`, …).
    pub id: String,
    /// Sequence index, shared with the vector index rows.
    pub index: usize,
    /// Raw chunk text.
    pub text: String,
    /// Coarse main category from the heuristic tagger.
    pub category: String,
    /// Sub-topic tags.
    pub sub_topics: Vec<String>,
    /// Section label (`"General"` when none was inferred).
    pub section: String,
    /// Clause or reference label, when one is known.
    pub clause: Option<String>,
    /// Fingerprint of the owning document.
    pub fingerprint: String,
}

/// Catalog entry for one ingested document.
///
/// Created once per fingerprint and never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub fingerprint: String,
    pub filename: String,
    pub pages: usize,
    pub size_bytes: u64,
    pub processed_at: DateTime<Utc>,
    pub num_chunks: usize,
    /// Store location of the vector index artifact.
    pub index_path: String,
    /// Store location of the binary chunk artifact.
    pub chunks_path: String,
}

/// Registry of all ingested documents, keyed by fingerprint.
///
/// The totals are always recomputed as folds over the records, never
/// tracked independently, so they cannot drift. The whole catalog is
/// loaded, mutated, and persisted as one unit; serializing that
/// read-modify-write cycle is the store's job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub documents: BTreeMap<String, DocumentRecord>,
    pub total_documents: usize,
    pub total_chunks: usize,
}

impl Catalog {
    /// Insert or overwrite the record for its fingerprint and
    /// recompute both totals.
    pub fn upsert(&mut self, record: DocumentRecord) {
        self.documents.insert(record.fingerprint.clone(), record);
        self.total_documents = self.documents.len();
        self.total_chunks = self.documents.values().map(|r| r.num_chunks).sum();
    }

    pub fn contains(&self, fingerprint: &str) -> bool {
        self.documents.contains_key(fingerprint)
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Records to search for a query.
    ///
    /// A known target fingerprint narrows the scope to that single
    /// document. No target, or a fingerprint the catalog has never
    /// seen, means every registered document: callers must treat an
    /// unknown fingerprint as "search everything", not as an error.
    pub fn in_scope(&self, target: Option<&str>) -> Vec<&DocumentRecord> {
        if let Some(fp) = target {
            if let Some(record) = self.documents.get(fp) {
                return vec![record];
            }
        }
        self.documents.values().collect()
    }
}

/// A ranked retrieval hit. Produced fresh per query, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub fingerprint: String,
    pub filename: String,
    pub chunk: Chunk,
    /// Raw inner-product similarity from the vector index.
    pub similarity: f64,
    /// Lexical bonus from keyword-set substring matches.
    pub keyword_bonus: f64,
    /// Similarity plus lexical bonuses; the ranking key.
    pub combined_score: f64,
    /// True when the hit came from the exact substring fallback
    /// rather than vector search.
    pub direct_match: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fp: &str, chunks: usize) -> DocumentRecord {
        DocumentRecord {
            fingerprint: fp.to_string(),
            filename: format!("{fp}.pdf"),
            pages: 1,
            size_bytes: 10,
            processed_at: Utc::now(),
            num_chunks: chunks,
            index_path: format!("indexes/{fp}.vec"),
            chunks_path: format!("chunks/{fp}.bin"),
        }
    }

    #[test]
    fn fingerprint_is_deterministic() {
        assert_eq!(fingerprint(b"hello"), fingerprint(b"hello"));
        assert_ne!(fingerprint(b"hello"), fingerprint(b"world"));
        assert_eq!(fingerprint(b"hello").len(), 64);
    }

    #[test]
    fn upsert_recomputes_totals() {
        let mut catalog = Catalog::default();
        catalog.upsert(record("a", 3));
        catalog.upsert(record("b", 5));
        assert_eq!(catalog.total_documents, 2);
        assert_eq!(catalog.total_chunks, 8);

        // Overwriting the same fingerprint must not inflate the totals.
        catalog.upsert(record("a", 3));
        assert_eq!(catalog.total_documents, 2);
        assert_eq!(catalog.total_chunks, 8);
    }

    #[test]
    fn scope_known_target_is_single_document() {
        let mut catalog = Catalog::default();
        catalog.upsert(record("a", 1));
        catalog.upsert(record("b", 1));
        let scope = catalog.in_scope(Some("a"));
        assert_eq!(scope.len(), 1);
        assert_eq!(scope[0].fingerprint, "a");
    }

    #[test]
    fn scope_unknown_target_falls_back_to_all() {
        let mut catalog = Catalog::default();
        catalog.upsert(record("a", 1));
        catalog.upsert(record("b", 1));
        assert_eq!(catalog.in_scope(Some("doesnotexist")).len(), 2);
        assert_eq!(catalog.in_scope(None).len(), 2);
    }
}
