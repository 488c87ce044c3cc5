//! End-to-end pipeline tests: ingest real files into a filesystem
//! store with a deterministic embedder, then retrieve through the
//! full fallback engine.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;

use askdoc::config::ChunkingConfig;
use askdoc::fs_store::FsStore;
use askdoc::ingest::Ingestor;
use askdoc_core::embedding::Embedder;
use askdoc_core::engine::{retrieve, RetrievalParams};
use askdoc_core::error::IngestError;
use askdoc_core::store::DocumentStore;

/// Embeds everything to the same unit vector and counts calls.
/// Similarity is constant, so retrieval ordering is driven entirely
/// by the lexical bonuses.
struct StubEmbedder {
    calls: AtomicUsize,
    vectors_per_call: Option<usize>,
}

impl StubEmbedder {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            vectors_per_call: None,
        }
    }

    /// Return a fixed number of vectors regardless of input size, to
    /// provoke the parity check.
    fn broken(vectors_per_call: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            vectors_per_call: Some(vectors_per_call),
        }
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    fn model_name(&self) -> &str {
        "stub"
    }
    fn dims(&self) -> usize {
        4
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let n = self.vectors_per_call.unwrap_or(texts.len());
        Ok((0..n).map(|_| vec![1.0, 0.0, 0.0, 0.0]).collect())
    }
}

fn write_file(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

// Long enough to produce several chunks, so the first vector sweep
// already satisfies the minimum result count.
const POLICY: &str = "Grace period of thirty days is provided for premium payment after the due \
date to renew or continue the policy without losing continuity benefits. During the grace period \
the insurer shall not deny any claim solely on the ground of delayed premium payment, provided \
the premium is received before the grace period expires. Premium payment may be made annually, \
half-yearly, quarterly or monthly as chosen at inception.\n\n\
There is a waiting period of thirty-six months of continuous coverage from the first policy \
inception for pre-existing diseases and their direct complications to be covered under the \
policy. The waiting period applies afresh to any enhancement of the sum insured, limited to the \
extent of the enhancement. Specific named ailments carry a waiting period of twenty-four months \
of continuous coverage irrespective of medical history declared at inception.\n\n\
The policy covers medical expenses for organ donor hospitalization for harvesting the organ, \
provided the organ is donated for the use of an insured person and the donation conforms to the \
transplantation of human organs regulations in force. Expenses of the donor after discharge are \
not payable under this benefit.\n\n\
Expenses for cataract surgery are covered after a waiting period of twenty-four months, subject \
to the sub-limits stated in the schedule for each eye in one policy year. Day care treatment for \
cataract surgery does not require twenty-four hours of hospitalization to be admissible.\n\n\
A hospital means any institution established for inpatient care and day care treatment which has \
qualified nursing staff under its employment round the clock, at least ten inpatient beds in \
towns with a population below ten lakhs and fifteen beds in all other places, and a fully \
equipped operation theatre of its own.";

const HANDBOOK: &str = "Employees accrue vacation days monthly. Unused days roll over up to a \
cap of thirty days per calendar year.\n\n\
Remote work requires manager approval and a secure network connection.";

#[tokio::test]
async fn ingest_then_retrieve_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsStore::open(dir.path().join("store")).unwrap();
    let embedder = StubEmbedder::new();
    let ingestor = Ingestor::new(&store, &embedder, ChunkingConfig::default());

    let path = write_file(dir.path(), "policy.txt", POLICY);
    let outcome = ingestor.ingest_file(&path).await.unwrap();
    assert!(!outcome.already_processed);
    assert!(outcome.chunk_count >= 1);
    assert_eq!(outcome.filename, "policy.txt");

    let catalog = store.load_catalog().await.unwrap();
    assert_eq!(catalog.total_documents, 1);
    assert_eq!(catalog.total_chunks, outcome.chunk_count);

    let results = retrieve(
        &store,
        &embedder,
        &RetrievalParams::default(),
        "What is the grace period for premium payment?",
        None,
    )
    .await
    .unwrap();

    assert!(!results.is_empty());
    assert!(results[0].chunk.text.to_lowercase().contains("grace period"));
    assert!(results[0].keyword_bonus > 0.0);
    // The tagger should have labeled the premium chunk.
    assert_eq!(results[0].chunk.category, "Premiums");
}

#[tokio::test]
async fn duplicate_content_short_circuits_without_embedding() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsStore::open(dir.path().join("store")).unwrap();
    let embedder = StubEmbedder::new();
    let ingestor = Ingestor::new(&store, &embedder, ChunkingConfig::default());

    let first = write_file(dir.path(), "policy.txt", POLICY);
    let outcome1 = ingestor.ingest_file(&first).await.unwrap();
    let calls_after_first = embedder.calls.load(Ordering::SeqCst);
    assert!(calls_after_first >= 1);

    // Same bytes under a different name: same fingerprint.
    let second = write_file(dir.path(), "policy_copy.txt", POLICY);
    let outcome2 = ingestor.ingest_file(&second).await.unwrap();
    assert!(outcome2.already_processed);
    assert_eq!(outcome2.fingerprint, outcome1.fingerprint);
    assert_eq!(outcome2.chunk_count, outcome1.chunk_count);
    // The record keeps the original filename.
    assert_eq!(outcome2.filename, "policy.txt");
    assert_eq!(embedder.calls.load(Ordering::SeqCst), calls_after_first);

    let catalog = store.load_catalog().await.unwrap();
    assert_eq!(catalog.total_documents, 1);
    assert_eq!(catalog.total_chunks, outcome1.chunk_count);
}

#[tokio::test]
async fn embedding_parity_mismatch_is_fatal_and_leaves_no_registration() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsStore::open(dir.path().join("store")).unwrap();
    let embedder = StubEmbedder::broken(1000);
    let ingestor = Ingestor::new(&store, &embedder, ChunkingConfig::default());

    let path = write_file(dir.path(), "policy.txt", POLICY);
    let err = ingestor.ingest_file(&path).await.unwrap_err();
    assert!(matches!(err, IngestError::EmbeddingCountMismatch { .. }));

    let catalog = store.load_catalog().await.unwrap();
    assert!(catalog.is_empty());
}

#[tokio::test]
async fn unsupported_file_type_is_an_extraction_failure() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsStore::open(dir.path().join("store")).unwrap();
    let embedder = StubEmbedder::new();
    let ingestor = Ingestor::new(&store, &embedder, ChunkingConfig::default());

    let path = write_file(dir.path(), "photo.png", "not really a photo");
    let err = ingestor.ingest_file(&path).await.unwrap_err();
    assert!(matches!(err, IngestError::ExtractionFailed { .. }));
    assert!(store.load_catalog().await.unwrap().is_empty());
}

#[tokio::test]
async fn target_fingerprint_narrows_and_unknown_widens() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsStore::open(dir.path().join("store")).unwrap();
    let embedder = StubEmbedder::new();
    let ingestor = Ingestor::new(&store, &embedder, ChunkingConfig::default());

    let policy = write_file(dir.path(), "policy.txt", POLICY);
    let handbook = write_file(dir.path(), "handbook.txt", HANDBOOK);
    let policy_fp = ingestor.ingest_file(&policy).await.unwrap().fingerprint;
    ingestor.ingest_file(&handbook).await.unwrap();

    let params = RetrievalParams::default();
    let question = "What is the waiting period for pre-existing diseases?";

    let targeted = retrieve(&store, &embedder, &params, question, Some(&policy_fp))
        .await
        .unwrap();
    assert!(!targeted.is_empty());
    assert!(targeted.iter().all(|r| r.fingerprint == policy_fp));

    let widened = retrieve(&store, &embedder, &params, question, Some("nosuchdoc"))
        .await
        .unwrap();
    assert!(!widened.is_empty());
    // Unknown fingerprint searches everything rather than failing.
    assert!(widened.iter().any(|r| r.fingerprint == policy_fp));
}

#[tokio::test]
async fn email_body_is_ingested_without_headers() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsStore::open(dir.path().join("store")).unwrap();
    let embedder = StubEmbedder::new();
    let ingestor = Ingestor::new(&store, &embedder, ChunkingConfig::default());

    let path = write_file(
        dir.path(),
        "notice.eml",
        "From: hr@example.com\nSubject: policy update\n\n\
         The grace period for premium payment is extended to forty-five days.",
    );
    let outcome = ingestor.ingest_file(&path).await.unwrap();
    let chunks = store.load_chunks(&outcome.fingerprint).await.unwrap();
    assert!(chunks.iter().all(|c| !c.text.contains("hr@example.com")));
    assert!(chunks.iter().any(|c| c.text.contains("forty-five days")));
}
