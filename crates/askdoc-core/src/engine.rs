//! Hybrid retrieval engine with cascading fallback.
//!
//! Given a question and an optional target fingerprint, the engine
//! scores chunks across the documents in scope using vector similarity
//! plus lexical bonuses, escalating through progressively broader and
//! cheaper strategies while results stay insufficient:
//!
//! 1. Vector sweep, `top_k = 10`
//! 2. Vector sweep, `top_k = 30`
//! 3. Vector sweep, `top_k = 50`
//! 4. Per-term vector probe (`top_k = 20`, first non-empty term wins)
//! 5. Exact substring scan over every chunk (fixed score, last resort)
//!
//! The escalation order is a single piece of data ([`RetrievalParams::
//! strategies`]), not entangled branching: each stage runs at most
//! once, there is no backward transition, and the engine returns the
//! first stage result with at least [`RetrievalParams::min_results`]
//! entries, or whatever the final stage produced.
//!
//! Per-document read failures are logged and skipped — one bad index
//! must never abort a multi-document query. Scoring favors recall over
//! precision (the generative answerer does the final grounding), hence
//! the deliberately low score threshold.

use anyhow::Context;
use tracing::{debug, warn};

use crate::embedding::{embed_query, Embedder};
use crate::error::RetrievalError;
use crate::index::{l2_normalize, VectorIndex};
use crate::models::{Chunk, DocumentRecord, ScoredChunk};
use crate::store::DocumentStore;
use crate::terms::{question_terms, raw_tokens};

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone)]
pub struct RetrievalParams {
    /// A stage yielding fewer results than this triggers escalation.
    pub min_results: usize,
    /// Combined-score floor for vector-stage results (exclusive).
    pub score_threshold: f64,
    /// Maximum results from a vector stage.
    pub max_results: usize,
    /// `top_k` per vector-sweep stage, in escalation order.
    pub sweep_ks: Vec<usize>,
    /// `top_k` for the per-term vector probe.
    pub probe_k: usize,
    /// Maximum results from the exact substring scan.
    pub direct_limit: usize,
    /// Fixed score assigned to exact substring matches.
    pub direct_score: f64,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            min_results: 3,
            score_threshold: 0.05,
            max_results: 15,
            sweep_ks: vec![10, 30, 50],
            probe_k: 20,
            direct_limit: 10,
            direct_score: 0.8,
        }
    }
}

/// One fallback stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Score the question against every document's vector index.
    VectorSweep { top_k: usize },
    /// Probe each raw question token as its own query; the first
    /// token with a non-empty result wins (no merging across terms).
    TermProbe { top_k: usize },
    /// Literal substring scan over every chunk of every document.
    DirectScan,
}

impl RetrievalParams {
    /// The escalation order as data.
    pub fn strategies(&self) -> Vec<Strategy> {
        let mut stages: Vec<Strategy> = self
            .sweep_ks
            .iter()
            .map(|&top_k| Strategy::VectorSweep { top_k })
            .collect();
        stages.push(Strategy::TermProbe { top_k: self.probe_k });
        stages.push(Strategy::DirectScan);
        stages
    }
}

/// Lexical bonus: 0.1 per keyword-set term occurring as a substring
/// of the lower-cased chunk text.
pub fn keyword_bonus(terms: &[String], text_lower: &str) -> f64 {
    0.1 * terms.iter().filter(|t| text_lower.contains(t.as_str())).count() as f64
}

/// Variant-match bonus: 0.2 × the fraction of keyword-set terms the
/// chunk contains directly or with hyphens and spaces swapped. A crude
/// proxy for morphological variants, not true semantic matching.
pub fn semantic_bonus(terms: &[String], text_lower: &str) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }
    let matches = terms
        .iter()
        .filter(|t| {
            text_lower.contains(t.as_str())
                || text_lower.contains(&t.replace('-', " "))
                || text_lower.contains(&t.replace(' ', "-"))
        })
        .count();
    matches as f64 / terms.len() as f64 * 0.2
}

/// Answer a question with an ordered list of supporting chunks,
/// most relevant first.
///
/// Returns `Ok(vec![])` when every fallback stage comes up empty
/// (the explicit "no results" outcome) and
/// [`RetrievalError::NoDocumentsRegistered`] when the catalog is empty.
/// An unknown `target` fingerprint widens the scope to every
/// registered document rather than failing.
pub async fn retrieve<S, E>(
    store: &S,
    embedder: &E,
    params: &RetrievalParams,
    question: &str,
    target: Option<&str>,
) -> Result<Vec<ScoredChunk>, RetrievalError>
where
    S: DocumentStore + ?Sized,
    E: Embedder + ?Sized,
{
    if question.trim().is_empty() {
        return Ok(Vec::new());
    }

    let catalog = store.load_catalog().await.map_err(RetrievalError::Other)?;
    if catalog.is_empty() {
        return Err(RetrievalError::NoDocumentsRegistered);
    }
    let scope: Vec<DocumentRecord> = catalog.in_scope(target).into_iter().cloned().collect();

    let mut results = Vec::new();
    for strategy in params.strategies() {
        results = match strategy {
            Strategy::VectorSweep { top_k } => {
                vector_sweep(store, embedder, params, &scope, question, top_k).await?
            }
            Strategy::TermProbe { top_k } => {
                term_probe(store, embedder, params, &scope, question, top_k).await?
            }
            Strategy::DirectScan => direct_scan(store, params, &scope, question).await?,
        };
        debug!(?strategy, results = results.len(), "retrieval stage finished");
        if results.len() >= params.min_results {
            break;
        }
    }
    Ok(results)
}

/// One vector-scoring pass over every document in scope.
///
/// The keyword set is derived from `query_text` itself, so the
/// per-term probe gets term-specific lexical bonuses for free.
async fn vector_sweep<S, E>(
    store: &S,
    embedder: &E,
    params: &RetrievalParams,
    scope: &[DocumentRecord],
    query_text: &str,
    top_k: usize,
) -> Result<Vec<ScoredChunk>, RetrievalError>
where
    S: DocumentStore + ?Sized,
    E: Embedder + ?Sized,
{
    let terms = question_terms(query_text);
    let mut query_vec = embed_query(embedder, query_text)
        .await
        .context("embedding the query failed")
        .map_err(RetrievalError::Other)?;
    l2_normalize(&mut query_vec);

    let mut results = Vec::new();
    for record in scope {
        let (index, chunks) = match load_artifacts(store, &record.fingerprint).await {
            Ok(loaded) => loaded,
            Err(err) => {
                warn!(
                    fingerprint = %record.fingerprint,
                    error = %err,
                    "skipping unreadable document"
                );
                continue;
            }
        };

        for (similarity, row) in index.query(&query_vec, top_k) {
            let Some(chunk) = chunks.get(row) else {
                continue;
            };
            let text_lower = chunk.text.to_lowercase();
            let kw_bonus = keyword_bonus(&terms, &text_lower);
            let sem_bonus = semantic_bonus(&terms, &text_lower);
            let combined = similarity as f64 + kw_bonus + sem_bonus;
            if combined > params.score_threshold {
                results.push(ScoredChunk {
                    fingerprint: record.fingerprint.clone(),
                    filename: record.filename.clone(),
                    chunk: chunk.clone(),
                    similarity: similarity as f64,
                    keyword_bonus: kw_bonus,
                    combined_score: combined,
                    direct_match: false,
                });
            }
        }
    }

    sort_by_score(&mut results);
    results.truncate(params.max_results);
    Ok(results)
}

/// Stage 4: run the vector sweep once per raw question token and adopt
/// the first token whose result is non-empty.
async fn term_probe<S, E>(
    store: &S,
    embedder: &E,
    params: &RetrievalParams,
    scope: &[DocumentRecord],
    question: &str,
    top_k: usize,
) -> Result<Vec<ScoredChunk>, RetrievalError>
where
    S: DocumentStore + ?Sized,
    E: Embedder + ?Sized,
{
    for token in raw_tokens(question) {
        let results = vector_sweep(store, embedder, params, scope, &token, top_k).await?;
        if !results.is_empty() {
            debug!(token = %token, results = results.len(), "term probe matched");
            return Ok(results);
        }
    }
    Ok(Vec::new())
}

/// Stage 5: literal substring scan, the last resort.
///
/// Every chunk containing any raw question token scores a fixed
/// [`RetrievalParams::direct_score`], counted once per chunk; ties
/// keep encounter order.
async fn direct_scan<S>(
    store: &S,
    params: &RetrievalParams,
    scope: &[DocumentRecord],
    question: &str,
) -> Result<Vec<ScoredChunk>, RetrievalError>
where
    S: DocumentStore + ?Sized,
{
    let tokens = raw_tokens(question);
    if tokens.is_empty() {
        return Ok(Vec::new());
    }

    let mut results = Vec::new();
    for record in scope {
        let chunks = match store.load_chunks(&record.fingerprint).await {
            Ok(chunks) => chunks,
            Err(err) => {
                warn!(
                    fingerprint = %record.fingerprint,
                    error = %err,
                    "skipping unreadable document"
                );
                continue;
            }
        };
        for chunk in &chunks {
            let text_lower = chunk.text.to_lowercase();
            if tokens.iter().any(|t| text_lower.contains(t.as_str())) {
                results.push(ScoredChunk {
                    fingerprint: record.fingerprint.clone(),
                    filename: record.filename.clone(),
                    chunk: chunk.clone(),
                    similarity: params.direct_score,
                    keyword_bonus: 0.0,
                    combined_score: params.direct_score,
                    direct_match: true,
                });
            }
        }
    }

    sort_by_score(&mut results);
    results.truncate(params.direct_limit);
    Ok(results)
}

async fn load_artifacts<S>(
    store: &S,
    fingerprint: &str,
) -> anyhow::Result<(VectorIndex, Vec<Chunk>)>
where
    S: DocumentStore + ?Sized,
{
    let index = store.load_index(fingerprint).await?;
    let chunks = store.load_chunks(fingerprint).await?;
    Ok((index, chunks))
}

/// Descending combined score; `sort_by` is stable, so equal scores
/// keep their encounter order.
fn sort_by_score(results: &mut [ScoredChunk]) {
    results.sort_by(|a, b| {
        b.combined_score
            .partial_cmp(&a.combined_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::models::{Catalog, DocumentRecord};
    use crate::store::memory::InMemoryStore;

    struct StubEmbedder {
        by_text: HashMap<String, Vec<f32>>,
        fallback: Vec<f32>,
    }

    impl StubEmbedder {
        fn new(fallback: Vec<f32>) -> Self {
            Self {
                by_text: HashMap::new(),
                fallback,
            }
        }
    }

    #[async_trait]
    impl Embedder for StubEmbedder {
        fn model_name(&self) -> &str {
            "stub"
        }
        fn dims(&self) -> usize {
            self.fallback.len()
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| self.by_text.get(t).cloned().unwrap_or_else(|| self.fallback.clone()))
                .collect())
        }
    }

    /// Counts `load_index` calls to observe which stages ran.
    struct CountingStore {
        inner: InMemoryStore,
        index_loads: AtomicUsize,
    }

    impl CountingStore {
        fn new(inner: InMemoryStore) -> Self {
            Self {
                inner,
                index_loads: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DocumentStore for CountingStore {
        async fn load_catalog(&self) -> Result<Catalog> {
            self.inner.load_catalog().await
        }
        async fn register(&self, record: DocumentRecord) -> Result<Catalog> {
            self.inner.register(record).await
        }
        async fn save_document(
            &self,
            record: &DocumentRecord,
            chunks: &[Chunk],
            raw_vectors: &[Vec<f32>],
            index: &VectorIndex,
            raw_text: &str,
        ) -> Result<()> {
            self.inner
                .save_document(record, chunks, raw_vectors, index, raw_text)
                .await
        }
        async fn load_chunks(&self, fingerprint: &str) -> Result<Vec<Chunk>> {
            self.inner.load_chunks(fingerprint).await
        }
        async fn load_index(&self, fingerprint: &str) -> Result<VectorIndex> {
            self.index_loads.fetch_add(1, Ordering::SeqCst);
            self.inner.load_index(fingerprint).await
        }
        fn index_location(&self, fingerprint: &str) -> String {
            self.inner.index_location(fingerprint)
        }
        fn chunks_location(&self, fingerprint: &str) -> String {
            self.inner.chunks_location(fingerprint)
        }
    }

    fn make_chunk(fingerprint: &str, index: usize, text: &str) -> Chunk {
        Chunk {
            id: format!("chunk_{index}"),
            index,
            text: text.to_string(),
            category: "General".to_string(),
            sub_topics: vec!["general information".to_string()],
            section: "General".to_string(),
            clause: None,
            fingerprint: fingerprint.to_string(),
        }
    }

    fn make_record(fingerprint: &str, num_chunks: usize) -> DocumentRecord {
        DocumentRecord {
            fingerprint: fingerprint.to_string(),
            filename: format!("{fingerprint}.pdf"),
            pages: 1,
            size_bytes: 100,
            processed_at: Utc::now(),
            num_chunks,
            index_path: format!("memory://indexes/{fingerprint}"),
            chunks_path: format!("memory://chunks/{fingerprint}"),
        }
    }

    async fn seed_document(
        store: &impl DocumentStore,
        fingerprint: &str,
        texts: &[&str],
        vectors: &[Vec<f32>],
    ) {
        let chunks: Vec<Chunk> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| make_chunk(fingerprint, i, t))
            .collect();
        let index = VectorIndex::build(vectors).unwrap();
        let record = make_record(fingerprint, chunks.len());
        store
            .save_document(&record, &chunks, vectors, &index, "")
            .await
            .unwrap();
        store.register(record).await.unwrap();
    }

    #[tokio::test]
    async fn empty_catalog_is_an_explicit_error() {
        let store = InMemoryStore::new();
        let embedder = StubEmbedder::new(vec![1.0, 0.0]);
        let err = retrieve(&store, &embedder, &RetrievalParams::default(), "anything", None)
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::NoDocumentsRegistered));
    }

    #[tokio::test]
    async fn targeted_question_finds_grace_period_with_keyword_bonus() {
        let store = InMemoryStore::new();
        let embedder = StubEmbedder::new(vec![1.0, 0.0]);
        seed_document(
            &store,
            "doc1",
            &["Grace period is 30 days for premium payment."],
            &[vec![1.0, 0.0]],
        )
        .await;

        // One chunk total, so a single hit must satisfy the stage.
        let params = RetrievalParams {
            min_results: 1,
            ..RetrievalParams::default()
        };
        let results = retrieve(&store, &embedder, &params, "What is the grace period?", Some("doc1"))
            .await
            .unwrap();

        assert!(!results.is_empty());
        let top = &results[0];
        assert!(top.chunk.text.to_lowercase().contains("grace period"));
        assert!(top.keyword_bonus > 0.0, "grace and period should both match");
        assert!(!top.direct_match);
        assert!(top.combined_score > top.similarity);
    }

    #[tokio::test]
    async fn unknown_target_searches_everything() {
        let store = InMemoryStore::new();
        let embedder = StubEmbedder::new(vec![1.0, 0.0]);
        seed_document(
            &store,
            "doc1",
            &["Grace period is 30 days for premium payment."],
            &[vec![1.0, 0.0]],
        )
        .await;

        let results = retrieve(
            &store,
            &embedder,
            &RetrievalParams::default(),
            "What is the grace period?",
            Some("doesnotexist"),
        )
        .await
        .unwrap();

        assert!(!results.is_empty(), "unknown fingerprint must widen, not fail");
        assert_eq!(results[0].fingerprint, "doc1");
    }

    #[tokio::test]
    async fn results_are_ordered_and_above_threshold() {
        let store = InMemoryStore::new();
        let embedder = StubEmbedder::new(vec![1.0, 0.0]);
        let texts = [
            "Grace period for premium payment is thirty days.",
            "The waiting period spans several months of time.",
            "Unrelated text about sailing across oceans.",
            "Barely related text.",
        ];
        let vectors = vec![
            vec![0.9, 0.4359],
            vec![0.6, 0.8],
            vec![0.04, 0.9992],
            vec![0.03, 0.9996],
        ];
        seed_document(&store, "doc1", &texts, &vectors).await;

        let results = retrieve(
            &store,
            &embedder,
            &RetrievalParams::default(),
            "What is the grace period?",
            None,
        )
        .await
        .unwrap();

        assert!(!results.is_empty());
        for pair in results.windows(2) {
            assert!(pair[0].combined_score >= pair[1].combined_score);
        }
        for r in &results {
            assert!(r.combined_score > 0.05);
        }
        // The sailing chunks earn no lexical bonus and sit at or below
        // the threshold on similarity alone.
        assert!(results.iter().all(|r| !r.chunk.text.contains("sailing")));
    }

    #[tokio::test]
    async fn low_vector_rank_escalates_to_wider_sweep() {
        // 25 filler chunks crowd the top-10 but score under the
        // threshold; 3 keyword-rich chunks hide below them and only
        // surface once the sweep widens to 30.
        let store = CountingStore::new(InMemoryStore::new());
        let question = "waiting period duration";
        let embedder = StubEmbedder::new(vec![1.0, 0.0]);

        let mut texts: Vec<String> = (0..25).map(|i| format!("zzz filler {i}")).collect();
        let mut vectors: Vec<Vec<f32>> = (0..25).map(|_| vec![0.04, 0.9992]).collect();
        for _ in 0..3 {
            texts.push("waiting period duration time".to_string());
            vectors.push(vec![-0.1, 0.995]);
        }
        let text_refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
        seed_document(&store, "doc1", &text_refs, &vectors).await;

        let results = retrieve(&store, &embedder, &RetrievalParams::default(), question, None)
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| !r.direct_match));
        // Stage 1 (top_k=10) found nothing, stage 2 (top_k=30) found
        // all three, stage 3 never ran.
        assert_eq!(store.index_loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn exhausted_vector_stages_fall_back_to_direct_scan() {
        // 8 fillers and 2 keyword-rich chunks: every vector stage
        // yields those same 2 (< 3), the term probe adopts its first
        // non-empty token, and the direct scan has the final word.
        let store = CountingStore::new(InMemoryStore::new());
        let embedder = StubEmbedder::new(vec![1.0, 0.0]);

        let mut texts: Vec<String> = (0..8).map(|i| format!("zzz filler {i}")).collect();
        let mut vectors: Vec<Vec<f32>> = (0..8).map(|_| vec![0.04, 0.9992]).collect();
        for _ in 0..2 {
            texts.push("waiting period duration time".to_string());
            vectors.push(vec![-0.1, 0.995]);
        }
        let text_refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
        seed_document(&store, "doc1", &text_refs, &vectors).await;

        let results = retrieve(
            &store,
            &embedder,
            &RetrievalParams::default(),
            "waiting period duration",
            None,
        )
        .await
        .unwrap();

        // The direct scan matched the two keyword chunks at the fixed
        // score, in encounter order.
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.direct_match));
        assert!(results.iter().all(|r| (r.combined_score - 0.8).abs() < 1e-9));
        assert!(results[0].chunk.index < results[1].chunk.index);
        // Three sweeps plus one adopted probe token touched the index.
        assert_eq!(store.index_loads.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn unreadable_document_is_skipped_not_fatal() {
        let store = InMemoryStore::new();
        let embedder = StubEmbedder::new(vec![1.0, 0.0]);
        seed_document(
            &store,
            "good",
            &["Grace period is 30 days for premium payment."],
            &[vec![1.0, 0.0]],
        )
        .await;
        seed_document(&store, "bad", &["other text"], &[vec![1.0, 0.0]]).await;
        store.corrupt_document("bad");

        let results = retrieve(
            &store,
            &embedder,
            &RetrievalParams::default(),
            "What is the grace period?",
            None,
        )
        .await
        .unwrap();

        assert!(!results.is_empty());
        assert!(results.iter().all(|r| r.fingerprint == "good"));
    }

    #[tokio::test]
    async fn blank_question_returns_empty() {
        let store = InMemoryStore::new();
        let embedder = StubEmbedder::new(vec![1.0, 0.0]);
        seed_document(&store, "doc1", &["text"], &[vec![1.0, 0.0]]).await;
        let results = retrieve(&store, &embedder, &RetrievalParams::default(), "   ", None)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn strategies_are_ordered_data() {
        let params = RetrievalParams::default();
        let stages = params.strategies();
        assert_eq!(
            stages,
            vec![
                Strategy::VectorSweep { top_k: 10 },
                Strategy::VectorSweep { top_k: 30 },
                Strategy::VectorSweep { top_k: 50 },
                Strategy::TermProbe { top_k: 20 },
                Strategy::DirectScan,
            ]
        );
    }

    #[test]
    fn bonuses_match_their_definitions() {
        let terms = vec!["grace".to_string(), "period".to_string(), "co-pay".to_string()];
        let text = "the grace period includes a co pay clause";
        assert!((keyword_bonus(&terms, text) - 0.2).abs() < 1e-9);
        // "co-pay" matches via the hyphen/space swap, so 3 of 3 terms.
        assert!((semantic_bonus(&terms, text) - 0.2).abs() < 1e-9);
        assert_eq!(semantic_bonus(&[], text), 0.0);
    }
}
