//! Embedding provider trait.
//!
//! Concrete providers (OpenAI-compatible HTTP, test stubs) live in the
//! `askdoc` app crate; the engine and ingestion pipeline depend only
//! on this seam. Providers return one vector per input string in input
//! order and need not normalize — callers normalize themselves.

use anyhow::Result;
use async_trait::async_trait;

/// Trait for embedding providers.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Embedding vector dimensionality.
    fn dims(&self) -> usize;

    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed a single query text.
pub async fn embed_query<E: Embedder + ?Sized>(embedder: &E, text: &str) -> Result<Vec<f32>> {
    let vectors = embedder.embed(&[text.to_string()]).await?;
    vectors
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("empty embedding response"))
}
