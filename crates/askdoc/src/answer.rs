//! Generative answering over retrieved chunks.
//!
//! The [`Answerer`] turns a question plus the retrieval engine's top
//! chunks into a natural-language answer. One chat-completion call per
//! question, no conversation state. The retrieval layer stays useful
//! without it (`askdoc search` never touches this module).

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::fmt::Write as _;
use std::time::Duration;

use askdoc_core::models::ScoredChunk;

use crate::config::AnswererConfig;

const SYSTEM_PROMPT: &str = "You are a precise assistant answering questions about documents. \
Answer using only the provided excerpts. Quote exact figures, durations, and conditions when \
they appear. If the excerpts do not contain the answer, say so plainly.";

/// Trait for answering providers.
#[async_trait]
pub trait Answerer: Send + Sync {
    /// Answer `question` grounded in `context` chunks.
    async fn answer(&self, question: &str, context: &[ScoredChunk]) -> Result<String>;
}

/// Used when `answerer.provider = "disabled"`; `askdoc ask` reports
/// the error, `askdoc search` works regardless.
pub struct DisabledAnswerer;

#[async_trait]
impl Answerer for DisabledAnswerer {
    async fn answer(&self, _question: &str, _context: &[ScoredChunk]) -> Result<String> {
        bail!("Answerer provider is disabled")
    }
}

/// Chat-completion answerer backed by `POST /v1/chat/completions` on
/// the OpenAI API. Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAiAnswerer {
    model: String,
    max_context_chunks: usize,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiAnswerer {
    pub fn new(config: &AnswererConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            model: config.model.clone(),
            max_context_chunks: config.max_context_chunks.max(1),
            api_key,
            client,
        })
    }
}

#[async_trait]
impl Answerer for OpenAiAnswerer {
    async fn answer(&self, question: &str, context: &[ScoredChunk]) -> Result<String> {
        if context.is_empty() {
            bail!("no context chunks to answer from");
        }
        let prompt = build_prompt(question, context, self.max_context_chunks);

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": prompt},
            ],
            "temperature": 0.1,
        });

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("OpenAI API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        json.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.trim().to_string())
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing message content"))
    }
}

/// One labeled excerpt per chunk, highest-scored first.
fn build_prompt(question: &str, context: &[ScoredChunk], limit: usize) -> String {
    let mut prompt = String::new();
    for (i, sc) in context.iter().take(limit).enumerate() {
        let _ = writeln!(
            prompt,
            "[Excerpt {} | {} | {} / {}]",
            i + 1,
            sc.filename,
            sc.chunk.category,
            sc.chunk.section,
        );
        prompt.push_str(sc.chunk.text.trim());
        prompt.push_str("\n\n");
    }
    let _ = write!(prompt, "Question: {}", question);
    prompt
}

/// Instantiate the configured [`Answerer`].
pub fn create_answerer(config: &AnswererConfig) -> Result<Box<dyn Answerer>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledAnswerer)),
        "openai" => Ok(Box::new(OpenAiAnswerer::new(config)?)),
        other => bail!("Unknown answerer provider: {}", other),
    }
}
