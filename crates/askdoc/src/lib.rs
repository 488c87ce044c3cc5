//! # askdoc
//!
//! Document question answering over local files. This crate wires the
//! pure pipeline and retrieval logic from `askdoc-core` to the real
//! world: file formats, the filesystem store, the embeddings API, and
//! the answering model.
//!
//! - [`config`] — TOML configuration with defaults
//! - [`extract`] — text extraction for PDF, DOCX, plain text, email
//! - [`embedding`] — OpenAI-backed [`askdoc_core::embedding::Embedder`]
//! - [`fs_store`] — filesystem [`askdoc_core::store::DocumentStore`]
//! - [`ingest`] — the fingerprint → chunk → tag → embed → index →
//!   register pipeline
//! - [`answer`] — generative answering over retrieved chunks

pub mod answer;
pub mod config;
pub mod embedding;
pub mod extract;
pub mod fs_store;
pub mod ingest;
