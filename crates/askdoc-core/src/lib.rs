//! # askdoc core
//!
//! Shared logic for askdoc: data models, chunking, heuristic tagging,
//! term extraction, the flat vector index, store and embedder traits,
//! and the hybrid retrieval engine with its cascading fallback.
//!
//! This crate contains no tokio, filesystem I/O, or HTTP dependencies.
//! Async seams go through `async-trait`; concrete providers and the
//! filesystem store live in the `askdoc` app crate.

pub mod chunk;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod index;
pub mod models;
pub mod store;
pub mod tag;
pub mod terms;
