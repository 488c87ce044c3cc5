//! Filesystem-backed [`DocumentStore`].
//!
//! Layout under the configured root:
//!
//! ```text
//! catalog.json          master index: records + derived totals
//! indexes/<fp>.vec      vector index (normalized embeddings)
//! vectors/<fp>.bin      raw embedding matrix
//! chunks/<fp>.bin       chunk list, bincode
//! chunks/<fp>.json      chunk list, pretty JSON, for inspection
//! text/<fp>.txt         raw extracted text
//! ```
//!
//! `<fp>` is the document's content fingerprint, so artifacts are
//! naturally content-addressed and a re-ingested identical file maps
//! to the same paths. Every write goes through a temp file plus
//! rename; readers only ever see complete artifacts. Catalog
//! registration is serialized behind a mutex so concurrent ingestions
//! cannot lose an update.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;

use askdoc_core::index::{encode_matrix, VectorIndex};
use askdoc_core::models::{Catalog, Chunk, DocumentRecord};
use askdoc_core::store::DocumentStore;

pub struct FsStore {
    root: PathBuf,
    catalog_lock: Mutex<()>,
}

impl FsStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for sub in ["indexes", "vectors", "chunks", "text"] {
            std::fs::create_dir_all(root.join(sub))
                .with_context(|| format!("Failed to create store directory {}", sub))?;
        }
        Ok(Self {
            root,
            catalog_lock: Mutex::new(()),
        })
    }

    fn catalog_path(&self) -> PathBuf {
        self.root.join("catalog.json")
    }

    fn index_path(&self, fingerprint: &str) -> PathBuf {
        self.root.join("indexes").join(format!("{fingerprint}.vec"))
    }

    fn vectors_path(&self, fingerprint: &str) -> PathBuf {
        self.root.join("vectors").join(format!("{fingerprint}.bin"))
    }

    fn chunks_bin_path(&self, fingerprint: &str) -> PathBuf {
        self.root.join("chunks").join(format!("{fingerprint}.bin"))
    }

    fn chunks_json_path(&self, fingerprint: &str) -> PathBuf {
        self.root.join("chunks").join(format!("{fingerprint}.json"))
    }

    fn text_path(&self, fingerprint: &str) -> PathBuf {
        self.root.join("text").join(format!("{fingerprint}.txt"))
    }

    fn read_catalog(&self) -> Result<Catalog> {
        let path = self.catalog_path();
        if !path.exists() {
            return Ok(Catalog::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read catalog: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Catalog is corrupt: {}", path.display()))
    }
}

/// Write via a sibling temp file and rename, so a crash mid-write
/// never leaves a truncated artifact at the final path.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move {} into place", path.display()))?;
    Ok(())
}

#[async_trait]
impl DocumentStore for FsStore {
    async fn load_catalog(&self) -> Result<Catalog> {
        self.read_catalog()
    }

    async fn register(&self, record: DocumentRecord) -> Result<Catalog> {
        let _guard = self.catalog_lock.lock().await;
        let mut catalog = self.read_catalog()?;
        catalog.upsert(record);
        let json = serde_json::to_string_pretty(&catalog)?;
        write_atomic(&self.catalog_path(), json.as_bytes())?;
        Ok(catalog)
    }

    async fn save_document(
        &self,
        record: &DocumentRecord,
        chunks: &[Chunk],
        raw_vectors: &[Vec<f32>],
        index: &VectorIndex,
        raw_text: &str,
    ) -> Result<()> {
        let fp = &record.fingerprint;
        write_atomic(&self.index_path(fp), &index.to_bytes())?;
        write_atomic(&self.vectors_path(fp), &encode_matrix(raw_vectors)?)?;
        let encoded = bincode::serialize(chunks).context("Failed to encode chunks")?;
        write_atomic(&self.chunks_bin_path(fp), &encoded)?;
        let json = serde_json::to_string_pretty(chunks)?;
        write_atomic(&self.chunks_json_path(fp), json.as_bytes())?;
        write_atomic(&self.text_path(fp), raw_text.as_bytes())?;
        Ok(())
    }

    async fn load_chunks(&self, fingerprint: &str) -> Result<Vec<Chunk>> {
        let path = self.chunks_bin_path(fingerprint);
        let bytes = std::fs::read(&path)
            .with_context(|| format!("Failed to read chunks: {}", path.display()))?;
        bincode::deserialize(&bytes)
            .with_context(|| format!("Chunk store is corrupt: {}", path.display()))
    }

    async fn load_index(&self, fingerprint: &str) -> Result<VectorIndex> {
        let path = self.index_path(fingerprint);
        let bytes = std::fs::read(&path)
            .with_context(|| format!("Failed to read vector index: {}", path.display()))?;
        VectorIndex::from_bytes(&bytes)
            .with_context(|| format!("Vector index is corrupt: {}", path.display()))
    }

    fn index_location(&self, fingerprint: &str) -> String {
        self.index_path(fingerprint).display().to_string()
    }

    fn chunks_location(&self, fingerprint: &str) -> String {
        self.chunks_bin_path(fingerprint).display().to_string()
    }
}
