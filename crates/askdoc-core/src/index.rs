//! Flat inner-product vector index.
//!
//! One index per document, built over that document's L2-normalized
//! chunk embeddings. Queries are exact brute-force inner products,
//! which doubles as cosine similarity for unit vectors. Rows are
//! addressed by the same sequence index the chunk store uses.
//!
//! The serialized form is a small little-endian header (row count,
//! dimensionality) followed by the raw `f32` values.

use anyhow::{bail, Result};

/// Exact nearest-neighbor index over one document's embeddings.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    dims: usize,
    /// Row-major `len × dims` matrix.
    values: Vec<f32>,
}

impl VectorIndex {
    /// Build an index from one embedding per chunk.
    ///
    /// Fails on an empty input or inconsistent dimensionality; the
    /// ingestion pipeline never produces either.
    pub fn build(vectors: &[Vec<f32>]) -> Result<Self> {
        let Some(first) = vectors.first() else {
            bail!("cannot build an index over zero vectors");
        };
        let dims = first.len();
        if dims == 0 {
            bail!("cannot build an index over zero-dimensional vectors");
        }
        let mut values = Vec::with_capacity(vectors.len() * dims);
        for (i, v) in vectors.iter().enumerate() {
            if v.len() != dims {
                bail!("vector {} has {} dims, expected {}", i, v.len(), dims);
            }
            values.extend_from_slice(v);
        }
        Ok(Self { dims, values })
    }

    pub fn len(&self) -> usize {
        self.values.len() / self.dims
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Return the `k` rows with the highest inner product against the
    /// query, as `(score, row index)` pairs in descending score order.
    ///
    /// A query of the wrong dimensionality yields no candidates.
    pub fn query(&self, query: &[f32], k: usize) -> Vec<(f32, usize)> {
        if query.len() != self.dims || k == 0 {
            return Vec::new();
        }
        let mut scored: Vec<(f32, usize)> = self
            .values
            .chunks_exact(self.dims)
            .enumerate()
            .map(|(row, v)| {
                let dot: f32 = v.iter().zip(query.iter()).map(|(a, b)| a * b).sum();
                (dot, row)
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }

    /// Serialize as `u32 count, u32 dims, f32 values…`, little-endian.
    pub fn to_bytes(&self) -> Vec<u8> {
        encode_matrix_raw(self.len(), self.dims, &self.values)
    }

    /// Deserialize the [`to_bytes`](Self::to_bytes) form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (count, dims, values) = decode_matrix_raw(bytes)?;
        if count == 0 || dims == 0 {
            bail!("vector index is empty");
        }
        Ok(Self { dims, values })
    }
}

/// Scale a vector to unit L2 norm in place. Zero vectors are left as-is.
pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Encode a list of equal-length vectors in the index wire format.
pub fn encode_matrix(vectors: &[Vec<f32>]) -> Result<Vec<u8>> {
    let dims = vectors.first().map(|v| v.len()).unwrap_or(0);
    let mut values = Vec::with_capacity(vectors.len() * dims);
    for (i, v) in vectors.iter().enumerate() {
        if v.len() != dims {
            bail!("vector {} has {} dims, expected {}", i, v.len(), dims);
        }
        values.extend_from_slice(v);
    }
    Ok(encode_matrix_raw(vectors.len(), dims, &values))
}

/// Decode the [`encode_matrix`] form back into vectors.
pub fn decode_matrix(bytes: &[u8]) -> Result<Vec<Vec<f32>>> {
    let (count, dims, values) = decode_matrix_raw(bytes)?;
    if count == 0 {
        return Ok(Vec::new());
    }
    Ok(values.chunks_exact(dims).map(|c| c.to_vec()).collect())
}

fn encode_matrix_raw(count: usize, dims: usize, values: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(8 + values.len() * 4);
    bytes.extend_from_slice(&(count as u32).to_le_bytes());
    bytes.extend_from_slice(&(dims as u32).to_le_bytes());
    for v in values {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

fn decode_matrix_raw(bytes: &[u8]) -> Result<(usize, usize, Vec<f32>)> {
    if bytes.len() < 8 {
        bail!("vector blob truncated: {} bytes", bytes.len());
    }
    let count = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    let dims = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    let body = &bytes[8..];
    if body.len() != count * dims * 4 {
        bail!(
            "vector blob length mismatch: {} bytes for {}x{} matrix",
            body.len(),
            count,
            dims
        );
    }
    let values = body
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Ok((count, dims, values))
}
