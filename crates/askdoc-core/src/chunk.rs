//! Overlapping-window text chunker.
//!
//! Splits document text into windows of roughly `chunk_size` bytes
//! with `overlap` bytes of carry-over between consecutive windows,
//! preferring to break at paragraph, line, sentence, or word
//! boundaries. A post-pass merges any chunk shorter than `min_chunk`
//! into its successor, capped at 1.5× the target size, so fragment
//! chunks never stand alone.
//!
//! All indices are snapped to UTF-8 char boundaries, so multi-byte
//! text never splits mid-character.

/// Target window size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Carry-over between consecutive windows.
pub const DEFAULT_OVERLAP: usize = 300;
/// Chunks shorter than this are merged into their successor.
pub const DEFAULT_MIN_CHUNK: usize = 200;

/// Break preference within a window, most to least desirable.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Split text into overlapping windows and merge short fragments.
///
/// Returns an empty vector for empty or whitespace-only input; the
/// ingestion pipeline treats that as a chunking failure.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize, min_chunk: usize) -> Vec<String> {
    merge_short_chunks(split_text(text, chunk_size, overlap), chunk_size, min_chunk)
}

/// The windowing pass: overlapping windows of at most `chunk_size`
/// bytes, broken at the best separator in the back half of the window.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if text.len() <= chunk_size {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;
    while start < text.len() {
        let hard_end = floor_char_boundary(text, (start + chunk_size).min(text.len()));
        let end = if hard_end < text.len() {
            find_break(text, start, hard_end)
        } else {
            hard_end
        };

        let piece = text[start..end].trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }
        if end >= text.len() {
            break;
        }

        // Step back by the overlap, but always move forward.
        let next = end.saturating_sub(overlap).max(start + 1);
        start = ceil_char_boundary(text, next);
    }
    chunks
}

/// Merge pass: a chunk under `min_chunk` bytes is joined with its
/// successor unless the result would exceed 1.5× the target size.
pub fn merge_short_chunks(chunks: Vec<String>, chunk_size: usize, min_chunk: usize) -> Vec<String> {
    let cap = chunk_size + chunk_size / 2;
    let mut merged = Vec::with_capacity(chunks.len());
    let mut i = 0;
    while i < chunks.len() {
        let current = &chunks[i];
        if current.trim().len() < min_chunk && i + 1 < chunks.len() {
            let combined_len = current.len() + 2 + chunks[i + 1].len();
            if combined_len <= cap {
                merged.push(format!("{}\n\n{}", current, chunks[i + 1]));
                i += 2;
                continue;
            }
        }
        merged.push(current.clone());
        i += 1;
    }
    merged
}

/// Pick the break position for a window `text[start..hard_end]`.
///
/// The best separator found in the back half of the window wins;
/// a window with no separator there is hard-split at `hard_end`.
fn find_break(text: &str, start: usize, hard_end: usize) -> usize {
    let window = &text[start..hard_end];
    let min_pos = window.len() / 2;
    for sep in SEPARATORS {
        if let Some(pos) = window.rfind(sep) {
            if pos >= min_pos {
                return start + pos + sep.len();
            }
        }
    }
    hard_end
}

/// Snap a byte index down to the nearest valid UTF-8 char boundary.
fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Snap a byte index up to the nearest valid UTF-8 char boundary.
fn ceil_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}
