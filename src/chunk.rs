//! Overlapping window text chunker.
//!
//! Splits extracted text into [`Chunk`]s of at most `chunk_size` characters.
//! Consecutive chunks share exactly `chunk_overlap` characters so that a
//! sentence cut at a window edge still appears whole in one of the two
//! neighbours.
//!
//! Window ends are pulled back to the nearest natural boundary when one is
//! available, preferring paragraph breaks, then line breaks, then sentence
//! ends, then any whitespace. Without a usable boundary the window is a hard
//! character cut. Sizes are counted in `char`s, never bytes, so multi-byte
//! text is never split inside a code point.
//!
//! Each chunk carries a SHA-256 hash of its text.

use sha2::{Digest, Sha256};

use crate::models::Chunk;

/// Boundary separators in order of preference. Separators on the same level
/// are equally good.
const BOUNDARY_LEVELS: &[&[&str]] = &[&["\n\n"], &["\n"], &[". ", "! ", "? "]];

/// Split text into overlapping chunks with contiguous indices starting at 0.
///
/// Whitespace-only input yields no chunks. `chunk_overlap` is clamped below
/// `chunk_size`; config validation rejects such values before they get here.
pub fn chunk_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<Chunk> {
    let text = text.trim();
    if text.is_empty() || chunk_size == 0 {
        return Vec::new();
    }

    let overlap = chunk_overlap.min(chunk_size - 1);
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        let mut end = (start + chunk_size).min(len);

        if end < len {
            // Boundaries closer to `start` than this would produce runt
            // chunks or fail to advance past the overlap.
            let min_end = start + (overlap + 1).max(chunk_size / 2);
            if let Some(boundary) = find_boundary(&chars, min_end, end) {
                end = boundary;
            }
        }

        let piece: String = chars[start..end].iter().collect();
        chunks.push(make_chunk(chunks.len(), &piece));

        if end >= len {
            break;
        }
        start = end - overlap;
    }

    tracing::debug!(
        chunks = chunks.len(),
        chars = len,
        chunk_size,
        overlap,
        "chunked text"
    );

    chunks
}

/// Largest position `p` in `min_end..=end` where `chars[..p]` ends on a
/// boundary, searching the preferred boundary kinds first.
fn find_boundary(chars: &[char], min_end: usize, end: usize) -> Option<usize> {
    if min_end > end {
        return None;
    }

    for level in BOUNDARY_LEVELS {
        let found = (min_end..=end)
            .rev()
            .find(|&p| level.iter().any(|sep| ends_with_at(chars, p, sep)));
        if found.is_some() {
            return found;
        }
    }

    (min_end..=end)
        .rev()
        .find(|&p| p > 0 && chars[p - 1].is_whitespace())
}

fn ends_with_at(chars: &[char], pos: usize, sep: &str) -> bool {
    let sep_len = sep.chars().count();
    if pos < sep_len {
        return false;
    }
    chars[pos - sep_len..pos].iter().copied().eq(sep.chars())
}

fn make_chunk(index: usize, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        index,
        text: text.to_string(),
        hash,
    }
}
