//! Deterministic sliding-window document segmentation.

use serde::{Deserialize, Serialize};

use crate::error::WeightError;

/// A contiguous window of document text. Offsets are character positions
/// (half-open `[start, end)`), so multi-byte text never splits a code point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Segment `text` into overlapping windows of `size` characters.
///
/// Windows start every `size - overlap` characters, so each adjacent pair
/// overlaps by exactly `overlap` characters; the final chunk ends at the text
/// boundary and may be shorter. Together the chunks cover `[0, len)`. The
/// segmentation is a pure function of its inputs; rerunning it on the same
/// text always reproduces the same chunks.
pub fn chunk(text: &str, size: usize, overlap: usize) -> Result<Vec<Chunk>, WeightError> {
    if size == 0 || overlap >= size {
        return Err(WeightError::InvalidChunking { size, overlap });
    }

    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Err(WeightError::EmptyDocument);
    }

    let step = size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + size).min(chars.len());
        chunks.push(Chunk {
            text: chars[start..end].iter().collect(),
            start,
            end,
        });
        if end == chars.len() {
            break;
        }
        start += step;
    }

    Ok(chunks)
}
