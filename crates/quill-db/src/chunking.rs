//! Lossless splitting of document bodies into stored parts.
//!
//! Bodies larger than the configured part size are cut into ordered parts.
//! Concatenating the parts in index order reproduces the input byte for byte,
//! so no separator is ever dropped or added.
//!
//! # Strategies
//!
//! - `ParagraphChunker` - Packs whole paragraphs (the `\n\n` stays with the
//!   paragraph before it) and falls back to fixed cuts for huge paragraphs
//! - `FixedChunker` - Cuts every `max_bytes`, moved back to a char boundary
//!
//! The same chunkers produce retrieval chunks for embedding.

use std::fmt;
use std::str::FromStr;

use quill_core::{defaults, Error, Result};
use uuid::Uuid;

/// Splitting strategy for document bodies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChunkStrategy {
    #[default]
    Paragraph,
    Fixed,
}

impl ChunkStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkStrategy::Paragraph => "paragraph",
            ChunkStrategy::Fixed => "fixed",
        }
    }
}

impl fmt::Display for ChunkStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChunkStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "paragraph" => Ok(ChunkStrategy::Paragraph),
            "fixed" => Ok(ChunkStrategy::Fixed),
            other => Err(Error::InvalidInput(format!(
                "unknown chunk strategy '{}' (expected 'paragraph' or 'fixed')",
                other
            ))),
        }
    }
}

/// A contiguous slice of the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    /// Starting byte offset in the original text.
    pub start_offset: usize,
    /// Ending byte offset (exclusive) in the original text.
    pub end_offset: usize,
}

impl Chunk {
    fn from_range(text: &str, start: usize, end: usize) -> Self {
        Self {
            text: text[start..end].to_string(),
            start_offset: start,
            end_offset: end,
        }
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Common trait for all chunking strategies.
pub trait Chunker: Send + Sync {
    /// Chunk the given text. Ranges are contiguous and cover the whole input.
    fn chunk(&self, text: &str) -> Vec<Chunk>;

    /// Upper bound on a chunk's size in bytes.
    fn max_bytes(&self) -> usize;
}

/// Find UTF-8 safe boundary at or before the given position.
fn find_char_boundary_before(text: &str, mut pos: usize) -> usize {
    while pos > 0 && !text.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

/// Find UTF-8 safe boundary at or after the given position.
fn find_char_boundary_after(text: &str, mut pos: usize) -> usize {
    while pos < text.len() && !text.is_char_boundary(pos) {
        pos += 1;
    }
    pos
}

/// Byte ranges of fixed-size cuts over `text[start..end]`.
fn fixed_ranges(text: &str, start: usize, end: usize, max_bytes: usize) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut pos = start;
    while pos < end {
        let mut cut = find_char_boundary_before(text, (pos + max_bytes).min(end));
        if cut <= pos {
            // A single character wider than max_bytes.
            cut = find_char_boundary_after(text, pos + 1);
        }
        ranges.push((pos, cut));
        pos = cut;
    }
    ranges
}

/// Cuts every `max_bytes` bytes.
#[derive(Debug, Clone)]
pub struct FixedChunker {
    max_bytes: usize,
}

impl FixedChunker {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes: max_bytes.max(1),
        }
    }
}

impl Chunker for FixedChunker {
    fn chunk(&self, text: &str) -> Vec<Chunk> {
        fixed_ranges(text, 0, text.len(), self.max_bytes)
            .into_iter()
            .map(|(s, e)| Chunk::from_range(text, s, e))
            .collect()
    }

    fn max_bytes(&self) -> usize {
        self.max_bytes
    }
}

/// Packs paragraphs up to `max_bytes`.
#[derive(Debug, Clone)]
pub struct ParagraphChunker {
    max_bytes: usize,
}

impl ParagraphChunker {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes: max_bytes.max(1),
        }
    }

    /// Paragraph ranges; each ends just after its `\n\n` separator.
    fn paragraphs(text: &str) -> Vec<(usize, usize)> {
        let mut ranges = Vec::new();
        let mut start = 0;
        for (idx, sep) in text.match_indices("\n\n") {
            let end = idx + sep.len();
            ranges.push((start, end));
            start = end;
        }
        if start < text.len() {
            ranges.push((start, text.len()));
        }
        ranges
    }
}

impl Chunker for ParagraphChunker {
    fn chunk(&self, text: &str) -> Vec<Chunk> {
        let mut ranges: Vec<(usize, usize)> = Vec::new();
        let mut current: Option<(usize, usize)> = None;

        for (p_start, p_end) in Self::paragraphs(text) {
            if p_end - p_start > self.max_bytes {
                if let Some(range) = current.take() {
                    ranges.push(range);
                }
                ranges.extend(fixed_ranges(text, p_start, p_end, self.max_bytes));
                continue;
            }
            current = match current {
                Some((c_start, _)) if p_end - c_start <= self.max_bytes => Some((c_start, p_end)),
                Some(range) => {
                    ranges.push(range);
                    Some((p_start, p_end))
                }
                None => Some((p_start, p_end)),
            };
        }
        if let Some(range) = current {
            ranges.push(range);
        }

        ranges
            .into_iter()
            .map(|(s, e)| Chunk::from_range(text, s, e))
            .collect()
    }

    fn max_bytes(&self) -> usize {
        self.max_bytes
    }
}

/// Splits document bodies into stored parts.
#[derive(Debug, Clone, Copy)]
pub struct BodySplitter {
    pub strategy: ChunkStrategy,
    pub max_part_bytes: usize,
}

impl Default for BodySplitter {
    fn default() -> Self {
        Self {
            strategy: ChunkStrategy::default(),
            max_part_bytes: defaults::MAX_PART_BYTES,
        }
    }
}

impl BodySplitter {
    pub fn new(strategy: ChunkStrategy, max_part_bytes: usize) -> Self {
        Self {
            strategy,
            max_part_bytes: max_part_bytes.max(defaults::MIN_PART_BYTES),
        }
    }

    /// Split a body into parts. A body within the limit (including the empty
    /// body) is a single part.
    pub fn split(&self, body: &str) -> Vec<String> {
        if body.len() <= self.max_part_bytes {
            return vec![body.to_string()];
        }
        let chunks = match self.strategy {
            ChunkStrategy::Paragraph => ParagraphChunker::new(self.max_part_bytes).chunk(body),
            ChunkStrategy::Fixed => FixedChunker::new(self.max_part_bytes).chunk(body),
        };
        chunks.into_iter().map(|c| c.text).collect()
    }
}

/// Rebuild a body from `(part_index, body)` rows.
///
/// The indices must be exactly `0..part_count`. Anything else means the stored
/// parts are inconsistent and is reported instead of returning a short body.
pub fn reassemble_parts(
    document_id: Uuid,
    part_count: i32,
    mut parts: Vec<(i32, String)>,
) -> Result<String> {
    parts.sort_by_key(|(idx, _)| *idx);
    if parts.len() != part_count.max(0) as usize {
        return Err(Error::Internal(format!(
            "document {} has {} stored parts, expected {}",
            document_id,
            parts.len(),
            part_count
        )));
    }
    let mut body = String::with_capacity(parts.iter().map(|(_, p)| p.len()).sum());
    for (expected, (idx, part)) in parts.into_iter().enumerate() {
        if idx as usize != expected {
            return Err(Error::Internal(format!(
                "document {} is missing part {} (found part {})",
                document_id, expected, idx
            )));
        }
        body.push_str(&part);
    }
    Ok(body)
}
