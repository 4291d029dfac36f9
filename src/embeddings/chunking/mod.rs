
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::records::FieldRecord;
use crate::{RagError, Result};

/// Separators tried in order, coarsest first. Anything still over budget after
/// the last one is split into runs of characters.
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// Represents a chunk of a rendered record ready for embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// The chunk text, including any overlap carried over from the previous chunk
    pub text: String,
    /// Index of the record this chunk was cut from
    pub source_index: usize,
    /// Number of leading characters of `text` repeated from the previous chunk
    pub overlap: usize,
}

impl Chunk {
    /// The chunk text without the characters repeated from the previous chunk
    #[inline]
    pub fn body(&self) -> &str {
        self.text
            .char_indices()
            .nth(self.overlap)
            .map_or("", |(idx, _)| self.text.split_at(idx).1)
    }

    #[inline]
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Configuration for record chunking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Characters repeated from the end of the previous chunk
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 200,
            chunk_overlap: 20,
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        let config = Self {
            chunk_size,
            chunk_overlap,
        };
        config.validate()?;
        Ok(config)
    }

    #[inline]
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Chunking(
                "chunk size must be greater than 0".to_string(),
            ));
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Chunking(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }

        Ok(())
    }
}

/// Split field records into embedding-ready chunks.
///
/// Every record is rendered to a `"<label>: <value>"` line and chunked on its
/// own, so no chunk mixes two records. Chunks are returned in record order.
#[inline]
pub fn split_records(records: &[FieldRecord], config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    config.validate()?;

    let mut chunks = Vec::new();
    for (source_index, record) in records.iter().enumerate() {
        chunks.extend(split_line(&record.render(), source_index, config));
    }

    debug!(
        "Split {} records into {} chunks (size {}, overlap {})",
        records.len(),
        chunks.len(),
        config.chunk_size,
        config.chunk_overlap
    );

    Ok(chunks)
}

/// Chunk a single rendered line. Assumes a validated config.
fn split_line(text: &str, source_index: usize, config: &ChunkingConfig) -> Vec<Chunk> {
    let mut pieces = Vec::new();
    segment(text, config.chunk_size, &SEPARATORS, &mut pieces);

    pack_pieces(&pieces, source_index, config)
}

/// Recursively cut `text` into pieces of at most `budget` characters.
///
/// Separators stay attached to the end of the piece before them, so the pieces
/// concatenate back to `text` exactly.
fn segment<'a>(text: &'a str, budget: usize, separators: &[&str], pieces: &mut Vec<&'a str>) {
    if text.is_empty() {
        return;
    }

    if char_len(text) <= budget {
        pieces.push(text);
        return;
    }

    let Some((&separator, finer)) = separators.split_first() else {
        split_by_chars(text, budget, pieces);
        return;
    };

    if !text.contains(separator) {
        segment(text, budget, finer, pieces);
        return;
    }

    for part in text.split_inclusive(separator) {
        if char_len(part) <= budget {
            pieces.push(part);
        } else {
            segment(part, budget, finer, pieces);
        }
    }
}

/// Split text into runs of `budget` characters as a last resort
fn split_by_chars<'a>(text: &'a str, budget: usize, pieces: &mut Vec<&'a str>) {
    let mut rest = text;
    while char_len(rest) > budget {
        let idx = rest
            .char_indices()
            .nth(budget)
            .map_or(rest.len(), |(idx, _)| idx);
        let (head, tail) = rest.split_at(idx);
        pieces.push(head);
        rest = tail;
    }

    if !rest.is_empty() {
        pieces.push(rest);
    }
}

/// Greedily merge pieces into chunks, prefixing each chunk after the first with
/// up to `chunk_overlap` characters from the tail of the previous one. The
/// carried tail shrinks when the next piece would not fit beside it.
fn pack_pieces(pieces: &[&str], source_index: usize, config: &ChunkingConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    let mut overlap = 0;

    for piece in pieces {
        let piece_len = char_len(piece);

        if current_len + piece_len > config.chunk_size && current_len > overlap {
            let room = config.chunk_size - piece_len;
            let carried = trailing_chars(&current, config.chunk_overlap.min(room)).to_string();
            let carried_len = char_len(&carried);

            chunks.push(Chunk {
                text: std::mem::replace(&mut current, carried),
                source_index,
                overlap,
            });

            current_len = carried_len;
            overlap = carried_len;
        }

        current.push_str(piece);
        current_len += piece_len;
    }

    if current_len > overlap {
        chunks.push(Chunk {
            text: current,
            source_index,
            overlap,
        });
    }

    chunks
}

/// The last `count` characters of `text` (all of it when shorter)
fn trailing_chars(text: &str, count: usize) -> &str {
    if count == 0 {
        return "";
    }

    let idx = text
        .char_indices()
        .rev()
        .nth(count - 1)
        .map_or(0, |(idx, _)| idx);
    text.split_at(idx).1
}

#[inline]
fn char_len(text: &str) -> usize {
    text.chars().count()
}
