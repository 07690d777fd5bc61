//! Core data models shared by the chunker, the index, and the retriever.

use serde::Serialize;

/// An ordered, immutable segment of a document's normalized text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Position in the chunk sequence, contiguous from 0.
    pub index: usize,
    pub text: String,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
    /// Set when the chunk is a single atomic unit longer than the
    /// configured maximum.
    pub oversized: bool,
}

impl Chunk {
    /// Length in characters (Unicode scalar values).
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A chunk paired with its similarity to a query.
#[derive(Debug, Clone, Serialize)]
pub struct RankedChunk {
    pub chunk: Chunk,
    /// Cosine similarity in `[0.0, 1.0]`.
    pub score: f64,
}
