//! Similarity ranking over a [`ChunkIndex`].
//!
//! # Ranking
//!
//! 1. Project the query onto the index vocabulary (TF-IDF, L2-normalized).
//! 2. Score every chunk by cosine similarity.
//! 3. Sort by score (desc), then chunk index (asc).
//! 4. Truncate to `top_k`.
//! 5. Keep only scores strictly above `relevance_floor`.
//!
//! An empty result means nothing in the document was relevant enough; it is
//! not an error. Ranking against an index with no chunks is
//! [`RetrievalError::NotReady`].

use crate::index::{ChunkIndex, SparseVector};
use crate::models::RankedChunk;

/// Default number of chunks returned.
pub const DEFAULT_TOP_K: usize = 3;
/// Default minimum similarity a chunk must exceed.
pub const DEFAULT_RELEVANCE_FLOOR: f64 = 0.1;

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankParams {
    /// Maximum chunks to return.
    pub top_k: usize,
    /// Scores must be strictly greater than this to be returned.
    pub relevance_floor: f64,
}

impl Default for RankParams {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            relevance_floor: DEFAULT_RELEVANCE_FLOOR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetrievalError {
    #[error("no document is indexed")]
    NotReady,
}

/// Rank the chunks of `index` against `query`.
pub fn rank(
    index: &ChunkIndex,
    query: &str,
    params: RankParams,
) -> Result<Vec<RankedChunk>, RetrievalError> {
    if index.is_empty() {
        return Err(RetrievalError::NotReady);
    }
    if query.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut scored: Vec<(usize, f64)> = index.score_all(query).into_iter().enumerate().collect();
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    scored.truncate(params.top_k);

    Ok(scored
        .into_iter()
        .filter(|(_, score)| *score > params.relevance_floor)
        .map(|(i, score)| RankedChunk {
            chunk: index.chunks()[i].clone(),
            score,
        })
        .collect())
}

/// Cosine similarity between two sparse vectors.
///
/// Returns `0.0` when either vector is zero.
pub fn cosine_similarity(a: &SparseVector, b: &SparseVector) -> f64 {
    let na = a.norm();
    let nb = b.norm();
    if na < f64::EPSILON || nb < f64::EPSILON {
        return 0.0;
    }
    a.dot(b) / (na * nb)
}
