//! Sparse TF-IDF index over one document's chunk sequence.
//!
//! [`ChunkIndex::build`] derives a vocabulary from the chunks alone
//! (unigrams plus adjacent bigrams, English stop words removed), computes
//! smoothed inverse document frequencies, and stores one L2-normalized
//! weight vector per chunk. The index is immutable once built; a new
//! document means a new index.
//!
//! # Weighting
//!
//! ```text
//! idf(t)    = ln((1 + n) / (1 + df(t))) + 1
//! w(t, c)   = count(t, c) × idf(t)
//! vector(c) = w(·, c) / ‖w(·, c)‖₂
//! ```
//!
//! Vocabulary ids follow lexical term order, so building the same chunks
//! twice yields identical vectors.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::models::Chunk;
use crate::stopwords::is_stop_word;

/// A sparse vector: `(term_id, weight)` pairs sorted by `term_id`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    entries: Vec<(usize, f64)>,
}

impl SparseVector {
    fn from_weights(weights: HashMap<usize, f64>) -> Self {
        let mut entries: Vec<(usize, f64)> =
            weights.into_iter().filter(|(_, w)| *w != 0.0).collect();
        entries.sort_by_key(|(id, _)| *id);
        Self { entries }
    }

    pub fn entries(&self) -> &[(usize, f64)] {
        &self.entries
    }

    pub fn is_zero(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn norm(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w * w).sum::<f64>().sqrt()
    }

    /// Sparse dot product via a merge over the sorted term ids.
    pub fn dot(&self, other: &SparseVector) -> f64 {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0;
        while i < self.entries.len() && j < other.entries.len() {
            let (a_id, a_w) = self.entries[i];
            let (b_id, b_w) = other.entries[j];
            match a_id.cmp(&b_id) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += a_w * b_w;
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }

    fn normalized(mut self) -> Self {
        let norm = self.norm();
        if norm > 0.0 {
            for (_, w) in &mut self.entries {
                *w /= norm;
            }
        }
        self
    }
}

/// Immutable TF-IDF index over a chunk sequence.
#[derive(Debug, Clone)]
pub struct ChunkIndex {
    chunks: Vec<Chunk>,
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f64>,
    vectors: Vec<SparseVector>,
}

impl ChunkIndex {
    /// Build the index from the full chunk sequence of one document.
    pub fn build(chunks: Vec<Chunk>) -> Self {
        let analyzed: Vec<Vec<String>> = chunks.iter().map(|c| analyze(&c.text)).collect();

        let terms: BTreeSet<&str> = analyzed.iter().flatten().map(String::as_str).collect();
        let vocabulary: BTreeMap<String, usize> = terms
            .into_iter()
            .enumerate()
            .map(|(id, term)| (term.to_string(), id))
            .collect();

        let mut df = vec![0usize; vocabulary.len()];
        for units in &analyzed {
            let seen: HashSet<usize> = units.iter().map(|t| vocabulary[t.as_str()]).collect();
            for id in seen {
                df[id] += 1;
            }
        }

        let n = chunks.len() as f64;
        let idf: Vec<f64> = df
            .iter()
            .map(|&d| ((1.0 + n) / (1.0 + d as f64)).ln() + 1.0)
            .collect();

        let mut index = Self {
            chunks,
            vocabulary,
            idf,
            vectors: Vec::new(),
        };
        index.vectors = analyzed.iter().map(|units| index.weigh(units)).collect();
        index
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub(crate) fn vector(&self, chunk_index: usize) -> &SparseVector {
        &self.vectors[chunk_index]
    }

    /// Project arbitrary text (typically a query) onto this index's
    /// vocabulary. Terms the document never uses are ignored.
    pub fn vectorize(&self, text: &str) -> SparseVector {
        self.weigh(&analyze(text))
    }

    /// Cosine similarity of `query` against every chunk, in document order.
    pub fn score_all(&self, query: &str) -> Vec<f64> {
        let q = self.vectorize(query);
        self.vectors
            .iter()
            .map(|v| crate::search::cosine_similarity(&q, v))
            .collect()
    }

    fn weigh(&self, units: &[String]) -> SparseVector {
        let mut weights: HashMap<usize, f64> = HashMap::new();
        for unit in units {
            if let Some(&id) = self.vocabulary.get(unit.as_str()) {
                *weights.entry(id).or_insert(0.0) += self.idf[id];
            }
        }
        SparseVector::from_weights(weights).normalized()
    }
}

/// Lowercase word tokens with stop words removed.
///
/// A token is a maximal run of alphanumeric characters or `_`, so single
/// characters and digits count as terms.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .filter(|t| !is_stop_word(t))
        .collect()
}

/// Vocabulary units for `text`: every token, then every adjacent token pair.
pub fn analyze(text: &str) -> Vec<String> {
    let tokens = tokenize(text);
    let mut units = Vec::with_capacity(tokens.len() * 2);
    units.extend(tokens.iter().cloned());
    units.extend(tokens.windows(2).map(|pair| format!("{} {}", pair[0], pair[1])));
    units
}
