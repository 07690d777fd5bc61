//! # docchat Core
//!
//! Pure logic for docchat: the chunk model, the paragraph/line chunker,
//! the TF-IDF chunk index, and similarity ranking.
//!
//! This crate performs no file, network, or async I/O. Format extraction,
//! configuration, and the completion client live in the `docchat` app crate.

pub mod chunk;
pub mod index;
pub mod models;
pub mod search;
mod stopwords;
