//! This crate computes the CIDEr consensus metric for tokenized captions.

pub mod error;
pub mod scorer;
pub mod utils;

/// CIDEr Scorer
/// The top-level struct of this crate. It accumulates
/// `(candidate, references)` items and scores them in one pass.
///
/// Scoring runs in four steps:
/// - n-gram counts of orders 1..=n for every sentence
/// - a document frequency table over the reference groups
/// - TF-IDF vectors per order
/// - length-penalized cosine similarity, averaged over references and orders
///
/// Per-item work runs in parallel once the document frequency table is
/// fixed; scores come back in the order the items were added.
///
/// `CiderScorer<E>` has the following generic parameter:
/// - `E`: weighting engine (e.g., DefaultWeightEngine)
pub use scorer::CiderScorer;

/// Scoring result
/// Corpus mean plus one score per item, in submission order.
pub use scorer::{Score, ScorerState, ScoringItem};

/// Scorer configuration
/// n-gram order, length penalty sigma, scale, CIDEr-D clipping and where the
/// document frequency table comes from.
///
/// # Serialization
/// Supported, missing fields fall back to the standard CIDEr defaults.
pub use scorer::config::{CiderConfig, DfMode};

/// Document Frequency table
/// For every n-gram, the number of documents (reference groups) that contain
/// it, plus the number of documents. Base data for IDF.
///
/// # Serialization
/// Supported as CBOR or JSON. Loading checks the table invariants.
pub use scorer::corpus::DocumentFrequency;

/// Persisted layout of a `DocumentFrequency`
pub use scorer::serde::{DocumentFrequencyData, OrderTable, TableFormat};

/// N-gram structures
/// - `NGram`: value-equal, hashable token tuple
/// - `NGramCounts`: occurrence counts of one sentence, per order
pub use scorer::ngram::{extract_ngrams, NGram, NGramCounts, Sentence, MAX_ORDER};

/// TF-IDF Weighting Engine Trait
/// Pluggable term weighting. `DefaultWeightEngine` uses raw term count
/// times idf.
pub use scorer::tfidf::{DefaultWeightEngine, SentenceVectors, TfIdfVector, WeightEngine};

/// Per-item aggregation over a fixed document frequency table
pub use scorer::evaluate::similarity::SimilarityAggregator;

pub use error::{CiderError, ContractReason, Result};
