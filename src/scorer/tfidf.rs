use indexmap::IndexMap;

use crate::scorer::{corpus::DocumentFrequency, ngram::{NGram, NGramCounts}};
use crate::utils::math::l2_norm;

/// TF-IDF weight vector of one sentence for one n-gram order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TfIdfVector {
    /// n-gram -> weight
    pub weights: IndexMap<NGram, f64>,
    /// L2 norm of `weights`
    pub norm: f64,
}

impl TfIdfVector {
    pub fn from_weights(weights: IndexMap<NGram, f64>) -> Self {
        let norm = l2_norm(weights.values().copied());
        Self { weights, norm }
    }

    /// A vector with no n-grams, or with only zero weights
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.norm == 0.0
    }

    #[inline]
    pub fn get(&self, ngram: &NGram) -> f64 {
        self.weights.get(ngram).copied().unwrap_or(0.0)
    }

    /// dot積
    /// d(a, b) = Σ(a_i * b_i)
    pub fn dot(&self, other: &TfIdfVector) -> f64 {
        // 小さい方を回す
        let (small, large) = if self.weights.len() <= other.weights.len() {
            (self, other)
        } else {
            (other, self)
        };
        small
            .weights
            .iter()
            .map(|(ngram, &w)| w * large.get(ngram))
            .sum()
    }

    /// Clipped dot product against a reference
    /// d(a, b) = Σ(min(a_i, b_i) * b_i)
    ///
    /// Keeps a candidate from gaining similarity by repeating an n-gram more
    /// often than the reference does.
    pub fn clipped_dot(&self, reference: &TfIdfVector) -> f64 {
        self.weights
            .iter()
            .map(|(ngram, &w)| {
                let r = reference.get(ngram);
                w.min(r) * r
            })
            .sum()
    }

    /// コサイン類似度
    /// cos(θ) = Σ(a_i * b_i) / (||a|| * ||b||)
    /// A zero vector on either side gives 0.0.
    pub fn cosine(&self, other: &TfIdfVector) -> f64 {
        if self.is_zero() || other.is_zero() {
            return 0.0;
        }
        self.dot(other) / (self.norm * other.norm)
    }

    /// Cosine with the clipped numerator, see [`TfIdfVector::clipped_dot`]
    pub fn clipped_cosine(&self, reference: &TfIdfVector) -> f64 {
        if self.is_zero() || reference.is_zero() {
            return 0.0;
        }
        self.clipped_dot(reference) / (self.norm * reference.norm)
    }
}

/// TF-IDF vectors of one sentence, one per order, plus its token length
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SentenceVectors {
    /// `per_order[k - 1]` for order `k`
    pub per_order: Vec<TfIdfVector>,
    pub token_len: usize,
}

impl SentenceVectors {
    #[inline]
    pub fn order(&self, k: usize) -> Option<&TfIdfVector> {
        k.checked_sub(1).and_then(|i| self.per_order.get(i))
    }
}

/// TF-IDF weighting engine
/// Turns the n-gram counts of a sentence into weight vectors against a
/// document frequency table.
pub trait WeightEngine {
    /// Term frequency part of a weight
    fn tf(count: u32) -> f64;

    /// Build the vector of one order
    ///
    /// # Arguments
    /// * `counts` - n-gram counts of that order
    /// * `df` - document frequency table
    fn order_vec(counts: &IndexMap<NGram, u32>, df: &DocumentFrequency) -> TfIdfVector {
        let weights = counts
            .iter()
            .map(|(ngram, &count)| (ngram.clone(), Self::tf(count) * df.weight(ngram)))
            .collect();
        TfIdfVector::from_weights(weights)
    }

    /// Build the vectors of every order of a sentence
    fn sentence_vecs(counts: &NGramCounts, df: &DocumentFrequency) -> SentenceVectors {
        SentenceVectors {
            per_order: counts
                .iter_orders()
                .map(|(_, order_counts)| Self::order_vec(order_counts, df))
                .collect(),
            token_len: counts.token_len(),
        }
    }
}

/// デフォルトのエンジン
/// Raw term count times idf, no sub-linear scaling.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultWeightEngine;

impl WeightEngine for DefaultWeightEngine {
    #[inline]
    fn tf(count: u32) -> f64 {
        count as f64
    }
}
