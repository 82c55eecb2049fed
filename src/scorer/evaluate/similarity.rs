use std::marker::PhantomData;

use crate::scorer::{
    config::CiderConfig,
    corpus::DocumentFrequency,
    ngram::NGramCounts,
    tfidf::{DefaultWeightEngine, SentenceVectors, TfIdfVector, WeightEngine},
};
use crate::utils::math::gaussian_penalty;

/// Per-item CIDEr aggregation against a fixed document frequency table
///
/// Holds only shared references, so one aggregator can score items from
/// several threads at once.
#[derive(Debug)]
pub struct SimilarityAggregator<'a, E = DefaultWeightEngine>
where
    E: WeightEngine,
{
    df: &'a DocumentFrequency,
    config: &'a CiderConfig,
    _marker: PhantomData<E>,
}

impl<'a, E> SimilarityAggregator<'a, E>
where
    E: WeightEngine,
{
    pub fn new(df: &'a DocumentFrequency, config: &'a CiderConfig) -> Self {
        Self {
            df,
            config,
            _marker: PhantomData,
        }
    }

    /// Similarity of one order, length penalty applied.
    /// `None` when the order is skipped: neither side has an n-gram of it.
    fn order_similarity(&self, cand: &TfIdfVector, refv: &TfIdfVector, penalty: f64) -> Option<f64> {
        if self.config.skip_empty_orders && cand.weights.is_empty() && refv.weights.is_empty() {
            return None;
        }
        let sim = if self.config.clip_candidate_weights {
            cand.clipped_cosine(refv)
        } else {
            cand.cosine(refv)
        };
        Some(sim * penalty)
    }

    /// Penalized similarity of every order against one reference
    fn pair_scores(&self, cand: &SentenceVectors, refv: &SentenceVectors) -> Vec<Option<f64>> {
        let delta = cand.token_len as f64 - refv.token_len as f64;
        let penalty = gaussian_penalty(delta, self.config.sigma);
        (1..=self.config.n)
            .map(|k| match (cand.order(k), refv.order(k)) {
                (Some(c), Some(r)) => self.order_similarity(c, r, penalty),
                _ => Some(0.0),
            })
            .collect()
    }

    /// Penalized similarity of each order, averaged over the references
    /// for which the order is not skipped.
    ///
    /// # Returns
    /// * `Vec<Option<f64>>` - one value per order, index `k - 1` for order `k`.
    ///   `None` when the order is skipped against every reference.
    ///
    /// When every reference leaves out the same orders, `score_item` equals
    /// `scale` times the mean of the `Some` values.
    pub fn order_scores(&self, candidate: &NGramCounts, references: &[NGramCounts]) -> Vec<Option<f64>> {
        let mut sums = vec![(0.0, 0usize); self.config.n];
        let cand = E::sentence_vecs(candidate, self.df);
        for reference in references {
            let refv = E::sentence_vecs(reference, self.df);
            for ((sum, seen), sim) in sums.iter_mut().zip(self.pair_scores(&cand, &refv)) {
                if let Some(sim) = sim {
                    *sum += sim;
                    *seen += 1;
                }
            }
        }
        sums.into_iter()
            .map(|(sum, seen)| (seen > 0).then(|| sum / seen as f64))
            .collect()
    }

    /// CIDEr score of one item
    /// scale * mean_refs(Σ_k w_k * penalty * cos_k), w_k = 1/n
    ///
    /// With `skip_empty_orders` the weights are spread over the orders that
    /// are not skipped for that reference.
    pub fn score_item(&self, candidate: &NGramCounts, references: &[NGramCounts]) -> f64 {
        if references.is_empty() {
            return 0.0;
        }
        let cand = E::sentence_vecs(candidate, self.df);
        let total: f64 = references
            .iter()
            .map(|reference| {
                let refv = E::sentence_vecs(reference, self.df);
                let scores: Vec<f64> = self.pair_scores(&cand, &refv).into_iter().flatten().collect();
                if scores.is_empty() {
                    return 0.0;
                }
                let weight = if self.config.skip_empty_orders {
                    1.0 / scores.len() as f64
                } else {
                    self.config.order_weight()
                };
                scores.iter().map(|s| s * weight).sum::<f64>()
            })
            .sum();
        total / references.len() as f64 * self.config.scale
    }
}
