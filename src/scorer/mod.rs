pub mod config;
pub mod corpus;
pub mod evaluate;
pub mod ngram;
pub mod serde;
pub mod tfidf;

use std::{fmt, marker::PhantomData, path::Path, sync::Arc};

use ::serde::{Deserialize, Serialize};
use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::{CiderError, ContractReason, Result};
use crate::scorer::{
    config::{CiderConfig, DfMode},
    corpus::DocumentFrequency,
    evaluate::similarity::SimilarityAggregator,
    ngram::{NGramCounts, Sentence},
    tfidf::{DefaultWeightEngine, WeightEngine},
};
use crate::utils::math::{mean, std_dev};

/// One candidate sentence and its references
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringItem {
    pub id: String,
    pub candidate: Sentence,
    pub references: Vec<Sentence>,
}

/// Result of one `compute_score` pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    /// corpus level score, mean of `per_item`
    pub mean: f64,
    /// one score per item, in the order the items were added
    pub per_item: Vec<f64>,
    /// item ids aligned with `per_item`
    pub ids: Vec<String>,
}

impl Score {
    /// Population standard deviation of the per-item scores
    pub fn std_dev(&self) -> f64 {
        std_dev(&self.per_item)
    }

    /// Iterate over `(id, score)` pairs in submission order
    pub fn iter_with_ids(&self) -> impl Iterator<Item = (&str, f64)> {
        self.ids.iter().map(|s| s.as_str()).zip(self.per_item.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.per_item.len()
    }

    pub fn is_empty(&self) -> bool {
        self.per_item.is_empty()
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            writeln!(f, "CIDEr {:.6} [", self.mean)?;
            for (id, score) in self.iter_with_ids() {
                writeln!(f, "    {id}: {score:.6}")?;
            }
            write!(f, "]")
        } else {
            write!(f, "CIDEr {:.6} over {} items", self.mean, self.per_item.len())
        }
    }
}

/// Lifecycle of a scorer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScorerState {
    Empty,
    Accumulating,
    Scored,
}

/// CIDEr scorer
/// Accumulates `(candidate, references)` items, then scores them all in one
/// pass against a document frequency table.
///
/// `CiderScorer<E>` has one generic parameter:
/// - `E`: TF-IDF weighting engine (e.g., DefaultWeightEngine)
///
/// In [`DfMode::Corpus`] the table is rebuilt from the accumulated references
/// on every `compute_score`. In [`DfMode::Precomputed`] a table supplied with
/// [`CiderScorer::with_document_frequency`] or [`CiderScorer::load_df`] is
/// shared read-only.
#[derive(Debug, Clone)]
pub struct CiderScorer<E = DefaultWeightEngine>
where
    E: WeightEngine,
{
    config: CiderConfig,
    /// accumulated items keyed by id, submission order
    items: IndexMap<String, ScoringItem>,
    /// table used in precomputed mode
    precomputed: Option<Arc<DocumentFrequency>>,
    /// table used by the latest `compute_score`
    last_df: Option<Arc<DocumentFrequency>>,
    state: ScorerState,
    _marker: PhantomData<E>,
}

impl Default for CiderScorer {
    fn default() -> Self {
        Self::new(CiderConfig::default())
    }
}

impl<E> CiderScorer<E>
where
    E: WeightEngine + Send + Sync,
{
    pub fn new(config: CiderConfig) -> Self {
        Self {
            config,
            items: IndexMap::new(),
            precomputed: None,
            last_df: None,
            state: ScorerState::Empty,
            _marker: PhantomData,
        }
    }

    /// Use a fixed document frequency table and switch to precomputed mode
    pub fn with_document_frequency(mut self, table: Arc<DocumentFrequency>) -> Self {
        self.set_document_frequency(table);
        self
    }

    pub fn set_document_frequency(&mut self, table: Arc<DocumentFrequency>) {
        self.config.df_mode = DfMode::Precomputed;
        self.precomputed = Some(table);
    }

    #[inline]
    pub fn config(&self) -> &CiderConfig {
        &self.config
    }

    #[inline]
    pub fn state(&self) -> ScorerState {
        self.state
    }

    /// Number of accumulated items
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> impl Iterator<Item = &ScoringItem> {
        self.items.values()
    }

    /// Table used by the latest `compute_score`, if any
    /// In corpus mode it is dropped as soon as another item is added.
    pub fn document_frequency(&self) -> Option<&Arc<DocumentFrequency>> {
        self.last_df.as_ref()
    }

    /// Drop every accumulated item
    /// A precomputed table stays attached.
    pub fn clear(&mut self) {
        self.items.clear();
        self.last_df = None;
        self.state = ScorerState::Empty;
    }

    /// Add one item
    ///
    /// # Arguments
    /// * `id` - item id, unique within the scorer
    /// * `candidate` - exactly one tokenized candidate sentence
    /// * `references` - at least one tokenized reference sentence
    ///
    /// A rejected item leaves the scorer unchanged.
    pub fn add(
        &mut self,
        id: impl Into<String>,
        candidate: Vec<Sentence>,
        references: Vec<Sentence>,
    ) -> Result<&mut Self> {
        let item = Self::check_item(id.into(), candidate, references)?;
        if self.items.contains_key(&item.id) {
            return Err(CiderError::contract(&item.id, ContractReason::DuplicateId));
        }
        self.items.insert(item.id.clone(), item);
        self.mark_accumulating();
        Ok(self)
    }

    /// Add a batch given as `id -> references` and `id -> candidates` maps
    /// Items are added in the order of `candidates`. Every candidate id must
    /// have references. Either the whole batch is added or nothing is.
    pub fn add_batch(
        &mut self,
        references: &IndexMap<String, Vec<Sentence>>,
        candidates: &IndexMap<String, Vec<Sentence>>,
    ) -> Result<&mut Self> {
        let mut staged = Vec::with_capacity(candidates.len());
        for (id, candidate) in candidates {
            let Some(refs) = references.get(id) else {
                return Err(CiderError::contract(id, ContractReason::MissingReferences));
            };
            if self.items.contains_key(id) {
                return Err(CiderError::contract(id, ContractReason::DuplicateId));
            }
            staged.push(Self::check_item(id.clone(), candidate.clone(), refs.clone())?);
        }
        if staged.is_empty() {
            return Ok(self);
        }
        for item in staged {
            self.items.insert(item.id.clone(), item);
        }
        self.mark_accumulating();
        Ok(self)
    }

    /// A corpus table no longer covers the items once new ones arrive
    fn mark_accumulating(&mut self) {
        if self.config.df_mode == DfMode::Corpus {
            self.last_df = None;
        }
        self.state = ScorerState::Accumulating;
    }

    fn check_item(id: String, mut candidate: Vec<Sentence>, references: Vec<Sentence>) -> Result<ScoringItem> {
        if id.is_empty() {
            return Err(CiderError::contract(&id, ContractReason::EmptyId));
        }
        if candidate.len() != 1 {
            return Err(CiderError::contract(
                &id,
                ContractReason::CandidateNotSingleton { found: candidate.len() },
            ));
        }
        if references.is_empty() {
            return Err(CiderError::contract(&id, ContractReason::EmptyReferences));
        }
        let candidate = candidate.swap_remove(0);
        Ok(ScoringItem { id, candidate, references })
    }

    /// n-gram counts of every item, `(candidate, references)`
    fn item_counts(&self) -> Vec<(NGramCounts, Vec<NGramCounts>)> {
        let n = self.config.n;
        let items: Vec<&ScoringItem> = self.items.values().collect();
        items
            .par_iter()
            .map(|item| {
                (
                    NGramCounts::from_tokens(&item.candidate, n),
                    item.references
                        .iter()
                        .map(|r| NGramCounts::from_tokens(r, n))
                        .collect(),
                )
            })
            .collect()
    }

    /// Table for the current pass: the attached one in precomputed mode,
    /// built from the reference counts otherwise
    fn resolve_df(&self, counts: &[(NGramCounts, Vec<NGramCounts>)]) -> Result<Arc<DocumentFrequency>> {
        match self.config.df_mode {
            DfMode::Precomputed => {
                let table = self.precomputed.clone().ok_or_else(|| {
                    CiderError::InvalidConfig("precomputed df mode requires a loaded table".to_string())
                })?;
                if table.max_order() < self.config.n {
                    return Err(CiderError::InvalidConfig(format!(
                        "precomputed table covers orders up to {} but n is {}",
                        table.max_order(),
                        self.config.n
                    )));
                }
                Ok(table)
            }
            DfMode::Corpus => {
                let mut table = DocumentFrequency::new(self.config.n);
                for (_, refs) in counts {
                    table.add_counts(refs);
                }
                debug!(
                    documents = table.total_documents(),
                    ngrams = table.vocab_size(),
                    "built document frequency table from accumulated references"
                );
                Ok(Arc::new(table))
            }
        }
    }

    /// Score every accumulated item
    ///
    /// # Returns
    /// * `Score` - corpus mean and per-item scores in submission order
    pub fn compute_score(&mut self) -> Result<Score> {
        if self.items.is_empty() {
            return Err(CiderError::EmptyCorpus);
        }
        self.config.validate()?;

        let counts = self.item_counts();
        // DF は全件そろってから確定、以降は読むだけ
        let df = self.resolve_df(&counts)?;
        if !df.is_informative() {
            warn!(
                documents = df.total_documents(),
                "document frequency table has at most one document, weighting by raw term frequency"
            );
        }

        let aggregator: SimilarityAggregator<'_, E> = SimilarityAggregator::new(&df, &self.config);
        let per_item: Vec<f64> = counts
            .par_iter()
            .map(|(cand, refs)| aggregator.score_item(cand, refs))
            .collect();
        let score = Score {
            mean: mean(&per_item),
            per_item,
            ids: self.items.keys().cloned().collect(),
        };
        info!(items = score.len(), mean = score.mean, "computed CIDEr score");

        self.last_df = Some(df);
        self.state = ScorerState::Scored;
        Ok(score)
    }

    /// Save the document frequency table of the latest pass.
    /// Before any pass, the table is built from the accumulated references
    /// (or the attached precomputed table is written).
    pub fn save_df<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(df) = &self.last_df {
            return df.save(path);
        }
        self.config.validate()?;
        if self.config.df_mode == DfMode::Corpus && self.items.is_empty() {
            return Err(CiderError::EmptyCorpus);
        }
        let counts = self.item_counts();
        self.resolve_df(&counts)?.save(path)
    }

    /// Load a table from `path` and switch to precomputed mode
    pub fn load_df<P: AsRef<Path>>(&mut self, path: P) -> Result<Arc<DocumentFrequency>> {
        let table = Arc::new(DocumentFrequency::load(path)?);
        self.set_document_frequency(Arc::clone(&table));
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::ngram::NGram;

    fn s(words: &str) -> Sentence {
        words.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn state_machine_transitions() {
        let mut scorer = CiderScorer::default();
        assert_eq!(scorer.state(), ScorerState::Empty);
        scorer.add("img1", vec![s("a cat sat")], vec![s("a cat sat")]).unwrap();
        assert_eq!(scorer.state(), ScorerState::Accumulating);
        scorer.compute_score().unwrap();
        assert_eq!(scorer.state(), ScorerState::Scored);
        assert!(scorer.document_frequency().is_some());
        scorer.add("img2", vec![s("a dog")], vec![s("a dog")]).unwrap();
        assert_eq!(scorer.state(), ScorerState::Accumulating);
        scorer.clear();
        assert_eq!(scorer.state(), ScorerState::Empty);
        assert!(scorer.is_empty());
        assert!(scorer.document_frequency().is_none());
    }

    #[test]
    fn rejected_add_leaves_items_untouched() {
        let mut scorer = CiderScorer::default();
        scorer.add("ok", vec![s("a b")], vec![s("a b")]).unwrap();

        let err = scorer.add("two", vec![s("a"), s("b")], vec![s("a")]).unwrap_err();
        assert!(matches!(
            err,
            CiderError::ContractViolation { reason: ContractReason::CandidateNotSingleton { found: 2 }, .. }
        ));
        let err = scorer.add("none", vec![], vec![s("a")]).unwrap_err();
        assert!(matches!(
            err,
            CiderError::ContractViolation { reason: ContractReason::CandidateNotSingleton { found: 0 }, .. }
        ));
        let err = scorer.add("norefs", vec![s("a")], vec![]).unwrap_err();
        assert!(matches!(
            err,
            CiderError::ContractViolation { reason: ContractReason::EmptyReferences, .. }
        ));
        let err = scorer.add("", vec![s("a")], vec![s("a")]).unwrap_err();
        assert!(matches!(
            err,
            CiderError::ContractViolation { reason: ContractReason::EmptyId, .. }
        ));
        let err = scorer.add("ok", vec![s("a")], vec![s("a")]).unwrap_err();
        assert!(matches!(
            err,
            CiderError::ContractViolation { reason: ContractReason::DuplicateId, .. }
        ));

        assert_eq!(scorer.len(), 1);
        assert_eq!(scorer.state(), ScorerState::Accumulating);
    }

    #[test]
    fn batch_is_all_or_nothing() {
        let mut refs = IndexMap::new();
        refs.insert("a".to_string(), vec![s("one two")]);
        refs.insert("b".to_string(), vec![s("three four")]);
        let mut cands = IndexMap::new();
        cands.insert("b".to_string(), vec![s("three")]);
        cands.insert("c".to_string(), vec![s("five")]);

        let mut scorer = CiderScorer::default();
        let err = scorer.add_batch(&refs, &cands).unwrap_err();
        assert!(matches!(
            err,
            CiderError::ContractViolation { reason: ContractReason::MissingReferences, .. }
        ));
        assert!(scorer.is_empty());
        assert_eq!(scorer.state(), ScorerState::Empty);

        cands.swap_remove("c");
        cands.insert("a".to_string(), vec![s("one")]);
        scorer.add_batch(&refs, &cands).unwrap();
        let ids: Vec<&str> = scorer.items().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn empty_scorer_cannot_compute() {
        let mut scorer = CiderScorer::default();
        assert!(matches!(scorer.compute_score(), Err(CiderError::EmptyCorpus)));
        scorer.add("x", vec![s("a")], vec![s("a")]).unwrap();
        scorer.clear();
        assert!(matches!(scorer.compute_score(), Err(CiderError::EmptyCorpus)));
    }

    #[test]
    fn precomputed_mode_without_table_is_a_config_error() {
        let config = CiderConfig::default().with_df_mode(DfMode::Precomputed);
        let mut scorer: CiderScorer = CiderScorer::new(config);
        scorer.add("x", vec![s("a")], vec![s("a")]).unwrap();
        assert!(matches!(scorer.compute_score(), Err(CiderError::InvalidConfig(_))));
    }

    #[test]
    fn precomputed_table_must_cover_n() {
        let table = DocumentFrequency::build(&[vec![s("a b")], vec![s("c")]], 2);
        let mut scorer = CiderScorer::default().with_document_frequency(Arc::new(table));
        scorer.add("x", vec![s("a b")], vec![s("a b")]).unwrap();
        assert!(matches!(scorer.compute_score(), Err(CiderError::InvalidConfig(_))));
    }

    #[test]
    fn adding_after_score_drops_corpus_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("df.json");

        let mut scorer = CiderScorer::default();
        scorer.add("1", vec![s("a cat")], vec![s("a cat")]).unwrap();
        scorer.compute_score().unwrap();
        assert_eq!(scorer.document_frequency().unwrap().total_documents(), 1);

        scorer.add("2", vec![s("a dog")], vec![s("a dog")]).unwrap();
        assert!(scorer.document_frequency().is_none());
        scorer.save_df(&path).unwrap();
        let saved = DocumentFrequency::load(&path).unwrap();
        assert_eq!(saved.total_documents(), 2);
        assert_eq!(saved.df(&NGram::new(&["dog"])), 1);

        let mut refs = IndexMap::new();
        refs.insert("3".to_string(), vec![s("a bird")]);
        scorer.compute_score().unwrap();
        scorer.add_batch(&refs, &refs.clone()).unwrap();
        assert!(scorer.document_frequency().is_none());
    }

    #[test]
    fn adding_after_score_keeps_precomputed_table() {
        let table = Arc::new(DocumentFrequency::build(&[vec![s("a b")], vec![s("c")]], 4));
        let mut scorer = CiderScorer::default().with_document_frequency(Arc::clone(&table));
        scorer.add("x", vec![s("a b")], vec![s("a b")]).unwrap();
        scorer.compute_score().unwrap();
        scorer.add("y", vec![s("c")], vec![s("c")]).unwrap();
        assert!(Arc::ptr_eq(scorer.document_frequency().unwrap(), &table));
    }

    #[test]
    fn score_display() {
        let score = Score {
            mean: 1.5,
            per_item: vec![1.0, 2.0],
            ids: vec!["a".into(), "b".into()],
        };
        assert_eq!(score.to_string(), "CIDEr 1.500000 over 2 items");
        assert!(format!("{score:#}").contains("b: 2.000000"));
        assert_eq!(score.std_dev(), 0.5);
        assert_eq!(score.iter_with_ids().collect::<Vec<_>>(), vec![("a", 1.0), ("b", 2.0)]);
    }
}
