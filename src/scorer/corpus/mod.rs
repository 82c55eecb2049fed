use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::error::{CiderError, Result};
use crate::scorer::ngram::{NGram, NGramCounts, MAX_ORDER};

/// Document frequency table
/// Counts, for every n-gram, how many documents (reference groups) contain it
/// at least once, together with the number of documents seen.
///
/// The table only grows while it is being built. Once handed to the scorer it
/// is read through a shared reference and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentFrequency {
    /// document counts per order, `orders[k - 1]` for order `k`
    pub(crate) orders: Vec<IndexMap<NGram, u64>>,
    /// number of documents added
    pub(crate) total_documents: u64,
}

impl Default for DocumentFrequency {
    fn default() -> Self {
        Self::new(MAX_ORDER)
    }
}

impl DocumentFrequency {
    /// Create an empty table covering orders `1..=max_order`
    pub fn new(max_order: usize) -> Self {
        Self {
            orders: (0..max_order).map(|_| IndexMap::new()).collect(),
            total_documents: 0,
        }
    }

    /// Build a table from reference groups, one group per document
    ///
    /// # Arguments
    /// * `documents` - reference sentences of each document
    /// * `max_order` - highest n-gram order to count
    pub fn build<D, S, T>(documents: &[D], max_order: usize) -> Self
    where
        D: AsRef<[S]>,
        S: AsRef<[T]>,
        T: AsRef<str>,
    {
        let mut table = Self::new(max_order);
        for doc in documents {
            table.add_document(doc.as_ref());
        }
        debug!(
            documents = table.total_documents,
            ngrams = table.vocab_size(),
            "built document frequency table"
        );
        table
    }

    /// Add one document given as its tokenized reference sentences
    pub fn add_document<S, T>(&mut self, references: &[S])
    where
        S: AsRef<[T]>,
        T: AsRef<str>,
    {
        let max_order = self.max_order();
        let counts: Vec<NGramCounts> = references
            .iter()
            .map(|r| NGramCounts::from_tokens(r.as_ref(), max_order))
            .collect();
        self.add_counts(&counts);
    }

    /// Add one document given as the n-gram counts of its references
    /// Presence only: an n-gram found in several references of the same
    /// document still counts once.
    pub fn add_counts(&mut self, references: &[NGramCounts]) {
        self.total_documents += 1;
        for (i, table) in self.orders.iter_mut().enumerate() {
            let k = i + 1;
            // 文書内でユニークな n-gram
            let distinct: IndexSet<&NGram> = references
                .iter()
                .filter_map(|c| c.order(k))
                .flat_map(|m| m.keys())
                .collect();
            for ngram in distinct {
                *table.entry(ngram.clone()).or_insert(0) += 1;
            }
        }
    }

    /// Highest order this table covers
    #[inline]
    pub fn max_order(&self) -> usize {
        self.orders.len()
    }

    /// Get the number of documents in the table
    #[inline]
    pub fn total_documents(&self) -> u64 {
        self.total_documents
    }

    /// Get the number of distinct n-grams across all orders
    #[inline]
    pub fn vocab_size(&self) -> usize {
        self.orders.iter().map(|m| m.len()).sum()
    }

    /// Document frequency of `ngram`, 0 if never seen
    #[inline]
    pub fn df(&self, ngram: &NGram) -> u64 {
        ngram
            .order()
            .checked_sub(1)
            .and_then(|i| self.orders.get(i))
            .and_then(|m| m.get(ngram))
            .copied()
            .unwrap_or(0)
    }

    /// Inverse document frequency
    /// idf = ln(max(1, N) / max(1, df))
    ///
    /// An unseen n-gram is treated as df = 1, so it gets the largest weight
    /// instead of dividing by zero.
    #[inline]
    pub fn idf(&self, ngram: &NGram) -> f64 {
        let n = self.total_documents.max(1) as f64;
        let df = self.df(ngram).max(1) as f64;
        (n / df).ln()
    }

    /// Whether the table can tell n-grams apart.
    /// With at most one document every idf is ln(1) = 0.
    #[inline]
    pub fn is_informative(&self) -> bool {
        self.total_documents > 1
    }

    /// Weight applied to a term count when building vectors.
    /// The idf for an informative table, 1.0 otherwise, so a single-document
    /// corpus still compares sentences by raw term frequency.
    #[inline]
    pub fn weight(&self, ngram: &NGram) -> f64 {
        if self.is_informative() {
            self.idf(ngram)
        } else {
            1.0
        }
    }

    /// Iterate over `(ngram, df)` pairs, lowest order first
    pub fn iter(&self) -> impl Iterator<Item = (&NGram, u64)> {
        self.orders.iter().flat_map(|m| m.iter().map(|(g, &c)| (g, c)))
    }

    /// Counts of order `k`
    pub fn order(&self, k: usize) -> Option<&IndexMap<NGram, u64>> {
        k.checked_sub(1).and_then(|i| self.orders.get(i))
    }

    /// Merge a table built over a disjoint set of documents into self
    pub fn merge(&mut self, other: &DocumentFrequency) {
        if other.max_order() > self.max_order() {
            self.orders.resize_with(other.max_order(), IndexMap::new);
        }
        for (mine, theirs) in self.orders.iter_mut().zip(other.orders.iter()) {
            for (ngram, &count) in theirs {
                *mine.entry(ngram.clone()).or_insert(0) += count;
            }
        }
        self.total_documents += other.total_documents;
    }

    /// Check the table invariants: every df in `1..=total_documents`,
    /// every n-gram stored under its own order, order within `1..=MAX_ORDER`.
    pub fn validate(&self) -> Result<()> {
        if self.max_order() == 0 || self.max_order() > MAX_ORDER {
            return Err(CiderError::MalformedTable(format!(
                "max order {} outside 1..={MAX_ORDER}",
                self.max_order()
            )));
        }
        for (i, table) in self.orders.iter().enumerate() {
            let k = i + 1;
            for (ngram, &count) in table {
                if ngram.order() != k {
                    return Err(CiderError::MalformedTable(format!(
                        "n-gram \"{ngram}\" of length {} stored under order {k}",
                        ngram.order()
                    )));
                }
                if count == 0 || count > self.total_documents {
                    return Err(CiderError::MalformedTable(format!(
                        "n-gram \"{ngram}\" has document frequency {count} with {} documents",
                        self.total_documents
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn g(tokens: &[&str]) -> NGram {
        NGram::new(tokens)
    }

    #[test]
    fn df_counts_presence_per_document() {
        let docs = vec![
            vec![vec!["a", "cat", "a"], vec!["a", "dog"]],
            vec![vec!["the", "cat"]],
        ];
        let table = DocumentFrequency::build(&docs, 4);
        assert_eq!(table.total_documents(), 2);
        // "a" appears three times in document 0 but counts once
        assert_eq!(table.df(&g(&["a"])), 1);
        assert_eq!(table.df(&g(&["cat"])), 2);
        assert_eq!(table.df(&g(&["a", "cat"])), 1);
        assert_eq!(table.df(&g(&["bird"])), 0);
        table.validate().unwrap();
    }

    #[test]
    fn df_is_monotone_as_documents_are_added() {
        let mut table = DocumentFrequency::new(2);
        let probe = g(&["a"]);
        let mut last = 0;
        for doc in [vec![vec!["a", "b"]], vec![vec!["c"]], vec![vec!["a"]]] {
            table.add_document(&doc);
            let now = table.df(&probe);
            assert!(now >= last);
            assert!(now <= table.total_documents());
            last = now;
        }
        assert_eq!(last, 2);
    }

    #[test]
    fn idf_is_non_negative_and_unseen_is_maximal() {
        let docs = vec![vec![vec!["a", "b"]], vec![vec!["a", "c"]], vec![vec!["d"]]];
        let table = DocumentFrequency::build(&docs, 2);
        let n = 3.0_f64;
        assert!((table.idf(&g(&["a"])) - (n / 2.0).ln()).abs() < 1e-12);
        assert!((table.idf(&g(&["b"])) - n.ln()).abs() < 1e-12);
        assert!((table.idf(&g(&["zzz"])) - n.ln()).abs() < 1e-12);
        for (ngram, _) in table.iter() {
            assert!(table.idf(ngram) >= 0.0);
        }
    }

    #[test]
    fn empty_table_idf_is_zero() {
        let table = DocumentFrequency::new(4);
        assert_eq!(table.idf(&g(&["a"])), 0.0);
        assert!(!table.is_informative());
        assert_eq!(table.weight(&g(&["a"])), 1.0);
    }

    #[test]
    fn merge_adds_counts_and_documents() {
        let mut left = DocumentFrequency::build(&[vec![vec!["a", "b"]]], 2);
        let right = DocumentFrequency::build(&[vec![vec!["a"]], vec![vec!["c"]]], 3);
        left.merge(&right);
        assert_eq!(left.total_documents(), 3);
        assert_eq!(left.max_order(), 3);
        assert_eq!(left.df(&g(&["a"])), 2);
        assert_eq!(left.df(&g(&["c"])), 1);
        assert_eq!(left.df(&g(&["a", "b"])), 1);
        left.validate().unwrap();
    }

    #[test]
    fn validate_rejects_broken_tables() {
        let mut table = DocumentFrequency::build(&[vec![vec!["a"]]], 1);
        table.orders[0].insert(g(&["b"]), 5);
        assert!(matches!(table.validate(), Err(CiderError::MalformedTable(_))));

        let mut table = DocumentFrequency::build(&[vec![vec!["a"]]], 2);
        table.orders[1].insert(g(&["b"]), 1);
        assert!(matches!(table.validate(), Err(CiderError::MalformedTable(_))));

        let table = DocumentFrequency::new(0);
        assert!(table.validate().is_err());
    }
}
