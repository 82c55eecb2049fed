use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// Upper bound of the n-gram order the scorer works with
pub const MAX_ORDER: usize = 4;

/// A tokenized sentence
pub type Sentence = Vec<String>;

/// NGram 構造体
/// A contiguous run of tokens. Equality and hashing go by value,
/// so it can be used directly as a map key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NGram(Box<[Box<str>]>);

impl NGram {
    pub fn new<T>(tokens: &[T]) -> Self
    where
        T: AsRef<str>,
    {
        NGram(tokens.iter().map(|t| Box::from(t.as_ref())).collect())
    }

    /// n-gram order (number of tokens)
    #[inline]
    pub fn order(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|t| t.as_ref())
    }
}

impl fmt::Display for NGram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, tok) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(tok)?;
        }
        Ok(())
    }
}

impl<T: AsRef<str>> From<&[T]> for NGram {
    fn from(tokens: &[T]) -> Self {
        NGram::new(tokens)
    }
}

/// NGramCounts 構造体
/// Occurrence counts of every n-gram of one sentence, partitioned by order.
///
/// `orders[k - 1]` holds the counts of order `k`. Insertion order of each map
/// follows the first occurrence in the sentence.
///
/// # Examples
/// ```
/// use cider_scorer::NGramCounts;
/// let counts = NGramCounts::from_tokens(&["a", "cat", "a", "cat"], 2);
/// assert_eq!(counts.total(1), 4);
/// assert_eq!(counts.distinct(2), 2); // "a cat", "cat a"
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NGramCounts {
    orders: Vec<IndexMap<NGram, u32>>,
    token_len: usize,
}

impl NGramCounts {
    /// Slide a window of length `k` (stride 1) over `tokens` for every `k` in `1..=n`.
    /// Orders longer than the sentence stay empty.
    ///
    /// # Arguments
    /// * `tokens` - tokenized sentence
    /// * `n` - maximum order, expected in `1..=MAX_ORDER`
    pub fn from_tokens<T>(tokens: &[T], n: usize) -> Self
    where
        T: AsRef<str>,
    {
        debug_assert!((1..=MAX_ORDER).contains(&n), "order {n} out of range");
        let mut orders = Vec::with_capacity(n);
        for k in 1..=n {
            let mut counts: IndexMap<NGram, u32> = IndexMap::new();
            for window in tokens.windows(k) {
                *counts.entry(NGram::new(window)).or_insert(0) += 1;
            }
            orders.push(counts);
        }
        NGramCounts {
            orders,
            token_len: tokens.len(),
        }
    }

    /// Maximum order these counts were built with
    #[inline]
    pub fn max_order(&self) -> usize {
        self.orders.len()
    }

    /// Token length of the source sentence
    #[inline]
    pub fn token_len(&self) -> usize {
        self.token_len
    }

    /// Counts of order `k`, `None` when `k` is outside `1..=max_order`
    #[inline]
    pub fn order(&self, k: usize) -> Option<&IndexMap<NGram, u32>> {
        k.checked_sub(1).and_then(|i| self.orders.get(i))
    }

    /// Occurrence count of one n-gram, 0 when absent
    #[inline]
    pub fn count(&self, ngram: &NGram) -> u32 {
        self.order(ngram.order())
            .and_then(|m| m.get(ngram))
            .copied()
            .unwrap_or(0)
    }

    /// Sum of counts of order `k`
    pub fn total(&self, k: usize) -> u64 {
        self.order(k)
            .map(|m| m.values().map(|&c| c as u64).sum())
            .unwrap_or(0)
    }

    /// Number of distinct n-grams of order `k`
    pub fn distinct(&self, k: usize) -> usize {
        self.order(k).map_or(0, |m| m.len())
    }

    /// Iterate over `(k, counts)` pairs, lowest order first
    pub fn iter_orders(&self) -> impl Iterator<Item = (usize, &IndexMap<NGram, u32>)> {
        self.orders.iter().enumerate().map(|(i, m)| (i + 1, m))
    }

    /// Distinct n-grams of every order, presence only
    pub fn ngram_set(&self) -> IndexSet<&NGram> {
        self.orders.iter().flat_map(|m| m.keys()).collect()
    }
}

/// Shorthand for [`NGramCounts::from_tokens`]
#[inline]
pub fn extract_ngrams<T: AsRef<str>>(tokens: &[T], n: usize) -> NGramCounts {
    NGramCounts::from_tokens(tokens, n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unigram_total_equals_sentence_length() {
        for sentence in [
            vec![],
            vec!["a"],
            vec!["a", "a", "a"],
            vec!["two", "dogs", "play", "in", "the", "grass"],
        ] {
            let counts = extract_ngrams(&sentence, MAX_ORDER);
            assert_eq!(counts.total(1), sentence.len() as u64);
            assert_eq!(counts.token_len(), sentence.len());
        }
    }

    #[test]
    fn short_sentence_leaves_higher_orders_empty() {
        let counts = extract_ngrams(&["a", "cat"], 4);
        assert_eq!(counts.max_order(), 4);
        assert_eq!(counts.distinct(1), 2);
        assert_eq!(counts.distinct(2), 1);
        assert_eq!(counts.distinct(3), 0);
        assert_eq!(counts.distinct(4), 0);
        assert!(counts.order(5).is_none());
        assert!(counts.order(0).is_none());
    }

    #[test]
    fn empty_sentence_produces_empty_maps() {
        let counts = extract_ngrams::<&str>(&[], 4);
        for k in 1..=4 {
            assert_eq!(counts.distinct(k), 0);
        }
        assert!(counts.ngram_set().is_empty());
    }

    #[test]
    fn repeated_ngrams_are_counted() {
        let counts = extract_ngrams(&["a", "b", "a", "b", "a"], 3);
        assert_eq!(counts.count(&NGram::new(&["a"])), 3);
        assert_eq!(counts.count(&NGram::new(&["a", "b"])), 2);
        assert_eq!(counts.count(&NGram::new(&["b", "a"])), 2);
        assert_eq!(counts.count(&NGram::new(&["a", "b", "a"])), 2);
        assert_eq!(counts.count(&NGram::new(&["x"])), 0);
        assert_eq!(counts.count(&NGram::new(&["a", "b", "a", "b"])), 0);
    }

    #[test]
    fn first_occurrence_order_is_kept() {
        let counts = extract_ngrams(&["c", "a", "c", "b"], 1);
        let keys: Vec<String> = counts
            .order(1)
            .map(|m| m.keys().map(|g| g.to_string()).collect())
            .unwrap_or_default();
        assert_eq!(keys, vec!["c", "a", "b"]);
    }

    #[test]
    fn ngram_display_and_order() {
        let g = NGram::new(&["a", "cat", "sat"]);
        assert_eq!(g.order(), 3);
        assert_eq!(g.to_string(), "a cat sat");
        assert_eq!(g.tokens().collect::<Vec<_>>(), vec!["a", "cat", "sat"]);
        assert_eq!(g, NGram::from(&["a", "cat", "sat"][..]));
    }
}
