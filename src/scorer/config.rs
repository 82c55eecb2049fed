use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CiderError, Result};
use crate::scorer::ngram::MAX_ORDER;

/// Where the document frequency table comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DfMode {
    /// Rebuilt from the accumulated references on every `compute_score`
    #[default]
    Corpus,
    /// A table loaded once and reused read-only
    Precomputed,
}

/// Scorer configuration
///
/// The defaults are the standard CIDEr setup: n-grams up to 4, Gaussian
/// length penalty with sigma 6, scores on a 0-10 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CiderConfig {
    /// maximum n-gram order
    pub n: usize,
    /// standard deviation of the length penalty
    pub sigma: f64,
    /// multiplier applied to the order-averaged similarity
    pub scale: f64,
    /// clip candidate weights to the reference weights (CIDEr-D)
    pub clip_candidate_weights: bool,
    /// leave out orders for which neither the candidate nor the reference
    /// has any n-gram, instead of counting them as 0
    pub skip_empty_orders: bool,
    pub df_mode: DfMode,
}

impl Default for CiderConfig {
    fn default() -> Self {
        Self {
            n: MAX_ORDER,
            sigma: 6.0,
            scale: 10.0,
            clip_candidate_weights: false,
            skip_empty_orders: true,
            df_mode: DfMode::Corpus,
        }
    }
}

impl CiderConfig {
    pub fn with_n(mut self, n: usize) -> Self {
        self.n = n;
        self
    }

    pub fn with_sigma(mut self, sigma: f64) -> Self {
        self.sigma = sigma;
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_clipping(mut self, clip: bool) -> Self {
        self.clip_candidate_weights = clip;
        self
    }

    pub fn with_skip_empty_orders(mut self, skip: bool) -> Self {
        self.skip_empty_orders = skip;
        self
    }

    pub fn with_df_mode(mut self, mode: DfMode) -> Self {
        self.df_mode = mode;
        self
    }

    /// Weight of each order, uniform 1/n
    #[inline]
    pub fn order_weight(&self) -> f64 {
        1.0 / self.n as f64
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_ORDER).contains(&self.n) {
            return Err(CiderError::InvalidConfig(format!(
                "n must be within 1..={MAX_ORDER}, got {}",
                self.n
            )));
        }
        if !self.sigma.is_finite() || self.sigma <= 0.0 {
            return Err(CiderError::InvalidConfig(format!(
                "sigma must be a positive finite number, got {}",
                self.sigma
            )));
        }
        if !self.scale.is_finite() {
            return Err(CiderError::InvalidConfig(format!(
                "scale must be finite, got {}",
                self.scale
            )));
        }
        Ok(())
    }

    /// Parse from JSON; missing fields keep their defaults
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: CiderConfig = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| CiderError::io(path, e))?;
        Self::from_json_str(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_standard_cider() {
        let c = CiderConfig::default();
        assert_eq!(c.n, 4);
        assert_eq!(c.sigma, 6.0);
        assert_eq!(c.scale, 10.0);
        assert!(!c.clip_candidate_weights);
        assert!(c.skip_empty_orders);
        assert_eq!(c.df_mode, DfMode::Corpus);
        assert_eq!(c.order_weight(), 0.25);
        c.validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let c = CiderConfig::from_json_str(r#"{"sigma": 3.0, "df_mode": "precomputed"}"#).unwrap();
        assert_eq!(c.sigma, 3.0);
        assert_eq!(c.n, 4);
        assert_eq!(c.df_mode, DfMode::Precomputed);
    }

    #[test]
    fn invalid_values_are_rejected() {
        for bad in [
            CiderConfig::default().with_n(0),
            CiderConfig::default().with_n(5),
            CiderConfig::default().with_sigma(0.0),
            CiderConfig::default().with_sigma(f64::NAN),
            CiderConfig::default().with_scale(f64::INFINITY),
        ] {
            assert!(matches!(bad.validate(), Err(CiderError::InvalidConfig(_))));
        }
        assert!(CiderConfig::from_json_str(r#"{"n": 9}"#).is_err());
        assert!(matches!(
            CiderConfig::from_json_str("{not json"),
            Err(CiderError::Json(_))
        ));
    }
}
