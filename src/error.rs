use std::{fmt, path::PathBuf};

use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, CiderError>;

/// Why an item was rejected at ingestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractReason {
    /// candidate list must hold exactly one sentence
    CandidateNotSingleton { found: usize },
    /// at least one reference sentence is required
    EmptyReferences,
    /// item id must not be empty
    EmptyId,
    /// candidate id has no entry in the reference mapping
    MissingReferences,
    /// the same id was submitted twice in one batch
    DuplicateId,
}

impl fmt::Display for ContractReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractReason::CandidateNotSingleton { found } => {
                write!(f, "expected exactly one candidate sentence but found {found}")
            }
            ContractReason::EmptyReferences => write!(f, "reference set is empty"),
            ContractReason::EmptyId => write!(f, "item id is empty"),
            ContractReason::MissingReferences => write!(f, "no references for candidate id"),
            ContractReason::DuplicateId => write!(f, "item id submitted more than once"),
        }
    }
}

/// Errors produced by the scorer and the document frequency table
#[derive(Debug, Error)]
pub enum CiderError {
    #[error("item \"{item}\" rejected: {reason}")]
    ContractViolation { item: String, reason: ContractReason },
    #[error("cannot compute a score over an empty corpus")]
    EmptyCorpus,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to access document frequency table at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode or decode CBOR table: {0}")]
    Cbor(#[from] serde_cbor::Error),
    #[error("failed to encode or decode JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed document frequency table: {0}")]
    MalformedTable(String),
}

impl CiderError {
    pub(crate) fn contract(item: &str, reason: ContractReason) -> Self {
        CiderError::ContractViolation {
            item: item.to_string(),
            reason,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CiderError::Io {
            path: path.into(),
            source,
        }
    }
}
