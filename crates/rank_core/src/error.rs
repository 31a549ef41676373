//! Error types for the rating engine.
//!
//! Every failure is a deterministic function of the input data, so nothing
//! here is retried internally. Callers branch on [`RankError::kind`] to tell
//! bad input apart from a fit that simply did not settle.

use std::path::PathBuf;

/// Coarse classification of a [`RankError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad record, unknown category or promptset, invalid settings.
    Configuration,
    /// Bradley-Terry fit stopped at the iteration cap.
    NotConverged,
    /// A requested estimate has zero observations behind it.
    InsufficientData,
    /// Snapshot (de)serialization failed.
    Serialization,
}

#[derive(Debug, thiserror::Error)]
pub enum RankError {
    #[error("unknown category '{category}' for promptset '{promptset}'")]
    UnknownCategory { promptset: String, category: String },

    #[error("unknown promptset '{0}'")]
    UnknownPromptset(String),

    #[error("model '{0}' cannot be compared against itself")]
    SelfComparison(String),

    #[error("outcome record is missing a {0}")]
    MissingField(&'static str),

    #[error("record belongs to promptset '{found}', expected '{expected}'")]
    PromptsetMismatch { expected: String, found: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("failed to read configuration {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot serialization failed: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("Bradley-Terry fit did not converge after {iterations} sweeps (max relative change {max_change:e})")]
    NotConverged { iterations: usize, max_change: f64 },

    #[error("insufficient data for model '{0}'")]
    InsufficientData(String),
}

impl RankError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownCategory { .. }
            | Self::UnknownPromptset(_)
            | Self::SelfComparison(_)
            | Self::MissingField(_)
            | Self::PromptsetMismatch { .. }
            | Self::InvalidConfig(_)
            | Self::ConfigParse(_)
            | Self::ConfigRead { .. } => ErrorKind::Configuration,
            Self::Snapshot(_) => ErrorKind::Serialization,
            Self::NotConverged { .. } => ErrorKind::NotConverged,
            Self::InsufficientData(_) => ErrorKind::InsufficientData,
        }
    }
}

pub type Result<T> = std::result::Result<T, RankError>;
