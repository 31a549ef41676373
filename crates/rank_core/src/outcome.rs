//! Outcome records: the atomic input of every rating computation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{RankError, Result};

/// Result of a single judged comparison, from `model_a`'s point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "A_WIN")]
    AWin,
    #[serde(rename = "B_WIN")]
    BWin,
    #[serde(rename = "TIE")]
    Tie,
}

impl Outcome {
    /// Actual score for model A (1 for a win, 0.5 for a tie, 0 for a loss)
    pub fn score_a(self) -> f64 {
        match self {
            Outcome::AWin => 1.0,
            Outcome::BWin => 0.0,
            Outcome::Tie => 0.5,
        }
    }

    /// The same outcome seen from model B's side.
    pub fn flipped(self) -> Self {
        match self {
            Outcome::AWin => Outcome::BWin,
            Outcome::BWin => Outcome::AWin,
            Outcome::Tie => Outcome::Tie,
        }
    }
}

/// One completed comparison between two models on one prompt.
///
/// Records are never mutated; a corrected judgement is a new record with a
/// later timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub model_a: String,
    pub model_b: String,
    pub category: String,
    pub promptset: String,
    pub result: Outcome,
    pub timestamp: DateTime<Utc>,
}

impl OutcomeRecord {
    pub fn new(
        model_a: impl Into<String>,
        model_b: impl Into<String>,
        category: impl Into<String>,
        promptset: impl Into<String>,
        result: Outcome,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            model_a: model_a.into(),
            model_b: model_b.into(),
            category: category.into(),
            promptset: promptset.into(),
            result,
            timestamp,
        }
    }

    /// Whether the record involves `model`
    pub fn involves(&self, model: &str) -> bool {
        self.model_a == model || self.model_b == model
    }

    /// Shape checks that don't depend on any promptset.
    pub fn check_shape(&self) -> Result<()> {
        if self.model_a.trim().is_empty() || self.model_b.trim().is_empty() {
            return Err(RankError::MissingField("model identifier"));
        }
        if self.promptset.trim().is_empty() {
            return Err(RankError::MissingField("promptset"));
        }
        if self.category.trim().is_empty() {
            return Err(RankError::MissingField("category"));
        }
        if self.model_a == self.model_b {
            return Err(RankError::SelfComparison(self.model_a.clone()));
        }
        Ok(())
    }
}

/// A named collection of prompt categories. Ratings never cross promptsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promptset {
    pub name: String,
    pub categories: BTreeSet<String>,
}

impl Promptset {
    pub fn new<I, S>(name: impl Into<String>, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            categories: categories.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.categories.contains(category)
    }

    /// Validate a record against this promptset.
    ///
    /// Rejects malformed pairs, records from another promptset and
    /// categories outside the declared set.
    pub fn validate(&self, record: &OutcomeRecord) -> Result<()> {
        record.check_shape()?;
        if record.promptset != self.name {
            return Err(RankError::PromptsetMismatch {
                expected: self.name.clone(),
                found: record.promptset.clone(),
            });
        }
        if !self.has_category(&record.category) {
            return Err(RankError::UnknownCategory {
                promptset: self.name.clone(),
                category: record.category.clone(),
            });
        }
        Ok(())
    }
}

/// Sort records into replay order: ascending timestamp, ties kept in input order.
pub fn replay_order(records: &mut [OutcomeRecord]) {
    // sort_by_key is stable, which is what makes equal timestamps deterministic
    records.sort_by_key(|r| r.timestamp);
}

#[cfg(test)]
#[path = "outcome_tests.rs"]
mod outcome_tests;
