//! Rating storage
//!
//! Ratings and the pair tallies behind them are derived state: they can
//! always be thrown away and rebuilt from the outcome log. The
//! [`RatingStore`] trait is the seam where a persistent backend plugs in;
//! [`InMemoryRatingStore`] is the default.
//!
//! Tallies are kept next to the ratings so a store restored from a snapshot
//! still knows how often each pair has played.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::elo::Rating;
use crate::error::Result;
use crate::head_to_head::{HeadToHead, PairTally};
use crate::outcome::OutcomeRecord;

/// Which rating series a rating belongs to
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Series {
    /// Fed by every record regardless of category
    Overall,
    Category(String),
}

impl Series {
    pub fn category(name: impl Into<String>) -> Self {
        Series::Category(name.into())
    }
}

impl fmt::Display for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Series::Overall => write!(f, "overall"),
            Series::Category(name) => write!(f, "{name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RatingKey {
    pub promptset: String,
    pub series: Series,
    pub model: String,
}

impl RatingKey {
    pub fn new(promptset: &str, series: Series, model: &str) -> Self {
        Self {
            promptset: promptset.to_string(),
            series,
            model: model.to_string(),
        }
    }
}

/// Holds the current rating of every `(promptset, series, model)` triple,
/// plus the pair tallies of every `(promptset, series)`.
pub trait RatingStore {
    fn get(&self, key: &RatingKey) -> Option<Rating>;

    fn put(&mut self, key: RatingKey, rating: Rating);

    /// Count one record in the pair tallies of `series`
    fn record_pair(&mut self, series: &Series, record: &OutcomeRecord);

    /// Pair tallies of one series; empty when nothing was recorded
    fn head_to_head(&self, promptset: &str, series: &Series) -> HeadToHead;

    /// Drop every rating and pair tally of a promptset
    fn clear_promptset(&mut self, promptset: &str);

    /// All ratings of a promptset, in key order
    fn entries(&self, promptset: &str) -> Vec<(RatingKey, Rating)>;

    /// Ratings of one series as `(model, rating)` pairs
    fn series(&self, promptset: &str, series: &Series) -> Vec<(String, Rating)> {
        self.entries(promptset)
            .into_iter()
            .filter(|(key, _)| &key.series == series)
            .map(|(key, rating)| (key.model, rating))
            .collect()
    }

    /// Return the rating for `key`, creating it at `base_rating` on first sight.
    /// Calling this for an existing key changes nothing.
    fn materialize(&mut self, key: &RatingKey, base_rating: f64) -> Rating {
        match self.get(key) {
            Some(rating) => rating,
            None => {
                let rating = Rating::initial(base_rating);
                tracing::debug!(
                    promptset = %key.promptset,
                    series = %key.series,
                    model = %key.model,
                    base_rating,
                    "materialized new rating"
                );
                self.put(key.clone(), rating);
                rating
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InMemoryRatingStore {
    ratings: BTreeMap<RatingKey, Rating>,
    pairs: BTreeMap<(String, Series), HeadToHead>,
}

impl InMemoryRatingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    pub fn snapshot(&self) -> RatingSnapshot {
        let entries = self
            .ratings
            .iter()
            .map(|(key, rating)| RatingEntry {
                key: key.clone(),
                rating: *rating,
            })
            .collect();
        let pairs = self
            .pairs
            .iter()
            .flat_map(|((promptset, series), h2h)| {
                h2h.pairs().map(move |(a, b, tally)| PairEntry {
                    promptset: promptset.clone(),
                    series: series.clone(),
                    model_a: a.to_string(),
                    model_b: b.to_string(),
                    tally: *tally,
                })
            })
            .collect();
        RatingSnapshot { entries, pairs }
    }

    pub fn from_snapshot(snapshot: RatingSnapshot) -> Self {
        let mut pairs: BTreeMap<(String, Series), HeadToHead> = BTreeMap::new();
        for entry in snapshot.pairs {
            pairs
                .entry((entry.promptset, entry.series))
                .or_default()
                .add_tally(&entry.model_a, &entry.model_b, entry.tally);
        }
        Self {
            ratings: snapshot
                .entries
                .into_iter()
                .map(|entry| (entry.key, entry.rating))
                .collect(),
            pairs,
        }
    }
}

impl RatingStore for InMemoryRatingStore {
    fn get(&self, key: &RatingKey) -> Option<Rating> {
        self.ratings.get(key).copied()
    }

    fn put(&mut self, key: RatingKey, rating: Rating) {
        self.ratings.insert(key, rating);
    }

    fn record_pair(&mut self, series: &Series, record: &OutcomeRecord) {
        self.pairs
            .entry((record.promptset.clone(), series.clone()))
            .or_default()
            .record(record);
    }

    fn head_to_head(&self, promptset: &str, series: &Series) -> HeadToHead {
        self.pairs
            .get(&(promptset.to_string(), series.clone()))
            .cloned()
            .unwrap_or_default()
    }

    fn clear_promptset(&mut self, promptset: &str) {
        self.ratings.retain(|key, _| key.promptset != promptset);
        self.pairs.retain(|(p, _), _| p != promptset);
    }

    fn entries(&self, promptset: &str) -> Vec<(RatingKey, Rating)> {
        self.ratings
            .iter()
            .filter(|(key, _)| key.promptset == promptset)
            .map(|(key, rating)| (key.clone(), *rating))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingEntry {
    #[serde(flatten)]
    pub key: RatingKey,
    pub rating: Rating,
}

/// Tally of one pair within one series, oriented from `model_a`'s side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairEntry {
    pub promptset: String,
    pub series: Series,
    pub model_a: String,
    pub model_b: String,
    #[serde(flatten)]
    pub tally: PairTally,
}

/// Serializable copy of a store's contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingSnapshot {
    pub entries: Vec<RatingEntry>,
    /// Snapshots written before pair tallies were stored load with none
    #[serde(default)]
    pub pairs: Vec<PairEntry>,
}

impl RatingSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod store_tests;
