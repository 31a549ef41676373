//! Leaderboard building: folding outcome records into ELO ratings.
//!
//! Every record updates two independent series for both models: its category
//! series and the overall series. Records are replayed in ascending timestamp
//! order with equal timestamps kept in input order, so the same log always
//! produces the same ratings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::bradley_terry::{BradleyTerryFit, BradleyTerrySolver};
use crate::config::EngineConfig;
use crate::coverage::{
    category_distribution, category_gaps, total_comparisons, underrepresented_models, CategoryGap,
    CoverageSummary, ModelCoverage,
};
use crate::elo::{EloUpdater, Rating};
use crate::error::{RankError, Result};
use crate::head_to_head::HeadToHead;
use crate::outcome::{replay_order, OutcomeRecord, Promptset};
use crate::store::{InMemoryRatingStore, RatingKey, RatingSnapshot, RatingStore, Series};
use crate::suggest::{Suggestion, SuggestionPolicy};

/// Source of archived outcome records, e.g. the comparison archive
pub trait OutcomeArchive {
    /// Every record of `promptset`, in insertion order
    fn outcomes(&self, promptset: &str) -> Vec<OutcomeRecord>;
}

impl OutcomeArchive for [OutcomeRecord] {
    fn outcomes(&self, promptset: &str) -> Vec<OutcomeRecord> {
        self.iter()
            .filter(|r| r.promptset == promptset)
            .cloned()
            .collect()
    }
}

impl OutcomeArchive for Vec<OutcomeRecord> {
    fn outcomes(&self, promptset: &str) -> Vec<OutcomeRecord> {
        self.as_slice().outcomes(promptset)
    }
}

/// One row of a ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub model: String,
    pub rating: f64,
    pub games_played: u32,
}

/// Full ranked view of a promptset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leaderboard {
    pub promptset: String,
    pub overall: Vec<RankedEntry>,
    /// One ranking per declared category, empty if nothing was played there
    pub categories: BTreeMap<String, Vec<RankedEntry>>,
}

impl Leaderboard {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Maintains the ratings of one promptset.
///
/// The builder owns its [`RatingStore`], which holds both the ratings and
/// the pair tallies. Only [`rebuild`](Self::rebuild) clears them;
/// [`update`](Self::update) only ever folds new records in.
pub struct LeaderboardBuilder<S: RatingStore = InMemoryRatingStore> {
    promptset: Promptset,
    elo: EloUpdater,
    store: S,
    latest: Option<DateTime<Utc>>,
}

impl LeaderboardBuilder<InMemoryRatingStore> {
    pub fn new(promptset: Promptset, elo: EloUpdater) -> Self {
        Self::with_store(promptset, elo, InMemoryRatingStore::new())
    }

    /// Builder for a promptset declared in `config`
    pub fn from_config(config: &EngineConfig, promptset: &str) -> Result<Self> {
        config.validate()?;
        let promptset = config.promptset(promptset)?.clone();
        Ok(Self::new(promptset, EloUpdater::from_config(config)))
    }

    /// Builder seeded from a previously saved snapshot, pair tallies included
    pub fn restore(promptset: Promptset, elo: EloUpdater, snapshot: RatingSnapshot) -> Self {
        Self::with_store(promptset, elo, InMemoryRatingStore::from_snapshot(snapshot))
    }

    pub fn snapshot(&self) -> RatingSnapshot {
        self.store.snapshot()
    }
}

impl<S: RatingStore> LeaderboardBuilder<S> {
    /// Builder over an existing store; ratings and tallies already in it are kept
    pub fn with_store(promptset: Promptset, elo: EloUpdater, store: S) -> Self {
        Self {
            promptset,
            elo,
            store,
            latest: None,
        }
    }

    pub fn promptset(&self) -> &Promptset {
        &self.promptset
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Fold new records into the current ratings.
    ///
    /// The whole batch is validated before anything is applied, so a bad
    /// record leaves the ratings untouched. Returns the number of records
    /// applied.
    pub fn update(&mut self, records: &[OutcomeRecord]) -> Result<usize> {
        for record in records {
            self.promptset.validate(record)?;
        }
        let mut ordered = records.to_vec();
        replay_order(&mut ordered);

        if let (Some(latest), Some(first)) = (self.latest, ordered.first()) {
            if first.timestamp < latest {
                tracing::warn!(
                    promptset = %self.promptset.name,
                    latest = %latest,
                    record = %first.timestamp,
                    "record predates already applied outcomes; a rebuild would order it differently"
                );
            }
        }

        for record in &ordered {
            apply_record(&mut self.store, &self.elo, record);
            self.latest = self.latest.max(Some(record.timestamp));
        }

        tracing::debug!(
            promptset = %self.promptset.name,
            applied = ordered.len(),
            "applied outcome records"
        );
        Ok(ordered.len())
    }

    /// Discard every rating and tally of the promptset and replay the archive.
    ///
    /// The whole archive is validated first; a bad record leaves the store
    /// untouched.
    pub fn rebuild<A>(&mut self, archive: &A) -> Result<usize>
    where
        A: OutcomeArchive + ?Sized,
    {
        let mut records = archive.outcomes(&self.promptset.name);
        for record in &records {
            self.promptset.validate(record)?;
        }
        replay_order(&mut records);

        self.store.clear_promptset(&self.promptset.name);
        for record in &records {
            apply_record(&mut self.store, &self.elo, record);
        }
        self.latest = records.last().map(|r| r.timestamp);

        tracing::info!(
            promptset = %self.promptset.name,
            records = records.len(),
            ratings = self.store.entries(&self.promptset.name).len(),
            "rebuilt ratings from archive"
        );
        Ok(records.len())
    }

    /// Models of one series, best first.
    ///
    /// Ties on rating go to the model with more games, then to the smaller
    /// model id. An undeclared category yields an empty ranking.
    pub fn rank(&self, series: &Series) -> Vec<RankedEntry> {
        let mut entries: Vec<RankedEntry> = self
            .store
            .series(&self.promptset.name, series)
            .into_iter()
            .map(|(model, rating)| RankedEntry {
                model,
                rating: rating.value,
                games_played: rating.games_played,
            })
            .collect();
        entries.sort_by(|a, b| {
            b.rating
                .total_cmp(&a.rating)
                .then_with(|| b.games_played.cmp(&a.games_played))
                .then_with(|| a.model.cmp(&b.model))
        });
        entries
    }

    /// Current rating of `model`; models never seen in the series have no estimate.
    pub fn rating(&self, model: &str, series: &Series) -> Result<Rating> {
        self.store
            .get(&RatingKey::new(&self.promptset.name, series.clone(), model))
            .ok_or_else(|| RankError::InsufficientData(model.to_string()))
    }

    pub fn leaderboard(&self) -> Leaderboard {
        Leaderboard {
            promptset: self.promptset.name.clone(),
            overall: self.rank(&Series::Overall),
            categories: self
                .promptset
                .categories
                .iter()
                .map(|c| (c.clone(), self.rank(&Series::category(c.as_str()))))
                .collect(),
        }
    }

    /// Pair counts of a series
    pub fn head_to_head(&self, series: &Series) -> Result<HeadToHead> {
        self.check_series(series)?;
        Ok(self.store.head_to_head(&self.promptset.name, series))
    }

    /// Bradley-Terry fit over `models` using the games of one series
    pub fn fit_bradley_terry(
        &self,
        solver: &BradleyTerrySolver,
        models: &[String],
        series: &Series,
    ) -> Result<BradleyTerryFit> {
        Ok(solver.fit(models, &self.head_to_head(series)?))
    }

    /// Suggest the next comparisons for one series
    pub fn suggest(&self, policy: &SuggestionPolicy, series: &Series) -> Result<Vec<Suggestion>> {
        let h2h = self.head_to_head(series)?;
        Ok(policy.suggest(&self.rank(series), &h2h))
    }

    /// Models with the fewest games overall first
    pub fn underrepresented_models(&self) -> Vec<ModelCoverage> {
        underrepresented_models(&self.store.head_to_head(&self.promptset.name, &Series::Overall))
    }

    /// For every declared category, the pairs compared overall that have
    /// fewer than `min_games` games in that category
    pub fn category_gaps(&self, min_games: u32) -> BTreeMap<String, Vec<CategoryGap>> {
        let overall = self.store.head_to_head(&self.promptset.name, &Series::Overall);
        self.category_head_to_heads()
            .into_iter()
            .map(|(category, h2h)| (category, category_gaps(&overall, &h2h, min_games)))
            .collect()
    }

    pub fn coverage_summary(&self) -> CoverageSummary {
        let overall = self.store.head_to_head(&self.promptset.name, &Series::Overall);
        let ratings: BTreeMap<String, f64> = self
            .rank(&Series::Overall)
            .into_iter()
            .map(|entry| (entry.model, entry.rating))
            .collect();

        CoverageSummary {
            promptset: self.promptset.name.clone(),
            total_models: ratings.len(),
            total_comparisons: total_comparisons(&overall),
            comparisons_per_model: underrepresented_models(&overall)
                .into_iter()
                .map(|c| (c.model, c.games))
                .collect(),
            category_distribution: category_distribution(&self.category_head_to_heads()),
            ratings,
        }
    }

    fn category_head_to_heads(&self) -> BTreeMap<String, HeadToHead> {
        self.promptset
            .categories
            .iter()
            .map(|c| {
                let h2h = self.store.head_to_head(&self.promptset.name, &Series::category(c.as_str()));
                (c.clone(), h2h)
            })
            .collect()
    }

    fn check_series(&self, series: &Series) -> Result<()> {
        match series {
            Series::Overall => Ok(()),
            Series::Category(name) if self.promptset.has_category(name) => Ok(()),
            Series::Category(name) => Err(RankError::UnknownCategory {
                promptset: self.promptset.name.clone(),
                category: name.clone(),
            }),
        }
    }
}

/// Apply one validated record to its category series and the overall series
fn apply_record<S: RatingStore>(store: &mut S, elo: &EloUpdater, record: &OutcomeRecord) {
    for series in [Series::category(record.category.as_str()), Series::Overall] {
        let key_a = RatingKey::new(&record.promptset, series.clone(), &record.model_a);
        let key_b = RatingKey::new(&record.promptset, series.clone(), &record.model_b);
        let a = store.materialize(&key_a, elo.base_rating);
        let b = store.materialize(&key_b, elo.base_rating);

        let (a, b) = elo.apply(a, b, record.result);
        store.put(key_a, a);
        store.put(key_b, b);

        store.record_pair(&series, record);
    }
}

#[cfg(test)]
#[path = "leaderboard_tests.rs"]
mod leaderboard_tests;
