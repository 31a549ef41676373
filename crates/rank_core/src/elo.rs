//! ELO rating calculation
//!
//! The updater is a pure function of two ratings and an outcome. It keeps no
//! history and never looks anything up, so the replay logic in
//! [`crate::leaderboard`] is the only place where ordering matters.

use serde::{Deserialize, Serialize};

use crate::config::{EngineConfig, DEFAULT_BASE_RATING, DEFAULT_K_FACTOR};
use crate::error::{RankError, Result};
use crate::head_to_head::PairTally;
use crate::outcome::Outcome;

/// Current skill estimate of one model in one series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub value: f64,
    pub games_played: u32,
}

impl Rating {
    /// Rating of a model that has not played yet
    pub fn initial(base_rating: f64) -> Self {
        Self {
            value: base_rating,
            games_played: 0,
        }
    }
}

/// Logistic ELO with a fixed K-factor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EloUpdater {
    pub k_factor: f64,
    pub base_rating: f64,
}

impl Default for EloUpdater {
    fn default() -> Self {
        Self {
            k_factor: DEFAULT_K_FACTOR,
            base_rating: DEFAULT_BASE_RATING,
        }
    }
}

impl EloUpdater {
    pub fn new(k_factor: f64, base_rating: f64) -> Self {
        Self {
            k_factor,
            base_rating,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.k_factor, config.base_rating)
    }

    pub fn initial_rating(&self) -> Rating {
        Rating::initial(self.base_rating)
    }

    /// Expected score of a player rated `ra` against one rated `rb`
    pub fn expected_score(ra: f64, rb: f64) -> f64 {
        1.0 / (1.0 + 10.0_f64.powf((rb - ra) / 400.0))
    }

    /// Apply one comparison and return the updated `(a, b)` pair.
    ///
    /// The change to A is computed once and subtracted from B, so the update
    /// is zero-sum.
    pub fn apply(&self, a: Rating, b: Rating, outcome: Outcome) -> (Rating, Rating) {
        let expected = Self::expected_score(a.value, b.value);
        let change = self.k_factor * (outcome.score_a() - expected);
        (
            Rating {
                value: a.value + change,
                games_played: a.games_played + 1,
            },
            Rating {
                value: b.value - change,
                games_played: b.games_played + 1,
            },
        )
    }

    /// Apply an aggregated head-to-head tally as a single update.
    ///
    /// The aggregate score `(wins + ties/2) / games` is compared with the
    /// expectation at the current ratings, and the change is scaled by the
    /// number of games.
    pub fn apply_tally(&self, a: Rating, b: Rating, tally: &PairTally) -> Result<(Rating, Rating)> {
        let games = tally.games();
        if games == 0 {
            return Err(RankError::InsufficientData(
                "tally with zero games".to_string(),
            ));
        }
        let expected = Self::expected_score(a.value, b.value);
        let change = self.k_factor * games as f64 * (tally.score_a() - expected);
        Ok((
            Rating {
                value: a.value + change,
                games_played: a.games_played + games,
            },
            Rating {
                value: b.value - change,
                games_played: b.games_played + games,
            },
        ))
    }
}

#[cfg(test)]
#[path = "elo_tests.rs"]
mod elo_tests;
