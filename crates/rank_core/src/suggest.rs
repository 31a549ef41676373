//! Next-comparison suggestions
//!
//! Every pair of rated models below the "sufficiently tested" threshold is
//! scored by
//!
//! ```text
//! count_weight / (1 + games) + proximity_weight / (1 + |ΔR| / proximity_scale)
//! ```
//!
//! so rarely compared pairs and pairs with close ratings come first.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::EngineConfig;
use crate::head_to_head::HeadToHead;
use crate::leaderboard::RankedEntry;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SuggestionReason {
    NeverCompared,
    FewComparisons { games: u32 },
    CloseRatings { gap: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Always the lexicographically smaller id of the pair
    pub model_a: String,
    pub model_b: String,
    pub games: u32,
    pub rating_gap: f64,
    pub score: f64,
    pub reason: SuggestionReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SuggestionPolicy {
    pub count: usize,
    pub sufficiently_tested_threshold: u32,
    pub count_weight: f64,
    pub proximity_weight: f64,
    pub proximity_scale: f64,
}

impl Default for SuggestionPolicy {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl SuggestionPolicy {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            count: config.suggestion_count,
            sufficiently_tested_threshold: config.sufficiently_tested_threshold,
            count_weight: config.count_weight,
            proximity_weight: config.proximity_weight,
            proximity_scale: config.proximity_scale,
        }
    }

    fn count_term(&self, games: u32) -> f64 {
        self.count_weight / (1.0 + games as f64)
    }

    fn proximity_term(&self, gap: f64) -> f64 {
        self.proximity_weight / (1.0 + gap.abs() / self.proximity_scale)
    }

    /// Priority of testing a pair with `games` recorded games and rating gap `gap`
    pub fn priority(&self, games: u32, gap: f64) -> f64 {
        self.count_term(games) + self.proximity_term(gap)
    }

    /// Up to `self.count` suggestions
    pub fn suggest(&self, ratings: &[RankedEntry], h2h: &HeadToHead) -> Vec<Suggestion> {
        self.suggest_n(ratings, h2h, self.count)
    }

    /// Up to `n` suggestions, highest priority first.
    ///
    /// Candidates are the models present in `ratings`. Self-pairs and pairs
    /// at or above the threshold are never returned.
    pub fn suggest_n(&self, ratings: &[RankedEntry], h2h: &HeadToHead, n: usize) -> Vec<Suggestion> {
        let by_model: BTreeMap<&str, f64> = ratings
            .iter()
            .map(|entry| (entry.model.as_str(), entry.rating))
            .collect();
        let models: Vec<(&str, f64)> = by_model.into_iter().collect();

        let mut suggestions = Vec::new();
        for (i, &(a, ra)) in models.iter().enumerate() {
            for &(b, rb) in &models[i + 1..] {
                let games = h2h.games(a, b);
                if games >= self.sufficiently_tested_threshold {
                    continue;
                }
                let gap = (ra - rb).abs();
                let reason = if games == 0 {
                    SuggestionReason::NeverCompared
                } else if self.proximity_term(gap) > self.count_term(games) {
                    SuggestionReason::CloseRatings { gap }
                } else {
                    SuggestionReason::FewComparisons { games }
                };
                suggestions.push(Suggestion {
                    model_a: a.to_string(),
                    model_b: b.to_string(),
                    games,
                    rating_gap: gap,
                    score: self.priority(games, gap),
                    reason,
                });
            }
        }

        suggestions.sort_by(|x, y| {
            y.score
                .total_cmp(&x.score)
                .then_with(|| x.model_a.cmp(&y.model_a))
                .then_with(|| x.model_b.cmp(&y.model_b))
        });
        suggestions.truncate(n);

        tracing::debug!(
            candidates = models.len(),
            returned = suggestions.len(),
            "generated comparison suggestions"
        );
        suggestions
    }
}

#[cfg(test)]
#[path = "suggest_tests.rs"]
mod suggest_tests;
