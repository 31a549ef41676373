//! Coverage of the comparison log: which models and pairs are thin.
//!
//! These views read the pair tallies only. They complement the suggestion
//! policy, which also weighs rating proximity.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::head_to_head::HeadToHead;

/// Total games of one model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCoverage {
    pub model: String,
    pub games: u32,
}

/// A pair compared overall but under-compared within one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryGap {
    pub model_a: String,
    pub model_b: String,
    /// Games between the pair in this category
    pub games: u32,
}

/// Counts behind a promptset's leaderboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageSummary {
    pub promptset: String,
    pub total_models: usize,
    /// Every record counts once
    pub total_comparisons: u32,
    pub comparisons_per_model: BTreeMap<String, u32>,
    /// Percentage of each model's games played in each category
    pub category_distribution: BTreeMap<String, BTreeMap<String, f64>>,
    /// Overall ELO rating per model
    pub ratings: BTreeMap<String, f64>,
}

/// Every model in `h2h` with its total games, fewest first
pub fn underrepresented_models(h2h: &HeadToHead) -> Vec<ModelCoverage> {
    let mut coverage: Vec<ModelCoverage> = h2h
        .models()
        .into_iter()
        .map(|model| ModelCoverage {
            games: h2h.games_of(&model),
            model,
        })
        .collect();
    coverage.sort_by(|a, b| a.games.cmp(&b.games).then_with(|| a.model.cmp(&b.model)));
    coverage
}

/// Pairs with at least one game in `overall` but fewer than `min_games`
/// games in `category`, fewest first
pub fn category_gaps(overall: &HeadToHead, category: &HeadToHead, min_games: u32) -> Vec<CategoryGap> {
    let mut gaps: Vec<CategoryGap> = overall
        .pairs()
        .map(|(a, b, _)| CategoryGap {
            model_a: a.to_string(),
            model_b: b.to_string(),
            games: category.games(a, b),
        })
        .filter(|gap| gap.games < min_games)
        .collect();
    gaps.sort_by(|x, y| {
        x.games
            .cmp(&y.games)
            .then_with(|| x.model_a.cmp(&y.model_a))
            .then_with(|| x.model_b.cmp(&y.model_b))
    });
    gaps
}

/// Number of games recorded in `h2h`
pub fn total_comparisons(h2h: &HeadToHead) -> u32 {
    h2h.pairs().map(|(_, _, tally)| tally.games()).sum()
}

/// Share of each model's games per category, in percent.
/// Models without games are left out.
pub fn category_distribution(
    categories: &BTreeMap<String, HeadToHead>,
) -> BTreeMap<String, BTreeMap<String, f64>> {
    let mut counts: BTreeMap<String, BTreeMap<String, u32>> = BTreeMap::new();
    for (category, h2h) in categories {
        for model in h2h.models() {
            let games = h2h.games_of(&model);
            counts.entry(model).or_default().insert(category.clone(), games);
        }
    }

    counts
        .into_iter()
        .filter_map(|(model, per_category)| {
            let total: u32 = per_category.values().sum();
            (total > 0).then(|| {
                let shares = per_category
                    .into_iter()
                    .map(|(category, games)| (category, 100.0 * games as f64 / total as f64))
                    .collect();
                (model, shares)
            })
        })
        .collect()
}

#[cfg(test)]
#[path = "coverage_tests.rs"]
mod coverage_tests;
