//! Head-to-head tallies and the rankings derived directly from them.
//!
//! [`HeadToHead`] is the per-pair win/loss/tie count used by the
//! Bradley-Terry solver and the suggestion policy. The two rankings in this
//! module read the tallies without any model fitting:
//! - direct ranking: mean head-to-head win rate against actual opponents
//! - focus ranking: win ratio against one reference model, extended
//!   transitively through intermediate opponents

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use crate::error::{RankError, Result};
use crate::outcome::{Outcome, OutcomeRecord};

/// Win/loss/tie counts between two models, from model A's perspective
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairTally {
    pub wins_a: u32,
    pub wins_b: u32,
    pub ties: u32,
}

impl PairTally {
    pub fn games(&self) -> u32 {
        self.wins_a + self.wins_b + self.ties
    }

    /// Score from A's perspective (1 for win, 0.5 for tie, 0 for loss)
    pub fn score_a(&self) -> f64 {
        let total = self.games() as f64;
        if total == 0.0 {
            return 0.5;
        }
        (self.wins_a as f64 + 0.5 * self.ties as f64) / total
    }

    /// Wins with ties counted as half a win for each side
    pub fn win_equivalents_a(&self) -> f64 {
        self.wins_a as f64 + 0.5 * self.ties as f64
    }

    pub fn win_equivalents_b(&self) -> f64 {
        self.wins_b as f64 + 0.5 * self.ties as f64
    }

    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::AWin => self.wins_a += 1,
            Outcome::BWin => self.wins_b += 1,
            Outcome::Tie => self.ties += 1,
        }
    }

    pub fn flipped(&self) -> Self {
        Self {
            wins_a: self.wins_b,
            wins_b: self.wins_a,
            ties: self.ties,
        }
    }
}

/// Tallies for every unordered model pair.
///
/// Pairs are stored under `(smaller, larger)` model id with the tally
/// oriented from the smaller id's side.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeadToHead {
    pairs: BTreeMap<(String, String), PairTally>,
}

impl HeadToHead {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a OutcomeRecord>,
    {
        let mut h2h = Self::new();
        for record in records {
            h2h.record(record);
        }
        h2h
    }

    /// Count one record. Self-pairs are ignored.
    pub fn record(&mut self, record: &OutcomeRecord) {
        if record.model_a == record.model_b {
            return;
        }
        let (key, outcome) = if record.model_a < record.model_b {
            ((record.model_a.clone(), record.model_b.clone()), record.result)
        } else {
            (
                (record.model_b.clone(), record.model_a.clone()),
                record.result.flipped(),
            )
        };
        self.pairs.entry(key).or_default().record(outcome);
    }

    /// Add a whole tally between `a` and `b`, oriented from `a`'s side.
    /// Self-pairs are ignored.
    pub fn add_tally(&mut self, a: &str, b: &str, tally: PairTally) {
        if a == b {
            return;
        }
        let (key, tally) = if a < b {
            ((a.to_string(), b.to_string()), tally)
        } else {
            ((b.to_string(), a.to_string()), tally.flipped())
        };
        let entry = self.pairs.entry(key).or_default();
        entry.wins_a += tally.wins_a;
        entry.wins_b += tally.wins_b;
        entry.ties += tally.ties;
    }

    /// Tally between `a` and `b`, oriented from `a`'s side
    pub fn tally(&self, a: &str, b: &str) -> PairTally {
        if a <= b {
            self.pairs
                .get(&(a.to_string(), b.to_string()))
                .copied()
                .unwrap_or_default()
        } else {
            self.tally(b, a).flipped()
        }
    }

    pub fn games(&self, a: &str, b: &str) -> u32 {
        self.tally(a, b).games()
    }

    /// Head-to-head win rate of `a` over `b`, ties counted half
    pub fn win_rate(&self, a: &str, b: &str) -> Option<f64> {
        let tally = self.tally(a, b);
        (tally.games() > 0).then(|| tally.score_a())
    }

    /// Every model that appears in at least one pair
    pub fn models(&self) -> BTreeSet<String> {
        self.pairs
            .keys()
            .flat_map(|(a, b)| [a.clone(), b.clone()])
            .collect()
    }

    /// Total games a model has played against anyone
    pub fn games_of(&self, model: &str) -> u32 {
        self.pairs
            .iter()
            .filter(|((a, b), _)| a == model || b == model)
            .map(|(_, tally)| tally.games())
            .sum()
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str, &PairTally)> {
        self.pairs
            .iter()
            .map(|((a, b), tally)| (a.as_str(), b.as_str(), tally))
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn clear(&mut self) {
        self.pairs.clear();
    }
}

// =============================================================================
// Direct comparison ranking
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectScore {
    pub model: String,
    /// Mean head-to-head win rate over opponents actually played
    pub score: f64,
    pub opponents: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectRanking {
    pub scores: Vec<DirectScore>,
    /// Pairs in the subset that have never been compared
    pub missing: Vec<(String, String)>,
    /// Models with no games against the rest of the subset
    pub excluded: Vec<String>,
}

impl DirectRanking {
    /// True when every pair in the subset has been compared
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn score(&self, model: &str) -> Result<f64> {
        self.scores
            .iter()
            .find(|s| s.model == model)
            .map(|s| s.score)
            .ok_or_else(|| RankError::InsufficientData(model.to_string()))
    }
}

/// Rank a model subset by mean head-to-head win rate, without any fitting.
pub fn direct_ranking(h2h: &HeadToHead, models: &[String]) -> DirectRanking {
    let subset: Vec<&String> = models.iter().collect::<BTreeSet<_>>().into_iter().collect();

    let mut missing = Vec::new();
    for (i, a) in subset.iter().enumerate() {
        for b in &subset[i + 1..] {
            if h2h.games(a, b) == 0 {
                missing.push(((*a).clone(), (*b).clone()));
            }
        }
    }

    let mut scores = Vec::new();
    let mut excluded = Vec::new();
    for model in &subset {
        let rates: Vec<f64> = subset
            .iter()
            .filter(|other| *other != model)
            .filter_map(|other| h2h.win_rate(model, other))
            .collect();
        if rates.is_empty() {
            excluded.push((*model).clone());
            continue;
        }
        scores.push(DirectScore {
            model: (*model).clone(),
            score: rates.iter().sum::<f64>() / rates.len() as f64,
            opponents: rates.len(),
        });
    }
    scores.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.model.cmp(&b.model)));

    DirectRanking {
        scores,
        missing,
        excluded,
    }
}

// =============================================================================
// Focus ranking
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FocusBasis {
    /// The focus model itself (ratio 1)
    Focus,
    /// Compared directly against the focus model
    Direct,
    /// Estimated through intermediate opponents; the path starts at the focus
    Transitive { path: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusEntry {
    pub model: String,
    /// Win-rate ratio of this model over the focus model. `> 1` means the
    /// model outperforms the focus; infinite when the focus never scored.
    pub ratio: f64,
    pub basis: FocusBasis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusRanking {
    pub focus: String,
    pub entries: Vec<FocusEntry>,
    /// Models not reachable from the focus within the depth limit
    pub excluded: Vec<String>,
}

/// Rank every model by its win ratio against `focus`.
///
/// `max_depth` bounds the path length used for transitive estimates; 1 means
/// direct comparisons only.
pub fn focus_ranking(h2h: &HeadToHead, focus: &str, max_depth: usize) -> Result<FocusRanking> {
    let models = h2h.models();
    if !models.contains(focus) {
        return Err(RankError::InsufficientData(focus.to_string()));
    }

    let mut entries = vec![FocusEntry {
        model: focus.to_string(),
        ratio: 1.0,
        basis: FocusBasis::Focus,
    }];
    let mut placed: HashSet<&str> = HashSet::from([focus]);

    for model in &models {
        if model == focus || h2h.games(focus, model) == 0 {
            continue;
        }
        let tally = h2h.tally(focus, model);
        let focus_wins = tally.win_equivalents_a();
        let ratio = if focus_wins > 0.0 {
            tally.win_equivalents_b() / focus_wins
        } else {
            f64::INFINITY
        };
        entries.push(FocusEntry {
            model: model.clone(),
            ratio,
            basis: FocusBasis::Direct,
        });
        placed.insert(model.as_str());
    }

    if max_depth > 1 {
        for (model, path) in shortest_paths(h2h, focus, max_depth) {
            if placed.contains(model.as_str()) {
                continue;
            }
            let ratio: f64 = path
                .windows(2)
                .map(|step| edge_ratio(h2h, &step[0], &step[1]))
                .product();
            entries.push(FocusEntry {
                model,
                ratio,
                basis: FocusBasis::Transitive { path },
            });
        }
    }

    let reached: HashSet<&str> = entries.iter().map(|e| e.model.as_str()).collect();
    let excluded = models
        .iter()
        .filter(|m| !reached.contains(m.as_str()))
        .cloned()
        .collect();

    entries.sort_by(|a, b| b.ratio.total_cmp(&a.ratio).then_with(|| a.model.cmp(&b.model)));

    Ok(FocusRanking {
        focus: focus.to_string(),
        entries,
        excluded,
    })
}

/// Strength ratio of `to` over `from` implied by their head-to-head tally.
/// Only called on edges kept by [`shortest_paths`], where `from` has scored.
fn edge_ratio(h2h: &HeadToHead, from: &str, to: &str) -> f64 {
    let tally = h2h.tally(from, to);
    debug_assert!(tally.win_equivalents_a() > 0.0, "edge {from} -> {to} has no score at its source");
    tally.win_equivalents_b() / tally.win_equivalents_a()
}

/// Breadth-first shortest paths from `start`, following only edges whose
/// source has scored at least once so every ratio along a path is finite.
fn shortest_paths(h2h: &HeadToHead, start: &str, max_depth: usize) -> BTreeMap<String, Vec<String>> {
    let mut neighbors: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (a, b, tally) in h2h.pairs() {
        if tally.win_equivalents_a() > 0.0 {
            neighbors.entry(a).or_default().push(b);
        }
        if tally.win_equivalents_b() > 0.0 {
            neighbors.entry(b).or_default().push(a);
        }
    }
    for list in neighbors.values_mut() {
        list.sort_unstable();
    }

    let mut paths: BTreeMap<String, Vec<String>> = BTreeMap::new();
    paths.insert(start.to_string(), vec![start.to_string()]);
    let mut queue = VecDeque::from([(start, 0usize)]);

    while let Some((current, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        for &next in neighbors.get(current).map(Vec::as_slice).unwrap_or_default() {
            if paths.contains_key(next) {
                continue;
            }
            let mut path = paths[current].clone();
            path.push(next.to_string());
            paths.insert(next.to_string(), path);
            queue.push_back((next, depth + 1));
        }
    }

    paths.remove(start);
    paths
}

#[cfg(test)]
#[path = "head_to_head_tests.rs"]
mod head_to_head_tests;
