//! Bradley-Terry strength estimation
//!
//! Each model gets a strength `s_i > 0` such that
//!
//! ```text
//! P(i beats j) = s_i / (s_i + s_j)
//! ```
//!
//! Strengths are fitted by the MM (Zermelo) iteration
//! `s_i = W_i / Σ_j N_ij / (s_i + s_j)`, one Jacobi sweep at a time, and
//! renormalized to geometric mean 1 after every sweep. Ties count as half a
//! win for each side. A smoothing prior adds `smoothing` pseudo-games to every
//! pair, split evenly, which keeps undefeated models finite and connects pairs
//! that were never compared.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::{EngineConfig, DEFAULT_BT_MAX_ITERATIONS, DEFAULT_BT_SMOOTHING, DEFAULT_BT_TOLERANCE};
use crate::error::{RankError, Result};
use crate::head_to_head::HeadToHead;

#[derive(Debug, Clone, PartialEq)]
pub struct BradleyTerrySolver {
    pub tolerance: f64,
    pub max_iterations: usize,
    pub smoothing: f64,
    initial: BTreeMap<String, f64>,
}

impl Default for BradleyTerrySolver {
    fn default() -> Self {
        Self::new(DEFAULT_BT_TOLERANCE, DEFAULT_BT_MAX_ITERATIONS, DEFAULT_BT_SMOOTHING)
    }
}

impl BradleyTerrySolver {
    pub fn new(tolerance: f64, max_iterations: usize, smoothing: f64) -> Self {
        Self {
            tolerance,
            max_iterations,
            smoothing,
            initial: BTreeMap::new(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.bt_tolerance, config.bt_max_iterations, config.bt_smoothing)
    }

    /// Start the iteration from the given strengths instead of all ones.
    /// Models not listed start at 1.
    pub fn with_initial_strengths(mut self, initial: BTreeMap<String, f64>) -> Result<Self> {
        if let Some((model, value)) = initial.iter().find(|(_, v)| !(v.is_finite() && **v > 0.0)) {
            return Err(RankError::InvalidConfig(format!(
                "initial strength for '{model}' must be positive, got {value}"
            )));
        }
        self.initial = initial;
        Ok(self)
    }

    /// Fit strengths for `models` from the pair tallies in `h2h`.
    ///
    /// Only games between members of the subset are used. Models without any
    /// such game are left out of the fit and listed in `excluded`.
    pub fn fit(&self, models: &[String], h2h: &HeadToHead) -> BradleyTerryFit {
        let subset: Vec<String> = models
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let (included, excluded): (Vec<String>, Vec<String>) = subset.iter().cloned().partition(|m| {
            subset
                .iter()
                .any(|other| other != m && h2h.games(m, other) > 0)
        });
        for model in &excluded {
            tracing::warn!(model = %model, "no games within subset, excluded from Bradley-Terry fit");
        }

        let n = included.len();
        // wins[i] and games[i][j] include the smoothing prior
        let mut wins = vec![0.0; n];
        let mut games = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let tally = h2h.tally(&included[i], &included[j]);
                wins[i] += tally.win_equivalents_a() + 0.5 * self.smoothing;
                games[i][j] = tally.games() as f64 + self.smoothing;
            }
        }

        let mut strengths: Vec<f64> = included
            .iter()
            .map(|m| self.initial.get(m).copied().unwrap_or(1.0))
            .collect();
        normalize(&mut strengths);

        let mut converged = n < 2;
        let mut iterations = 0;
        let mut max_change = 0.0;

        if n >= 2 {
            for sweep in 1..=self.max_iterations {
                let mut next: Vec<f64> = (0..n)
                    .map(|i| {
                        let denominator: f64 = (0..n)
                            .filter(|&j| j != i)
                            .map(|j| games[i][j] / (strengths[i] + strengths[j]))
                            .sum();
                        wins[i] / denominator
                    })
                    .collect();
                normalize(&mut next);

                max_change = next
                    .iter()
                    .zip(&strengths)
                    .map(|(new, old)| ((new - old) / old).abs())
                    .fold(0.0, f64::max);
                strengths = next;
                iterations = sweep;

                if max_change < self.tolerance {
                    converged = true;
                    break;
                }
            }
        }

        if converged {
            tracing::info!(models = n, iterations, "Bradley-Terry fit converged");
        } else {
            tracing::warn!(
                models = n,
                iterations,
                max_change,
                "Bradley-Terry fit hit the iteration cap before converging"
            );
        }

        let strengths: BTreeMap<String, f64> = included.into_iter().zip(strengths).collect();
        let probabilities = ProbabilityMatrix::from_strengths(&strengths);

        BradleyTerryFit {
            strengths,
            probabilities,
            excluded,
            converged,
            iterations,
            max_change,
        }
    }
}

/// Divide by the geometric mean so the product of strengths is 1
fn normalize(strengths: &mut [f64]) {
    if strengths.is_empty() {
        return;
    }
    let mean_log = strengths.iter().map(|s| s.ln()).sum::<f64>() / strengths.len() as f64;
    let scale = mean_log.exp();
    for s in strengths.iter_mut() {
        *s /= scale;
    }
}

/// Pairwise win probabilities implied by a set of strengths.
///
/// Models are listed strongest first. Diagonal entries are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityMatrix {
    pub models: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl ProbabilityMatrix {
    pub fn from_strengths(strengths: &BTreeMap<String, f64>) -> Self {
        let models: Vec<String> = ranked(strengths).into_iter().map(|(m, _)| m).collect();
        let n = models.len();
        let mut values = vec![vec![None; n]; n];

        for i in 0..n {
            for j in (i + 1)..n {
                let si = strengths[&models[i]];
                let sj = strengths[&models[j]];
                // Compute the favourite's side and derive the other as 1 - p.
                // For p >= 0.5 the subtraction is exact, so the pair sums to 1.
                let (p_ij, p_ji) = if si >= sj {
                    let p = si / (si + sj);
                    (p, 1.0 - p)
                } else {
                    let p = sj / (si + sj);
                    (1.0 - p, p)
                };
                values[i][j] = Some(p_ij);
                values[j][i] = Some(p_ji);
            }
        }

        Self { models, values }
    }

    /// Probability that `a` beats `b`
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.models.iter().position(|m| m == a)?;
        let j = self.models.iter().position(|m| m == b)?;
        self.values[i][j]
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BradleyTerryFit {
    /// Strengths normalized to geometric mean 1
    pub strengths: BTreeMap<String, f64>,
    pub probabilities: ProbabilityMatrix,
    /// Models with no games inside the subset
    pub excluded: Vec<String>,
    pub converged: bool,
    pub iterations: usize,
    /// Largest relative strength change in the final sweep
    pub max_change: f64,
}

impl BradleyTerryFit {
    pub fn strength(&self, model: &str) -> Result<f64> {
        self.strengths
            .get(model)
            .copied()
            .ok_or_else(|| RankError::InsufficientData(model.to_string()))
    }

    pub fn win_probability(&self, a: &str, b: &str) -> Option<f64> {
        self.probabilities.get(a, b)
    }

    /// Strongest first; equal strengths ordered by model id
    pub fn rankings(&self) -> Vec<(String, f64)> {
        ranked(&self.strengths)
    }

    /// Strengths relative to the strongest model (which gets 1.0)
    pub fn normalized_to_top(&self) -> Vec<(String, f64)> {
        let rankings = self.rankings();
        let top = rankings.first().map(|(_, s)| *s).unwrap_or(1.0);
        rankings.into_iter().map(|(m, s)| (m, s / top)).collect()
    }

    /// Turn a non-converged fit into a [`RankError::NotConverged`]
    pub fn ensure_converged(&self) -> Result<&Self> {
        if self.converged {
            Ok(self)
        } else {
            Err(RankError::NotConverged {
                iterations: self.iterations,
                max_change: self.max_change,
            })
        }
    }
}

fn ranked(strengths: &BTreeMap<String, f64>) -> Vec<(String, f64)> {
    let mut entries: Vec<(String, f64)> = strengths.iter().map(|(m, s)| (m.clone(), *s)).collect();
    entries.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries
}

#[cfg(test)]
#[path = "bradley_terry_tests.rs"]
mod bradley_terry_tests;
