//! Rating and ranking engine for pairwise LLM comparisons
//!
//! This crate turns judged win/loss/tie outcomes into:
//! - ELO leaderboards, overall and per category, scoped to a promptset
//! - Bradley-Terry strength estimates for any subset of models
//! - Suggestions for which pairs to compare next, and coverage views of
//!   which models and categories are thin
//!
//! Everything is synchronous, in-memory computation. Fetching responses,
//! judging them and archiving the records happen before records reach this
//! crate.
//!
//! # Usage
//!
//! ```
//! use chrono::Utc;
//! use rank_core::{EloUpdater, LeaderboardBuilder, Outcome, OutcomeRecord, Promptset, Series};
//!
//! let promptset = Promptset::new("basic1", ["Programming", "Reasoning"]);
//! let mut leaderboard = LeaderboardBuilder::new(promptset, EloUpdater::default());
//!
//! let record = OutcomeRecord::new("llama3", "mistral", "Programming", "basic1", Outcome::AWin, Utc::now());
//! leaderboard.update(&[record]).unwrap();
//!
//! let overall = leaderboard.rank(&Series::Overall);
//! assert_eq!(overall[0].model, "llama3");
//! assert_eq!(overall[0].rating, 1416.0);
//! ```

mod bradley_terry;
mod config;
mod coverage;
mod elo;
mod error;
mod head_to_head;
mod leaderboard;
mod outcome;
mod store;
mod suggest;

pub use bradley_terry::*;
pub use config::*;
pub use coverage::*;
pub use elo::*;
pub use error::*;
pub use head_to_head::*;
pub use leaderboard::*;
pub use outcome::*;
pub use store::*;
pub use suggest::*;
