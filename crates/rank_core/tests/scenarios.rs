//! End-to-end scenarios for the rating engine
//!
//! These drive the public API the way the surrounding tool does: records in,
//! leaderboards, fits and suggestions out.

use chrono::{DateTime, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rank_core::{
    BradleyTerrySolver, EloUpdater, EngineConfig, ErrorKind, HeadToHead, LeaderboardBuilder,
    Outcome, OutcomeRecord, Promptset, RankError, Series, SuggestionPolicy, SuggestionReason,
};

const CONFIG: &str = r#"
k_factor = 32.0
base_rating = 1400.0
sufficiently_tested_threshold = 5

[[promptsets]]
name = "basic1"
categories = ["General Knowledge", "Programming", "Reasoning"]

[[promptsets]]
name = "hard2"
categories = ["Programming"]
"#;

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn names(models: &[&str]) -> Vec<String> {
    models.iter().map(|m| m.to_string()).collect()
}

/// Simulate `games` comparisons where `a` wins with probability `p_a`
fn simulate(rng: &mut StdRng, records: &mut Vec<OutcomeRecord>, a: &str, b: &str, p_a: f64, games: usize) {
    for _ in 0..games {
        let result = if rng.gen::<f64>() < p_a { Outcome::AWin } else { Outcome::BWin };
        let ts = at(records.len() as i64);
        records.push(OutcomeRecord::new(a, b, "Reasoning", "basic1", result, ts));
    }
}

// =============================================================================
// ELO leaderboard
// =============================================================================

#[test]
fn test_two_unseen_models_one_win() {
    let config = EngineConfig::from_toml_str(CONFIG).unwrap();
    let mut lb = LeaderboardBuilder::from_config(&config, "basic1").unwrap();

    lb.update(&[OutcomeRecord::new("A", "B", "Programming", "basic1", Outcome::AWin, at(0))])
        .unwrap();

    let overall = lb.rank(&Series::Overall);
    assert_eq!(overall[0].model, "A");
    assert_eq!(overall[0].rating, 1416.0);
    assert_eq!(overall[1].rating, 1384.0);
}

#[test]
fn test_unknown_category_is_a_configuration_error() {
    let config = EngineConfig::from_toml_str(CONFIG).unwrap();
    let mut lb = LeaderboardBuilder::from_config(&config, "hard2").unwrap();

    let err = lb
        .update(&[OutcomeRecord::new("A", "B", "Reasoning", "hard2", Outcome::Tie, at(0))])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn test_independent_promptsets_on_separate_threads() {
    let config = EngineConfig::from_toml_str(CONFIG).unwrap();
    let mut rng = StdRng::seed_from_u64(7);
    let basic: Vec<OutcomeRecord> = (0..200)
        .map(|i| {
            let result = if rng.gen_bool(0.6) { Outcome::AWin } else { Outcome::Tie };
            OutcomeRecord::new("A", "B", "Programming", "basic1", result, at(i))
        })
        .collect();
    let hard: Vec<OutcomeRecord> = basic
        .iter()
        .map(|r| OutcomeRecord { promptset: "hard2".to_string(), ..r.clone() })
        .collect();

    let run = |name: &str, records: &[OutcomeRecord]| {
        let mut lb = LeaderboardBuilder::from_config(&config, name).unwrap();
        lb.update(records).unwrap();
        lb.rank(&Series::Overall)
    };

    let (basic_rank, hard_rank) = std::thread::scope(|s| {
        let basic_handle = s.spawn(|| run("basic1", &basic));
        let hard_handle = s.spawn(|| run("hard2", &hard));
        (basic_handle.join().unwrap(), hard_handle.join().unwrap())
    });

    assert_eq!(basic_rank, run("basic1", &basic));
    assert_eq!(basic_rank, hard_rank);
}

// =============================================================================
// Bradley-Terry
// =============================================================================

#[test]
fn test_bradley_terry_reproduces_head_to_head_counts() {
    // A beats B 8/15, ties 1/15, B wins the rest; scaled up so the smoothing
    // prior is negligible
    let mut records = Vec::new();
    for (result, count) in [(Outcome::AWin, 1600), (Outcome::Tie, 200), (Outcome::BWin, 1200)] {
        for _ in 0..count {
            let ts = at(records.len() as i64);
            records.push(OutcomeRecord::new("A", "B", "Reasoning", "basic1", result, ts));
        }
    }
    // C is a weaker third model that played both
    let mut rng = StdRng::seed_from_u64(42);
    simulate(&mut rng, &mut records, "A", "C", 0.8, 500);
    simulate(&mut rng, &mut records, "B", "C", 0.75, 500);

    let h2h = HeadToHead::from_records(&records);
    let fit = BradleyTerrySolver::default().fit(&names(&["A", "B", "C"]), &h2h);

    assert!(fit.converged);
    let p_ab = fit.win_probability("A", "B").unwrap();
    assert!((p_ab - 8.5 / 15.0).abs() < 0.02, "P(A beats B) = {p_ab}");
    assert_eq!(fit.rankings()[2].0, "C");
}

#[test]
fn test_bradley_terry_recovers_true_strengths() {
    let truth = [("A", 4.0), ("B", 2.0), ("C", 1.0), ("D", 0.5)];
    let mut rng = StdRng::seed_from_u64(2024);
    let mut records = Vec::new();
    for (i, &(a, sa)) in truth.iter().enumerate() {
        for &(b, sb) in &truth[i + 1..] {
            simulate(&mut rng, &mut records, a, b, sa / (sa + sb), 3000);
        }
    }

    let h2h = HeadToHead::from_records(&records);
    let fit = BradleyTerrySolver::default().fit(&names(&["A", "B", "C", "D"]), &h2h);
    assert!(fit.ensure_converged().is_ok());

    for &(a, sa) in &truth {
        for &(b, sb) in &truth {
            if a == b {
                continue;
            }
            let expected = sa / (sa + sb);
            let fitted = fit.win_probability(a, b).unwrap();
            assert!((fitted - expected).abs() < 0.03, "{a} vs {b}: {fitted} vs {expected}");
        }
    }
    let order: Vec<String> = fit.rankings().into_iter().map(|(m, _)| m).collect();
    assert_eq!(order, names(&["A", "B", "C", "D"]));
}

#[test]
fn test_model_without_games_is_insufficient_data() {
    let mut records = Vec::new();
    let mut rng = StdRng::seed_from_u64(1);
    simulate(&mut rng, &mut records, "A", "B", 0.6, 20);
    simulate(&mut rng, &mut records, "B", "C", 0.6, 20);
    simulate(&mut rng, &mut records, "A", "C", 0.6, 20);

    let h2h = HeadToHead::from_records(&records);
    let fit = BradleyTerrySolver::default().fit(&names(&["A", "B", "C", "D"]), &h2h);

    assert_eq!(fit.excluded, names(&["D"]));
    assert!(!fit.probabilities.models.contains(&"D".to_string()));
    assert!(matches!(fit.strength("D"), Err(RankError::InsufficientData(ref m)) if m == "D"));
}

// =============================================================================
// Suggestions
// =============================================================================

#[test]
fn test_suggestions_close_the_loop() {
    let config = EngineConfig::from_toml_str(CONFIG).unwrap();
    let policy = SuggestionPolicy::from_config(&config);
    let mut lb = LeaderboardBuilder::from_config(&config, "basic1").unwrap();

    let mut records = Vec::new();
    for i in 0..5 {
        records.push(OutcomeRecord::new("A", "B", "Programming", "basic1", Outcome::AWin, at(i)));
    }
    records.push(OutcomeRecord::new("B", "C", "Programming", "basic1", Outcome::Tie, at(10)));
    lb.update(&records).unwrap();

    let suggestions = lb.suggest(&policy, &Series::Overall).unwrap();
    // A-B reached the threshold of 5 games
    assert!(suggestions
        .iter()
        .all(|s| !(s.model_a == "A" && s.model_b == "B")));
    assert_eq!(suggestions[0].reason, SuggestionReason::NeverCompared);
    assert_eq!(suggestions.len(), 2);

    // No games at all in General Knowledge yet, so nothing is rated there
    let gk = lb.suggest(&policy, &Series::category("General Knowledge")).unwrap();
    assert!(gk.is_empty());
}

#[test]
fn test_tally_update_matches_direction_of_individual_games() {
    let elo = EloUpdater::default();
    let promptset = Promptset::new("basic1", ["Reasoning"]);
    let mut lb = LeaderboardBuilder::new(promptset, elo);
    let records: Vec<OutcomeRecord> = (0..6)
        .map(|i| OutcomeRecord::new("A", "B", "Reasoning", "basic1", Outcome::AWin, at(i)))
        .collect();
    lb.update(&records).unwrap();

    let tally = lb.head_to_head(&Series::Overall).unwrap().tally("A", "B");
    let (a, _) = elo
        .apply_tally(elo.initial_rating(), elo.initial_rating(), &tally)
        .unwrap();
    let per_game = lb.rating("A", &Series::Overall).unwrap();

    assert_eq!(a.games_played, per_game.games_played);
    assert!(a.value > 1400.0 && per_game.value > 1400.0);
}
