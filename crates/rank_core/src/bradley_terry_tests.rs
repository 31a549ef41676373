use super::*;
use crate::outcome::{Outcome, OutcomeRecord};
use chrono::{TimeZone, Utc};

fn add(records: &mut Vec<OutcomeRecord>, a: &str, b: &str, outcome: Outcome, n: u32) {
    for _ in 0..n {
        let ts = Utc.timestamp_opt(records.len() as i64, 0).unwrap();
        records.push(OutcomeRecord::new(a, b, "Reasoning", "basic1", outcome, ts));
    }
}

fn names(models: &[&str]) -> Vec<String> {
    models.iter().map(|m| m.to_string()).collect()
}

#[test]
fn test_two_models_match_smoothed_win_rate() {
    // 8 wins, 6 losses, 1 tie; with one smoothing pseudo-game the fixed
    // point is P(A beats B) = (8.5 + 0.5) / (15 + 1)
    let mut records = Vec::new();
    add(&mut records, "A", "B", Outcome::AWin, 8);
    add(&mut records, "A", "B", Outcome::BWin, 6);
    add(&mut records, "A", "B", Outcome::Tie, 1);
    let h2h = HeadToHead::from_records(&records);

    let fit = BradleyTerrySolver::default().fit(&names(&["A", "B"]), &h2h);
    assert!(fit.converged);
    let p = fit.win_probability("A", "B").unwrap();
    assert!((p - 9.0 / 16.0).abs() < 1e-5, "p = {p}");
}

#[test]
fn test_undefeated_model_stays_finite() {
    let mut records = Vec::new();
    add(&mut records, "champ", "B", Outcome::AWin, 10);
    add(&mut records, "champ", "C", Outcome::AWin, 10);
    add(&mut records, "B", "C", Outcome::AWin, 5);
    let h2h = HeadToHead::from_records(&records);

    let fit = BradleyTerrySolver::default().fit(&names(&["champ", "B", "C"]), &h2h);
    assert!(fit.converged);
    for (model, strength) in &fit.strengths {
        assert!(strength.is_finite() && *strength > 0.0, "{model}: {strength}");
    }
    assert_eq!(fit.rankings()[0].0, "champ");
}

#[test]
fn test_probabilities_are_complementary() {
    let mut records = Vec::new();
    add(&mut records, "A", "B", Outcome::AWin, 7);
    add(&mut records, "A", "B", Outcome::BWin, 2);
    add(&mut records, "B", "C", Outcome::AWin, 4);
    add(&mut records, "A", "C", Outcome::Tie, 3);
    let h2h = HeadToHead::from_records(&records);

    let fit = BradleyTerrySolver::default().fit(&names(&["A", "B", "C"]), &h2h);
    let matrix = &fit.probabilities;
    for a in &matrix.models {
        assert_eq!(matrix.get(a, a), None);
        for b in &matrix.models {
            if a != b {
                let sum = matrix.get(a, b).unwrap() + matrix.get(b, a).unwrap();
                assert_eq!(sum, 1.0);
            }
        }
    }
}

#[test]
fn test_zero_game_model_is_excluded() {
    let mut records = Vec::new();
    add(&mut records, "A", "B", Outcome::AWin, 3);
    add(&mut records, "B", "C", Outcome::AWin, 3);
    add(&mut records, "A", "C", Outcome::BWin, 1);
    // "outsider" played, but only against a model outside the subset
    add(&mut records, "outsider", "Z", Outcome::AWin, 2);
    let h2h = HeadToHead::from_records(&records);

    let fit = BradleyTerrySolver::default().fit(&names(&["A", "B", "C", "outsider"]), &h2h);
    assert_eq!(fit.excluded, vec!["outsider".to_string()]);
    assert_eq!(fit.probabilities.len(), 3);
    assert!(fit.win_probability("outsider", "A").is_none());

    let err = fit.strength("outsider").unwrap_err();
    assert_eq!(err.kind(), crate::ErrorKind::InsufficientData);
}

#[test]
fn test_strengths_have_unit_geometric_mean() {
    let mut records = Vec::new();
    add(&mut records, "A", "B", Outcome::AWin, 5);
    add(&mut records, "B", "C", Outcome::AWin, 5);
    let h2h = HeadToHead::from_records(&records);

    let fit = BradleyTerrySolver::default().fit(&names(&["A", "B", "C"]), &h2h);
    let log_sum: f64 = fit.strengths.values().map(|s| s.ln()).sum();
    assert!(log_sum.abs() < 1e-9);

    let top = fit.normalized_to_top();
    assert_eq!(top[0], ("A".to_string(), 1.0));
    assert!(top[2].1 < top[1].1);
}

#[test]
fn test_iteration_cap_flags_not_converged() {
    let mut records = Vec::new();
    add(&mut records, "A", "B", Outcome::AWin, 50);
    add(&mut records, "B", "C", Outcome::AWin, 50);
    add(&mut records, "A", "C", Outcome::BWin, 1);
    let h2h = HeadToHead::from_records(&records);

    let solver = BradleyTerrySolver::new(1e-15, 2, 1.0);
    let fit = solver.fit(&names(&["A", "B", "C"]), &h2h);

    assert!(!fit.converged);
    assert_eq!(fit.iterations, 2);
    assert_eq!(fit.strengths.len(), 3);
    let err = fit.ensure_converged().unwrap_err();
    assert_eq!(err.kind(), crate::ErrorKind::NotConverged);
}

#[test]
fn test_empty_subset() {
    let fit = BradleyTerrySolver::default().fit(&[], &HeadToHead::new());
    assert!(fit.converged);
    assert!(fit.probabilities.is_empty());
    assert!(fit.ensure_converged().is_ok());
}

#[test]
fn test_rejects_non_positive_initial_strength() {
    let initial = BTreeMap::from([("A".to_string(), 0.0)]);
    let err = BradleyTerrySolver::default()
        .with_initial_strengths(initial)
        .unwrap_err();
    assert!(matches!(err, RankError::InvalidConfig(_)));
}
