//! End-to-end properties of the score → classify pipeline.

use chrono::{Duration, TimeZone, Utc};
use infraguard::detect::DetectError;
use infraguard::simulate::{SimulationConfig, Simulator};
use infraguard::{
    classify_health, classify_health_default, score_anomalies, ForestParams, HealthState,
    Pipeline, Reading, RuleSet,
};

fn simulated(n: usize, seed: u64) -> Vec<Reading> {
    let config = SimulationConfig {
        seed,
        ..SimulationConfig::default()
    };
    Simulator::new(config).unwrap().history(n)
}

/// Quiet readings with anomaly flags preset, ready for classification.
fn flagged(n: usize, anomalous: &[usize]) -> Vec<Reading> {
    let base = Utc.with_ymd_and_hms(2026, 2, 26, 0, 0, 0).unwrap();
    (0..n)
        .map(|i| {
            let mut r = Reading::new(
                base + Duration::seconds(10 * i as i64),
                [0.0; 3],
                25.0,
                60.0,
                1.0,
            );
            r.anomaly = Some(anomalous.contains(&i));
            r
        })
        .collect()
}

#[test]
fn test_scoring_is_deterministic() {
    let params = ForestParams::default();
    let mut a = simulated(300, 42);
    let mut b = a.clone();
    score_anomalies(&mut a, &params).unwrap();
    score_anomalies(&mut b, &params).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_contamination_bound() {
    for (n, c) in [(1000, 0.10), (257, 0.05), (64, 0.25), (13, 0.2)] {
        let mut data = simulated(n, 9);
        let params = ForestParams {
            contamination: c,
            ..ForestParams::default()
        };
        score_anomalies(&mut data, &params).unwrap();
        let flagged = data.iter().filter(|r| r.anomaly == Some(true)).count();
        assert_eq!(flagged, (c * n as f64).floor() as usize, "n={} c={}", n, c);
    }
}

#[test]
fn test_degenerate_buffer_fails_to_fit() {
    let base = Utc.with_ymd_and_hms(2026, 2, 26, 0, 0, 0).unwrap();
    let mut data: Vec<Reading> = (0..20)
        .map(|i| Reading::new(base + Duration::seconds(i), [0.1, 0.1, 0.1], 25.0, 60.0, 2.0))
        .collect();
    let err = score_anomalies(&mut data, &ForestParams::default()).unwrap_err();
    assert!(matches!(err, DetectError::ModelFit { .. }));
}

#[test]
fn test_classify_before_scoring_is_precursor_missing() {
    let mut data = simulated(20, 1);
    assert_eq!(
        classify_health_default(&mut data),
        Err(DetectError::PrecursorMissing { index: 0 })
    );
}

#[test]
fn test_windowed_locality() {
    let mut base = flagged(40, &[3, 4]);
    classify_health_default(&mut base).unwrap();

    // Change features and flag at j; nothing before j - 10 may move.
    let j = 30;
    let mut changed = base.clone();
    changed[j].acc_x = 9.0;
    changed[j].temp = 50.0;
    changed[j].anomaly = Some(true);
    changed[j - 1].anomaly = Some(true);
    changed[j - 2].anomaly = Some(true);
    classify_health_default(&mut changed).unwrap();

    for i in 0..j - 10 {
        assert_eq!(base[i].health, changed[i].health, "index {}", i);
    }
    assert_eq!(changed[j].health, Some(HealthState::Critical));
}

#[test]
fn test_critical_vibration_dominates() {
    // Two flags near index 15: on their own they only reach Warning.
    let mut calm = flagged(20, &[13, 14]);
    classify_health_default(&mut calm).unwrap();
    assert_eq!(calm[15].health, Some(HealthState::Warning));

    let mut data = flagged(20, &[13, 14]);
    data[15].acc_x = 2.5;
    classify_health_default(&mut data).unwrap();
    assert_eq!(data[15].health, Some(HealthState::Critical));

    // Every environmental limit exceeded as well.
    let mut stormy = flagged(20, &[13, 14]);
    stormy[15].acc_x = 2.5;
    stormy[15].temp = 40.0;
    stormy[15].humidity = 95.0;
    stormy[15].wind_speed = 15.0;
    classify_health_default(&mut stormy).unwrap();
    assert_eq!(stormy[15].health, Some(HealthState::Critical));

    // A cold reading does not soften it either.
    let mut cold = flagged(20, &[13, 14]);
    cold[15].acc_x = 2.5;
    cold[15].temp = -10.0;
    classify_health_default(&mut cold).unwrap();
    assert_eq!(cold[15].health, Some(HealthState::Critical));
}

#[test]
fn test_boundary_window_at_buffer_start() {
    // Anomalies only at the end must not wrap around to the start.
    let mut data = flagged(20, &[17, 18, 19]);
    classify_health_default(&mut data).unwrap();
    for r in &data[..10] {
        assert_eq!(r.health, Some(HealthState::Good));
    }
    assert_eq!(data[19].health, Some(HealthState::Critical));
}

#[test]
fn test_classification_is_idempotent() {
    let mut data = simulated(200, 5);
    let pipeline = Pipeline::default();
    pipeline.run(&mut data).unwrap();
    let first: Vec<_> = data.iter().map(|r| r.health).collect();

    // stale labels must not influence the result
    for r in data.iter_mut() {
        r.health = Some(HealthState::Critical);
    }
    classify_health(&mut data, 11, &RuleSet::default()).unwrap();
    let second: Vec<_> = data.iter().map(|r| r.health).collect();
    assert_eq!(first, second);
}

#[test]
fn test_scenario_high_vibration_is_critical_regardless_of_flag() {
    for flag in [false, true] {
        let mut data = flagged(11, &[]);
        let r = &mut data[10];
        r.acc_x = 3.0;
        r.acc_y = 3.0;
        r.acc_z = 3.0;
        r.temp = 25.0;
        r.humidity = 60.0;
        r.wind_speed = 2.0;
        r.anomaly = Some(flag);
        classify_health_default(&mut data).unwrap();
        assert_eq!(data[10].health, Some(HealthState::Critical));
    }
}

#[test]
fn test_scenario_environmental_stress_is_critical() {
    let mut data = flagged(5, &[]);
    data[4].temp = 40.0;
    data[4].humidity = 85.0;
    data[4].wind_speed = 12.0;
    classify_health_default(&mut data).unwrap();
    assert_eq!(data[4].health, Some(HealthState::Critical));
}

#[test]
fn test_scenario_two_nearby_anomalies_is_warning() {
    let mut data = flagged(20, &[12, 16]);
    classify_health_default(&mut data).unwrap();
    assert_eq!(data[19].health, Some(HealthState::Warning));
}

#[test]
fn test_scenario_one_nearby_anomaly_is_good() {
    let mut data = flagged(20, &[16]);
    classify_health_default(&mut data).unwrap();
    assert_eq!(data[19].health, Some(HealthState::Good));
}

#[test]
fn test_pipeline_over_simulated_history() {
    let mut data = simulated(1000, 42);
    let summary = Pipeline::default().run(&mut data).unwrap();
    assert_eq!(summary.total, 1000);
    assert_eq!(summary.anomalies, 100);
    assert_eq!(summary.good + summary.warning + summary.critical, 1000);
    assert!((summary.good_health_pct + summary.risk_pct - 100.0).abs() < 1e-9);
    assert_eq!(summary.last_update, data.last().map(|r| r.timestamp));
}
