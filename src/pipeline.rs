//! Score → classify over a whole buffer, plus the dashboard summary.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::detect::{score_anomalies, DetectError, ForestParams, ScoreReport};
use crate::health::HealthClassifier;
use crate::reading::{HealthState, Reading};

/// Both stages, configured once and re-run on every buffer change.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    pub forest: ForestParams,
    pub health: HealthClassifier,
}

impl Pipeline {
    pub fn new(forest: ForestParams, health: HealthClassifier) -> Self {
        Self { forest, health }
    }

    /// Rescore and reclassify every reading. Anomaly scoring finishes over
    /// the whole buffer before any health label is computed.
    pub fn run(&self, readings: &mut [Reading]) -> Result<HealthSummary, DetectError> {
        let started = Instant::now();

        let report = score_anomalies(readings, &self.forest)?;
        let scored_in = started.elapsed();

        self.health.classify(readings)?;

        let summary = HealthSummary::from_readings(readings);
        debug!(
            scoring_ms = scored_in.as_millis() as u64,
            total_ms = started.elapsed().as_millis() as u64,
            "pipeline timings"
        );
        info!(
            readings = summary.total,
            anomalies = summary.anomalies,
            critical = summary.critical,
            warning = summary.warning,
            "pipeline run complete"
        );
        Ok(summary.with_score(report))
    }
}

/// Headline metrics over an annotated buffer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSummary {
    pub total: usize,
    pub anomalies: usize,
    pub anomaly_rate_pct: f64,
    pub good: usize,
    pub warning: usize,
    pub critical: usize,
    pub good_health_pct: f64,
    /// 100 minus the good-health share.
    pub risk_pct: f64,
    pub last_update: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<ScoreReport>,
}

impl HealthSummary {
    pub fn from_readings(readings: &[Reading]) -> Self {
        let total = readings.len();
        let anomalies = readings.iter().filter(|r| r.is_anomalous()).count();
        let count = |state: HealthState| readings.iter().filter(|r| r.health == Some(state)).count();
        let good = count(HealthState::Good);
        let good_health_pct = pct(good, total);

        Self {
            total,
            anomalies,
            anomaly_rate_pct: pct(anomalies, total),
            good,
            warning: count(HealthState::Warning),
            critical: count(HealthState::Critical),
            good_health_pct,
            risk_pct: if total == 0 { 0.0 } else { 100.0 - good_health_pct },
            last_update: readings.iter().map(|r| r.timestamp).max(),
            score: None,
        }
    }

    fn with_score(mut self, report: ScoreReport) -> Self {
        self.score = Some(report);
        self
    }

    /// Worst state present in the buffer.
    pub fn worst(&self) -> Option<HealthState> {
        if self.critical > 0 {
            Some(HealthState::Critical)
        } else if self.warning > 0 {
            Some(HealthState::Warning)
        } else if self.good > 0 {
            Some(HealthState::Good)
        } else {
            None
        }
    }
}

fn pct(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

/// The last `limit` anomalous readings, oldest first.
pub fn recent_anomalies(readings: &[Reading], limit: usize) -> Vec<&Reading> {
    let mut out: Vec<&Reading> = readings
        .iter()
        .rev()
        .filter(|r| r.is_anomalous())
        .take(limit)
        .collect();
    out.reverse();
    out
}
