//! Ordered health rules.
//!
//! Rules are tried top to bottom and the first match wins, so table order is
//! the tie-break between overlapping conditions.

use serde::{Deserialize, Serialize};

use crate::reading::HealthState;

/// Per-reading inputs to the rule table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HealthSignals {
    pub vib_mag: f64,
    pub env_score: u8,
    pub anomalies_near: usize,
}

/// A single threshold test. All comparisons are strict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "above", rename_all = "snake_case")]
pub enum Condition {
    VibrationAbove(f64),
    AnomaliesNearAbove(usize),
    EnvScoreAbove(u8),
}

impl Condition {
    pub fn matches(&self, s: &HealthSignals) -> bool {
        match *self {
            Condition::VibrationAbove(limit) => s.vib_mag > limit,
            Condition::AnomaliesNearAbove(limit) => s.anomalies_near > limit,
            Condition::EnvScoreAbove(limit) => s.env_score > limit,
        }
    }
}

/// Yields `state` when any of its conditions holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRule {
    pub state: HealthState,
    pub any_of: Vec<Condition>,
}

impl HealthRule {
    pub fn matches(&self, s: &HealthSignals) -> bool {
        self.any_of.iter().any(|c| c.matches(s))
    }
}

/// Precedence-ordered rule table. Readings matching no rule are `Good`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    pub rules: Vec<HealthRule>,
}

impl Default for RuleSet {
    /// Critical: vibration > 2.0, more than 2 nearby anomalies, or all three
    /// environmental limits exceeded. Warning: vibration > 1.0 or more than
    /// 1 nearby anomaly.
    fn default() -> Self {
        Self {
            rules: vec![
                HealthRule {
                    state: HealthState::Critical,
                    any_of: vec![
                        Condition::VibrationAbove(2.0),
                        Condition::AnomaliesNearAbove(2),
                        Condition::EnvScoreAbove(2),
                    ],
                },
                HealthRule {
                    state: HealthState::Warning,
                    any_of: vec![
                        Condition::VibrationAbove(1.0),
                        Condition::AnomaliesNearAbove(1),
                    ],
                },
            ],
        }
    }
}

impl RuleSet {
    pub fn evaluate(&self, s: &HealthSignals) -> HealthState {
        self.rules
            .iter()
            .find(|r| r.matches(s))
            .map(|r| r.state)
            .unwrap_or(HealthState::Good)
    }
}
