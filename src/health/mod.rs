//! Windowed, rule-based health classification.
//!
//! Each reading's state depends on its own vibration magnitude and
//! environmental stress plus the anomaly flags of itself and up to
//! `window - 1` readings before it. Nothing after a reading is ever read.

pub mod rules;

pub use self::rules::{Condition, HealthRule, HealthSignals, RuleSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::detect::DetectError;
use crate::reading::Reading;

/// Current reading plus the 10 before it.
pub const DEFAULT_WINDOW: usize = 11;

/// Environmental limits; each one exceeded adds 1 to the stress score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvLimits {
    pub max_temp: f64,
    pub max_humidity: f64,
    pub max_wind_speed: f64,
}

impl Default for EnvLimits {
    fn default() -> Self {
        Self {
            max_temp: 35.0,
            max_humidity: 80.0,
            max_wind_speed: 10.0,
        }
    }
}

impl EnvLimits {
    /// Count of limits strictly exceeded (0..=3).
    pub fn stress_score(&self, r: &Reading) -> u8 {
        u8::from(r.temp > self.max_temp)
            + u8::from(r.humidity > self.max_humidity)
            + u8::from(r.wind_speed > self.max_wind_speed)
    }
}

/// Window size, limits and rule table for one classification pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthClassifier {
    pub window: usize,
    pub env: EnvLimits,
    pub rules: RuleSet,
}

impl Default for HealthClassifier {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            env: EnvLimits::default(),
            rules: RuleSet::default(),
        }
    }
}

impl HealthClassifier {
    /// Signals for every reading. Fails if any reading is unscored.
    pub fn signals(&self, readings: &[Reading]) -> Result<Vec<HealthSignals>, DetectError> {
        if self.window == 0 {
            return Err(DetectError::invalid("health window must be at least 1"));
        }
        let flags = readings
            .iter()
            .enumerate()
            .map(|(index, r)| r.anomaly.ok_or(DetectError::PrecursorMissing { index }))
            .collect::<Result<Vec<bool>, _>>()?;

        let mut out = Vec::with_capacity(readings.len());
        let mut in_window = 0usize;
        for (i, r) in readings.iter().enumerate() {
            in_window += usize::from(flags[i]);
            if i >= self.window {
                in_window -= usize::from(flags[i - self.window]);
            }
            out.push(HealthSignals {
                vib_mag: r.vibration_magnitude(),
                env_score: self.env.stress_score(r),
                anomalies_near: in_window,
            });
        }
        Ok(out)
    }

    /// Assign `health` to every reading. Nothing is written unless every
    /// reading already carries an anomaly flag.
    pub fn classify(&self, readings: &mut [Reading]) -> Result<(), DetectError> {
        let signals = self.signals(readings)?;
        for (r, s) in readings.iter_mut().zip(&signals) {
            r.health = Some(self.rules.evaluate(s));
        }
        debug!(
            readings = readings.len(),
            window = self.window,
            "health classification complete"
        );
        Ok(())
    }
}

/// Classify with an explicit window and rule table, default env limits.
pub fn classify_health(
    readings: &mut [Reading],
    window: usize,
    rules: &RuleSet,
) -> Result<(), DetectError> {
    HealthClassifier {
        window,
        env: EnvLimits::default(),
        rules: rules.clone(),
    }
    .classify(readings)
}

/// Classify with the 11-reading window and the reference rule table.
pub fn classify_health_default(readings: &mut [Reading]) -> Result<(), DetectError> {
    HealthClassifier::default().classify(readings)
}
