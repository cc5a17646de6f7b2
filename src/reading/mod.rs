//! Sensor readings and the caller-owned reading buffer.

pub mod buffer;

pub use self::buffer::{BufferError, ReadingBuffer};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Names of the six model features, in `Reading::features()` order.
pub const FEATURE_NAMES: [&str; 6] = ["acc_x", "acc_y", "acc_z", "temp", "humidity", "wind_speed"];

/// Number of features fed to the anomaly model.
pub const FEATURE_COUNT: usize = FEATURE_NAMES.len();

/// Discrete asset condition at a reading. Ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HealthState {
    Good,
    Warning,
    Critical,
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthState::Good => write!(f, "Good"),
            HealthState::Warning => write!(f, "Warning"),
            HealthState::Critical => write!(f, "Critical"),
        }
    }
}

/// One SHM sample: tri-axial vibration plus environmental covariates.
///
/// `anomaly`, `anomaly_score` and `health` are annotations written by the
/// pipeline. They are `None` until the corresponding stage has run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub acc_x: f64,
    pub acc_y: f64,
    pub acc_z: f64,
    /// Degrees Celsius.
    pub temp: f64,
    /// Relative humidity, percent.
    pub humidity: f64,
    /// m/s, non-negative.
    pub wind_speed: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anomaly: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anomaly_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthState>,
}

impl Reading {
    /// Build an unannotated reading.
    pub fn new(
        timestamp: DateTime<Utc>,
        acc: [f64; 3],
        temp: f64,
        humidity: f64,
        wind_speed: f64,
    ) -> Self {
        Self {
            timestamp,
            acc_x: acc[0],
            acc_y: acc[1],
            acc_z: acc[2],
            temp,
            humidity,
            wind_speed,
            anomaly: None,
            anomaly_score: None,
            health: None,
        }
    }

    /// Feature vector in `FEATURE_NAMES` order.
    pub fn features(&self) -> [f64; FEATURE_COUNT] {
        [
            self.acc_x,
            self.acc_y,
            self.acc_z,
            self.temp,
            self.humidity,
            self.wind_speed,
        ]
    }

    /// Euclidean norm of the three acceleration axes.
    pub fn vibration_magnitude(&self) -> f64 {
        (self.acc_x.powi(2) + self.acc_y.powi(2) + self.acc_z.powi(2)).sqrt()
    }

    pub fn is_anomalous(&self) -> bool {
        self.anomaly.unwrap_or(false)
    }
}
