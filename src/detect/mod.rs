//! Multivariate anomaly detection over sensor readings.

pub mod forest;
pub mod scorer;

pub use self::forest::{ForestParams, IsolationForest};
pub use self::scorer::{score_anomalies, ScoreReport};

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum DetectError {
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("anomaly model could not be fit: {reason}")]
    ModelFit { reason: String },

    #[error("reading {index} has no anomaly flag; score anomalies before classifying health")]
    PrecursorMissing { index: usize },
}

impl DetectError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        DetectError::InvalidInput {
            reason: reason.into(),
        }
    }
}
