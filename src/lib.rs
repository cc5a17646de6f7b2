//! InfraGuard -- structural health monitoring for bridge-class assets.
//!
//! This crate scores a time-ordered buffer of vibration and environmental
//! readings with an isolation forest, then labels each reading `Good`,
//! `Warning` or `Critical` with a windowed rule table. The buffer is always
//! rescored in full; no model state survives between runs.

pub mod config;
pub mod detect;
pub mod health;
pub mod monitor;
pub mod pipeline;
pub mod reading;
pub mod simulate;

pub use detect::{score_anomalies, DetectError, ForestParams};
pub use health::{classify_health, classify_health_default, HealthClassifier, RuleSet};
pub use pipeline::{HealthSummary, Pipeline};
pub use reading::{HealthState, Reading, ReadingBuffer};
