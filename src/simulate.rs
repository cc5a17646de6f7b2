//! Seeded synthetic SHM data, modelled on an ageing bridge deployment.
//!
//! Vibration is zero-mean noise with occasional injected spikes; temperature,
//! humidity and wind follow plausible ambient distributions. Injected spikes
//! are not guaranteed to be flagged by the scorer, and flagged readings are
//! not guaranteed to be spikes.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp, Normal};
use serde::{Deserialize, Serialize};

use crate::reading::Reading;

/// Longest spacing accepted between generated readings (one day).
pub const MAX_INTERVAL_SECS: u64 = 86_400;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of historical readings to generate up front.
    pub samples: usize,
    pub seed: u64,
    /// First timestamp of the generated history.
    pub start: DateTime<Utc>,
    /// Spacing between consecutive readings.
    pub interval_secs: u64,
    /// Chance that a historical reading carries a vibration spike.
    pub spike_probability: f64,
    /// Live monitor cadence.
    pub refresh_secs: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            samples: 1000,
            seed: 42,
            start: Utc
                .with_ymd_and_hms(2026, 2, 26, 0, 0, 0)
                .single()
                .unwrap_or_else(Utc::now),
            interval_secs: 10,
            spike_probability: 0.1,
            refresh_secs: 5,
        }
    }
}

struct Distributions {
    vibration: Normal<f64>,
    spike: Normal<f64>,
    temp: Normal<f64>,
    humidity: Normal<f64>,
    wind: Exp<f64>,
}

impl Distributions {
    fn new() -> Result<Self> {
        Ok(Self {
            vibration: Normal::new(0.0, 0.5).context("vibration distribution")?,
            spike: Normal::new(3.0, 1.0).context("spike distribution")?,
            temp: Normal::new(25.0, 5.0).context("temperature distribution")?,
            humidity: Normal::new(60.0, 10.0).context("humidity distribution")?,
            // rate 0.5 => mean wind speed of 2 m/s
            wind: Exp::new(0.5).context("wind distribution")?,
        })
    }
}

pub struct Simulator {
    config: SimulationConfig,
    rng: StdRng,
    dist: Distributions,
}

impl Simulator {
    pub fn new(config: SimulationConfig) -> Result<Self> {
        if !(0.0..=1.0).contains(&config.spike_probability) {
            anyhow::bail!(
                "spike_probability must be in [0, 1], got {}",
                config.spike_probability
            );
        }
        if !(1..=MAX_INTERVAL_SECS).contains(&config.interval_secs) {
            anyhow::bail!(
                "interval_secs must be in [1, {}], got {}",
                MAX_INTERVAL_SECS,
                config.interval_secs
            );
        }
        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            dist: Distributions::new()?,
            config,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    fn interval(&self) -> Duration {
        Duration::seconds(self.config.interval_secs as i64)
    }

    fn sample(&mut self, timestamp: DateTime<Utc>, spike: bool) -> Reading {
        let mut acc = [0.0; 3];
        for a in acc.iter_mut() {
            *a = self.dist.vibration.sample(&mut self.rng);
        }
        if spike {
            for a in acc.iter_mut() {
                *a += self.dist.spike.sample(&mut self.rng);
            }
        }
        Reading::new(
            timestamp,
            acc,
            self.dist.temp.sample(&mut self.rng),
            self.dist.humidity.sample(&mut self.rng),
            self.dist.wind.sample(&mut self.rng),
        )
    }

    /// `n` readings from `start`, with spikes injected at `spike_probability`.
    /// Stops early if the timestamps would run past the end of the calendar.
    pub fn history(&mut self, n: usize) -> Vec<Reading> {
        let step = self.interval();
        let mut out = Vec::with_capacity(n);
        let mut ts = Some(self.config.start);
        for _ in 0..n {
            let Some(at) = ts else { break };
            let spike = self.rng.gen_bool(self.config.spike_probability);
            out.push(self.sample(at, spike));
            ts = at.checked_add_signed(step);
        }
        out
    }

    /// One live reading, one interval after `previous` (or at `start`).
    /// Live readings carry no injected spike.
    pub fn next_after(&mut self, previous: Option<&Reading>) -> Reading {
        let ts = match previous {
            // saturates at the calendar end; the buffer then rejects it as out of order
            Some(r) => r
                .timestamp
                .checked_add_signed(self.interval())
                .unwrap_or(r.timestamp),
            None => self.config.start,
        };
        self.sample(ts, false)
    }
}
