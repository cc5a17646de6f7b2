//! TOML configuration for InfraGuard.
//!
//! Every section is optional; anything missing falls back to the reference
//! values (contamination 0.10, seed 42, 11-reading window, 1000-reading
//! history). Lookup order is an explicit path, then `INFRAGUARD_CONFIG`, then
//! `./infraguard.toml`, then compiled-in defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::detect::ForestParams;
use crate::health::HealthClassifier;
use crate::pipeline::Pipeline;
use crate::reading::buffer::DEFAULT_CAPACITY;
use crate::simulate::{SimulationConfig, MAX_INTERVAL_SECS};

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "INFRAGUARD_CONFIG";

/// Config file picked up from the working directory.
pub const LOCAL_CONFIG: &str = "infraguard.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InfraGuardConfig {
    #[serde(default)]
    pub detector: ForestParams,
    #[serde(default)]
    pub health: HealthClassifier,
    #[serde(default)]
    pub buffer: BufferConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl InfraGuardConfig {
    /// Load and validate configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Resolve configuration. An explicit path must load; a broken
    /// `INFRAGUARD_CONFIG` or local file is skipped and reported in
    /// [`Resolved::skipped`].
    ///
    /// Does not log; call [`Resolved::log`] once tracing is initialised.
    pub fn resolve(explicit: Option<&Path>) -> Result<Resolved> {
        let env_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        Self::resolve_from(explicit, env_path.as_deref(), Path::new(LOCAL_CONFIG))
    }

    fn resolve_from(explicit: Option<&Path>, env_path: Option<&Path>, local: &Path) -> Result<Resolved> {
        if let Some(path) = explicit {
            return Ok(Resolved {
                config: Self::load(path)?,
                source: Some(path.to_path_buf()),
                skipped: Vec::new(),
            });
        }

        let mut skipped = Vec::new();
        let candidates = env_path.into_iter().chain(Some(local).filter(|p| p.exists()));
        for path in candidates {
            match Self::load(path) {
                Ok(config) => {
                    return Ok(Resolved {
                        config,
                        source: Some(path.to_path_buf()),
                        skipped,
                    })
                }
                Err(e) => skipped.push(SkippedConfig {
                    path: path.to_path_buf(),
                    error: format!("{:#}", e),
                }),
            }
        }

        Ok(Resolved {
            config: Self::default(),
            source: None,
            skipped,
        })
    }

    pub fn validate(&self) -> Result<()> {
        self.detector.validate()?;
        if self.health.window == 0 {
            anyhow::bail!("health.window must be at least 1");
        }
        if self.buffer.capacity == 0 {
            anyhow::bail!("buffer.capacity must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.simulation.spike_probability) {
            anyhow::bail!(
                "simulation.spike_probability must be in [0, 1], got {}",
                self.simulation.spike_probability
            );
        }
        if !(1..=MAX_INTERVAL_SECS).contains(&self.simulation.interval_secs) {
            anyhow::bail!(
                "simulation.interval_secs must be in [1, {}], got {}",
                MAX_INTERVAL_SECS,
                self.simulation.interval_secs
            );
        }
        Ok(())
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(self.detector.clone(), self.health.clone())
    }
}

// ---------------------------------------------------------------------------
// Resolution outcome
// ---------------------------------------------------------------------------

/// Effective configuration plus where it came from.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub config: InfraGuardConfig,
    /// File the config was read from; `None` means compiled-in defaults.
    pub source: Option<PathBuf>,
    /// Fallback files that existed or were named but failed to load.
    pub skipped: Vec<SkippedConfig>,
}

impl Resolved {
    /// Report the resolution through `tracing`. Call after the subscriber
    /// is installed.
    pub fn log(&self) {
        for s in &self.skipped {
            warn!(
                path = %s.path.display(),
                error = %s.error,
                "config file could not be loaded, falling back"
            );
        }
        match &self.source {
            Some(path) => info!(path = %path.display(), "loaded configuration"),
            None => debug!("no config file found, using compiled-in defaults"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedConfig {
    pub path: PathBuf,
    pub error: String,
}

// ---------------------------------------------------------------------------
// Buffer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Readings kept before the oldest are evicted.
    pub capacity: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level (`trace`, `debug`, `info`, `warn`, `error`).
    /// `RUST_LOG` takes precedence when set.
    pub level: String,
    /// Emit JSON lines instead of human-readable logs.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
