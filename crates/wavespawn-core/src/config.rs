//! Configuration loading and typed config structures for Wavespawn.
//!
//! The canonical configuration lives in `wavespawn-config.yaml` at the
//! project root. Every field has a default, so an empty or partial file is
//! valid.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Environment variable that overrides `rules.path`.
pub const RULES_PATH_ENV: &str = "WAVESPAWN_RULES_PATH";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        #[from]
        source: serde_yml::Error,
    },

    /// A value parsed but is out of range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

/// Top-level configuration, mirroring `wavespawn-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WavespawnConfig {
    /// Rule table location and fallback behaviour.
    #[serde(default)]
    pub rules: RulesConfig,

    /// Host game loop parameters.
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl WavespawnConfig {
    /// Load and validate configuration from a YAML file.
    ///
    /// `WAVESPAWN_RULES_PATH` overrides `rules.path` when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] or [`ConfigError::Invalid`].
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes as unit, not as an empty mapping.
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.rules.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sim = &self.simulation;
        for (field, value) in [
            ("simulation.time_step_secs", sim.time_step_secs),
            ("simulation.base_spawn_interval_secs", sim.base_spawn_interval_secs),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Invalid {
                    reason: format!("{field} must be a positive number, got {value}"),
                });
            }
        }
        if !sim.duration_secs.is_finite() || sim.duration_secs < 0.0 {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "simulation.duration_secs must be >= 0, got {}",
                    sim.duration_secs
                ),
            });
        }
        if self.rules.hot_reload && self.rules.reload_poll_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "rules.reload_poll_ms must be at least 1 when hot_reload is on".to_owned(),
            });
        }
        Ok(())
    }
}

/// Rule table configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RulesConfig {
    /// Path of the rule table (`.csv`, `.yaml`, or `.yml`).
    #[serde(default = "default_rules_path")]
    pub path: PathBuf,

    /// Entity type spawned when no rule applies.
    #[serde(default = "default_entity_type")]
    pub default_entity_type: u32,

    /// Whether to watch the rule table and reload it on change.
    #[serde(default = "default_true")]
    pub hot_reload: bool,

    /// How often the watcher checks the file, in milliseconds.
    #[serde(default = "default_reload_poll_ms")]
    pub reload_poll_ms: u64,
}

impl RulesConfig {
    /// Apply `WAVESPAWN_RULES_PATH` if it is set and non-empty.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var(RULES_PATH_ENV) {
            if !path.trim().is_empty() {
                self.path = PathBuf::from(path);
            }
        }
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            path: default_rules_path(),
            default_entity_type: default_entity_type(),
            hot_reload: true,
            reload_poll_ms: default_reload_poll_ms(),
        }
    }
}

/// Host game loop configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Seed for the spawn RNG.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Game seconds to simulate. `0` runs until interrupted.
    #[serde(default = "default_duration_secs")]
    pub duration_secs: f64,

    /// Game seconds advanced per step.
    #[serde(default = "default_time_step_secs")]
    pub time_step_secs: f64,

    /// Spawn-timer threshold in game seconds at frequency 1.0.
    #[serde(default = "default_base_spawn_interval_secs")]
    pub base_spawn_interval_secs: f64,

    /// Real milliseconds per step. `0` runs as fast as possible.
    #[serde(default)]
    pub tick_interval_ms: u64,

    /// Where to write the JSON run report, if anywhere.
    #[serde(default)]
    pub report_path: Option<PathBuf>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            duration_secs: default_duration_secs(),
            time_step_secs: default_time_step_secs(),
            base_spawn_interval_secs: default_base_spawn_interval_secs(),
            tick_interval_ms: 0,
            report_path: None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_rules_path() -> PathBuf {
    PathBuf::from("data/spawn_rules.csv")
}

const fn default_entity_type() -> u32 {
    1
}

const fn default_true() -> bool {
    true
}

const fn default_reload_poll_ms() -> u64 {
    1000
}

const fn default_seed() -> u64 {
    42
}

const fn default_duration_secs() -> f64 {
    300.0
}

const fn default_time_step_secs() -> f64 {
    0.1
}

const fn default_base_spawn_interval_secs() -> f64 {
    2.0
}

fn default_log_level() -> String {
    String::from("info")
}
