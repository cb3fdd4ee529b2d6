//! Configuration file support for cmtree.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/cmtree/config.toml`.

use crate::diagnostic::Diagnostic;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub simulation: SimulationConfig,

    #[serde(default)]
    pub scenario: ScenarioConfig,

    #[serde(default)]
    pub diagnostic: DiagnosticConfig,
}

/// Random stream configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
        }
    }
}

/// Which case-management tree to load
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct ScenarioConfig {
    /// Tree file (.toml or .json); the built-in reference tree when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Diagnostic test parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiagnosticConfig {
    /// Parasites/µL. Minimum detectable density for a deterministic test,
    /// half-detection density for a stochastic one.
    #[serde(default = "default_detection_limit")]
    pub detection_limit: f64,

    /// Set to use a stochastic test with this specificity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specificity: Option<f64>,
}

impl Default for DiagnosticConfig {
    fn default() -> Self {
        Self {
            detection_limit: default_detection_limit(),
            specificity: None,
        }
    }
}

impl DiagnosticConfig {
    /// Build the configured test
    pub fn build(&self) -> Result<Diagnostic> {
        match self.specificity {
            Some(specificity) => Diagnostic::stochastic(self.detection_limit, specificity),
            None => Diagnostic::deterministic(self.detection_limit),
        }
    }
}

// Default value functions
fn default_seed() -> u64 {
    0
}

fn default_detection_limit() -> f64 {
    40.0
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.diagnostic.build()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> Result<PathBuf> {
        let base = match dirs::config_dir() {
            Some(dir) => dir,
            None => {
                let home = std::env::var("HOME").map_err(|_| {
                    Error::Config("Neither a config dir nor HOME is available".into())
                })?;
                PathBuf::from(home).join(".config")
            }
        };
        Ok(base.join("cmtree").join("config.toml"))
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
