//! CLI configuration management.
//!
//! Values come from, in increasing precedence: built-in defaults, the JSON config
//! file, a `.env` file / environment variables, and finally command-line flags.

use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::warn;

use markov_stepper_engine::SimulationConfig;

/// Document used when neither a flag nor the config names one.
pub const DEFAULT_DOCUMENT: &str = "markov_chain.json";

/// Overrides the directory holding `config.json`.
const CONFIG_DIR_ENV: &str = "MARKOV_CONFIG_DIR";

/// Application-wide configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chain document the commands read and write.
    pub document: PathBuf,

    /// Delay between simulation ticks, in milliseconds.
    pub tick_interval_ms: u64,

    /// Fixed RNG seed; random when unset.
    pub seed: Option<u64>,

    /// State count used by `generate` when no count is given.
    pub node_count: usize,
}

impl Default for Config {
    fn default() -> Self {
        let simulation = SimulationConfig::default();
        Self {
            document: PathBuf::from(DEFAULT_DOCUMENT),
            tick_interval_ms: simulation.tick_interval_ms,
            seed: None,
            node_count: simulation.default_node_count,
        }
    }
}

impl Config {
    /// Load configuration from the config file and environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file if present (silently ignore if missing)
        let _ = dotenvy::dotenv();

        let mut config = Self::load_file()?.unwrap_or_default();

        // Environment overrides the file
        if let Ok(document) = std::env::var("MARKOV_DOCUMENT") {
            config.document = PathBuf::from(document);
        }
        if let Ok(tick_ms) = std::env::var("MARKOV_TICK_MS") {
            match tick_ms.parse() {
                Ok(ms) => config.tick_interval_ms = ms,
                Err(_) => warn!(value = %tick_ms, "env_tick_ms_ignored"),
            }
        }
        if let Ok(seed) = std::env::var("MARKOV_SEED") {
            match seed.parse() {
                Ok(seed) => config.seed = Some(seed),
                Err(_) => warn!(value = %seed, "env_seed_ignored"),
            }
        }

        Ok(config)
    }

    /// Read only the config file, if there is one.
    pub fn load_file() -> Result<Option<Self>> {
        let Some(config_path) = Self::config_file_path() else {
            return Ok(None);
        };
        if !config_path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config from {}", config_path.display()))?;
        let config =
            serde_json::from_str(&contents).with_context(|| "Failed to parse config file")?;
        Ok(Some(config))
    }

    /// Save current configuration to the config file.
    pub fn save(&self) -> Result<()> {
        if let Some(config_path) = Self::config_file_path() {
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create config directory: {}", parent.display())
                })?;
            }
            let contents = serde_json::to_string_pretty(self)?;
            std::fs::write(&config_path, contents)
                .with_context(|| format!("Failed to write config to {}", config_path.display()))?;
        }
        Ok(())
    }

    /// Get the path to the config file.
    pub fn config_file_path() -> Option<PathBuf> {
        if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
            return Some(PathBuf::from(dir).join("config.json"));
        }
        ProjectDirs::from("dev", "markov-stepper", "markov")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Simulation settings for this run.
    pub fn simulation(&self) -> SimulationConfig {
        SimulationConfig {
            tick_interval_ms: self.tick_interval_ms,
            seed: self.seed,
            default_node_count: self.node_count,
            ..Default::default()
        }
    }
}
