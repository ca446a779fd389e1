//! Config command implementation.

use std::path::PathBuf;

use anyhow::Result;

use crate::config::Config;

fn seed_label(seed: Option<u64>) -> String {
    seed.map(|s| s.to_string())
        .unwrap_or_else(|| "(random)".to_string())
}

/// Show current configuration.
pub fn show(config: &Config) -> Result<()> {
    println!("Markov Stepper Configuration");
    println!("{:-<40}", "");

    println!("Document:        {}", config.document.display());
    println!("Tick Interval:   {} ms", config.tick_interval_ms);
    println!("Seed:            {}", seed_label(config.seed));
    println!("Node Count:      {}", config.node_count);

    if let Some(config_path) = Config::config_file_path() {
        println!("\nConfig file: {}", config_path.display());
    }

    Ok(())
}

/// Set a configuration value and persist it.
///
/// Only the file layer is written, so environment overrides are not baked in.
pub fn set(key: &str, value: &str) -> Result<()> {
    let mut config = Config::load_file()?.unwrap_or_default();

    match key {
        "document" | "doc" => {
            config.document = PathBuf::from(value);
            println!("Set document to: {}", value);
        }
        "tick-ms" | "tick" => {
            config.tick_interval_ms = value.parse()?;
            println!("Set tick-ms to: {} ms", value);
        }
        "seed" => {
            config.seed = match value {
                "none" | "random" => None,
                _ => Some(value.parse()?),
            };
            println!("Set seed to: {}", seed_label(config.seed));
        }
        "node-count" | "nodes" => {
            let count: usize = value.parse()?;
            if count == 0 {
                anyhow::bail!("node-count must be at least 1");
            }
            config.node_count = count;
            println!("Set node-count to: {}", count);
        }
        _ => {
            anyhow::bail!(
                "Unknown config key: {}. Valid keys: document, tick-ms, seed, node-count",
                key
            );
        }
    }

    config.save()?;
    Ok(())
}

/// Get a configuration value.
pub fn get(config: &Config, key: &str) -> Result<()> {
    let value = match key {
        "document" | "doc" => config.document.display().to_string(),
        "tick-ms" | "tick" => config.tick_interval_ms.to_string(),
        "seed" => seed_label(config.seed),
        "node-count" | "nodes" => config.node_count.to_string(),
        _ => {
            anyhow::bail!("Unknown config key: {}", key);
        }
    };

    println!("{}", value);
    Ok(())
}

/// Reset configuration to defaults.
pub fn reset() -> Result<()> {
    Config::default().save()?;
    println!("Configuration reset to defaults");
    Ok(())
}
