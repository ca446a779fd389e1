//! Markov Stepper CLI - build, edit and step discrete-time Markov chains.
//!
//! The chain lives in a JSON document (default `markov_chain.json`). Editing
//! commands rewrite it in place; `run` steps it in real time and saves the result.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;

use markov_stepper_engine::{default_file_name, DocumentStore, Position};

mod commands;
mod config;

use commands::{chain, config as config_cmd, run};
use config::Config;

/// Markov Stepper - edit and simulate Markov chains.
#[derive(Parser, Debug)]
#[command(
    name = "markov",
    author,
    version,
    about = "Markov Stepper: edit and simulate discrete-time Markov chains",
    long_about = None
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Chain document to operate on (overrides MARKOV_DOCUMENT and the config file).
    #[arg(short, long, global = true)]
    document: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a random chain, replacing the document.
    Generate {
        /// Number of states (defaults to the configured node count).
        #[arg(value_parser = clap::value_parser!(u64).range(1..))]
        count: Option<u64>,

        /// Fixed RNG seed.
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Show states, transition matrix and visit statistics.
    Show {
        /// Print the raw JSON document instead.
        #[arg(long)]
        json: bool,
    },

    /// Add a state with a self-loop.
    AddState {
        /// Horizontal position (defaults to the canvas centre).
        #[arg(long)]
        x: Option<f64>,

        /// Vertical position (defaults to the canvas centre).
        #[arg(long)]
        y: Option<f64>,

        /// Fill colour (defaults to the palette colour for the new index).
        #[arg(long)]
        color: Option<String>,
    },

    /// Remove a state and its transitions.
    RemoveState {
        /// State index.
        index: usize,
    },

    /// Move a state on the canvas.
    MoveState {
        /// State index.
        index: usize,
        x: f64,
        y: f64,
    },

    /// Set one transition probability. The row is not renormalised.
    Set {
        from: usize,
        to: usize,
        probability: f64,
    },

    /// Set one transition probability to zero.
    Clear { from: usize, to: usize },

    /// Create an edge with the default probability, or remove one.
    Edge {
        from: usize,
        to: usize,

        /// Remove the edge instead.
        #[arg(long)]
        remove: bool,
    },

    /// Rescale rows so they sum to 1.
    Normalize {
        /// Only this row.
        #[arg(long)]
        row: Option<usize>,
    },

    /// Redraw the transition matrix for the existing states.
    Randomize {
        /// Fixed RNG seed.
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Step the chain in real time, then save it.
    Run {
        /// Stop after this many steps (runs until Ctrl-C otherwise).
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        steps: Option<u64>,

        /// Delay between steps in milliseconds.
        #[arg(long)]
        tick_ms: Option<u64>,

        /// Fixed RNG seed.
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Copy the document to a timestamped export file.
    Export {
        /// Directory to write into.
        #[arg(default_value = ".")]
        dir: PathBuf,
    },

    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Configuration subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration.
    Show,

    /// Set a configuration value.
    Set {
        /// Configuration key.
        key: String,
        /// Configuration value.
        value: String,
    },

    /// Get a configuration value.
    Get {
        /// Configuration key.
        key: String,
    },

    /// Reset configuration to defaults.
    Reset,

    /// Show path to config file.
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    let level = if cli.quiet {
        Level::ERROR
    } else if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load()?;
    if let Some(document) = cli.document {
        config.document = document;
    }
    let store = DocumentStore::new(&config.document);

    match cli.command {
        Commands::Generate { count, seed } => {
            config.seed = seed.or(config.seed);
            let count = count.map(|c| c as usize).unwrap_or(config.node_count);
            chain::generate(&config, &store, count)?;
        }

        Commands::Show { json } => chain::show(&config, &store, json)?,

        Commands::AddState { x, y, color } => {
            let center = Position::center();
            let position = Position::new(x.unwrap_or(center.x), y.unwrap_or(center.y));
            chain::add_state(&config, &store, position, color)?;
        }

        Commands::RemoveState { index } => chain::remove_state(&config, &store, index)?,

        Commands::MoveState { index, x, y } => {
            chain::move_state(&config, &store, index, Position::new(x, y))?;
        }

        Commands::Set {
            from,
            to,
            probability,
        } => chain::set_transition(&config, &store, from, to, probability)?,

        Commands::Clear { from, to } => chain::clear_transition(&config, &store, from, to)?,

        Commands::Edge { from, to, remove } => chain::edge(&config, &store, from, to, remove)?,

        Commands::Normalize { row } => chain::normalize(&config, &store, row)?,

        Commands::Randomize { seed } => {
            config.seed = seed.or(config.seed);
            chain::randomize(&config, &store)?;
        }

        Commands::Run {
            steps,
            tick_ms,
            seed,
        } => {
            config.seed = seed.or(config.seed);
            if let Some(ms) = tick_ms {
                config.tick_interval_ms = ms;
            }
            run::execute(&config, &store, steps).await?;
        }

        Commands::Export { dir } => {
            let sim = chain::open(&config, &store)?;
            let target = DocumentStore::new(dir.join(default_file_name()));
            let path = target.save(&sim)?;
            println!("✅ Exported {} -> {}", store.path().display(), path.display());
        }

        Commands::Config(config_cmd_inner) => match config_cmd_inner {
            ConfigCommands::Show => config_cmd::show(&config)?,
            ConfigCommands::Set { key, value } => config_cmd::set(&key, &value)?,
            ConfigCommands::Get { key } => config_cmd::get(&config, &key)?,
            ConfigCommands::Reset => config_cmd::reset()?,
            ConfigCommands::Path => {
                if let Some(path) = Config::config_file_path() {
                    println!("{}", path.display());
                } else {
                    println!("(no config file path available)");
                }
            }
        },
    }

    Ok(())
}
