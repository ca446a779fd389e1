//! Run command: step the chain in real time.
//!
//! The simulation is handed to a [`SimulationRuntime`]; this command only listens to
//! its events. Ctrl-C cancels the runtime, and the final state is saved either way.

use anyhow::{Context, Result};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use markov_stepper_engine::{ChainEvent, DocumentStore, SimulationRuntime};

use crate::commands::chain;
use crate::config::Config;

/// Run until `steps` ticks have happened, or until Ctrl-C when unlimited.
pub async fn execute(config: &Config, store: &DocumentStore, steps: Option<u64>) -> Result<()> {
    let sim = chain::open(config, store)?;
    let start_state = sim.current_state();
    let start_steps = sim.stats().total_steps();

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("ctrl_c_received");
            ctrl_c.cancel();
        }
    });

    let mut runtime = SimulationRuntime::new(sim).with_cancellation(cancel.clone());
    if let Some(limit) = steps {
        runtime = runtime.with_step_limit(limit);
    }
    let (handle, join) = runtime.spawn();
    let mut events = handle.subscribe();

    if let Err(e) = handle.start().await {
        handle.shutdown();
        let _ = join.await;
        return Err(e).context("Cannot start the simulation");
    }

    println!(
        "▶️  Running from state {} every {} ms{}",
        start_state,
        config.tick_interval_ms,
        steps
            .map(|s| format!(" for {} steps", s))
            .unwrap_or_else(|| " (Ctrl-C to stop)".to_string())
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                println!("\n⏹️  Interrupted");
                break;
            }
            event = events.recv() => match event {
                Ok(ChainEvent::StateTransitioned { from, to, step }) => {
                    println!("step {:>6}: {} -> {}", step, from, to);
                }
                Ok(ChainEvent::SimulationStopped) => break,
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event_listener_lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    handle.shutdown();
    let sim = join.await.context("Simulation task failed")?;

    let path = store
        .save(&sim)
        .with_context(|| format!("Failed to save {}", store.path().display()))?;
    println!(
        "✅ {} steps this run, {} total, now at state {} -> {}",
        sim.stats().total_steps() - start_steps,
        sim.stats().total_steps(),
        sim.current_state(),
        path.display()
    );
    Ok(())
}
