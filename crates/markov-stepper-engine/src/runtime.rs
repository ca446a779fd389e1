//! Paced simulation runtime.
//!
//! A spawned task owns the [`Simulation`] and is the only code that touches it.
//! It reacts to two sources, one at a time:
//!
//! - commands sent through a [`RuntimeHandle`]
//! - the deadline of the next scheduled tick
//!
//! After every command or tick the task reconciles its single pending deadline
//! with the simulation: if the loop is idle, or the live tick handle changed, the
//! old deadline is dropped. A stopped loop can therefore never tick again, even if
//! its deadline had already passed. Ticks reschedule themselves one interval after
//! they complete.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use markov_stepper_core::{MatrixReport, Position, StateNode};

use crate::error::{EngineError, EngineResult};
use crate::events::ChainEvent;
use crate::persistence::ChainDocument;
use crate::simulation::{Simulation, TickHandle};

type Job = Box<dyn FnOnce(&mut Simulation) + Send>;

/// Capacity of the command queue.
const COMMAND_CAPACITY: usize = 64;

/// Capacity of the event broadcast channel.
const EVENT_CAPACITY: usize = 256;

/// Builder for a runtime task.
#[derive(Debug)]
pub struct SimulationRuntime {
    simulation: Simulation,
    step_limit: Option<u64>,
    cancel: CancellationToken,
}

impl SimulationRuntime {
    pub fn new(simulation: Simulation) -> Self {
        Self {
            simulation,
            step_limit: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop the loop automatically after this many ticks per run.
    pub fn with_step_limit(mut self, steps: u64) -> Self {
        self.step_limit = Some(steps);
        self
    }

    /// Shut the task down when this token is cancelled.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Spawn the task. The join handle yields the simulation on shutdown.
    pub fn spawn(self) -> (RuntimeHandle, JoinHandle<Simulation>) {
        let (jobs_tx, jobs_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);

        let handle = RuntimeHandle {
            jobs: jobs_tx,
            events: events_tx.clone(),
            cancel: self.cancel.clone(),
        };

        let actor = Actor {
            sim: self.simulation,
            jobs: jobs_rx,
            events: events_tx,
            cancel: self.cancel,
            step_limit: self.step_limit,
            steps_this_run: 0,
            run_epoch: None,
            scheduled: None,
        };
        let join = tokio::spawn(actor.run());

        (handle, join)
    }
}

struct Actor {
    sim: Simulation,
    jobs: mpsc::Receiver<Job>,
    events: broadcast::Sender<ChainEvent>,
    cancel: CancellationToken,
    step_limit: Option<u64>,
    steps_this_run: u64,
    run_epoch: Option<u64>,
    scheduled: Option<(TickHandle, Instant)>,
}

impl Actor {
    async fn run(mut self) -> Simulation {
        let interval = self.sim.config().tick_interval();
        info!(interval_ms = interval.as_millis() as u64, "runtime_started");

        loop {
            let deadline = self.scheduled.map(|(_, at)| at);

            tokio::select! {
                _ = self.cancel.cancelled() => break,

                job = self.jobs.recv() => match job {
                    Some(job) => job(&mut self.sim),
                    None => break,
                },

                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if let Some((handle, _)) = self.scheduled.take() {
                        self.fire(handle);
                    }
                }
            }

            self.reconcile(interval);
            self.publish();
        }

        self.sim.stop();
        self.publish();
        info!(
            total_steps = self.sim.stats().total_steps(),
            "runtime_stopped"
        );
        self.sim
    }

    fn fire(&mut self, handle: TickHandle) {
        if self.sim.fire(handle).is_some() {
            self.steps_this_run += 1;
            if self
                .step_limit
                .is_some_and(|limit| self.steps_this_run >= limit)
            {
                debug!(steps = self.steps_this_run, "step_limit_reached");
                self.sim.stop();
            }
        }
    }

    /// Keep exactly one deadline for the live tick handle, or none when idle.
    fn reconcile(&mut self, interval: Duration) {
        let scheduled = self.scheduled.map(|(handle, _)| handle);
        match self.sim.pending_handle() {
            None => {
                if self.scheduled.take().is_some() {
                    debug!("pending_tick_cancelled");
                }
            }
            Some(live) if scheduled == Some(live) => {}
            Some(live) => {
                if self.run_epoch != Some(live.epoch()) {
                    self.run_epoch = Some(live.epoch());
                    self.steps_this_run = 0;
                }
                self.scheduled = Some((live, Instant::now() + interval));
            }
        }
    }

    fn publish(&mut self) {
        for event in self.sim.drain_events() {
            // No subscribers is fine
            let _ = self.events.send(event);
        }
    }
}

/// Clonable command surface for a running [`SimulationRuntime`].
#[derive(Debug, Clone)]
pub struct RuntimeHandle {
    jobs: mpsc::Sender<Job>,
    events: broadcast::Sender<ChainEvent>,
    cancel: CancellationToken,
}

impl RuntimeHandle {
    /// Receive events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ChainEvent> {
        self.events.subscribe()
    }

    /// Ask the runtime task to exit.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Run a closure against the simulation inside the runtime task.
    pub async fn call<R, F>(&self, f: F) -> EngineResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut Simulation) -> R + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move |sim| {
            let _ = reply_tx.send(f(sim));
        });
        self.jobs
            .send(job)
            .await
            .map_err(|_| EngineError::RuntimeClosed)?;
        reply_rx.await.map_err(|_| EngineError::RuntimeClosed)
    }

    pub async fn start(&self) -> EngineResult<()> {
        self.call(|sim| sim.start().map(|_| ())).await??;
        Ok(())
    }

    pub async fn stop(&self) -> EngineResult<bool> {
        self.call(Simulation::stop).await
    }

    pub async fn generate(&self, count: usize) -> EngineResult<()> {
        Ok(self.call(move |sim| sim.generate(count)).await??)
    }

    pub async fn add_state(
        &self,
        position: Position,
        color: Option<String>,
    ) -> EngineResult<u64> {
        Ok(self.call(move |sim| sim.add_state(position, color)).await??)
    }

    pub async fn remove_state(&self, index: usize) -> EngineResult<StateNode> {
        Ok(self.call(move |sim| sim.remove_state(index)).await??)
    }

    pub async fn set_transition(
        &self,
        from: usize,
        to: usize,
        probability: f64,
    ) -> EngineResult<f64> {
        Ok(self
            .call(move |sim| sim.set_transition(from, to, probability))
            .await??)
    }

    pub async fn normalize_all(&self) -> EngineResult<usize> {
        self.call(Simulation::normalize_all).await
    }

    pub async fn validate(&self) -> EngineResult<MatrixReport> {
        self.call(|sim| sim.matrix_report()).await
    }

    /// Replace the chain with a document. The loop is stopped first.
    pub async fn load(&self, document: ChainDocument) -> EngineResult<()> {
        Ok(self.call(move |sim| document.apply_to(sim)).await??)
    }

    /// Capture the current chain as a document.
    pub async fn snapshot(&self) -> EngineResult<ChainDocument> {
        self.call(|sim| ChainDocument::capture(sim)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;

    fn runtime(count: usize) -> SimulationRuntime {
        let config = SimulationConfig::default().with_seed(21);
        SimulationRuntime::new(Simulation::generated(config, count).unwrap())
    }

    async fn next_transition(rx: &mut broadcast::Receiver<ChainEvent>) -> (usize, usize, u64) {
        loop {
            if let ChainEvent::StateTransitioned { from, to, step } = rx.recv().await.unwrap() {
                return (from, to, step);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_before_first_tick() {
        let (handle, join) = runtime(3).spawn();

        handle.start().await.unwrap();
        assert!(handle.stop().await.unwrap());
        tokio::time::sleep(Duration::from_secs(10)).await;

        handle.shutdown();
        let sim = join.await.unwrap();
        assert_eq!(sim.stats().total_steps(), 0);
        assert_eq!(sim.current_state(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_are_paced() {
        let (handle, join) = runtime(3).spawn();
        let mut rx = handle.subscribe();

        let started = Instant::now();
        handle.start().await.unwrap();

        for expected in 1..=3u64 {
            let (_, _, step) = next_transition(&mut rx).await;
            assert_eq!(step, expected);
        }
        assert!(started.elapsed() >= Duration::from_millis(4500));

        handle.stop().await.unwrap();
        handle.shutdown();
        let sim = join.await.unwrap();
        assert_eq!(sim.stats().total_steps(), 3);
        assert_eq!(sim.stats().total_visits(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_limit_stops_loop() {
        let (handle, join) = runtime(4).with_step_limit(5).spawn();

        handle.start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;

        handle.shutdown();
        let sim = join.await.unwrap();
        assert_eq!(sim.stats().total_steps(), 5);
        assert!(!sim.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_cancels_pending_tick() {
        let (handle, join) = runtime(3).spawn();

        handle.start().await.unwrap();
        handle
            .add_state(Position::new(50.0, 50.0), None)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;

        handle.shutdown();
        let sim = join.await.unwrap();
        assert_eq!(sim.stats().total_steps(), 0);
        assert_eq!(sim.store().state_count(), 4);
    }

    #[tokio::test]
    async fn test_start_errors_propagate() {
        let (handle, join) =
            SimulationRuntime::new(Simulation::new(SimulationConfig::default())).spawn();

        let err = handle.start().await.unwrap_err();
        assert_eq!(err.as_chain().map(|e| e.kind()), Some("empty_chain"));

        handle.shutdown();
        join.await.unwrap();
        assert!(matches!(
            handle.stop().await,
            Err(EngineError::RuntimeClosed)
        ));
    }
}
