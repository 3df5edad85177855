//! Real-time scheduling: one actor task owns the engine, three timers and
//! any number of [`EngineHandle`]s feed it through a single ordered queue.

use crate::{Action, ActionOutcome, GameSnapshot, SimulationEngine};
use chrono::Utc;
use sim_econ::ActionError;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Timer periods. Production must be faster than drift, and drift faster
/// than autosave.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub production: Duration,
    pub drift: Duration,
    pub autosave: Duration,
    /// Capacity of the command queue.
    pub queue_depth: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            production: Duration::from_secs(1),
            drift: Duration::from_secs(10),
            autosave: Duration::from_secs(30),
            queue_depth: 64,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.production.is_zero()
            || self.production >= self.drift
            || self.drift >= self.autosave
        {
            return Err(SchedulerError::PeriodOrder);
        }
        if self.queue_depth == 0 {
            return Err(SchedulerError::ZeroQueue);
        }
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("periods must satisfy 0 < production < drift < autosave")]
    PeriodOrder,
    #[error("command queue depth must be > 0")]
    ZeroQueue,
    #[error("engine task has stopped")]
    Closed,
}

enum Command {
    Tick,
    Drift,
    Autosave,
    Act(Action, oneshot::Sender<Result<ActionOutcome, ActionError>>),
    Snapshot(oneshot::Sender<GameSnapshot>),
    Shutdown,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Command::Tick => "Tick",
            Command::Drift => "Drift",
            Command::Autosave => "Autosave",
            Command::Act(..) => "Act",
            Command::Snapshot(_) => "Snapshot",
            Command::Shutdown => "Shutdown",
        };
        f.write_str(name)
    }
}

/// Cloneable front door to a running engine.
#[derive(Clone, Debug)]
pub struct EngineHandle {
    tx: mpsc::Sender<Command>,
}

impl EngineHandle {
    /// Queue a player action and wait for its result.
    pub async fn act(&self, action: Action) -> Result<Result<ActionOutcome, ActionError>, SchedulerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Act(action, reply))
            .await
            .map_err(|_| SchedulerError::Closed)?;
        rx.await.map_err(|_| SchedulerError::Closed)
    }

    /// Snapshot taken after every command queued before this call.
    pub async fn snapshot(&self) -> Result<GameSnapshot, SchedulerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Snapshot(reply))
            .await
            .map_err(|_| SchedulerError::Closed)?;
        rx.await.map_err(|_| SchedulerError::Closed)
    }
}

/// Running engine plus its timers.
pub struct Scheduler {
    handle: EngineHandle,
    timers: Vec<JoinHandle<()>>,
    actor: JoinHandle<SimulationEngine>,
}

impl Scheduler {
    /// Move the engine into an actor task and start the timers. Must be
    /// called from within a Tokio runtime.
    pub fn start(engine: SimulationEngine, cfg: SchedulerConfig) -> Result<Self, SchedulerError> {
        cfg.validate()?;
        let (tx, rx) = mpsc::channel(cfg.queue_depth);
        let actor = tokio::spawn(run_actor(engine, rx));
        let timers = vec![
            spawn_timer(tx.clone(), cfg.production, || Command::Tick),
            spawn_timer(tx.clone(), cfg.drift, || Command::Drift),
            spawn_timer(tx.clone(), cfg.autosave, || Command::Autosave),
        ];
        info!(
            production_ms = cfg.production.as_millis() as u64,
            drift_ms = cfg.drift.as_millis() as u64,
            autosave_ms = cfg.autosave.as_millis() as u64,
            "scheduler started"
        );
        Ok(Self {
            handle: EngineHandle { tx },
            timers,
            actor,
        })
    }

    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// Stop the timers, let the actor finish every queued command, save a
    /// final time and hand the engine back.
    pub async fn shutdown(self) -> Result<SimulationEngine, SchedulerError> {
        for timer in &self.timers {
            timer.abort();
        }
        self.handle
            .tx
            .send(Command::Shutdown)
            .await
            .map_err(|_| SchedulerError::Closed)?;
        let engine = self.actor.await.map_err(|_| SchedulerError::Closed)?;
        info!("scheduler stopped");
        Ok(engine)
    }
}

fn spawn_timer(
    tx: mpsc::Sender<Command>,
    period: Duration,
    make: fn() -> Command,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if tx.send(make()).await.is_err() {
                break;
            }
        }
    })
}

async fn run_actor(mut engine: SimulationEngine, mut rx: mpsc::Receiver<Command>) -> SimulationEngine {
    while let Some(cmd) = rx.recv().await {
        debug!(?cmd, "command");
        match cmd {
            Command::Tick => {
                engine.tick(Utc::now());
            }
            Command::Drift => {
                engine.drift_prices();
            }
            Command::Autosave => {
                engine.save();
            }
            Command::Act(action, reply) => {
                let result = engine.dispatch(action, Utc::now());
                let _ = reply.send(result);
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(engine.snapshot());
            }
            Command::Shutdown => break,
        }
    }
    engine.save();
    engine
}
