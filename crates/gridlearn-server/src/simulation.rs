//! Async handle around the shared simulation state
//!
//! Every operation (request handlers, the continuous-play loop, turbo runs)
//! goes through the one `Mutex<SimulationState>`, so at most one writer
//! touches the world and agent at a time.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use gridlearn_core::{GridLearnError, GridSnapshot, Position, Result, SimulationConfig};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::config::ServerConfig;
use crate::events::{LiveCommand, LiveEvent};
use crate::observers::ObserverHub;
use crate::orchestrator::{StepReport, TurboReport};
use crate::state::{RunMode, SimulationState, StateSnapshot};
use crate::throttle::BroadcastThrottle;

struct PlayHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// The running simulation plus its live observers
pub struct Simulation {
    state: Arc<Mutex<SimulationState>>,
    observers: Arc<ObserverHub>,
    player: Mutex<Option<PlayHandle>>,
    broadcast_interval: Duration,
}

impl Simulation {
    pub fn new(config: &ServerConfig) -> Result<Self> {
        Ok(Self {
            state: Arc::new(Mutex::new(SimulationState::new(config)?)),
            observers: Arc::new(ObserverHub::new()),
            player: Mutex::new(None),
            broadcast_interval: config.broadcast_interval,
        })
    }

    pub fn observers(&self) -> &Arc<ObserverHub> {
        &self.observers
    }

    /// Replace world and agent; stops continuous play first
    pub async fn setup(&self, config: &SimulationConfig) -> Result<StateSnapshot> {
        self.pause().await;
        let mut state = self.state.lock().await;
        state.setup(config)?;
        Ok(state.query())
    }

    pub async fn update_config(&self, config: &SimulationConfig) -> Result<()> {
        self.state.lock().await.update_config(config)
    }

    pub async fn query(&self) -> StateSnapshot {
        self.state.lock().await.query()
    }

    /// One manual tick; stops continuous play first
    pub async fn step(&self) -> Result<StepReport> {
        self.pause().await;
        self.state.lock().await.manual_step()
    }

    /// Run `episodes` back-to-back episodes off the async runtime.
    ///
    /// Holds the state lock for the whole run.
    pub async fn turbo(&self, episodes: u64) -> Result<TurboReport> {
        self.pause().await;
        let mut state = self.state.clone().lock_owned().await;
        state.run_mode = RunMode::Turbo;
        info!(episodes, "Turbo run started");

        tokio::task::spawn_blocking(move || {
            let result = catch_unwind(AssertUnwindSafe(|| state.turbo(episodes)));
            state.run_mode = RunMode::Paused;
            result.map_err(|panic| GridLearnError::Simulation(panic_message(panic.as_ref())))
        })
        .await
        .map_err(|e| GridLearnError::Simulation(format!("turbo task failed: {}", e)))?
    }

    pub async fn generate_maze(&self) -> GridSnapshot {
        self.state.lock().await.generate_maze()
    }

    pub async fn clear(&self) -> GridSnapshot {
        self.state.lock().await.clear()
    }

    pub async fn set_cell(&self, pos: Position, cell: &str) -> Result<GridSnapshot> {
        self.state.lock().await.set_cell(pos, cell)
    }

    pub async fn optimal_path(&self) -> Vec<Position> {
        self.state.lock().await.optimal_path()
    }

    pub async fn set_speed(&self, speed_ms: u64) {
        self.state.lock().await.set_speed(speed_ms);
        debug!(speed_ms, "Tick delay changed");
    }

    /// Start continuous play; a no-op when it is already running
    pub async fn play(&self) {
        let mut player = self.player.lock().await;
        if player.as_ref().is_some_and(|p| !p.task.is_finished()) {
            debug!("Continuous play already running");
            return;
        }

        self.state.lock().await.run_mode = RunMode::Playing;
        let (stop, stop_rx) = watch::channel(false);
        let task = tokio::spawn(play_loop(
            self.state.clone(),
            self.observers.clone(),
            BroadcastThrottle::new(self.broadcast_interval),
            stop_rx,
        ));
        *player = Some(PlayHandle { stop, task });
        info!("Continuous play started");
    }

    /// Stop continuous play. Takes effect before the next tick.
    pub async fn pause(&self) {
        if let Some(handle) = self.player.lock().await.take() {
            let _ = handle.stop.send(true);
            info!("Continuous play stopped");
        }
        let mut state = self.state.lock().await;
        if state.run_mode == RunMode::Playing {
            state.run_mode = RunMode::Paused;
        }
    }

    pub async fn handle_command(&self, command: LiveCommand) {
        match command {
            LiveCommand::Play => self.play().await,
            LiveCommand::Pause => self.pause().await,
            LiveCommand::SetSpeed { speed } => self.set_speed(speed).await,
        }
    }
}

async fn play_loop(
    state: Arc<Mutex<SimulationState>>,
    observers: Arc<ObserverHub>,
    mut throttle: BroadcastThrottle,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        let (result, delay) = {
            let mut guard = state.lock().await;
            let stopped = *stop.borrow();
            if stopped || guard.run_mode != RunMode::Playing {
                break;
            }
            let result = catch_unwind(AssertUnwindSafe(|| -> Result<(LiveEvent, bool)> {
                let outcome = guard.tick()?;
                Ok((guard.update_event(&outcome), outcome.is_episode_event()))
            }));
            (result, Duration::from_millis(guard.speed_ms()))
        };

        let failure = match result {
            Ok(Ok((event, urgent))) => {
                if throttle.admit(urgent, Instant::now()) {
                    observers.broadcast(&event);
                }
                None
            }
            Ok(Err(e)) => Some(e.to_string()),
            Err(panic) => Some(panic_message(panic.as_ref())),
        };

        if let Some(message) = failure {
            error!(%message, "Tick failed, pausing");
            state.lock().await.run_mode = RunMode::Paused;
            observers.broadcast(&LiveEvent::Error { message });
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = stop.changed() => break,
        }
    }
    debug!("Continuous play loop exited");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "simulation panicked".to_string()
    }
}
