// src/driver.rs
// Drives a pendulum session. Simulation is the context object that owns config, state, dt and
// elapsed time; nothing here lives in a global.
// Two ways to sequence ticks and observers:
//   * run_cooperative: one thread, strictly tick-then-observe. Deterministic; solve_batch (the
//     batch endpoint) is built on it.
//   * SharedSimulation + spawn_ticker: a tokio task is the sole mutator, ticking on an interval;
//     observers take owned snapshots under the same mutex, so a reader never sees fields from
//     two different ticks. A watch channel carries the stop signal.

use crate::config::{ConfigError, InitialConditions, PendulumConfig};
use crate::logic::{step, IntegrationError, StepOutcome};
use crate::state::PendulumState;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Owned copy of everything an observer may read for one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub elapsed: f64, // Simulated seconds; only advances on non-paused steps.
    pub steps: u64,
    pub energy: f64,
    pub state: PendulumState,
}

#[derive(Debug, Clone)]
pub struct Simulation {
    config: PendulumConfig,
    state: PendulumState,
    dt: f64,
    elapsed: f64,
    steps: u64,
    last_error: Option<IntegrationError>,
}

impl Simulation {
    pub fn new(config: PendulumConfig, initial: InitialConditions, dt: f64) -> Result<Self, ConfigError> {
        config.validate()?;
        if !dt.is_finite() || dt <= 0.0 {
            return Err(ConfigError::InvalidTimeStep(dt));
        }
        let state = PendulumState::initialize(&config, initial);
        Ok(Self {
            config,
            state,
            dt,
            elapsed: 0.0,
            steps: 0,
            last_error: None,
        })
    }

    /// Resumes from a previously captured snapshot. `config` wins over whatever the snapshot
    /// was taken under: positions are re-derived from the angles and trails re-capped.
    pub fn restore(config: PendulumConfig, snapshot: Snapshot, dt: f64) -> Result<Self, ConfigError> {
        let mut sim = Self::new(config, InitialConditions::default(), dt)?;
        sim.state = snapshot.state;
        sim.state.conform_to(&sim.config);
        sim.elapsed = snapshot.elapsed;
        sim.steps = snapshot.steps;
        Ok(sim)
    }

    /// One integration step. Singular configurations are logged and kept in `last_error`;
    /// the session keeps running with the state frozen.
    pub fn tick(&mut self) -> Result<StepOutcome, IntegrationError> {
        match step(&mut self.state, &self.config, self.dt) {
            Ok(StepOutcome::Advanced) => {
                self.steps += 1;
                self.elapsed = self.steps as f64 * self.dt;
                Ok(StepOutcome::Advanced)
            }
            Ok(StepOutcome::Paused) => Ok(StepOutcome::Paused),
            Err(err) => {
                if self.last_error.is_none() {
                    warn!(%err, steps = self.steps, "integration hit a singular configuration, state frozen");
                }
                self.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    pub fn toggle_pause(&mut self) -> bool {
        self.state.toggle_pause();
        debug!(paused = self.state.paused, "pause toggled");
        self.state.paused
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            elapsed: self.elapsed,
            steps: self.steps,
            energy: self.state.total_energy(&self.config),
            state: self.state.clone(),
        }
    }

    pub fn config(&self) -> &PendulumConfig {
        &self.config
    }

    pub fn state(&self) -> &PendulumState {
        &self.state
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn last_error(&self) -> Option<&IntegrationError> {
        self.last_error.as_ref()
    }
}

/// Alternates `tick` and `observe` `ticks` times on the current thread.
/// Returns the number of ticks that failed with a singular configuration.
pub fn run_cooperative<F>(sim: &mut Simulation, ticks: usize, mut observe: F) -> usize
where
    F: FnMut(&Simulation),
{
    let mut failures = 0;
    for _ in 0..ticks {
        if sim.tick().is_err() {
            failures += 1;
        }
        observe(sim);
    }
    failures
}

/// One observed tick of a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrajectoryPoint {
    pub time: f64,
    pub theta_1: f64,
    pub theta_2: f64,
    pub omega_1: f64,
    pub omega_2: f64,
    pub positions: [f64; 4], // [x1, y1, x2, y2]
}

impl TrajectoryPoint {
    fn observe(sim: &Simulation) -> Self {
        let s = &sim.state;
        Self {
            time: sim.elapsed,
            theta_1: s.theta_1,
            theta_2: s.theta_2,
            omega_1: s.omega_1,
            omega_2: s.omega_2,
            positions: [s.x_1, s.y_1, s.x_2, s.y_2],
        }
    }
}

/// Output of `solve_batch`.
#[derive(Debug, Clone)]
pub struct Trajectory {
    pub config: PendulumConfig,
    pub points: Vec<TrajectoryPoint>, // points[0] is the initial state.
    pub final_state: PendulumState,
    /// Tick (1-based) that first hit a singular configuration. Points stop there; the state
    /// stays frozen for the remaining ticks.
    pub singular_at: Option<usize>,
}

/// Runs `n_steps` ticks from `initial` through `run_cooperative`, observing a point per tick.
pub fn solve_batch(
    config: PendulumConfig,
    initial: InitialConditions,
    dt: f64,
    n_steps: usize,
) -> Result<Trajectory, ConfigError> {
    let mut sim = Simulation::new(config, initial, dt)?;
    let mut points = Vec::with_capacity(n_steps + 1);
    points.push(TrajectoryPoint::observe(&sim));
    let mut singular_at = None;
    let mut tick = 0usize;
    run_cooperative(&mut sim, n_steps, |s| {
        tick += 1;
        if singular_at.is_some() {
            return; // Frozen; nothing new to observe.
        }
        if s.last_error().is_some() {
            debug!(tick, "batch run hit a singular configuration");
            singular_at = Some(tick);
            return;
        }
        points.push(TrajectoryPoint::observe(s));
    });
    Ok(Trajectory {
        config: sim.config,
        points,
        final_state: sim.state,
        singular_at,
    })
}

/// A simulation shared between one ticking producer and any number of observers.
#[derive(Debug, Clone)]
pub struct SharedSimulation {
    inner: Arc<Mutex<Simulation>>,
}

impl SharedSimulation {
    pub fn new(sim: Simulation) -> Self {
        Self {
            inner: Arc::new(Mutex::new(sim)),
        }
    }

    // A panic while holding the lock can't leave the state half-written (step writes after all
    // checks), so a poisoned mutex is still safe to read.
    fn lock(&self) -> MutexGuard<'_, Simulation> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn tick(&self) -> Result<StepOutcome, IntegrationError> {
        self.lock().tick()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.lock().snapshot()
    }

    pub fn toggle_pause(&self) -> bool {
        self.lock().toggle_pause()
    }

    pub fn config(&self) -> PendulumConfig {
        self.lock().config().clone()
    }
}

/// Handle to a running ticker task.
#[derive(Debug)]
pub struct TickerHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<u64>,
}

impl TickerHandle {
    /// Sends the stop signal and waits for the task. Returns how many ticks it ran.
    pub async fn stop(self) -> u64 {
        let _ = self.stop_tx.send(true);
        match self.task.await {
            Ok(ticks) => ticks,
            Err(err) => {
                warn!(%err, "ticker task did not shut down cleanly");
                0
            }
        }
    }
}

/// Spawns the producer: calls `tick` every `interval` until stopped.
/// Must be called from within a tokio runtime.
pub fn spawn_ticker(sim: SharedSimulation, interval: Duration) -> TickerHandle {
    let (stop_tx, mut stop_rx) = watch::channel(false);
    let task = tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut ticks = 0u64;
        info!(?interval, "ticker started");
        loop {
            tokio::select! {
                _ = timer.tick() => {
                    // Errors are recorded on the simulation itself.
                    let _ = sim.tick();
                    ticks += 1;
                }
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
            }
        }
        info!(ticks, "ticker stopped");
        ticks
    });
    TickerHandle { stop_tx, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::DEFAULT_DT;

    fn default_sim() -> Simulation {
        Simulation::new(PendulumConfig::default(), InitialConditions::default(), DEFAULT_DT).unwrap()
    }

    #[test]
    fn test_rejects_invalid_dt() {
        let result = Simulation::new(PendulumConfig::default(), InitialConditions::default(), -0.01);
        assert_eq!(result.err(), Some(ConfigError::InvalidTimeStep(-0.01)));
    }

    #[test]
    fn test_cooperative_run_observes_every_tick() {
        let mut sim = default_sim();
        let mut seen = Vec::new();
        let failures = run_cooperative(&mut sim, 10, |s| seen.push(s.snapshot().steps));
        assert_eq!(failures, 0);
        assert_eq!(seen, (1..=10).collect::<Vec<u64>>());
        assert!((sim.elapsed() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_pause_stops_elapsed_time() {
        let mut sim = default_sim();
        sim.tick().unwrap();
        assert!(sim.toggle_pause());
        let before = sim.snapshot();
        for _ in 0..5 {
            assert_eq!(sim.tick(), Ok(StepOutcome::Paused));
        }
        assert_eq!(sim.snapshot(), before);
        assert!(!sim.toggle_pause());
        sim.tick().unwrap();
        assert_eq!(sim.snapshot().steps, 2);
    }

    #[test]
    fn test_snapshot_round_trip_resumes_identically() {
        let mut uninterrupted = default_sim();
        for _ in 0..150 {
            uninterrupted.tick().unwrap();
        }
        let json = serde_json::to_string(&uninterrupted.snapshot()).unwrap();
        for _ in 0..150 {
            uninterrupted.tick().unwrap();
        }

        let snapshot: Snapshot = serde_json::from_str(&json).unwrap();
        let mut resumed = Simulation::restore(PendulumConfig::default(), snapshot, DEFAULT_DT).unwrap();
        for _ in 0..150 {
            resumed.tick().unwrap();
        }
        assert_eq!(resumed.snapshot(), uninterrupted.snapshot());
    }

    #[test]
    fn test_restore_conforms_state_to_new_config() {
        let mut original = default_sim();
        for _ in 0..50 {
            original.tick().unwrap();
        }
        let snapshot = original.snapshot();
        assert_eq!(snapshot.state.trail_1.len(), 50);

        let config = PendulumConfig::default().with_trail_capacity(5).with_origin(0.0, 0.0).unwrap();
        let mut restored = Simulation::restore(config.clone(), snapshot.clone(), DEFAULT_DT).unwrap();
        let state = restored.state();
        assert_eq!(state.angles(), snapshot.state.angles());
        assert_eq!(state.trail_1.capacity(), 5);
        assert_eq!(state.trail_1.to_vec(), snapshot.state.trail_1.to_vec()[45..].to_vec());
        assert_eq!(state.trail_2.len(), 5);
        let expected = crate::math::forward_kinematics(&config, state.theta_1, state.theta_2);
        assert_eq!(state.coordinates(), expected);

        restored.tick().unwrap();
        assert!(restored.state().trail_1.len() <= 5);
        assert!(restored.state().trail_2.len() <= 5);
    }

    #[test]
    fn test_batch_matches_manual_stepping() {
        let trajectory = solve_batch(PendulumConfig::default(), InitialConditions::default(), DEFAULT_DT, 200).unwrap();
        assert_eq!(trajectory.points.len(), 201);
        assert_eq!(trajectory.singular_at, None);

        let mut state = PendulumState::with_defaults(&trajectory.config);
        for _ in 0..200 {
            step(&mut state, &trajectory.config, DEFAULT_DT).unwrap();
        }
        assert_eq!(trajectory.final_state, state);
        let last = trajectory.points[200];
        assert_eq!(last.positions, [state.x_1, state.y_1, state.x_2, state.y_2]);
        assert!((last.time - 12.0).abs() < 1e-9);
        assert_eq!(trajectory.points[0].time, 0.0);
    }

    #[test]
    fn test_batch_rejects_bad_dt() {
        let result = solve_batch(PendulumConfig::default(), InitialConditions::default(), 0.0, 10);
        assert_eq!(result.err(), Some(ConfigError::InvalidTimeStep(0.0)));
    }

    #[test]
    fn test_batch_stops_recording_at_singular_tick() {
        let initial = InitialConditions::new(0.0, 1.0, f64::MAX, 0.0);
        let trajectory = solve_batch(PendulumConfig::default(), initial, DEFAULT_DT, 10).unwrap();
        assert_eq!(trajectory.singular_at, Some(1));
        assert_eq!(trajectory.points.len(), 1);
        assert_eq!(trajectory.final_state.omega_1, f64::MAX);
    }

    #[test]
    fn test_singular_tick_is_recorded_and_non_fatal() {
        let mut sim = Simulation::new(
            PendulumConfig::default(),
            InitialConditions::new(0.0, 1.0, f64::MAX, 0.0),
            DEFAULT_DT,
        )
        .unwrap();
        let failures = run_cooperative(&mut sim, 3, |_| {});
        assert_eq!(failures, 3);
        assert!(sim.last_error().is_some());
        assert_eq!(sim.snapshot().steps, 0);
    }

    #[tokio::test]
    async fn test_ticker_advances_and_stops() {
        let shared = SharedSimulation::new(default_sim());
        let handle = spawn_ticker(shared.clone(), Duration::from_millis(1));
        tokio::time::sleep(Duration::from_millis(50)).await;
        let ticks = handle.stop().await;
        assert!(ticks > 0);

        let after_stop = shared.snapshot();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(shared.snapshot(), after_stop);
        // Every snapshot is internally consistent.
        let expected = crate::math::forward_kinematics(&shared.config(), after_stop.state.theta_1, after_stop.state.theta_2);
        assert_eq!(after_stop.state.coordinates(), expected);
    }

    #[tokio::test]
    async fn test_ticker_respects_pause() {
        let shared = SharedSimulation::new(default_sim());
        shared.toggle_pause();
        let handle = spawn_ticker(shared.clone(), Duration::from_millis(1));
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.stop().await;
        assert_eq!(shared.snapshot().steps, 0);
    }
}
