//! # double-pendulum-sim
//!
//! Real-time simulation of a two-link, two-mass pendulum under gravity.
//!
//! The physics core is small: [`state::PendulumState`] holds the angles, angular velocities,
//! derived bob positions and bounded trails, and [`logic::step`] advances it with
//! semi-implicit Euler using the closed-form Lagrangian equations in [`math`].
//! [`driver`] sequences ticks and observers, [`plot`] records and draws θ/ω time series and the bobs' x-y path, and
//! [`ui`] serves everything over HTTP.

pub mod config;
pub mod driver;
pub mod logic;
pub mod math;
pub mod plot;
pub mod state;
pub mod ui;

pub use config::{ConfigError, InitialConditions, ParamForm, PendulumConfig, ServerSettings};
pub use driver::{
    run_cooperative, solve_batch, spawn_ticker, SharedSimulation, Simulation, Snapshot, TickerHandle, Trajectory,
    TrajectoryPoint,
};
pub use logic::{step, IntegrationError, StepOutcome, DEFAULT_DT};
pub use math::{forward_kinematics, PendulumMath};
pub use plot::{render, render_time_series_png, render_trajectory_png, PlotKind, Sample, TimeSeriesRecorder};
pub use state::{PendulumState, Trail};
