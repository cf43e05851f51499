// src/logic.rs
// Fixed-step integration of the double pendulum.
// `step` advances one PendulumState by dt with semi-implicit Euler: velocities are updated
// from accelerations evaluated at the pre-update angles, then angles are updated from the
// just-updated velocities. The ordering is what reproduces reference trajectories; do not
// swap it for explicit Euler or RK4.
// Batch runs are sequenced by driver::solve_batch on top of this.

use crate::config::PendulumConfig;
use crate::math::PendulumMath;
use crate::state::PendulumState;
use thiserror::Error;

/// Seconds per integration call. Large on purpose: it keeps the animation lively.
pub const DEFAULT_DT: f64 = 0.06;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Advanced,
    Paused,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntegrationError {
    /// An equation-of-motion denominator hit zero (or the values overflowed).
    /// The state is left at its last finite values.
    #[error("singular configuration at theta1={theta_1}, theta2={theta_2}: denominators ({denom_1}, {denom_2})")]
    SingularConfiguration {
        theta_1: f64,
        theta_2: f64,
        denom_1: f64,
        denom_2: f64,
    },
}

/// Advances `state` by one time step.
///
/// A paused state is returned untouched. When the step would produce a non-finite angle or
/// velocity nothing is written and `SingularConfiguration` is returned; the caller may keep
/// ticking, the state simply stays frozen at the last good values.
pub fn step(state: &mut PendulumState, config: &PendulumConfig, dt: f64) -> Result<StepOutcome, IntegrationError> {
    if state.paused {
        return Ok(StepOutcome::Paused); // No recomputation either; trails stay as they are.
    }

    let math = PendulumMath::new(config, state.angles(), state.angular_velocities()); // Pre-update snapshot.
    let (accel_1, accel_2) = math.accelerations(); // α from the old angles and old ω.

    let omega_1 = state.omega_1 + accel_1 * dt; // ω ← ω + α·dt.
    let omega_2 = state.omega_2 + accel_2 * dt;
    let theta_1 = state.theta_1 + omega_1 * dt; // θ ← θ + ω_new·dt (semi-implicit, not explicit Euler).
    let theta_2 = state.theta_2 + omega_2 * dt; // No wrapping to [0, 2π).

    // A zero denominator (or overflow) shows up as inf/NaN here; nothing has been written yet.
    if ![omega_1, omega_2, theta_1, theta_2].iter().all(|v| v.is_finite()) {
        let (denom_1, denom_2) = math.denominators();
        return Err(IntegrationError::SingularConfiguration {
            theta_1: state.theta_1,
            theta_2: state.theta_2,
            denom_1,
            denom_2,
        });
    }

    state.omega_1 = omega_1;
    state.omega_2 = omega_2;
    state.theta_1 = theta_1;
    state.theta_2 = theta_2;
    state.refresh_coordinates(config); // x/y always derived, never stored independently.
    state.record_trail(); // One push per advanced step.
    Ok(StepOutcome::Advanced)
}
