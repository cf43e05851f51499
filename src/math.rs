// src/math.rs
// Closed-form Lagrangian equations of motion for the two-link, two-mass pendulum.
// PendulumMath captures the parameters plus one instantaneous (θ, ω) snapshot and exposes the
// terms the integrator needs: the two denominators, the two angular accelerations, and the
// mechanical energy used to check integration drift.
// Convention: angles from the downward vertical, y grows downward (screen space), bob 2 hangs
// from bob 1, not from the origin.

use crate::config::PendulumConfig;

/// Bob positions derived from the two angles: ((x1, y1), (x2, y2)).
pub fn forward_kinematics(config: &PendulumConfig, theta_1: f64, theta_2: f64) -> ((f64, f64), (f64, f64)) {
    let x_1 = config.origin_x + config.length_rod_1 * theta_1.sin(); // sin: horizontal offset from the pivot.
    let y_1 = config.origin_y + config.length_rod_1 * theta_1.cos(); // cos: downward, since screen y grows down.
    let x_2 = x_1 + config.length_rod_2 * theta_2.sin(); // Bob 2 hangs from bob 1.
    let y_2 = y_1 + config.length_rod_2 * theta_2.cos();
    ((x_1, y_1), (x_2, y_2))
}

/// Parameters plus a single (θ1, θ2, ω1, ω2) snapshot.
pub struct PendulumMath<'a> {
    pub config: &'a PendulumConfig,
    pub angles: (f64, f64),   // (θ1, θ2) in radians.
    pub ang_vels: (f64, f64), // (ω1, ω2) in radians/second.
}

impl<'a> PendulumMath<'a> {
    pub fn new(config: &'a PendulumConfig, angles: (f64, f64), ang_vels: (f64, f64)) -> Self {
        Self {
            config,
            angles,
            ang_vels,
        }
    }

    /// Δ = θ2 − θ1.
    pub fn delta(&self) -> f64 {
        self.angles.1 - self.angles.0
    }

    /// denom1 = (m1+m2)·L1 − m2·L1·cos²Δ and denom2 = (L2/L1)·denom1.
    /// Only reach zero when m1 does; with a validated config a non-finite step comes from
    /// overflowing velocities instead. The caller checks the result either way.
    pub fn denominators(&self) -> (f64, f64) {
        let c = self.config;
        let cos_delta = self.delta().cos();
        let denom_1 = c.total_mass() * c.length_rod_1 - c.mass_bob_2 * c.length_rod_1 * cos_delta * cos_delta; // L1·(m1 + m2·sin²Δ) > 0 for positive masses.
        let denom_2 = (c.length_rod_2 / c.length_rod_1) * denom_1; // Same factor rescaled to rod 2.
        (denom_1, denom_2)
    }

    /// Angular accelerations (α1, α2) at the current snapshot.
    pub fn accelerations(&self) -> (f64, f64) {
        let c = self.config;
        let (theta_1, theta_2) = self.angles;
        let (omega_1, omega_2) = self.ang_vels;
        let (sin_d, cos_d) = self.delta().sin_cos(); // Coupling terms depend only on Δ.
        let (denom_1, denom_2) = self.denominators();
        let m2 = c.mass_bob_2;
        let m12 = c.total_mass(); // m1 + m2.

        let accel_1 = (m2 * c.length_rod_1 * omega_1 * omega_1 * sin_d * cos_d // Centripetal, rod 1 seen through Δ.
            + m2 * c.g * theta_2.sin() * cos_d // Gravity on bob 2, projected onto rod 1.
            + m2 * c.length_rod_2 * omega_2 * omega_2 * sin_d // Centripetal pull of bob 2.
            - m12 * c.g * theta_1.sin()) // Gravity restoring rod 1.
            / denom_1;

        let accel_2 = (-m2 * c.length_rod_2 * omega_2 * omega_2 * sin_d * cos_d
            + m12 * c.g * theta_1.sin() * cos_d
            - m12 * c.length_rod_1 * omega_1 * omega_1 * sin_d
            - m12 * c.g * theta_2.sin()) // Gravity restoring rod 2.
            / denom_2;

        (accel_1, accel_2)
    }

    /// T = ½(m1+m2)L1²ω1² + ½m2L2²ω2² + m2L1L2ω1ω2cos(θ1−θ2).
    pub fn kinetic_energy(&self) -> f64 {
        let c = self.config;
        let (omega_1, omega_2) = self.ang_vels;
        let (l1, l2) = (c.length_rod_1, c.length_rod_2);
        0.5 * c.total_mass() * l1 * l1 * omega_1 * omega_1
            + 0.5 * c.mass_bob_2 * l2 * l2 * omega_2 * omega_2
            + c.mass_bob_2 * l1 * l2 * omega_1 * omega_2 * self.delta().cos()
    }

    /// V = −(m1+m2)gL1cosθ1 − m2gL2cosθ2, zero at the pivot height.
    pub fn potential_energy(&self) -> f64 {
        let c = self.config;
        let (theta_1, theta_2) = self.angles;
        -c.total_mass() * c.g * c.length_rod_1 * theta_1.cos() - c.mass_bob_2 * c.g * c.length_rod_2 * theta_2.cos()
    }

    pub fn total_energy(&self) -> f64 {
        self.kinetic_energy() + self.potential_energy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_forward_kinematics_hanging_straight_down() {
        let config = PendulumConfig::default();
        let ((x1, y1), (x2, y2)) = forward_kinematics(&config, 0.0, 0.0);
        assert_eq!((x1, y1), (300.0, 220.0));
        assert_eq!((x2, y2), (300.0, 340.0));
    }

    #[test]
    fn test_forward_kinematics_chains_second_bob() {
        let config = PendulumConfig::default();
        let ((x1, y1), (x2, y2)) = forward_kinematics(&config, FRAC_PI_2, PI);
        assert!((x1 - 420.0).abs() < 1e-9);
        assert!((y1 - 100.0).abs() < 1e-9);
        // Bob 2 points straight up from bob 1.
        assert!((x2 - 420.0).abs() < 1e-9);
        assert!((y2 + 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_accelerations_horizontal_start() {
        let config = PendulumConfig::default();
        let math = PendulumMath::new(&config, (FRAC_PI_2, FRAC_PI_2), (0.0, 0.0));
        let (denom_1, denom_2) = math.denominators();
        assert!((denom_1 - 1200.0).abs() < 1e-9);
        assert!((denom_2 - 1200.0).abs() < 1e-9);
        let (a1, a2) = math.accelerations();
        assert!((a1 + 0.08175).abs() < 1e-12, "a1 = {}", a1);
        assert!(a2.abs() < 1e-12, "a2 = {}", a2);
    }

    #[test]
    fn test_equilibrium_has_no_acceleration() {
        let config = PendulumConfig::default();
        let (a1, a2) = PendulumMath::new(&config, (0.0, 0.0), (0.0, 0.0)).accelerations();
        assert_eq!(a1, 0.0);
        assert_eq!(a2, 0.0);
    }

    #[test]
    fn test_energy_at_rest() {
        let config = PendulumConfig::default();
        let math = PendulumMath::new(&config, (0.0, 0.0), (0.0, 0.0));
        assert_eq!(math.kinetic_energy(), 0.0);
        // −(20·9.81·120) − (10·9.81·120)
        assert!((math.potential_energy() + 35316.0).abs() < 1e-9);
    }
}
