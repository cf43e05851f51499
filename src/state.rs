// src/state.rs
// The evolving state of one pendulum session: angles, angular velocities, the bob positions
// derived from them, a bounded trail per bob, and the pause flag.
// Positions are never set on their own; they are recomputed from the angles via
// math::forward_kinematics at construction and after every integration step.

use crate::config::{InitialConditions, PendulumConfig};
use crate::math::{forward_kinematics, PendulumMath};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Bounded FIFO of recent (x, y) positions. Oldest entry is evicted first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trail {
    capacity: usize,
    points: VecDeque<(f64, f64)>,
}

impl Trail {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            points: VecDeque::with_capacity(capacity),
        }
    }

    /// Appends a point, dropping from the front until the length is back within capacity.
    pub fn push(&mut self, point: (f64, f64)) {
        self.points.push_back(point);
        while self.points.len() > self.capacity {
            self.points.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Points in chronological order, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &(f64, f64)> + '_ {
        self.points.iter()
    }

    pub fn to_vec(&self) -> Vec<(f64, f64)> {
        self.points.iter().copied().collect()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Changes the capacity, keeping only the newest points that still fit.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        while self.points.len() > capacity {
            self.points.pop_front(); // Oldest first.
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendulumState {
    pub theta_1: f64, // Angle of rod 1 from vertical; accumulates, never wrapped.
    pub theta_2: f64,
    pub omega_1: f64,
    pub omega_2: f64,
    pub x_1: f64,
    pub y_1: f64,
    pub x_2: f64,
    pub y_2: f64,
    pub trail_1: Trail,
    pub trail_2: Trail,
    pub paused: bool,
}

impl PendulumState {
    /// Sets the initial angles and velocities, derives positions, starts with empty trails.
    pub fn initialize(config: &PendulumConfig, initial: InitialConditions) -> Self {
        let ((x_1, y_1), (x_2, y_2)) = forward_kinematics(config, initial.theta_1, initial.theta_2);
        Self {
            theta_1: initial.theta_1,
            theta_2: initial.theta_2,
            omega_1: initial.omega_1,
            omega_2: initial.omega_2,
            x_1,
            y_1,
            x_2,
            y_2,
            trail_1: Trail::new(config.trail_capacity),
            trail_2: Trail::new(config.trail_capacity),
            paused: false,
        }
    }

    /// Both rods horizontal (θ = π/2), at rest.
    pub fn with_defaults(config: &PendulumConfig) -> Self {
        Self::initialize(config, InitialConditions::default())
    }

    pub fn coordinates(&self) -> ((f64, f64), (f64, f64)) {
        ((self.x_1, self.y_1), (self.x_2, self.y_2))
    }

    pub fn angles(&self) -> (f64, f64) {
        (self.theta_1, self.theta_2)
    }

    pub fn angular_velocities(&self) -> (f64, f64) {
        (self.omega_1, self.omega_2)
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    /// Recomputes x/y of both bobs from the current angles.
    pub fn refresh_coordinates(&mut self, config: &PendulumConfig) {
        let ((x_1, y_1), (x_2, y_2)) = forward_kinematics(config, self.theta_1, self.theta_2);
        self.x_1 = x_1;
        self.y_1 = y_1;
        self.x_2 = x_2;
        self.y_2 = y_2;
    }

    /// Brings a state produced under another config (e.g. a deserialized snapshot) back in line
    /// with `config`: positions recomputed from the angles, trails re-capped.
    pub fn conform_to(&mut self, config: &PendulumConfig) {
        self.refresh_coordinates(config);
        self.trail_1.set_capacity(config.trail_capacity);
        self.trail_2.set_capacity(config.trail_capacity);
    }

    /// Pushes the current bob positions onto their trails.
    pub fn record_trail(&mut self) {
        self.trail_1.push((self.x_1, self.y_1));
        self.trail_2.push((self.x_2, self.y_2));
    }

    pub fn total_energy(&self, config: &PendulumConfig) -> f64 {
        PendulumMath::new(config, self.angles(), self.angular_velocities()).total_energy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_satisfies_forward_kinematics() {
        let config = PendulumConfig::default();
        let initial = InitialConditions::new(0.3, -1.1, 0.5, 0.0);
        let state = PendulumState::initialize(&config, initial);
        let ((x1, y1), (x2, y2)) = state.coordinates();
        assert!((x1 - (300.0 + 120.0 * 0.3_f64.sin())).abs() < 1e-9);
        assert!((y1 - (100.0 + 120.0 * 0.3_f64.cos())).abs() < 1e-9);
        assert!((x2 - (x1 + 120.0 * (-1.1_f64).sin())).abs() < 1e-9);
        assert!((y2 - (y1 + 120.0 * (-1.1_f64).cos())).abs() < 1e-9);
        assert!(state.trail_1.is_empty() && state.trail_2.is_empty());
        assert!(!state.is_paused());
    }

    #[test]
    fn test_default_initial_conditions() {
        let state = PendulumState::with_defaults(&PendulumConfig::default());
        assert_eq!(state.angles(), (std::f64::consts::FRAC_PI_2, std::f64::consts::FRAC_PI_2));
        assert_eq!(state.angular_velocities(), (0.0, 0.0));
    }

    #[test]
    fn test_trail_keeps_most_recent_in_order() {
        let mut trail = Trail::new(3);
        for i in 0..10 {
            trail.push((i as f64, -(i as f64)));
            assert!(trail.len() <= 3);
        }
        assert_eq!(trail.to_vec(), vec![(7.0, -7.0), (8.0, -8.0), (9.0, -9.0)]);
    }

    #[test]
    fn test_zero_capacity_trail_stays_empty() {
        let mut trail = Trail::new(0);
        trail.push((1.0, 1.0));
        assert!(trail.is_empty());
    }

    #[test]
    fn test_record_trail_respects_capacity() {
        let config = PendulumConfig::default().with_trail_capacity(5);
        let mut state = PendulumState::with_defaults(&config);
        for _ in 0..12 {
            state.record_trail();
        }
        assert_eq!(state.trail_1.len(), 5);
        assert_eq!(state.trail_2.len(), 5);
        assert_eq!(state.trail_2.iter().last(), Some(&(state.x_2, state.y_2)));
    }

    #[test]
    fn test_set_capacity_keeps_newest() {
        let mut trail = Trail::new(10);
        for i in 0..8 {
            trail.push((i as f64, 0.0));
        }
        trail.set_capacity(3);
        assert_eq!(trail.capacity(), 3);
        assert_eq!(trail.to_vec(), vec![(5.0, 0.0), (6.0, 0.0), (7.0, 0.0)]);
        trail.push((8.0, 0.0));
        assert_eq!(trail.len(), 3);
    }

    #[test]
    fn test_toggle_pause_twice_restores() {
        let mut state = PendulumState::with_defaults(&PendulumConfig::default());
        let before = state.clone();
        state.toggle_pause();
        assert!(state.is_paused());
        state.toggle_pause();
        assert_eq!(state, before);
    }
}
