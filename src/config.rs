// src/config.rs
// Typed configuration for the double pendulum: fixed geometry/mass/gravity (PendulumConfig),
// the initial angles and velocities (InitialConditions), the text-form boundary that turns
// user-entered fields into those structs (ParamForm), and the server settings read from the
// environment (ServerSettings).
// Geometry is in render-space units (pixels); angles in radians from the downward vertical.

use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_ORIGIN: (f64, f64) = (300.0, 100.0);
pub const DEFAULT_LENGTH: f64 = 120.0;
pub const DEFAULT_MASS: f64 = 10.0;
pub const DEFAULT_GRAVITY: f64 = 9.81;
pub const DEFAULT_THETA: f64 = FRAC_PI_2;
pub const DEFAULT_OMEGA: f64 = 0.0;
pub const DEFAULT_TRAIL_CAPACITY: usize = 400;

/// Rejected configuration. Raised at construction, before any stepping happens.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{name} must be a finite positive number, got {value}")]
    NonPositive { name: &'static str, value: f64 },
    #[error("{name} must be finite, got {value}")]
    NonFinite { name: &'static str, value: f64 },
    #[error("time step must be a finite positive number of seconds, got {0}")]
    InvalidTimeStep(f64),
}

/// Fixed parameters of the pendulum. Immutable once validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendulumConfig {
    pub origin_x: f64,
    pub origin_y: f64,
    pub length_rod_1: f64,
    pub length_rod_2: f64,
    pub mass_bob_1: f64,
    pub mass_bob_2: f64,
    pub g: f64, // Gravitational acceleration.
    pub trail_capacity: usize,
}

impl Default for PendulumConfig {
    fn default() -> Self {
        Self {
            origin_x: DEFAULT_ORIGIN.0,
            origin_y: DEFAULT_ORIGIN.1,
            length_rod_1: DEFAULT_LENGTH,
            length_rod_2: DEFAULT_LENGTH,
            mass_bob_1: DEFAULT_MASS,
            mass_bob_2: DEFAULT_MASS,
            g: DEFAULT_GRAVITY,
            trail_capacity: DEFAULT_TRAIL_CAPACITY,
        }
    }
}

impl PendulumConfig {
    /// Builds a validated config with the default origin, gravity and trail capacity.
    pub fn new(
        length_rod_1: f64,
        length_rod_2: f64,
        mass_bob_1: f64,
        mass_bob_2: f64,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            length_rod_1,
            length_rod_2,
            mass_bob_1,
            mass_bob_2,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_origin(mut self, origin_x: f64, origin_y: f64) -> Result<Self, ConfigError> {
        self.origin_x = origin_x;
        self.origin_y = origin_y;
        self.validate()?;
        Ok(self)
    }

    pub fn with_gravity(mut self, g: f64) -> Result<Self, ConfigError> {
        self.g = g;
        self.validate()?;
        Ok(self)
    }

    pub fn with_trail_capacity(mut self, trail_capacity: usize) -> Self {
        self.trail_capacity = trail_capacity;
        self
    }

    /// Checks L1, L2, m1, m2, g > 0 and a finite origin.
    /// Deserialized configs bypass `new`, so callers holding one must run this before stepping.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("length_rod_1", self.length_rod_1),
            ("length_rod_2", self.length_rod_2),
            ("mass_bob_1", self.mass_bob_1),
            ("mass_bob_2", self.mass_bob_2),
            ("g", self.g),
        ];
        for (name, value) in positive {
            // `!(value > 0.0)` also catches NaN.
            if !value.is_finite() || !(value > 0.0) {
                return Err(ConfigError::NonPositive { name, value });
            }
        }
        for (name, value) in [("origin_x", self.origin_x), ("origin_y", self.origin_y)] {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { name, value });
            }
        }
        Ok(())
    }

    /// Total mass m1 + m2, which shows up in nearly every term of the equations of motion.
    pub fn total_mass(&self) -> f64 {
        self.mass_bob_1 + self.mass_bob_2
    }
}

/// Starting angles (radians) and angular velocities (radians/second).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InitialConditions {
    pub theta_1: f64,
    pub theta_2: f64,
    pub omega_1: f64,
    pub omega_2: f64,
}

impl Default for InitialConditions {
    fn default() -> Self {
        Self {
            theta_1: DEFAULT_THETA,
            theta_2: DEFAULT_THETA,
            omega_1: DEFAULT_OMEGA,
            omega_2: DEFAULT_OMEGA,
        }
    }
}

impl InitialConditions {
    pub fn new(theta_1: f64, theta_2: f64, omega_1: f64, omega_2: f64) -> Self {
        Self {
            theta_1,
            theta_2,
            omega_1,
            omega_2,
        }
    }
}

/// Raw text fields from a parameter-entry form. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParamForm {
    #[serde(default)]
    pub mass1: Option<String>,
    #[serde(default)]
    pub mass2: Option<String>,
    #[serde(default)]
    pub theta1: Option<String>,
    #[serde(default)]
    pub theta2: Option<String>,
    #[serde(default)]
    pub omega1: Option<String>,
    #[serde(default)]
    pub omega2: Option<String>,
}

/// Parses one form field; blank, missing or unparseable text falls back to `default`.
fn field_or_default(name: &str, raw: Option<&str>, default: f64) -> f64 {
    let Some(text) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return default;
    };
    match text.parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => {
            warn!(field = name, input = text, default, "unparseable parameter, using default");
            default
        }
    }
}

impl ParamForm {
    /// Translates the form into a validated config plus initial conditions.
    /// Parse failures never surface; a parsed mass that is not positive does.
    pub fn resolve(&self) -> Result<(PendulumConfig, InitialConditions), ConfigError> {
        let mass_bob_1 = field_or_default("mass1", self.mass1.as_deref(), DEFAULT_MASS);
        let mass_bob_2 = field_or_default("mass2", self.mass2.as_deref(), DEFAULT_MASS);
        let config = PendulumConfig::new(DEFAULT_LENGTH, DEFAULT_LENGTH, mass_bob_1, mass_bob_2)?;
        let initial = InitialConditions {
            theta_1: field_or_default("theta1", self.theta1.as_deref(), DEFAULT_THETA),
            theta_2: field_or_default("theta2", self.theta2.as_deref(), DEFAULT_THETA),
            omega_1: field_or_default("omega1", self.omega1.as_deref(), DEFAULT_OMEGA),
            omega_2: field_or_default("omega2", self.omega2.as_deref(), DEFAULT_OMEGA),
        };
        Ok((config, initial))
    }
}

/// Process-level settings for the HTTP front end.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    pub bind: String,
    pub static_dir: String,
    pub tick_hz: u32,
    pub log_level: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            static_dir: "./static".to_string(),
            tick_hz: 100,
            log_level: "info".to_string(),
        }
    }
}

impl ServerSettings {
    /// Reads `PENDULUM_BIND`, `PENDULUM_STATIC_DIR`, `PENDULUM_TICK_HZ` and `PENDULUM_LOG`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` but with an injectable lookup, so tests don't touch the process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let tick_hz = match lookup("PENDULUM_TICK_HZ") {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(hz) if hz > 0 => hz,
                _ => {
                    warn!(input = raw.as_str(), "invalid PENDULUM_TICK_HZ, using default");
                    defaults.tick_hz
                }
            },
            None => defaults.tick_hz,
        };
        Self {
            bind: lookup("PENDULUM_BIND").unwrap_or(defaults.bind),
            static_dir: lookup("PENDULUM_STATIC_DIR").unwrap_or(defaults.static_dir),
            tick_hz,
            log_level: lookup("PENDULUM_LOG").unwrap_or(defaults.log_level),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PendulumConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.length_rod_1, 120.0);
        assert_eq!(config.g, 9.81);
        assert_eq!(config.total_mass(), 20.0);
    }

    #[test]
    fn test_rejects_non_positive_parameters() {
        assert_eq!(
            PendulumConfig::new(0.0, 120.0, 10.0, 10.0),
            Err(ConfigError::NonPositive { name: "length_rod_1", value: 0.0 })
        );
        assert!(matches!(
            PendulumConfig::new(120.0, 120.0, 10.0, -1.0),
            Err(ConfigError::NonPositive { name: "mass_bob_2", .. })
        ));
        assert!(PendulumConfig::default().with_gravity(f64::NAN).is_err());
        assert!(PendulumConfig::default().with_origin(f64::INFINITY, 0.0).is_err());
    }

    #[test]
    fn test_error_message_is_descriptive() {
        let err = PendulumConfig::new(120.0, 120.0, 0.0, 10.0).unwrap_err();
        assert_eq!(err.to_string(), "mass_bob_1 must be a finite positive number, got 0");
    }

    #[test]
    fn test_form_falls_back_to_defaults() {
        let form = ParamForm {
            mass1: Some("abc".to_string()),
            mass2: Some("  ".to_string()),
            theta1: Some("0.5".to_string()),
            theta2: None,
            omega1: Some("1e400".to_string()), // Overflows to infinity.
            omega2: Some("-2".to_string()),
        };
        let (config, initial) = form.resolve().unwrap();
        assert_eq!(config.mass_bob_1, DEFAULT_MASS);
        assert_eq!(config.mass_bob_2, DEFAULT_MASS);
        assert_eq!(initial.theta_1, 0.5);
        assert_eq!(initial.theta_2, DEFAULT_THETA);
        assert_eq!(initial.omega_1, DEFAULT_OMEGA);
        assert_eq!(initial.omega_2, -2.0);
    }

    #[test]
    fn test_form_rejects_parsed_negative_mass() {
        let form = ParamForm {
            mass2: Some("-5".to_string()),
            ..ParamForm::default()
        };
        assert!(form.resolve().is_err());
    }

    #[test]
    fn test_server_settings_lookup() {
        let settings = ServerSettings::from_lookup(|key| match key {
            "PENDULUM_BIND" => Some("0.0.0.0:9000".to_string()),
            "PENDULUM_TICK_HZ" => Some("zero".to_string()),
            _ => None,
        });
        assert_eq!(settings.bind, "0.0.0.0:9000");
        assert_eq!(settings.tick_hz, 100);
        assert_eq!(settings.static_dir, "./static");
    }
}
