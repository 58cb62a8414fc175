//! Configuration types for simulation.
//!
//! [`SimulationConfig`] controls the outer loop (timestep, gravity, velocity
//! caps); [`StabilizationConfig`] holds the constraint-level knobs that every
//! producer and solver reads (Baumgarte factor, warm starting, limit shell,
//! contact slop).

use crate::dynamics::Gravity;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Main configuration for a simulation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimulationConfig {
    /// Fixed timestep for physics integration (seconds).
    pub timestep: f64,
    /// Gravity configuration.
    pub gravity: Gravity,
    /// Constraint stabilization settings.
    pub stabilization: StabilizationConfig,
    /// Linear speed cap applied after solving (m/s, `INFINITY` disables).
    pub max_linear_velocity: f64,
    /// Angular speed cap applied after solving (rad/s, `INFINITY` disables).
    pub max_angular_velocity: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            timestep: 1.0 / 240.0,
            gravity: Gravity::earth(),
            stabilization: StabilizationConfig::default(),
            max_linear_velocity: f64::INFINITY,
            max_angular_velocity: f64::INFINITY,
        }
    }
}

impl SimulationConfig {
    /// Create a new simulation config with the given timestep.
    #[must_use]
    pub fn with_timestep(timestep: f64) -> Self {
        Self {
            timestep,
            ..Default::default()
        }
    }

    /// Create a configuration for real-time simulation (60 Hz).
    #[must_use]
    pub fn realtime() -> Self {
        Self {
            timestep: 1.0 / 60.0,
            max_linear_velocity: 100.0,
            max_angular_velocity: 100.0,
            ..Default::default()
        }
    }

    /// Create a configuration for high-fidelity simulation (1000 Hz).
    #[must_use]
    pub fn high_fidelity() -> Self {
        Self {
            timestep: 1.0 / 1000.0,
            stabilization: StabilizationConfig::stiff(),
            ..Default::default()
        }
    }

    /// Set the gravity.
    #[must_use]
    pub fn gravity(mut self, gravity: Gravity) -> Self {
        self.gravity = gravity;
        self
    }

    /// Disable gravity (zero-G environment).
    #[must_use]
    pub fn zero_gravity(mut self) -> Self {
        self.gravity = Gravity::zero();
        self
    }

    /// Set the stabilization configuration.
    #[must_use]
    pub fn stabilization(mut self, stabilization: StabilizationConfig) -> Self {
        self.stabilization = stabilization;
        self
    }

    /// Cap linear and angular speeds.
    #[must_use]
    pub fn velocity_limits(mut self, linear: f64, angular: f64) -> Self {
        self.max_linear_velocity = linear;
        self.max_angular_velocity = angular;
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidTimestep`](crate::SimError::InvalidTimestep)
    /// if the timestep is not positive and finite, or
    /// [`SimError::InvalidConfig`](crate::SimError::InvalidConfig) if the
    /// timestep exceeds one second, gravity is not finite, a velocity limit
    /// is not positive, or the stabilization settings are out of range.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.timestep.is_finite() || self.timestep <= 0.0 {
            return Err(crate::SimError::InvalidTimestep(self.timestep));
        }

        if self.timestep > 1.0 {
            return Err(crate::SimError::invalid_config(
                "timestep > 1 second is likely an error",
            ));
        }

        if !self.gravity.acceleration.iter().all(|x| x.is_finite()) {
            return Err(crate::SimError::invalid_config("gravity must be finite"));
        }

        if self.max_linear_velocity.is_nan() || self.max_linear_velocity <= 0.0 {
            return Err(crate::SimError::invalid_config(
                "max_linear_velocity must be positive",
            ));
        }

        if self.max_angular_velocity.is_nan() || self.max_angular_velocity <= 0.0 {
            return Err(crate::SimError::invalid_config(
                "max_angular_velocity must be positive",
            ));
        }

        self.stabilization.validate()
    }

    /// Get the frequency in Hz.
    #[must_use]
    pub fn frequency(&self) -> f64 {
        1.0 / self.timestep
    }
}

/// Constraint stabilization and warm-start settings.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StabilizationConfig {
    /// Baumgarte factor `Kcor` in (0, 1]: fraction of positional drift
    /// corrected per step.
    pub baumgarte: f64,
    /// Cap on the Baumgarte correction velocity (m/s or rad/s).
    pub max_correction_velocity: f64,
    /// Seed each step's multipliers from the previous step.
    pub warm_starting: bool,
    /// Scale applied to warm-start multipliers, in [0, 1].
    pub warm_start_factor: f64,
    /// Angular margin inside a joint limit where the limit already acts (rad).
    pub limit_shell: f64,
    /// Penetration tolerated before contacts push back (m).
    pub contact_slop: f64,
    /// Closing speed below which restitution is ignored (m/s).
    pub restitution_threshold: f64,
    /// Constraint force mixing added to every row's diagonal.
    pub cfm: f64,
    /// Passes of joint position projection after each position update
    /// (0 disables it).
    pub position_iterations: usize,
    /// Joint error below which position projection stops (m or rad).
    pub position_tolerance: f64,
}

impl Default for StabilizationConfig {
    fn default() -> Self {
        Self {
            baumgarte: 0.2,
            max_correction_velocity: f64::INFINITY,
            warm_starting: true,
            warm_start_factor: 0.9,
            limit_shell: 0.01,
            contact_slop: 0.005,
            restitution_threshold: 0.5,
            cfm: 1e-9,
            position_iterations: 4,
            position_tolerance: 1e-6,
        }
    }
}

impl StabilizationConfig {
    /// Aggressive drift correction for small timesteps.
    #[must_use]
    pub fn stiff() -> Self {
        Self {
            baumgarte: 0.5,
            warm_start_factor: 1.0,
            limit_shell: 0.005,
            contact_slop: 0.001,
            position_iterations: 8,
            position_tolerance: 1e-8,
            ..Default::default()
        }
    }

    /// Gentle correction that avoids energy injection during interactive
    /// manipulation.
    #[must_use]
    pub fn soft() -> Self {
        Self {
            baumgarte: 0.1,
            max_correction_velocity: 1.0,
            warm_start_factor: 0.8,
            cfm: 1e-6,
            position_iterations: 2,
            position_tolerance: 1e-4,
            ..Default::default()
        }
    }

    /// Set the Baumgarte factor.
    #[must_use]
    pub const fn with_baumgarte(mut self, baumgarte: f64) -> Self {
        self.baumgarte = baumgarte;
        self
    }

    /// Enable or disable warm starting.
    #[must_use]
    pub const fn with_warm_starting(mut self, enabled: bool) -> Self {
        self.warm_starting = enabled;
        self
    }

    /// Set the joint limit shell tolerance.
    #[must_use]
    pub const fn with_limit_shell(mut self, shell: f64) -> Self {
        self.limit_shell = shell;
        self
    }

    /// Set the correction velocity cap.
    #[must_use]
    pub const fn with_max_correction_velocity(mut self, cap: f64) -> Self {
        self.max_correction_velocity = cap;
        self
    }

    /// Set the joint position projection passes and stopping tolerance.
    #[must_use]
    pub const fn with_position_projection(mut self, iterations: usize, tolerance: f64) -> Self {
        self.position_iterations = iterations;
        self.position_tolerance = tolerance;
        self
    }

    /// Effective warm-start scale (0 when warm starting is off).
    #[must_use]
    pub fn warm_start_scale(&self) -> f64 {
        if self.warm_starting {
            self.warm_start_factor
        } else {
            0.0
        }
    }

    /// Baumgarte correction velocity for a positional error, capped.
    ///
    /// Returns `-Kcor * error / dt` clamped to `±max_correction_velocity`.
    #[must_use]
    pub fn correction(&self, error: f64, dt: f64) -> f64 {
        let v = -self.baumgarte * error / dt;
        v.clamp(-self.max_correction_velocity, self.max_correction_velocity)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`](crate::SimError::InvalidConfig)
    /// naming the first setting that is out of range.
    pub fn validate(&self) -> crate::Result<()> {
        if !(self.baumgarte > 0.0 && self.baumgarte <= 1.0) {
            return Err(crate::SimError::invalid_config(
                "baumgarte must be in (0, 1]",
            ));
        }
        if self.max_correction_velocity.is_nan() || self.max_correction_velocity <= 0.0 {
            return Err(crate::SimError::invalid_config(
                "max_correction_velocity must be positive",
            ));
        }
        if !(0.0..=1.0).contains(&self.warm_start_factor) {
            return Err(crate::SimError::invalid_config(
                "warm_start_factor must be in [0, 1]",
            ));
        }
        if !self.limit_shell.is_finite() || self.limit_shell < 0.0 {
            return Err(crate::SimError::invalid_config(
                "limit_shell must be finite and non-negative",
            ));
        }
        if !self.contact_slop.is_finite() || self.contact_slop < 0.0 {
            return Err(crate::SimError::invalid_config(
                "contact_slop must be finite and non-negative",
            ));
        }
        if self.restitution_threshold.is_nan() || self.restitution_threshold < 0.0 {
            return Err(crate::SimError::invalid_config(
                "restitution_threshold must be non-negative",
            ));
        }
        if !self.cfm.is_finite() || self.cfm < 0.0 {
            return Err(crate::SimError::invalid_config(
                "cfm must be finite and non-negative",
            ));
        }
        if !self.position_tolerance.is_finite() || self.position_tolerance <= 0.0 {
            return Err(crate::SimError::invalid_config(
                "position_tolerance must be finite and positive",
            ));
        }
        Ok(())
    }
}
