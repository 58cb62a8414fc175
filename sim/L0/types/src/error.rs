//! Error types for simulation operations.

use thiserror::Error;

/// Errors that can occur while configuring or stepping a simulation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    /// No live body has this raw id.
    #[error("no body with id {0}")]
    InvalidBodyId(u64),

    /// No live constraint has this raw id.
    #[error("no constraint with id {0}")]
    InvalidConstraintId(u64),

    /// A body cannot be removed while constraints still reference it.
    #[error("body {body} is still referenced by {constraints} constraint(s)")]
    BodyInUse {
        /// The body that was to be removed.
        body: u64,
        /// Number of live constraints that reference it.
        constraints: usize,
    },

    /// Timestep that is zero, negative or not finite.
    #[error("timestep must be positive and finite, got {0}")]
    InvalidTimestep(f64),

    /// Joint limits outside `[-pi, 0] x [0, pi]`.
    #[error("invalid joint limits [{lower}, {upper}]: lower must lie in [-pi, 0] and upper in [0, pi]")]
    InvalidLimits {
        /// Requested lower limit (radians).
        lower: f64,
        /// Requested upper limit (radians).
        upper: f64,
    },

    /// A force or torque magnitude was negative.
    #[error("{what} must be non-negative, got {value}")]
    NegativeForce {
        /// Which quantity was rejected.
        what: &'static str,
        /// The offending value.
        value: f64,
    },

    /// Body state became non-finite.
    #[error("simulation diverged: {reason}")]
    Diverged {
        /// Which body and when.
        reason: String,
    },

    /// Out-of-range parameter or structurally invalid setup.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// The offending parameter and its value.
        reason: String,
    },

    /// Mass properties that cannot drive a dynamic body.
    #[error("invalid mass properties: {reason}")]
    InvalidMassProperties {
        /// Which property was rejected.
        reason: String,
    },
}

impl SimError {
    /// [`SimError::Diverged`] with a reason.
    #[must_use]
    pub fn diverged(reason: impl Into<String>) -> Self {
        Self::Diverged {
            reason: reason.into(),
        }
    }

    /// [`SimError::InvalidConfig`] with a reason.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// [`SimError::InvalidMassProperties`] with a reason.
    #[must_use]
    pub fn invalid_mass(reason: impl Into<String>) -> Self {
        Self::InvalidMassProperties {
            reason: reason.into(),
        }
    }

    /// Reject a negative force magnitude.
    ///
    /// Returns the value unchanged when it is finite and non-negative.
    pub fn check_force(what: &'static str, value: f64) -> crate::Result<f64> {
        if value.is_nan() || value < 0.0 {
            return Err(Self::NegativeForce { what, value });
        }
        Ok(value)
    }

    /// Raised by a tick that produced or met non-finite state.
    #[must_use]
    pub fn is_diverged(&self) -> bool {
        matches!(self, Self::Diverged { .. })
    }

    /// Raised synchronously while setting up bodies, joints or solver
    /// parameters.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. }
                | Self::InvalidLimits { .. }
                | Self::NegativeForce { .. }
                | Self::InvalidMassProperties { .. }
                | Self::InvalidTimestep(_)
        )
    }
}
