//! Angular joint limits.

use sim_types::{Result, SimError};
use std::f64::consts::PI;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Angular position limits about a joint axis.
///
/// The lower bound lies in `[-π, 0]` and the upper in `[0, π]`, so the zero
/// pose is always admissible and the acos-based angle measure never wraps.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AngleLimits {
    lower: f64,
    upper: f64,
}

impl AngleLimits {
    /// Create new limits.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidLimits`] if `lower` is outside `[-π, 0]` or
    /// `upper` is outside `[0, π]`.
    pub fn new(lower: f64, upper: f64) -> Result<Self> {
        if !(-PI..=0.0).contains(&lower) || !(0.0..=PI).contains(&upper) {
            return Err(SimError::InvalidLimits { lower, upper });
        }
        Ok(Self { lower, upper })
    }

    /// Create symmetric limits `[-bound, bound]`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidLimits`] unless `bound` is in `[0, π]`.
    pub fn symmetric(bound: f64) -> Result<Self> {
        Self::new(-bound, bound)
    }

    /// Get the lower limit.
    #[must_use]
    pub fn lower(&self) -> f64 {
        self.lower
    }

    /// Get the upper limit.
    #[must_use]
    pub fn upper(&self) -> f64 {
        self.upper
    }

    /// Get the range of motion.
    #[must_use]
    pub fn range(&self) -> f64 {
        self.upper - self.lower
    }

    /// Midpoint of the range.
    #[must_use]
    pub fn midpoint(&self) -> f64 {
        0.5 * (self.lower + self.upper)
    }

    /// Check if an angle is within limits.
    #[must_use]
    pub fn contains(&self, angle: f64) -> bool {
        angle >= self.lower && angle <= self.upper
    }

    /// Classify an angle against the limits with a shell tolerance.
    #[must_use]
    pub fn state(&self, angle: f64, shell: f64) -> LimitState {
        if self.range() <= 2.0 * shell {
            LimitState::Clamped
        } else if angle >= self.upper - shell {
            LimitState::AtUpper
        } else if angle <= self.lower + shell {
            LimitState::AtLower
        } else {
            LimitState::Free
        }
    }
}

/// Where a governed axis sits relative to its limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LimitState {
    /// Inside the range; only motor or friction act.
    #[default]
    Free,
    /// Within the shell of the lower limit.
    AtLower,
    /// Within the shell of the upper limit.
    AtUpper,
    /// Range narrower than the shell; axis held at the midpoint.
    Clamped,
}

impl LimitState {
    /// Check if a limit is active.
    #[must_use]
    pub fn is_limited(&self) -> bool {
        !matches!(self, Self::Free)
    }
}
