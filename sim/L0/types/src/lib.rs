//! Core types for constraint-based rigid-body simulation.
//!
//! This crate provides the foundational data shared by the solver and the
//! engine:
//!
//! - [`BodyId`] / [`ConstraintId`] - Stable handles into the world's arenas
//! - [`Pose`] / [`Twist`] - Where a body is and how it moves
//! - [`MassProperties`] / [`MassPropertySource`] - How a body resists motion
//! - [`SimulationConfig`] / [`StabilizationConfig`] - Timestep and solver knobs
//! - [`SimError`] - Everything that can be rejected or go wrong
//!
//! # Layer 0
//!
//! These types are pure data with no physics. They have no engine or
//! renderer dependencies and can be used from headless tools.
//!
//! # Example
//!
//! ```
//! use sim_types::{MassProperties, MassPropertySource, Shape};
//!
//! let sphere = Shape::Sphere { mass: 1.0, radius: 0.5 };
//! let props = sphere.mass_properties();
//! assert!(props.validate_dynamic().is_ok());
//! assert_eq!(props.inverse_mass(), 1.0);
//! ```

#![doc(html_root_url = "https://docs.rs/sim-types/0.7.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
    clippy::missing_errors_doc,        // Error docs added where non-obvious
)]

mod body;
mod config;
mod dynamics;
mod error;
mod id;

pub use body::{MassProperties, MassPropertySource, Pose, Shape, Twist};
pub use config::{SimulationConfig, StabilizationConfig};
pub use dynamics::Gravity;
pub use error::SimError;
pub use id::{BodyId, ConstraintId};

// Re-export math types for convenience
pub use nalgebra::{Matrix3, Point3, UnitQuaternion, Vector3};

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, SimError>;
