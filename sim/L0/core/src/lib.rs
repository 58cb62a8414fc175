//! Core physics simulation engine.
//!
//! This crate provides rigid bodies, numerical integration and the
//! [`World`] that ties bodies, constraints and a solver strategy into a
//! fixed-step simulation. Constraint rows and solvers come from
//! [`sim_constraint`]; identifiers, configuration and errors from
//! [`sim_types`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       World::tick                            │
//! │  gravity → velocities → rows → solve → poses → joints → time │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │
//!          ┌────────────────┼─────────────────┐
//!          ▼                ▼                 ▼
//! ┌────────────────┐ ┌──────────────┐ ┌──────────────────────┐
//! │   RigidBody    │ │  Constraint  │ │  ContactGenerator    │
//! │ state, forces  │ │ joints, rows │ │ (external detection) │
//! └────────────────┘ └──────────────┘ └──────────────────────┘
//! ```
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with **no engine or renderer dependencies**. It can be used in:
//!
//! - Headless training loops
//! - Hardware control code
//! - Analysis tools
//! - Other engines
//!
//! # Quick Start
//!
//! ```
//! use sim_core::{RigidBody, World};
//! use sim_constraint::BallJoint;
//! use sim_types::{Gravity, MassProperties, Pose, SimulationConfig};
//! use nalgebra::Point3;
//!
//! let config = SimulationConfig::with_timestep(0.01).gravity(Gravity::earth_y_up());
//! let mut world = World::new(config);
//!
//! // A pendulum: fixed pivot at the origin, bob one meter away
//! let pivot = world.add_fixed_body(Pose::identity());
//! let bob = world.add_body(
//!     RigidBody::new(
//!         Pose::from_position(Point3::new(1.0, 0.0, 0.0)),
//!         MassProperties::sphere(1.0, 0.5),
//!     )?,
//! );
//! let joint = BallJoint::new(world.body_frame(pivot)?, world.body_frame(bob)?, Point3::origin());
//! world.add_constraint(joint)?;
//!
//! world.run(100)?;
//!
//! let distance = world.body(bob).map(|b| b.position.coords.norm());
//! assert!((distance.unwrap_or_default() - 1.0).abs() < 1e-3);
//! # Ok::<(), sim_types::SimError>(())
//! ```

#![doc(html_root_url = "https://docs.rs/sim-core/0.7.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,       // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,           // mul_add style changes aren't always clearer
    clippy::cast_precision_loss,        // IDs and step counts stay far below 2^52
    clippy::cast_possible_truncation,   // usize <-> u64 for arena slots
)]

mod body;
mod contact;
pub mod integrators;
mod stepper;
mod world;

pub use body::RigidBody;
pub use contact::{BodyView, ContactGenerator, StaticContacts};
pub use world::World;

// Re-export commonly used types from sim-types
pub use sim_types::{
    BodyId, ConstraintId, Gravity, MassProperties, MassPropertySource, Pose, Result, Shape,
    SimError, SimulationConfig, StabilizationConfig, Twist,
};
