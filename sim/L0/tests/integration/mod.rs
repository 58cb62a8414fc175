//! Integration tests for the sim-* crate ecosystem.
//!
//! These tests drive a full [`sim_core::World`] through many ticks and check
//! physical outcomes rather than individual rows:
//! - Joints stay assembled under gravity, motors and limits behave
//! - Contacts from an external generator stop, bounce and hold bodies
//! - Every solver strategy agrees on the same scene
//! - World bookkeeping survives bodies and constraints coming and going

pub mod ball_joint;
pub mod contacts;
pub mod hinge_joint;
pub mod scenes;
pub mod solver_strategies;
pub mod universal_joint;
pub mod world_lifecycle;
