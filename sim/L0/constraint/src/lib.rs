//! Constraint rows, joint producers and iterative solvers.
//!
//! Every interaction between two rigid bodies is lowered, once per step, into
//! scalar [`ConstraintRow`]s: a Jacobian on each body, a target velocity, and
//! bounds on the accumulated impulse. A solver then resolves all rows into
//! impulses and per-body velocity deltas.
//!
//! # Producers
//!
//! - [`BallJoint`]: Three translational rows pinning an anchor point
//! - [`HingeJoint`]: Ball rows plus two angular rows, with one controlled axis
//! - [`UniversalJoint`]: Ball rows plus an orthogonality row, two controlled axes
//! - [`ContactConstraint`]: One normal row and two friction rows
//!
//! Controlled axes go through an [`AxisController`], which turns
//! [`AngleLimits`], an [`AxisMotor`] and dry friction into zero, one or two
//! rows depending on where the axis sits relative to its limits.
//!
//! # Solvers
//!
//! All solvers implement [`RowSolver`] and share one contract and one merit
//! ([`projection_merit`]), so they can be swapped through [`SolverStrategy`]:
//!
//! - [`ProjectedGaussSeidel`]: Fixed sweep budget, the baseline
//! - [`NonsmoothConjugateGradient`]: PGS accelerated with conjugate directions
//! - [`SubspaceMinimization`]: PGS plus CG refinement of the free rows
//! - [`FischerNewton`]: Inexact Newton on a Fischer-Burmeister reformulation
//!
//! # Row Formulation
//!
//! ```text
//! rhs = target − J·v
//! J·Δv + cfm·λ = rhs      while lower < λ < upper
//! ```
//!
//! Friction rows are coupled to their contact's normal row: their bounds are
//! `±μ·|λ_normal|`, read from the normal row's current multiplier.
//!
//! # Example
//!
//! ```
//! use sim_constraint::{
//!     BallJoint, BodyFrame, BodyPair, BodyState, ConstraintProducer, ProjectedGaussSeidel, RowArena,
//!     RowContext, RowSolver, RowSource,
//! };
//! use sim_types::{BodyId, ConstraintId, Pose, StabilizationConfig};
//! use nalgebra::{Matrix3, Point3, Vector3};
//!
//! let mut bodies = vec![
//!     BodyState::fixed(Point3::origin()),
//!     BodyState::dynamic(
//!         Pose::from_position(Point3::new(1.0, 0.0, 0.0)),
//!         1.0,
//!         Matrix3::identity(),
//!     )
//!     .with_velocity(Vector3::new(1.0, 0.0, 0.0), Vector3::zeros()),
//! ];
//!
//! let mut joint = BallJoint::new(
//!     BodyFrame::new(BodyId::new(0), bodies[0].pose()),
//!     BodyFrame::new(BodyId::new(1), bodies[1].pose()),
//!     Point3::origin(),
//! );
//! let ctx = RowContext::new(0.01, StabilizationConfig::default());
//! let pair = BodyPair::resolve(&bodies, 0, 1).unwrap();
//!
//! let mut arena = RowArena::new();
//! arena.push_group(RowSource::Constraint(ConstraintId::new(0)), joint.build_rows(pair, &ctx));
//! arena.prepare(&bodies, 1e-9);
//!
//! let report = ProjectedGaussSeidel::default().solve(arena.rows_mut(), &mut bodies);
//! assert!(report.converged);
//! ```
//!
//! # Layer 0 Crate
//!
//! This crate has no engine or renderer dependencies. Body state comes in as
//! plain [`BodyState`] values, so it can be driven from headless tools,
//! tests and benchmarks.

#![doc(html_root_url = "https://docs.rs/sim-constraint/0.7.0")]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
    clippy::similar_names,             // lin_a/lin_b, ang_a/ang_b are intentional
    clippy::many_single_char_names,    // Solver math uses standard notation
)]

mod arena;
mod axis;
mod cg;
mod contact;
pub mod frame;
mod joint;
mod limits;
mod motor;
mod newton;
mod pgs;
mod row;
mod solver;
mod subspace;
mod types;

pub use arena::{RowArena, RowGroup, RowSource, RowSpan, WarmStart};
pub use axis::{AxisController, AxisRows};
pub use cg::{NncgConfig, NonsmoothConjugateGradient};
pub use contact::{ContactConstraint, ContactPoint};
pub use joint::{BallJoint, Constraint, ConstraintProducer, HingeJoint, UniversalJoint};
pub use limits::{AngleLimits, LimitState};
pub use motor::{AxisMotor, MotorMode};
pub use newton::{fischer, FischerNewton, FischerNewtonConfig};
pub use pgs::{PgsConfig, ProjectedGaussSeidel};
pub use row::{project, row_bounds, ConstraintRow, Coupling};
pub use solver::{projection_merit, RowSolver, SolveReport, SolverStrategy};
pub use subspace::{Preconditioner, SubspaceConfig, SubspaceMinimization};
pub use types::{BodyFrame, BodyPair, BodyState, RowContext};

// Re-export types needed to build rows
pub use sim_types::{BodyId, ConstraintId, Pose, Vector3};
