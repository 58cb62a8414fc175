//! Shared scene builders for the integration tests.

use nalgebra::{Point3, Vector3};
use sim_constraint::{BallJoint, Constraint, ConstraintProducer, ContactPoint};
use sim_core::{BodyId, BodyView, ConstraintId, RigidBody, World};
use sim_types::{MassProperties, Pose};

/// Add a dynamic sphere at `position`.
pub fn sphere(world: &mut World, position: Point3<f64>, mass: f64, radius: f64) -> BodyId {
    let body = RigidBody::new(
        Pose::from_position(position),
        MassProperties::sphere(mass, radius),
    )
    .expect("sphere mass properties are valid");
    world.add_body(body)
}

/// Pin `a` and `b` together at a world-space point.
pub fn ball_joint(world: &mut World, a: BodyId, b: BodyId, anchor: Point3<f64>) -> ConstraintId {
    let joint = BallJoint::new(
        world.body_frame(a).expect("body a exists"),
        world.body_frame(b).expect("body b exists"),
        anchor,
    );
    world.add_constraint(joint).expect("joint bodies exist")
}

/// World-space gap between the two anchor points of a registered joint.
pub fn anchor_gap(world: &World, id: ConstraintId) -> f64 {
    let constraint = world.constraint(id).expect("constraint exists");
    let (a, b) = constraint.bodies();
    let a = world.body(a).expect("body a exists").solver_state();
    let b = world.body(b).expect("body b exists").solver_state();
    match constraint {
        Constraint::Ball(j) => j.anchor_separation(&a, &b),
        Constraint::Hinge(j) => j.anchor_separation(&a, &b),
        Constraint::Universal(j) => j.anchor_separation(&a, &b),
        Constraint::Contact(_) => 0.0,
    }
}

/// Contact generator for spheres resting on the plane `z = 0`.
///
/// Every dynamic body is treated as a sphere of `radius`; a contact is
/// reported once the sphere is within `margin` of the plane.
pub fn ground_plane(
    ground: BodyId,
    radius: f64,
    friction: f64,
    restitution: f64,
) -> impl FnMut(&[BodyView<'_>]) -> Vec<ContactPoint> {
    let margin = 0.01;
    move |bodies: &[BodyView<'_>]| {
        bodies
            .iter()
            .filter(|view| view.id != ground && !view.body.is_fixed())
            .filter_map(|view| {
                let depth = radius - view.body.position.z;
                (depth > -margin).then(|| {
                    let point = view.body.position - Vector3::z() * radius;
                    ContactPoint::new(ground, view.id, point, Vector3::z(), depth)
                        .with_friction(friction)
                        .with_restitution(restitution)
                })
            })
            .collect()
    }
}
