//! Contact generation collaborator.
//!
//! Collision detection lives outside this crate. Each tick the [`World`]
//! shows the registered [`ContactGenerator`] a read-only view of every live
//! body and turns the returned [`ContactPoint`]s into contact constraints.
//!
//! Closures work directly as generators:
//!
//! ```
//! use sim_core::{BodyView, World};
//! use sim_constraint::ContactPoint;
//!
//! let mut world = World::default();
//! world.set_contact_generator(|_bodies: &[BodyView<'_>]| Vec::<ContactPoint>::new());
//! ```
//!
//! [`World`]: crate::World

use sim_constraint::ContactPoint;
use sim_types::BodyId;

use crate::RigidBody;

/// A live body as seen by a contact generator.
#[derive(Debug, Clone, Copy)]
pub struct BodyView<'a> {
    /// The body's identifier.
    pub id: BodyId,
    /// The body itself.
    pub body: &'a RigidBody,
}

/// Produces this step's contact points.
pub trait ContactGenerator {
    /// Report contacts between the given bodies.
    ///
    /// Normals point from `body_a` to `body_b`. Contacts naming a body that is
    /// not in `bodies` are discarded by the world.
    fn generate(&mut self, bodies: &[BodyView<'_>]) -> Vec<ContactPoint>;
}

impl<F> ContactGenerator for F
where
    F: FnMut(&[BodyView<'_>]) -> Vec<ContactPoint>,
{
    fn generate(&mut self, bodies: &[BodyView<'_>]) -> Vec<ContactPoint> {
        self(bodies)
    }
}

/// Replays a fixed list of contacts every step.
///
/// Contacts whose bodies are not both present are skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticContacts {
    contacts: Vec<ContactPoint>,
}

impl StaticContacts {
    /// Create a replay list.
    #[must_use]
    pub fn new(contacts: Vec<ContactPoint>) -> Self {
        Self { contacts }
    }

    /// Add a contact.
    pub fn push(&mut self, contact: ContactPoint) {
        self.contacts.push(contact);
    }

    /// Remove all contacts.
    pub fn clear(&mut self) {
        self.contacts.clear();
    }

    /// The replayed contacts.
    #[must_use]
    pub fn contacts(&self) -> &[ContactPoint] {
        &self.contacts
    }
}

impl ContactGenerator for StaticContacts {
    fn generate(&mut self, bodies: &[BodyView<'_>]) -> Vec<ContactPoint> {
        let present = |id: BodyId| bodies.iter().any(|view| view.id == id);
        self.contacts
            .iter()
            .filter(|c| present(c.body_a) && present(c.body_b))
            .copied()
            .collect()
    }
}
