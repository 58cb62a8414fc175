//! Simulation world container and entity management.
//!
//! The [`World`] owns every rigid body, every registered constraint, the
//! solver strategy and the configuration. Bodies and constraints are added and
//! removed between ticks; [`World::tick`](crate::World::tick) sees a frozen
//! structure.
//!
//! Identifiers are never reused: a removed body's slot stays empty, so a stale
//! [`BodyId`] can never alias a newer body.

use std::fmt;

use hashbrown::HashMap;
use nalgebra::{Point3, Vector3};
use sim_constraint::{
    BodyFrame, BodyState, Constraint, ConstraintProducer, ConstraintRow, ContactConstraint,
    RowArena, RowSolver, SolveReport, SolverStrategy,
};
use sim_types::{BodyId, ConstraintId, Pose, Result, SimError, SimulationConfig};
use tracing::debug;

use crate::contact::{BodyView, ContactGenerator};
use crate::RigidBody;

/// The simulation world containing all entities.
pub struct World {
    /// Simulation configuration.
    pub(crate) config: SimulationConfig,
    /// Active solver strategy.
    pub(crate) solver: SolverStrategy,
    /// Current simulation time.
    pub(crate) time: f64,
    /// Step counter.
    pub(crate) step_count: u64,
    /// Bodies, indexed by raw ID.
    pub(crate) bodies: Vec<Option<RigidBody>>,
    /// Body name to ID mapping.
    body_names: HashMap<String, BodyId>,
    /// Registered constraints, indexed by raw ID.
    pub(crate) constraints: Vec<Option<Constraint>>,
    /// External contact source.
    pub(crate) contact_generator: Option<Box<dyn ContactGenerator>>,
    /// Contacts generated during the last tick.
    pub(crate) contacts: Vec<ContactConstraint>,
    /// Per-tick scratch: rows.
    pub(crate) arena: RowArena,
    /// Per-tick scratch: solver body states, in body ID order.
    pub(crate) states: Vec<BodyState>,
    /// Per-tick scratch: body ID to index into `states`.
    pub(crate) dense: HashMap<BodyId, usize>,
    /// Per-tick scratch: joint rows for position projection.
    pub(crate) position_rows: Vec<ConstraintRow>,
    /// Report from the last solve.
    pub(crate) last_report: Option<SolveReport>,
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("config", &self.config)
            .field("solver", &self.solver.name())
            .field("time", &self.time)
            .field("step_count", &self.step_count)
            .field("bodies", &self.body_count())
            .field("constraints", &self.constraint_count())
            .field("contact_generator", &self.contact_generator.is_some())
            .field("contacts", &self.contacts.len())
            .finish_non_exhaustive()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}

impl World {
    /// Create a new empty world with the given configuration.
    #[must_use]
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            solver: SolverStrategy::default(),
            time: 0.0,
            step_count: 0,
            bodies: Vec::new(),
            body_names: HashMap::new(),
            constraints: Vec::new(),
            contact_generator: None,
            contacts: Vec::new(),
            arena: RowArena::new(),
            states: Vec::new(),
            dense: HashMap::new(),
            position_rows: Vec::new(),
            last_report: None,
        }
    }

    /// Get the simulation configuration.
    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Replace the simulation configuration.
    ///
    /// # Errors
    ///
    /// Propagates [`SimulationConfig::validate`]; the old configuration is
    /// kept on error.
    pub fn set_config(&mut self, config: SimulationConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Get the current simulation time.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Get the step count.
    #[must_use]
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Get the timestep.
    #[must_use]
    pub fn timestep(&self) -> f64 {
        self.config.timestep
    }

    /// Set the fixed timestep.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidTimestep`] unless `dt` is positive and
    /// finite.
    pub fn set_timestep(&mut self, dt: f64) -> Result<()> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(SimError::InvalidTimestep(dt));
        }
        self.config.timestep = dt;
        Ok(())
    }

    /// The active solver strategy.
    #[must_use]
    pub fn solver(&self) -> &SolverStrategy {
        &self.solver
    }

    /// Select the solver strategy.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] if the strategy's parameters are
    /// out of range; the current strategy is kept.
    pub fn set_solver(&mut self, strategy: SolverStrategy) -> Result<()> {
        strategy.validate()?;
        debug!(solver = strategy.name(), "solver strategy changed");
        self.solver = strategy;
        Ok(())
    }

    /// Install the contact source consulted every tick.
    pub fn set_contact_generator(&mut self, generator: impl ContactGenerator + 'static) {
        self.contact_generator = Some(Box::new(generator));
    }

    /// Remove the contact source, returning it.
    pub fn clear_contact_generator(&mut self) -> Option<Box<dyn ContactGenerator>> {
        self.contacts.clear();
        self.contact_generator.take()
    }

    // =========================================================================
    // Body Management
    // =========================================================================

    /// Add a body to the world.
    ///
    /// Names need not be unique. [`body_by_name`](Self::body_by_name)
    /// resolves a shared name to the oldest live body carrying it.
    pub fn add_body(&mut self, body: RigidBody) -> BodyId {
        let id = BodyId::new(self.bodies.len() as u64);
        if let Some(name) = &body.name {
            if self.body_by_name(name).is_some() {
                debug!(name = %name, body = %id, "body name already taken");
            } else {
                self.body_names.insert(name.clone(), id);
            }
        }
        self.bodies.push(Some(body));
        id
    }

    /// Add an immovable body at the given pose.
    pub fn add_fixed_body(&mut self, pose: Pose) -> BodyId {
        self.add_body(RigidBody::fixed(pose))
    }

    /// Get a body by ID.
    #[must_use]
    pub fn body(&self, id: BodyId) -> Option<&RigidBody> {
        self.bodies.get(slot(id.raw())?)?.as_ref()
    }

    /// Get a mutable reference to a body by ID.
    #[must_use]
    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut RigidBody> {
        self.bodies.get_mut(slot(id.raw())?)?.as_mut()
    }

    /// Get a body by name.
    #[must_use]
    pub fn body_by_name(&self, name: &str) -> Option<(BodyId, &RigidBody)> {
        let id = *self.body_names.get(name)?;
        self.body(id)
            .filter(|body| body.name.as_deref() == Some(name))
            .map(|body| (id, body))
    }

    /// Iterate over all live bodies in ID order.
    pub fn bodies(&self) -> impl Iterator<Item = (BodyId, &RigidBody)> {
        self.bodies
            .iter()
            .enumerate()
            .filter_map(|(raw, body)| Some((BodyId::new(raw as u64), body.as_ref()?)))
    }

    /// Iterate mutably over all live bodies in ID order.
    pub fn bodies_mut(&mut self) -> impl Iterator<Item = (BodyId, &mut RigidBody)> {
        self.bodies
            .iter_mut()
            .enumerate()
            .filter_map(|(raw, body)| Some((BodyId::new(raw as u64), body.as_mut()?)))
    }

    /// Number of live bodies.
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.bodies.iter().flatten().count()
    }

    /// The body's current identity and pose, for building joints.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidBodyId`] if the body does not exist.
    pub fn body_frame(&self, id: BodyId) -> Result<BodyFrame> {
        let body = self.body(id).ok_or(SimError::InvalidBodyId(id.raw()))?;
        Ok(BodyFrame::new(id, body.pose()))
    }

    /// Remove a body.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidBodyId`] if the body does not exist, or
    /// [`SimError::BodyInUse`] if a registered constraint still references it.
    pub fn remove_body(&mut self, id: BodyId) -> Result<RigidBody> {
        if self.body(id).is_none() {
            return Err(SimError::InvalidBodyId(id.raw()));
        }
        let in_use = self.constraints_referencing(id).len();
        if in_use > 0 {
            return Err(SimError::BodyInUse {
                body: id.raw(),
                constraints: in_use,
            });
        }
        self.take_body(id)
    }

    /// Remove a body together with every constraint that references it.
    ///
    /// Returns the body and the IDs of the removed constraints.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidBodyId`] if the body does not exist.
    pub fn remove_body_cascade(&mut self, id: BodyId) -> Result<(RigidBody, Vec<ConstraintId>)> {
        if self.body(id).is_none() {
            return Err(SimError::InvalidBodyId(id.raw()));
        }
        let removed = self.constraints_referencing(id);
        for cid in &removed {
            self.remove_constraint(*cid)?;
        }
        let body = self.take_body(id)?;
        Ok((body, removed))
    }

    fn take_body(&mut self, id: BodyId) -> Result<RigidBody> {
        let body = slot(id.raw())
            .and_then(|i| self.bodies.get_mut(i))
            .and_then(Option::take)
            .ok_or(SimError::InvalidBodyId(id.raw()))?;
        if let Some(name) = &body.name {
            if self.body_names.get(name) == Some(&id) {
                let heir = self
                    .bodies()
                    .find(|(_, other)| other.name.as_deref() == Some(name.as_str()))
                    .map(|(other, _)| other);
                if let Some(other) = heir {
                    self.body_names.insert(name.clone(), other);
                } else {
                    self.body_names.remove(name);
                }
            }
        }
        self.contacts.retain(|c| {
            let (a, b) = c.bodies();
            a != id && b != id
        });
        debug!(body = %id, "body removed");
        Ok(body)
    }

    fn constraints_referencing(&self, id: BodyId) -> Vec<ConstraintId> {
        self.constraints()
            .filter(|(_, c)| c.references(id))
            .map(|(cid, _)| cid)
            .collect()
    }

    // =========================================================================
    // Constraint Management
    // =========================================================================

    /// Register a joint or persistent contact.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidBodyId`] if either body does not exist, or
    /// [`SimError::InvalidConfig`] if both ends name the same body.
    pub fn add_constraint(&mut self, constraint: impl Into<Constraint>) -> Result<ConstraintId> {
        let constraint = constraint.into();
        let (a, b) = constraint.bodies();
        for body in [a, b] {
            if self.body(body).is_none() {
                return Err(SimError::InvalidBodyId(body.raw()));
            }
        }
        if a == b {
            return Err(SimError::invalid_config(format!(
                "{} constraint connects {a} to itself",
                constraint.kind()
            )));
        }
        let id = ConstraintId::new(self.constraints.len() as u64);
        debug!(constraint = %id, kind = constraint.kind(), %a, %b, "constraint added");
        self.constraints.push(Some(constraint));
        Ok(id)
    }

    /// Unregister a constraint, returning it.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConstraintId`] if it does not exist.
    pub fn remove_constraint(&mut self, id: ConstraintId) -> Result<Constraint> {
        slot(id.raw())
            .and_then(|i| self.constraints.get_mut(i))
            .and_then(Option::take)
            .ok_or(SimError::InvalidConstraintId(id.raw()))
    }

    /// Get a constraint by ID.
    #[must_use]
    pub fn constraint(&self, id: ConstraintId) -> Option<&Constraint> {
        self.constraints.get(slot(id.raw())?)?.as_ref()
    }

    /// Get a mutable reference to a constraint, e.g. to retune a motor.
    #[must_use]
    pub fn constraint_mut(&mut self, id: ConstraintId) -> Option<&mut Constraint> {
        self.constraints.get_mut(slot(id.raw())?)?.as_mut()
    }

    /// Multipliers from the constraint's last solve, indexed by row slot.
    #[must_use]
    pub fn constraint_impulse(&self, id: ConstraintId) -> Option<&[f64]> {
        self.constraint(id).map(ConstraintProducer::last_impulses)
    }

    /// Iterate over registered constraints in ID order.
    pub fn constraints(&self) -> impl Iterator<Item = (ConstraintId, &Constraint)> {
        self.constraints
            .iter()
            .enumerate()
            .filter_map(|(raw, c)| Some((ConstraintId::new(raw as u64), c.as_ref()?)))
    }

    /// Number of registered constraints.
    #[must_use]
    pub fn constraint_count(&self) -> usize {
        self.constraints.iter().flatten().count()
    }

    // =========================================================================
    // Force Application
    // =========================================================================

    /// Apply gravity to all dynamic bodies.
    pub fn apply_gravity(&mut self) {
        let gravity = self.config.gravity;
        for body in self.bodies.iter_mut().flatten() {
            if !body.is_fixed() {
                body.apply_force_at_com(gravity.force_on_mass(body.mass()));
            }
        }
    }

    /// Clear all accumulated forces on all bodies.
    pub fn clear_forces(&mut self) {
        for body in self.bodies.iter_mut().flatten() {
            body.clear_forces();
        }
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Contacts generated during the last tick, with their solved impulses.
    #[must_use]
    pub fn contacts(&self) -> &[ContactConstraint] {
        &self.contacts
    }

    /// The solver report from the last tick.
    #[must_use]
    pub fn last_solve_report(&self) -> Option<&SolveReport> {
        self.last_report.as_ref()
    }

    /// Sum of the kinetic energy of every body.
    #[must_use]
    pub fn total_kinetic_energy(&self) -> f64 {
        self.bodies
            .iter()
            .flatten()
            .map(RigidBody::kinetic_energy)
            .sum()
    }

    /// Mass-weighted center of all dynamic bodies.
    #[must_use]
    pub fn center_of_mass(&self) -> Option<Point3<f64>> {
        let (weighted, mass) = self
            .bodies
            .iter()
            .flatten()
            .filter(|b| !b.is_fixed())
            .fold((Vector3::zeros(), 0.0), |(sum, m), b| {
                (sum + b.position.coords * b.mass(), m + b.mass())
            });
        (mass > 0.0).then(|| Point3::from(weighted / mass))
    }

    /// Check every body for non-finite state.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Diverged`] naming the first offending body.
    pub fn validate(&self) -> Result<()> {
        match self.bodies().find(|(_, body)| !body.is_finite()) {
            Some((id, _)) => Err(SimError::diverged(format!("{id} has non-finite state"))),
            None => Ok(()),
        }
    }

    /// Reset the clock without touching body state.
    pub fn reset_time(&mut self) {
        self.time = 0.0;
        self.step_count = 0;
    }

    /// Views of every live body, for contact generation.
    pub(crate) fn body_views(bodies: &[Option<RigidBody>]) -> Vec<BodyView<'_>> {
        bodies
            .iter()
            .enumerate()
            .filter_map(|(raw, body)| {
                Some(BodyView {
                    id: BodyId::new(raw as u64),
                    body: body.as_ref()?,
                })
            })
            .collect()
    }
}

fn slot(raw: u64) -> Option<usize> {
    usize::try_from(raw).ok()
}
