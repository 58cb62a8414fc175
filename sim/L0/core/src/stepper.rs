//! The fixed-step tick.
//!
//! One call to [`World::tick`] runs:
//!
//! 1. Validation (configuration, finite state)
//! 2. Gravity, then velocity integration from accumulated forces
//! 3. Snapshot of every body into a dense [`BodyState`] buffer
//! 4. Contact generation
//! 5. Row assembly: registered constraints in ID order, then this tick's contacts
//! 6. Solve
//! 7. Impulse write-back to the producers (warm start for the next tick)
//! 8. Velocity deltas, velocity caps, position integration
//! 9. Joint position projection: the joints' equality rows are re-solved at
//!    the new poses with zero velocities and `target = −C`, and the solved
//!    deltas are applied as displacements until every error is below
//!    [`StabilizationConfig::position_tolerance`]
//! 10. Force clearing and time advance
//!
//! [`BodyState`]: sim_constraint::BodyState
//! [`StabilizationConfig::position_tolerance`]: sim_types::StabilizationConfig::position_tolerance

use nalgebra::Vector3;
use sim_constraint::{
    BodyPair, ConstraintProducer, ContactConstraint, PgsConfig, ProjectedGaussSeidel, RowContext,
    RowSolver, RowSource,
};
use sim_types::{BodyId, ConstraintId, Result, SimError};
use tracing::{debug, trace, warn};

use crate::World;

impl World {
    /// Advance the simulation by one timestep.
    ///
    /// Solver non-convergence is not an error; inspect
    /// [`last_solve_report`](Self::last_solve_report) for the residual.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration is invalid (checked before anything moves)
    /// - A body holds `NaN` or `Inf` state before or after the step
    ///   ([`SimError::Diverged`])
    pub fn tick(&mut self) -> Result<()> {
        self.config.validate()?;
        self.validate()?;

        let dt = self.config.timestep;

        // 1. Forces and unconstrained velocities
        self.apply_gravity();
        for body in self.bodies.iter_mut().flatten() {
            body.integrate_velocity(dt);
        }

        // 2. Dense solver view
        self.gather_states();

        // 3. Contacts and rows
        self.generate_contacts();
        self.assemble_rows(dt);
        self.arena.prepare(&self.states, self.config.stabilization.cfm);

        // 4. Solve
        let report = self.solver.solve(self.arena.rows_mut(), &mut self.states);
        self.store_impulses();

        // 5. Integrate positions with corrected velocities
        let (max_linear, max_angular) = (
            self.config.max_linear_velocity,
            self.config.max_angular_velocity,
        );
        for (body, state) in self.bodies.iter_mut().flatten().zip(&self.states) {
            body.apply_deltas(state);
            body.clamp_velocities(max_linear, max_angular);
            body.integrate_position(dt);
        }

        // 6. Pull joints back onto their constraint manifold
        let joint_error = self.project_positions();

        self.clear_forces();
        self.time += dt;
        self.step_count += 1;

        debug!(
            step = self.step_count,
            rows = report.rows,
            contacts = self.contacts.len(),
            solver = report.solver,
            iterations = report.iterations,
            merit = report.merit,
            joint_error,
            "tick"
        );
        self.last_report = Some(report);

        if let Some((id, _)) = self.bodies().find(|(_, body)| !body.is_finite()) {
            warn!(body = %id, step = self.step_count, "non-finite body state after tick");
            return Err(SimError::diverged(format!(
                "{id} has non-finite state after step {}",
                self.step_count
            )));
        }
        Ok(())
    }

    /// Run `steps` ticks, stopping at the first error.
    ///
    /// # Errors
    ///
    /// Propagates the first failing [`tick`](Self::tick).
    pub fn run(&mut self, steps: usize) -> Result<()> {
        for _ in 0..steps {
            self.tick()?;
        }
        Ok(())
    }

    fn gather_states(&mut self) {
        self.states.clear();
        self.dense.clear();
        for (raw, body) in self.bodies.iter().enumerate() {
            if let Some(body) = body {
                self.dense.insert(BodyId::new(raw as u64), self.states.len());
                self.states.push(body.solver_state());
            }
        }
    }

    /// Nonlinear Gauss-Seidel on joint positions. Returns the largest joint
    /// error left when it stopped.
    fn project_positions(&mut self) -> f64 {
        let stabilization = self.config.stabilization;
        let mut projector = ProjectedGaussSeidel::new(PgsConfig::high_accuracy());
        let mut error = 0.0;

        for pass in 0..=stabilization.position_iterations {
            self.gather_states();
            self.position_rows.clear();
            for constraint in self.constraints.iter().flatten() {
                let (a, b) = constraint.bodies();
                let pair = self
                    .dense
                    .get(&a)
                    .zip(self.dense.get(&b))
                    .and_then(|(&ia, &ib)| BodyPair::resolve(&self.states, ia, ib));
                if let Some(pair) = pair {
                    self.position_rows.extend(constraint.position_rows(pair));
                }
            }

            error = self
                .position_rows
                .iter()
                .map(|row| row.target.abs())
                .fold(0.0, f64::max);
            if error < stabilization.position_tolerance
                || pass == stabilization.position_iterations
            {
                break;
            }

            for state in &mut self.states {
                state.linear_velocity = Vector3::zeros();
                state.angular_velocity = Vector3::zeros();
            }
            for row in &mut self.position_rows {
                row.prepare(&self.states, stabilization.cfm);
            }
            projector.solve(&mut self.position_rows, &mut self.states);
            for (body, state) in self.bodies.iter_mut().flatten().zip(&self.states) {
                body.apply_displacement(state);
            }
            trace!(pass, error, "joint position projection");
        }
        error
    }

    fn generate_contacts(&mut self) {
        self.contacts.clear();
        let Some(generator) = self.contact_generator.as_mut() else {
            return;
        };

        let views = Self::body_views(&self.bodies);
        for point in generator.generate(&views) {
            if !self.dense.contains_key(&point.body_a) || !self.dense.contains_key(&point.body_b) {
                warn!(
                    body_a = %point.body_a,
                    body_b = %point.body_b,
                    "skipping contact with unknown body"
                );
                continue;
            }
            match ContactConstraint::new(point) {
                Ok(contact) => self.contacts.push(contact),
                Err(err) => warn!(%err, "skipping invalid contact"),
            }
        }
    }

    fn assemble_rows(&mut self, dt: f64) {
        self.arena.clear();
        let ctx = RowContext::new(dt, self.config.stabilization);

        for (raw, slot) in self.constraints.iter_mut().enumerate() {
            let Some(constraint) = slot.as_mut() else {
                continue;
            };
            let (a, b) = constraint.bodies();
            let pair = self
                .dense
                .get(&a)
                .zip(self.dense.get(&b))
                .and_then(|(&ia, &ib)| BodyPair::resolve(&self.states, ia, ib));
            let Some(pair) = pair else {
                warn!(%a, %b, "constraint references a missing body, skipping");
                continue;
            };
            let group = constraint.build_rows(pair, &ctx);
            self.arena
                .push_group(RowSource::Constraint(ConstraintId::new(raw as u64)), group);
        }

        for (k, contact) in self.contacts.iter_mut().enumerate() {
            let (a, b) = contact.bodies();
            let pair = self
                .dense
                .get(&a)
                .zip(self.dense.get(&b))
                .and_then(|(&ia, &ib)| BodyPair::resolve(&self.states, ia, ib));
            if let Some(pair) = pair {
                let group = contact.build_rows(pair, &ctx);
                self.arena.push_group(RowSource::Contact(k), group);
            }
        }
    }

    fn store_impulses(&mut self) {
        for span in self.arena.spans() {
            let rows = self.arena.span_rows(span);
            match span.source {
                RowSource::Constraint(id) => {
                    let producer = usize::try_from(id.raw())
                        .ok()
                        .and_then(|i| self.constraints.get_mut(i))
                        .and_then(Option::as_mut);
                    if let Some(producer) = producer {
                        producer.store_impulses(rows);
                    }
                }
                RowSource::Contact(k) => {
                    if let Some(contact) = self.contacts.get_mut(k) {
                        contact.store_impulses(rows);
                    }
                }
            }
        }
    }
}
