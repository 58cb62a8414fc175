//! Per-step row storage.
//!
//! Producers return their rows as a [`RowGroup`] with couplings expressed as
//! indices local to the group. [`RowArena::push_group`] rebases those indices
//! onto the arena and records which producer emitted the group, so solvers
//! only ever see a flat `&mut [ConstraintRow]`.

use std::ops::Range;

use sim_types::ConstraintId;
use smallvec::SmallVec;
use tracing::warn;

use crate::{BodyState, ConstraintRow};

/// Rows emitted by one producer in one step.
pub type RowGroup = SmallVec<[ConstraintRow; 8]>;

/// Who emitted a group of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowSource {
    /// A registered constraint (joint or persistent contact).
    Constraint(ConstraintId),
    /// The n-th contact handed over by the contact generator this step.
    Contact(usize),
}

/// A contiguous span of rows from one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSpan {
    /// Who emitted the rows.
    pub source: RowSource,
    /// Where they live in the arena.
    pub range: Range<usize>,
}

/// Flat, rebuilt-every-step storage for all constraint rows.
#[derive(Debug, Clone, Default)]
pub struct RowArena {
    rows: Vec<ConstraintRow>,
    spans: Vec<RowSpan>,
}

impl RowArena {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all rows, keeping capacity.
    pub fn clear(&mut self) {
        self.rows.clear();
        self.spans.clear();
    }

    /// Append a producer's rows.
    ///
    /// Couplings are rebased from group-local to arena indices. A coupling
    /// that does not point at an earlier row of the same group is dropped,
    /// which leaves the row with zero bounds.
    pub fn push_group(&mut self, source: RowSource, group: RowGroup) -> Range<usize> {
        let start = self.rows.len();
        for (local, mut row) in group.into_iter().enumerate() {
            if let Some(coupling) = row.coupling.as_mut() {
                if coupling.row < local {
                    coupling.row += start;
                } else {
                    warn!(
                        ?source,
                        row = local,
                        target = coupling.row,
                        "dropping forward coupling reference"
                    );
                    row.coupling = None;
                    row.lower = 0.0;
                    row.upper = 0.0;
                }
            }
            self.rows.push(row);
        }
        let range = start..self.rows.len();
        if !range.is_empty() {
            self.spans.push(RowSpan {
                source,
                range: range.clone(),
            });
        }
        range
    }

    /// Compute effective masses and right-hand sides for every row.
    pub fn prepare(&mut self, bodies: &[BodyState], cfm: f64) {
        for row in &mut self.rows {
            row.prepare(bodies, cfm);
        }
    }

    /// All rows.
    #[must_use]
    pub fn rows(&self) -> &[ConstraintRow] {
        &self.rows
    }

    /// All rows, mutably.
    pub fn rows_mut(&mut self) -> &mut [ConstraintRow] {
        &mut self.rows
    }

    /// The spans, in insertion order.
    #[must_use]
    pub fn spans(&self) -> &[RowSpan] {
        &self.spans
    }

    /// Rows belonging to a span.
    #[must_use]
    pub fn span_rows(&self, span: &RowSpan) -> &[ConstraintRow] {
        &self.rows[span.range.clone()]
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Multipliers a producer carries from one step to the next, keyed by row
/// slot.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WarmStart {
    lambda: [f64; 8],
}

impl WarmStart {
    /// Seed a row's multiplier from the stored value.
    #[must_use]
    pub fn seed(&self, row: ConstraintRow, scale: f64) -> ConstraintRow {
        let stored = self.stored(row.slot);
        row.with_lambda(stored * scale)
    }

    /// Seed every row of a freshly built group.
    pub fn seed_all(&self, rows: &mut RowGroup, scale: f64) {
        for row in rows.iter_mut() {
            row.lambda = self.stored(row.slot) * scale;
        }
    }

    fn stored(&self, slot: u8) -> f64 {
        self.lambda.get(usize::from(slot)).copied().unwrap_or(0.0)
    }

    /// Replace stored multipliers with those of the solved rows.
    ///
    /// Slots with no row this step are reset to zero.
    pub fn store(&mut self, rows: &[ConstraintRow]) {
        self.lambda = [0.0; 8];
        for row in rows {
            if let Some(slot) = self.lambda.get_mut(usize::from(row.slot)) {
                *slot = row.lambda;
            }
        }
    }

    /// Forget the stored multipliers for a range of slots.
    pub fn reset_slots(&mut self, slots: Range<u8>) {
        for slot in slots {
            if let Some(value) = self.lambda.get_mut(usize::from(slot)) {
                *value = 0.0;
            }
        }
    }

    /// Stored multipliers.
    #[must_use]
    pub fn values(&self) -> &[f64; 8] {
        &self.lambda
    }
}
