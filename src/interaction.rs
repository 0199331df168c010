//! Result of applying a physics interaction to a track.
//!
//! Interactors request their secondaries from a
//! [`SecondaryAllocatorView`](crate::SecondaryAllocatorView) once, up front.
//! If the request fails they return [`Interaction::from_failure`] without
//! writing anything; the host then grows the stack and re-runs the track.

use crate::secondary::{MevEnergy, Real3, Secondary};

/// What happened to the incident particle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Direction and/or energy changed.
    Scattered,
    /// The particle was absorbed.
    Absorbed,
    /// No state change.
    Unchanged,
    /// Secondaries could not be allocated.
    Failed,
}

/// Change to the incident particle plus the secondaries it produced.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Interaction<'a> {
    /// Outcome for the incident particle.
    pub action: Action,
    /// Post-interaction kinetic energy.
    pub energy: MevEnergy,
    /// Post-interaction direction.
    pub direction: Real3,
    /// Energy deposited locally.
    pub energy_deposition: MevEnergy,
    /// Emitted particles, living in the secondary stack.
    pub secondaries: &'a [Secondary],
}

impl<'a> Interaction<'a> {
    /// Interaction that could not allocate its secondaries.
    #[inline]
    pub fn from_failure() -> Self {
        Self {
            action: Action::Failed,
            ..Self::from_absorption()
        }
    }

    /// The incident particle is killed.
    #[inline]
    pub fn from_absorption() -> Self {
        Self {
            action: Action::Absorbed,
            energy: MevEnergy(0.0),
            direction: [0.0; 3],
            energy_deposition: MevEnergy(0.0),
            secondaries: &[],
        }
    }

    /// The incident particle continues untouched.
    #[inline]
    pub fn from_unchanged(energy: MevEnergy, direction: Real3) -> Self {
        Self {
            action: Action::Unchanged,
            energy,
            direction,
            energy_deposition: MevEnergy(0.0),
            secondaries: &[],
        }
    }

    /// Whether allocation failed and the track must be re-run.
    #[inline]
    pub fn is_failed(&self) -> bool {
        self.action == Action::Failed
    }

    /// Whether the incident particle survives.
    #[inline]
    pub fn alive(&self) -> bool {
        matches!(self.action, Action::Scattered | Action::Unchanged)
    }
}
