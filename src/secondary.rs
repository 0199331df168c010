//! Secondary particle records and their allocator aliases.

use crate::pointers::StackAllocatorPointers;
use crate::store::StackAllocatorStore;
use crate::view::StackAllocatorView;

/// Three-vector used for directions.
pub type Real3 = [f64; 3];

/// Index of a particle type in the particle definitions table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ParticleId(pub u32);

impl ParticleId {
    /// Marker for an unassigned particle.
    pub const INVALID: ParticleId = ParticleId(u32::MAX);

    /// Whether the id refers to a particle type.
    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl Default for ParticleId {
    fn default() -> Self {
        Self::INVALID
    }
}

/// Kinetic energy in MeV.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd)]
pub struct MevEnergy(pub f64);

impl MevEnergy {
    /// Raw value in MeV.
    #[inline]
    pub fn value(self) -> f64 {
        self.0
    }
}

/// A particle emitted by an interaction.
///
/// The default record is deliberately invalid so that slots nobody wrote can
/// be told apart from real output.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Secondary {
    /// Emitted particle type.
    pub particle_id: ParticleId,
    /// Kinetic energy.
    pub energy: MevEnergy,
    /// Unit direction.
    pub direction: Real3,
}

impl Secondary {
    /// Whether the record describes an emitted particle.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.particle_id.is_valid() && self.energy.value() > 0.0
    }
}

/// Descriptor for a secondary stack.
pub type SecondaryAllocatorPointers = StackAllocatorPointers<Secondary>;

/// View used by interactors to emit secondaries.
pub type SecondaryAllocatorView<'a> = StackAllocatorView<'a, Secondary>;

/// Host store for secondaries.
pub type SecondaryStore = StackAllocatorStore<Secondary>;
