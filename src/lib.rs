//! secondary-stack: a lock-free bounded stack allocator for particle transport.
//!
//! Physics interactions running one thread per particle track emit a
//! variable number of secondary particles. This crate gives every such thread
//! a way to claim output slots in a shared, pre-allocated buffer with a single
//! atomic add: no locks, no per-thread heap allocation, no blocking.
//!
//! # Components
//!
//! - [`StackAllocatorPointers`]: flat `Copy` descriptor (storage, capacity,
//!   cursor) passed into parallel kernels
//! - [`StackAllocatorView`]: per-thread façade performing the bump allocation
//! - [`SecondaryAllocatorView`]: the view specialised to [`Secondary`] records
//! - [`StackAllocatorStore`]: host-side owner of storage and cursor, with
//!   barrier-enforced `clear`, scrubbing and growth
//! - [`launch`](mod@launch): parallel launch driver with a grow-and-rerun policy
//!
//! # Failure is a value
//!
//! When a launch's buffer is too small, `allocate` returns `None`. The
//! interactor then returns [`Interaction::from_failure`] and the host grows the
//! store and re-runs the failed tracks. Nothing panics on overflow.
//!
//! # Usage
//!
//! ```rust
//! use secondary_stack::{MevEnergy, ParticleId, Secondary, SecondaryStore};
//!
//! let mut store = SecondaryStore::with_capacity(4).unwrap();
//! {
//!     let allocate = store.view();
//!     let out = allocate.allocate(2).unwrap();
//!     for secondary in out.iter_mut() {
//!         *secondary = Secondary {
//!             particle_id: ParticleId(11),
//!             energy: MevEnergy(0.25),
//!             direction: [0.0, 0.0, 1.0],
//!         };
//!     }
//!     assert_eq!(allocate.allocate(2).map(|s| s.len()), Some(2));
//!     // Exhausted: the failure is reported, not thrown.
//!     assert!(allocate.allocate(1).is_none());
//! }
//! assert!(store.overflowed());
//! store.clear();
//! assert_eq!(store.view().reserve(1), Some(0..1));
//! ```

pub mod config;
pub mod error;
pub mod interaction;
pub mod launch;
pub mod platform;
pub mod pointers;
pub mod secondary;
pub mod store;
pub mod view;

pub use config::*;
pub use error::StackError;
pub use interaction::{Action, Interaction};
pub use launch::{launch, run_with_growth, LaunchReport, RunSummary, TrackOutcome};
pub use platform::sys;
pub use pointers::StackAllocatorPointers;
pub use secondary::{
    MevEnergy, ParticleId, Real3, Secondary, SecondaryAllocatorPointers, SecondaryAllocatorView,
    SecondaryStore,
};
pub use store::{StackAllocatorStore, StackStats};
pub use view::StackAllocatorView;
