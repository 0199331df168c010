//! Host-side launch driver.
//!
//! [`launch`] runs a kernel once per track on a pool of scoped worker
//! threads, each allocating through its own copy of the store's view. The
//! scope join is the barrier that makes the records visible to the host and
//! makes the next `clear` safe.
//!
//! [`run_with_growth`] adds the recovery policy: after an overflowed launch
//! the surviving records are handed to the caller, the store grows to the
//! demand the launch observed, and only the failed tracks run again.

use std::num::NonZeroUsize;
use std::panic;
use std::thread;

use crate::config::StackConfig;
use crate::error::StackError;
use crate::interaction::Interaction;
use crate::store::StackAllocatorStore;
use crate::view::StackAllocatorView;

/// Per-track result the driver can classify.
pub trait TrackOutcome {
    /// Whether the track must be run again.
    fn is_failure(&self) -> bool;
}

impl TrackOutcome for Interaction<'_> {
    #[inline]
    fn is_failure(&self) -> bool {
        self.is_failed()
    }
}

/// `true` means the track completed.
impl TrackOutcome for bool {
    #[inline]
    fn is_failure(&self) -> bool {
        !*self
    }
}

impl<T, E> TrackOutcome for Result<T, E> {
    #[inline]
    fn is_failure(&self) -> bool {
        self.is_err()
    }
}

/// Summary of a single launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchReport {
    /// Number of tracks run.
    pub tracks: usize,
    /// Tracks whose kernel reported failure, ascending.
    pub failed: Vec<usize>,
    /// Slots handed out, clamped to capacity.
    pub claimed: usize,
    /// Raw cursor after the launch. Equals the records requested when the
    /// launch fit; after an overflow it is a lower bound on demand, since
    /// requests that find the arena exhausted do not advance it.
    pub requested: usize,
    /// Capacity of the store during the launch.
    pub capacity: usize,
}

impl LaunchReport {
    /// Whether the store was too small for this launch.
    #[inline]
    pub fn overflowed(&self) -> bool {
        self.requested > self.capacity
    }

    /// Tracks that completed.
    #[inline]
    pub fn completed(&self) -> usize {
        self.tracks - self.failed.len()
    }
}

/// Run `kernel` for every id in `tracks` in parallel.
///
/// The store's cursor is not cleared first: callers decide whether a launch
/// appends to or replaces the previous contents.
pub fn launch<'s, T, F, O>(
    store: &'s StackAllocatorStore<T>,
    tracks: &[usize],
    kernel: F,
) -> LaunchReport
where
    T: Send,
    F: Fn(usize, StackAllocatorView<'s, T>) -> O + Sync,
    O: TrackOutcome,
{
    let view = store.view();
    let workers = thread::available_parallelism()
        .map_or(1, NonZeroUsize::get)
        .min(tracks.len().max(1));
    let chunk = tracks.len().div_ceil(workers).max(1);

    tracing::debug!(
        tracks = tracks.len(),
        workers,
        capacity = store.capacity(),
        "launching kernel"
    );

    let kernel = &kernel;
    let mut failed: Vec<usize> = thread::scope(|scope| {
        let handles: Vec<_> = tracks
            .chunks(chunk)
            .map(|batch| {
                scope.spawn(move || {
                    batch
                        .iter()
                        .copied()
                        .filter(|&track| kernel(track, view).is_failure())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|handle| match handle.join() {
                Ok(failed) => failed,
                Err(payload) => panic::resume_unwind(payload),
            })
            .collect()
    });
    failed.sort_unstable();

    let stats = store.stats();
    let report = LaunchReport {
        tracks: tracks.len(),
        failed,
        claimed: stats.claimed,
        requested: stats.requested,
        capacity: stats.capacity,
    };
    if report.overflowed() {
        tracing::warn!(
            failed = report.failed.len(),
            requested = report.requested,
            capacity = report.capacity,
            "launch overflowed secondary stack"
        );
    }
    report
}

/// Totals for a [`run_with_growth`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Launches performed, including the first.
    pub launches: u32,
    /// Store capacity at the end of the run.
    pub capacity: usize,
    /// Slots passed to the consumer over all launches, including holes left
    /// by requests that ran past capacity.
    pub records: usize,
}

/// Run every track in `0..track_count` to completion, growing the store on
/// overflow.
///
/// Each launch starts from a scrubbed store. After it, `consume` receives the
/// claimed slots; slots inside an overflowed launch that no successful
/// request claimed hold `T::default()` and should be skipped. Kernels must
/// request their output in one allocation and write nothing on failure, so
/// failed tracks leave no records behind.
///
/// The kernel's outcome must not borrow from the view, since the store is
/// scrubbed and may be regrown before the next launch: reduce an
/// [`Interaction`] to `bool` or `Result` before returning it. [`launch`]
/// itself accepts borrowing outcomes such as `Interaction<'s>`.
pub fn run_with_growth<T, F, O, C>(
    store: &mut StackAllocatorStore<T>,
    config: &StackConfig,
    track_count: usize,
    kernel: F,
    mut consume: C,
) -> Result<RunSummary, StackError>
where
    T: Copy + Default + Send,
    F: for<'s> Fn(usize, StackAllocatorView<'s, T>) -> O + Sync,
    O: TrackOutcome,
    C: FnMut(&[T]),
{
    config.validate()?;

    let mut pending: Vec<usize> = (0..track_count).collect();
    let mut launches = 0u32;
    let mut records = 0usize;

    loop {
        store.scrub();
        let report = launch(&*store, &pending, &kernel);
        launches += 1;

        let output = store.records();
        records += output.len();
        consume(output);

        if report.failed.is_empty() {
            return Ok(RunSummary {
                launches,
                capacity: store.capacity(),
                records,
            });
        }

        let relaunches = launches - 1;
        if relaunches >= config.max_relaunches {
            return Err(StackError::RelaunchLimit {
                relaunches,
                pending: report.failed.len(),
            });
        }

        let current = store.capacity();
        let next = config.next_capacity(current, report.requested);
        if next > current {
            store.grow(next)?;
        } else if report.completed() == 0 {
            // At the ceiling and no track made progress: rerunning cannot help.
            return Err(StackError::CapacityExceeded {
                requested: report.requested,
                capacity: current,
            });
        }

        tracing::debug!(
            pending = report.failed.len(),
            capacity = store.capacity(),
            "relaunching failed tracks"
        );
        pending = report.failed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_reports_failed_tracks() {
        let store = StackAllocatorStore::<u64>::with_capacity(10).unwrap();
        let tracks: Vec<usize> = (0..20).collect();

        let report = launch(&store, &tracks, |track, view| match view.allocate(1) {
            Some(slot) => {
                slot[0] = track as u64;
                true
            }
            None => false,
        });

        assert_eq!(report.tracks, 20);
        assert_eq!(report.failed.len(), 10);
        assert_eq!(report.claimed, 10);
        assert!(report.requested > 10);
        assert!(report.overflowed());
        assert!(report.failed.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_launch_accepts_interaction_outcomes() {
        use crate::secondary::{MevEnergy, ParticleId, Secondary};

        let mut store = StackAllocatorStore::<Secondary>::with_capacity(6).unwrap();
        let tracks: Vec<usize> = (0..8).collect();

        let report = launch(&store, &tracks, |track, view| {
            let Some(out) = view.allocate(1) else {
                return Interaction::from_failure();
            };
            out[0] = Secondary {
                particle_id: ParticleId(track as u32),
                energy: MevEnergy(1.0),
                direction: [0.0, 0.0, 1.0],
            };
            Interaction {
                secondaries: out,
                ..Interaction::from_absorption()
            }
        });

        assert_eq!(report.failed.len(), 2);
        assert_eq!(report.completed(), 6);
        assert!(store.records().iter().all(Secondary::is_valid));
    }

    #[test]
    fn test_run_summary_counts_holes() {
        let config = StackConfig::new(3).with_max_capacity(64);
        let mut store = StackAllocatorStore::<u64>::new(&config).unwrap();
        let mut delivered = 0usize;

        let summary = run_with_growth(
            &mut store,
            &config,
            2,
            |track, view| match view.allocate(2) {
                Some(out) => {
                    out.fill(track as u64 + 1);
                    true
                }
                None => false,
            },
            |records: &[u64]| delivered += records.iter().filter(|&&r| r != 0).count(),
        )
        .unwrap();

        // First launch: one track fits in 0..2, the other claims through slot
        // 4 and fails, leaving slot 2 as a hole. Second launch: 2 slots.
        assert_eq!(summary.launches, 2);
        assert_eq!(summary.records, 5);
        assert_eq!(delivered, 4);
    }

    #[test]
    fn test_empty_launch() {
        let store = StackAllocatorStore::<u64>::with_capacity(4).unwrap();
        let report = launch(&store, &[], |_, view| view.allocate(1).is_some());
        assert_eq!(report.tracks, 0);
        assert!(report.failed.is_empty());
        assert!(!report.overflowed());
    }

    #[test]
    fn test_run_with_growth_converges() {
        let config = StackConfig::new(4).with_max_capacity(1024);
        let mut store = StackAllocatorStore::<u64>::new(&config).unwrap();
        let mut seen = Vec::new();

        let summary = run_with_growth(
            &mut store,
            &config,
            64,
            |track, view| match view.allocate(2) {
                Some(out) => {
                    out.fill(track as u64 + 1);
                    Ok(())
                }
                None => Err(()),
            },
            |records: &[u64]| seen.extend(records.iter().copied().filter(|&r| r != 0)),
        )
        .unwrap();

        assert!(summary.launches > 1);
        assert!(summary.capacity >= 4);
        seen.sort_unstable();
        let expected: Vec<u64> = (1..=64).flat_map(|t| [t, t]).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_run_with_growth_hits_ceiling() {
        let config = StackConfig::new(2).with_max_capacity(2);
        let mut store = StackAllocatorStore::<u64>::new(&config).unwrap();

        let err = run_with_growth(
            &mut store,
            &config,
            1,
            |_, view| view.allocate(3).is_some(),
            |_| {},
        )
        .unwrap_err();

        assert!(matches!(err, StackError::CapacityExceeded { capacity: 2, .. }));
    }

    #[test]
    fn test_run_with_growth_relaunch_limit() {
        let config = StackConfig::new(4).with_max_relaunches(2);
        let mut store = StackAllocatorStore::<u64>::new(&config).unwrap();

        // Never succeeds regardless of capacity.
        let err = run_with_growth(&mut store, &config, 3, |_, _| false, |_| {}).unwrap_err();

        assert_eq!(
            err,
            StackError::RelaunchLimit {
                relaunches: 2,
                pending: 3
            }
        );
    }
}
