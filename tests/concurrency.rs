//! Concurrent stress tests for the stack allocator.
//!
//! Many threads hammer one store through copies of the same view; the tests
//! check that handed-out regions never overlap and that the volume granted
//! is exactly what fits.

use rand::{rngs::StdRng, Rng, SeedableRng};
use secondary_stack::{
    launch, run_with_growth, Interaction, MevEnergy, ParticleId, Secondary,
    SecondaryAllocatorView, SecondaryStore, StackAllocatorStore, StackConfig,
};
use std::ops::Range;
use std::sync::Barrier;
use std::thread;

/// Spawn `threads` workers that each perform the given requests, starting
/// together. Returns every granted range.
fn hammer(store: &StackAllocatorStore<u32>, requests: &[Vec<usize>]) -> Vec<Range<usize>> {
    let barrier = Barrier::new(requests.len());
    let view = store.view();

    thread::scope(|scope| {
        let handles: Vec<_> = requests
            .iter()
            .map(|sizes| {
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    sizes
                        .iter()
                        .filter_map(|&n| view.reserve(n))
                        .filter(|range| !range.is_empty())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    })
}

#[test]
fn test_single_slot_per_thread_is_a_permutation() {
    for threads in [2usize, 8, 32, 64] {
        let store = StackAllocatorStore::<u32>::with_capacity(threads).unwrap();
        let requests = vec![vec![1usize]; threads];

        let mut offsets: Vec<usize> = hammer(&store, &requests)
            .into_iter()
            .map(|r| r.start)
            .collect();
        offsets.sort_unstable();

        assert_eq!(offsets, (0..threads).collect::<Vec<_>>());
        assert_eq!(store.size(), threads);
    }
}

#[test]
fn test_overflow_grants_exactly_capacity() {
    let threads = 48;
    let capacity = 17;
    let store = StackAllocatorStore::<u32>::with_capacity(capacity).unwrap();
    let requests = vec![vec![1usize]; threads];

    let mut offsets: Vec<usize> = hammer(&store, &requests)
        .into_iter()
        .map(|r| r.start)
        .collect();
    offsets.sort_unstable();

    // The survivors form the prefix {0..C-1}; which threads won is unspecified.
    assert_eq!(offsets, (0..capacity).collect::<Vec<_>>());
    assert!(store.size() > capacity);
    assert!(store.size() <= threads);
    assert!(store.stats().overflowed);
}

#[test]
fn test_randomized_requests_never_overlap() {
    let mut rng = StdRng::seed_from_u64(0x5ec0_4da7);

    for _ in 0..20 {
        let threads = rng.gen_range(2..16);
        let capacity = rng.gen_range(1..512);
        let requests: Vec<Vec<usize>> = (0..threads)
            .map(|_| {
                let count = rng.gen_range(1..32);
                (0..count).map(|_| rng.gen_range(0..12)).collect()
            })
            .collect();

        let store = StackAllocatorStore::<u32>::with_capacity(capacity).unwrap();
        let mut ranges = hammer(&store, &requests);
        ranges.sort_unstable_by_key(|r| r.start);

        let granted: usize = ranges.iter().map(|r| r.len()).sum();
        assert!(granted <= capacity);
        for pair in ranges.windows(2) {
            assert!(pair[0].end <= pair[1].start, "overlap: {pair:?}");
        }
        if let Some(last) = ranges.last() {
            assert!(last.end <= capacity);
        }

        let total: usize = requests.iter().flatten().sum();
        if total <= capacity {
            // Nothing overflowed: every request was granted, back to back.
            assert_eq!(granted, total);
            assert_eq!(store.size(), total);
        }
    }
}

#[test]
fn test_concurrent_writes_are_isolated() {
    let tracks: Vec<usize> = (0..1000).collect();
    let mut store = StackAllocatorStore::<u32>::with_capacity(3000).unwrap();

    let report = launch(&store, &tracks, |track, view| match view.allocate(track % 4) {
        Some(out) => {
            out.fill(track as u32);
            true
        }
        None => false,
    });
    assert!(report.failed.is_empty());

    // Each track's value appears exactly `track % 4` times.
    let mut counts = vec![0usize; tracks.len()];
    for &value in store.records() {
        counts[value as usize] += 1;
    }
    for track in tracks {
        assert_eq!(counts[track], track % 4, "track {track}");
    }
}

/// Toy interactor: a photon of energy `E` splits into `track % 3 + 1`
/// electrons of equal energy, requested in a single allocation.
fn pair_cascade<'a>(track: usize, allocate: &SecondaryAllocatorView<'a>) -> Interaction<'a> {
    let count = track % 3 + 1;
    let Some(out) = allocate.allocate(count) else {
        return Interaction::from_failure();
    };
    for secondary in out.iter_mut() {
        *secondary = Secondary {
            particle_id: ParticleId(track as u32),
            energy: MevEnergy(1.0 / count as f64),
            direction: [0.0, 0.0, 1.0],
        };
    }
    Interaction {
        secondaries: out,
        ..Interaction::from_absorption()
    }
}

#[test]
fn test_grow_and_rerun_delivers_every_track_once() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("secondary_stack=debug")
        .try_init();

    let tracks = 500;
    let config = StackConfig::new(16)
        .with_max_capacity(4096)
        .with_max_relaunches(16);
    let mut store = SecondaryStore::new(&config).unwrap();
    let mut per_track = vec![0usize; tracks];

    let summary = run_with_growth(
        &mut store,
        &config,
        tracks,
        |track, view| !pair_cascade(track, &view).is_failed(),
        |records: &[Secondary]| {
            for secondary in records.iter().filter(|s| s.is_valid()) {
                per_track[secondary.particle_id.0 as usize] += 1;
            }
        },
    )
    .unwrap();

    assert!(summary.launches >= 2);
    for (track, &count) in per_track.iter().enumerate() {
        assert_eq!(count, track % 3 + 1, "track {track}");
    }
}
