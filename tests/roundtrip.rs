mod common;

use common::*;
use quickcheck::quickcheck;
use rand::prelude::*;

quickcheck! {
    fn round_trip(old: Vec<u8>, new: Vec<u8>) -> bool {
        let patch = naive_diff(&old, &new);
        bspatch(&old, &patch).unwrap() == new
    }

    fn deterministic(old: Vec<u8>, new: Vec<u8>) -> bool {
        let patch = naive_diff(&old, &new);
        bspatch(&old, &patch).unwrap() == bspatch(&old, &patch).unwrap()
    }

    fn chunk_size_is_not_observable(old: Vec<u8>, new: Vec<u8>) -> bool {
        let patch = naive_diff(&old, &new);
        let reference = bspatch_chunked(&old, &patch, 1).unwrap();
        [7, 64, 4096].iter().all(|&cs| {
            bspatch_chunked(&old, &patch, cs).unwrap() == reference
        })
    }
}

#[test]
fn survives_megabyte_scale_inputs() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let old = random_bytes(&mut rng, 2 * 1024 * 1024);
    let new = distort(&mut rng, &old);

    let patch = naive_diff(&old, &new);
    assert_eq!(bspatch(&old, &patch).unwrap(), new);
}

#[test]
fn large_output_is_chunking_transparent() {
    let mut rng = StdRng::seed_from_u64(42);
    let old = random_bytes(&mut rng, 192 * 1024);
    let new = distort(&mut rng, &old);

    let patch = naive_diff(&old, &new);
    let reference = bspatch(&old, &patch).unwrap();
    assert_eq!(reference, new);
    assert_eq!(bspatch_chunked(&old, &patch, 1024 * 1024).unwrap(), reference);
    assert_eq!(bspatch_chunked(&old, &patch, 33).unwrap(), reference);
}

fn random_bytes(rng: &mut StdRng, n: usize) -> Vec<u8> {
    let mut bytes = vec![0; n];
    rng.fill_bytes(&mut bytes);
    bytes
}

/// Rewrite a few regions and append a tail, so patches mix adds with real
/// deltas, unchanged runs and extra data.
fn distort(rng: &mut StdRng, source: &[u8]) -> Vec<u8> {
    let mut target = source.to_vec();
    for _ in 0..16 {
        if target.is_empty() {
            break;
        }
        let start = rng.gen_range(0..target.len());
        let len = Ord::min(rng.gen_range(1..=4096), target.len() - start);
        for b in &mut target[start..start + len] {
            *b = b.wrapping_add(rng.gen_range(1..=255));
        }
    }
    let tail = rng.gen_range(0..64 * 1024);
    let mut extra = vec![0; tail];
    rng.fill_bytes(&mut extra);
    target.extend_from_slice(&extra);
    target
}
