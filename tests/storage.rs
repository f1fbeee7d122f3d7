//! End-to-end scenarios for the adaptive counter storage.
//!
//! Each test drives the public API the way the enclosing histogram would:
//! reset, fill, merge, scale, compare. Tags are asserted at every step the
//! representation is expected to change.

use approx::assert_relative_eq;
use num_bigint::BigUint;

use bincount::testing::FailAfter;
use bincount::{CountStorage, StorageError, Tag};

// =============================================================================
// Fill scenarios
// =============================================================================

#[test]
fn first_increment_materializes_u8() {
    let mut counts = CountStorage::new();
    counts.reset(3);
    counts.increment(0).unwrap();

    assert_eq!(counts.tag(), Tag::U8);
    assert!(counts.eq_counts(&[1u8, 0, 0]));
    assert_eq!(counts.get(0), 1.0);
}

#[test]
fn increment_256_times_promotes_to_u16() {
    let mut counts = CountStorage::new();
    counts.reset(1);

    for n in 1..=255u64 {
        counts.increment(0).unwrap();
        assert_eq!(counts.tag(), Tag::U8, "no promotion below 256 (n = {n})");
    }
    counts.increment(0).unwrap();

    assert_eq!(counts.tag(), Tag::U16);
    assert_eq!(counts.get(0), 256.0);
}

#[test]
fn integer_add_past_u64_promotes_to_big() {
    let mut counts = CountStorage::new();
    counts.reset(1);

    counts.add(0, u64::MAX).unwrap();
    assert_eq!(counts.tag(), Tag::U64);

    counts.add(0, 1).unwrap();
    assert_eq!(counts.tag(), Tag::Big);

    let mut expected = CountStorage::with_len(1);
    expected.set_big(0, &BigUint::from(2u8).pow(64)).unwrap();
    assert_eq!(counts, expected);
    assert_eq!(counts.get(0), 18_446_744_073_709_551_616.0);
}

#[test]
fn float_add_collapses_to_f64() {
    let mut counts = CountStorage::new();
    counts.reset(2);
    counts.add_f64(0, 1.5).unwrap();

    assert_eq!(counts.tag(), Tag::F64);
    assert_eq!(counts.get(0), 1.5);
    assert_eq!(counts.get(1), 0.0);
}

// =============================================================================
// Merge and scale scenarios
// =============================================================================

#[test]
fn bulk_add_of_a_clone_doubles_without_promotion() {
    let mut counts = CountStorage::new();
    counts.reset(4);
    // Push the representation to u16 first, then install the real values.
    counts.add(0, 300).unwrap();
    for (i, v) in [10u64, 20, 30, 40].into_iter().enumerate() {
        counts.set(i, v).unwrap();
    }
    assert_eq!(counts.tag(), Tag::U16);

    let snapshot = counts.clone();
    counts += &snapshot;

    assert!(counts.eq_counts(&[20u16, 40, 60, 80]));
    assert_eq!(counts.tag(), Tag::U16);
}

#[test]
fn scalar_multiply_collapses_to_f64() {
    let mut counts = CountStorage::new();
    counts.reset(2);
    counts.add(0, 3).unwrap();
    counts.add(1, 5).unwrap();
    assert_eq!(counts.tag(), Tag::U8);

    counts *= 2.0;

    assert_eq!(counts.tag(), Tag::F64);
    assert_eq!(counts.get(0), 6.0);
    assert_eq!(counts.get(1), 10.0);
}

#[test]
fn merge_mixed_representations() {
    // u8 counts merged into an f64 buffer stay floating; an arbitrary
    // precision buffer absorbs u64 counts exactly.
    let mut floats = CountStorage::with_len(2);
    floats.add_f64(0, 0.5).unwrap();
    let narrow = CountStorage::from_counts(&[1u8, 2]);
    floats.try_add_assign(&narrow).unwrap();
    assert_eq!(floats.tag(), Tag::F64);
    assert_eq!(floats.get(0), 1.5);
    assert_eq!(floats.get(1), 2.0);

    let mut big = CountStorage::with_len(2);
    big.set_big(0, &BigUint::from(2u8).pow(80)).unwrap();
    let wide = CountStorage::from_counts(&[0u64, u64::MAX]);
    big.try_add_assign(&wide).unwrap();
    assert_eq!(big.tag(), Tag::Big);

    let mut expected = CountStorage::with_len(2);
    expected.set_big(0, &BigUint::from(2u8).pow(80)).unwrap();
    expected.set_big(1, &BigUint::from(u64::MAX)).unwrap();
    assert_eq!(big, expected);
}

// =============================================================================
// Allocation failure
// =============================================================================

#[test]
fn failed_promotion_leaves_the_storage_intact() {
    // One allocation budget: enough for the u8 buffer, not for the
    // promotion to u16.
    let mut counts = CountStorage::with_len_in(1, FailAfter::new(1));
    for _ in 0..255 {
        counts.increment(0).unwrap();
    }
    assert_eq!(counts.tag(), Tag::U8);

    let err = counts.increment(0).unwrap_err();
    assert!(matches!(err, StorageError::AllocationFailed { cells: 1, .. }));
    assert_eq!(counts.tag(), Tag::U8);
    assert_eq!(counts.get(0), 255.0);

    // The storage is still usable; the failure repeats deterministically.
    assert!(counts.increment(0).is_err());
    assert_eq!(counts.get(0), 255.0);
}

#[test]
fn failed_first_allocation_keeps_the_storage_empty() {
    let mut counts = CountStorage::with_len_in(2, FailAfter::new(0));
    let err = counts.increment(0).unwrap_err();
    assert!(matches!(err, StorageError::AllocationFailed { .. }));
    assert_eq!(counts.tag(), Tag::Empty);
    assert_eq!(counts.get(0), 0.0);
}

#[test]
fn failed_f64_collapse_keeps_integer_counts() {
    // Budget covers the u8 buffer only; the collapse to f64 must fail
    // without touching the integer cells.
    let mut counts = CountStorage::with_len_in(2, FailAfter::new(1));
    counts.add(0, 7).unwrap();

    assert!(counts.scale(2.0).is_err());
    assert_eq!(counts.tag(), Tag::U8);
    assert_eq!(counts.get(0), 7.0);

    assert!(counts.add_f64(1, 0.25).is_err());
    assert_eq!(counts.tag(), Tag::U8);
    assert_eq!(counts.get(1), 0.0);
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn copy_and_move_preserve_the_cell_sequence() {
    let mut counts = CountStorage::with_len(3);
    counts.add(0, 1).unwrap();
    counts.add(1, 70_000).unwrap();
    counts.add_f64(2, 0.5).unwrap();

    let copy = counts.clone();
    assert_eq!(copy, counts);

    let original = counts.clone();
    let moved = counts.take();
    assert_eq!(moved, original);
    assert_eq!(counts.len(), 0);
    assert_eq!(counts.tag(), Tag::Empty);
}

#[test]
fn reset_produces_a_fresh_empty_storage() {
    let mut counts = CountStorage::from_counts(&[1u8, 2, 3]);
    counts.reset(2);
    assert_eq!(counts.len(), 2);
    assert_eq!(counts.tag(), Tag::Empty);
    assert_eq!(counts, CountStorage::with_len(2));

    counts.reset(0);
    assert!(counts.is_empty());
}

#[test]
fn empty_storage_equals_zero_filled_storage_of_any_tag() {
    let empty = CountStorage::with_len(3);

    // Walk one storage through every integer representation, zeroing it
    // at each stop.
    let mut other = CountStorage::with_len(3);
    for target in [Tag::U8, Tag::U16, Tag::U32, Tag::U64] {
        while other.tag() != target {
            let max = match other.tag() {
                Tag::Empty => 0,
                Tag::U8 => u8::MAX as u64,
                Tag::U16 => u16::MAX as u64,
                Tag::U32 => u32::MAX as u64,
                _ => unreachable!(),
            };
            other.add(0, max).unwrap();
            other.increment(0).unwrap();
        }
        other.set(0, 0).unwrap();
        assert_eq!(other.tag(), target);
        assert_eq!(empty, other, "Empty != zeroed {target:?}");
        assert_eq!(other, empty, "zeroed {target:?} != Empty");
    }

    let mut big = CountStorage::with_len(3);
    big.set_big(0, &BigUint::from(2u8).pow(70)).unwrap();
    big.set(0, 0).unwrap();
    assert_eq!(big.tag(), Tag::Big);
    assert_eq!(empty, big);

    let mut floats = CountStorage::with_len(3);
    floats.set_f64(0, 0.0).unwrap();
    assert_eq!(floats.tag(), Tag::F64);
    assert_eq!(empty, floats);
}

#[test]
fn getter_is_approximate_beyond_f64_precision() {
    // Counts above 2^53 lose their low bits through the f64 getter; the
    // exact value stays available to equality.
    let mut counts = CountStorage::with_len(1);
    let exact = BigUint::from(2u8).pow(64) + 12_345u32;
    counts.set_big(0, &exact).unwrap();

    assert_relative_eq!(counts.get(0), 2f64.powi(64), max_relative = 1e-12);

    let mut same = CountStorage::with_len(1);
    same.set_big(0, &exact).unwrap();
    let mut off_by_one = CountStorage::with_len(1);
    off_by_one.set_big(0, &(exact + 1u8)).unwrap();
    assert_eq!(counts, same);
    assert_ne!(counts, off_by_one);
}

#[test]
fn allocator_is_observable() {
    let counts = CountStorage::with_len_in(1, FailAfter::new(7));
    assert_eq!(counts.allocator().remaining(), 7);
}

#[test]
fn memory_footprint_tracks_the_representation() {
    let mut counts = CountStorage::with_len(100);
    assert_eq!(counts.size_bytes(), 0);

    counts.increment(0).unwrap();
    assert_eq!(counts.size_bytes(), 100);

    counts.add(0, 1_000_000).unwrap();
    assert_eq!(counts.tag(), Tag::U32);
    assert_eq!(counts.size_bytes(), 400);
}
