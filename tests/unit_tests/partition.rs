use femlayout::layout::OwnershipRange;
use femlayout::partition::{check_ownership_partition, Partition};
use femlayout::proptest::{partition, tiling_ownership_ranges};
use femlayout::Error;
use proptest::prelude::*;

#[test]
fn serial_partition_owns_everything() {
    let partition = Partition::serial();
    assert_eq!(partition.ownership_range(17), OwnershipRange::full(17));
    assert_eq!(Partition::default(), partition);
}

#[test]
fn uneven_split_gives_extra_index_to_first_parts() {
    let ranges = Partition::all_ownership_ranges(3, 10).unwrap();
    assert_eq!(
        ranges,
        vec![
            OwnershipRange::new(0, 4),
            OwnershipRange::new(4, 7),
            OwnershipRange::new(7, 10)
        ]
    );
}

#[test]
fn more_parts_than_indices_leaves_empty_parts() {
    let ranges = Partition::all_ownership_ranges(4, 2).unwrap();
    let lengths: Vec<_> = ranges.iter().map(OwnershipRange::len).collect();
    assert_eq!(lengths, vec![1, 1, 0, 0]);
    assert_eq!(check_ownership_partition(2, &ranges), Ok(()));
}

#[test]
fn invalid_partitions_are_rejected() {
    assert!(matches!(Partition::new(0, 0), Err(Error::InvalidArgument(_))));
    assert!(matches!(Partition::new(2, 2), Err(Error::OutOfRange { .. })));
}

#[test]
fn ownership_check_detects_gaps_and_overlaps() {
    let gap = [OwnershipRange::new(0, 3), OwnershipRange::new(4, 6)];
    assert!(matches!(check_ownership_partition(6, &gap), Err(Error::InvalidArgument(_))));

    let overlap = [OwnershipRange::new(0, 4), OwnershipRange::new(3, 6)];
    assert!(matches!(check_ownership_partition(6, &overlap), Err(Error::InvalidArgument(_))));

    let short = [OwnershipRange::new(0, 3), OwnershipRange::new(3, 5)];
    assert!(matches!(check_ownership_partition(6, &short), Err(Error::InvalidArgument(_))));

    let malformed = [OwnershipRange::new(4, 2)];
    assert!(matches!(check_ownership_partition(6, &malformed), Err(Error::InvalidArgument(_))));

    let unordered = [OwnershipRange::new(3, 6), OwnershipRange::new(0, 3)];
    assert_eq!(check_ownership_partition(6, &unordered), Ok(()));
}

proptest! {
    #[test]
    fn uniform_ranges_tile_the_index_set(n in 0usize..200, num_parts in 1usize..20) {
        let ranges = Partition::all_ownership_ranges(num_parts, n).unwrap();
        prop_assert_eq!(check_ownership_partition(n, &ranges), Ok(()));

        let max = ranges.iter().map(OwnershipRange::len).max().unwrap();
        let min = ranges.iter().map(OwnershipRange::len).min().unwrap();
        prop_assert!(max - min <= 1);
    }

    #[test]
    fn generated_tilings_pass_the_ownership_check((size, ranges) in tiling_ownership_ranges(50, 8)) {
        prop_assert_eq!(check_ownership_partition(size, &ranges), Ok(()));
    }

    #[test]
    fn local_range_is_within_bounds(partition in partition(16), n in 0usize..100) {
        let range = partition.ownership_range(n);
        prop_assert!(range.begin <= range.end);
        prop_assert!(range.end <= n);
    }
}
