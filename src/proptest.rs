//! Strategies for property-based testing of layouts and partitions.
use crate::layout::OwnershipRange;
use crate::partition::Partition;
use ::proptest::collection::vec;
use ::proptest::prelude::*;

/// A valid ownership range of a dimension of size `size`.
pub fn ownership_range(size: usize) -> impl Strategy<Value = OwnershipRange> {
    (0..=size)
        .prop_flat_map(move |begin| (Just(begin), begin..=size))
        .prop_map(|(begin, end)| OwnershipRange::new(begin, end))
}

/// A shape of rank in `1..=max_rank` together with one valid ownership range per dimension.
pub fn shape_and_ownership(max_rank: usize, max_size: usize) -> impl Strategy<Value = (Vec<usize>, Vec<OwnershipRange>)> {
    vec(0..=max_size, 1..=max_rank.max(1))
        .prop_flat_map(|shape| {
            let ranges: Vec<_> = shape.iter().map(|&size| ownership_range(size)).collect();
            (Just(shape), ranges)
        })
}

/// A dimension size together with ownership ranges of up to `max_parts` parts that tile it.
///
/// Parts may own nothing.
pub fn tiling_ownership_ranges(max_size: usize, max_parts: usize) -> impl Strategy<Value = (usize, Vec<OwnershipRange>)> {
    (0..=max_size)
        .prop_flat_map(move |size| (Just(size), vec(0..=size, 0..max_parts.max(1))))
        .prop_map(|(size, mut cuts)| {
            cuts.sort_unstable();
            let mut ranges = Vec::with_capacity(cuts.len() + 1);
            let mut begin = 0;
            for cut in cuts {
                ranges.push(OwnershipRange::new(begin, cut));
                begin = cut;
            }
            ranges.push(OwnershipRange::new(begin, size));
            (size, ranges)
        })
}

/// A partition into at most `max_parts` parts, and one of its parts.
pub fn partition(max_parts: usize) -> impl Strategy<Value = Partition> {
    (1..=max_parts.max(1))
        .prop_flat_map(|num_parts| (Just(num_parts), 0..num_parts))
        .prop_map(|(num_parts, part)| Partition::new(num_parts, part).expect("Part is always in range"))
}
