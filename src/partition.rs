//! Contiguous partitioning of global index ranges among the parts of a distributed context.
//!
//! Nothing here communicates. The distributed context decides which part the local process is,
//! and is responsible for gathering ranges if it wants to run
//! [`check_ownership_partition`].
use crate::error::{Error, Result};
use crate::layout::OwnershipRange;
use serde::{Deserialize, Serialize};

/// The local part of a partitioning into `num_parts` contiguous pieces.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Partition {
    num_parts: usize,
    part: usize,
}

impl Partition {
    pub fn new(num_parts: usize, part: usize) -> Result<Self> {
        if num_parts == 0 {
            return Err(Error::invalid_argument("a partition needs at least one part"));
        }
        if part >= num_parts {
            return Err(Error::out_of_range("partition", part, num_parts));
        }
        Ok(Self { num_parts, part })
    }

    /// A single part owning everything.
    pub fn serial() -> Self {
        Self { num_parts: 1, part: 0 }
    }

    pub fn num_parts(&self) -> usize {
        self.num_parts
    }

    pub fn part(&self) -> usize {
        self.part
    }

    /// Range of `[0, n)` owned by this part.
    ///
    /// Indices are split as evenly as possible. The first `n % num_parts` parts own one
    /// index more than the rest.
    pub fn ownership_range(&self, n: usize) -> OwnershipRange {
        let p = self.num_parts;
        let q = self.part;
        let chunk = n / p;
        let remainder = n % p;
        if q < remainder {
            let begin = q * (chunk + 1);
            OwnershipRange::new(begin, begin + chunk + 1)
        } else {
            let begin = q * chunk + remainder;
            OwnershipRange::new(begin, begin + chunk)
        }
    }

    /// Ownership ranges of all parts, in part order.
    pub fn all_ownership_ranges(num_parts: usize, n: usize) -> Result<Vec<OwnershipRange>> {
        (0..num_parts)
            .map(|part| Partition::new(num_parts, part).map(|p| p.ownership_range(n)))
            .collect()
    }
}

impl Default for Partition {
    fn default() -> Self {
        Self::serial()
    }
}

/// Check that `ranges`, gathered from every part, tile `[0, size)` without gaps or overlaps.
///
/// The ranges may be given in any order.
pub fn check_ownership_partition(size: usize, ranges: &[OwnershipRange]) -> Result<()> {
    for (part, range) in ranges.iter().enumerate() {
        range.validate(part, size).map_err(|_| {
            Error::invalid_argument(format!("ownership range {range} of part {part} is malformed for size {size}"))
        })?;
    }

    let mut sorted: Vec<_> = ranges.iter().filter(|range| !range.is_empty()).copied().collect();
    sorted.sort_unstable_by_key(|range| range.begin);

    let mut expected_begin = 0;
    for range in sorted {
        if range.begin > expected_begin {
            return Err(Error::invalid_argument(format!(
                "indices [{expected_begin}, {}) are not owned by any part",
                range.begin
            )));
        } else if range.begin < expected_begin {
            return Err(Error::invalid_argument(format!(
                "ownership range {range} overlaps with a preceding range"
            )));
        }
        expected_begin = range.end;
    }

    if expected_begin != size {
        return Err(Error::invalid_argument(format!(
            "indices [{expected_begin}, {size}) are not owned by any part"
        )));
    }
    Ok(())
}
