//! Sparsity patterns discovered during the structural pre-pass of assembly.
//!
//! A pattern goes through three states: uninitialized (no shape), collecting (accepts
//! insertions) and finalized (accepts queries). [`GenericSparsityPattern::init`] moves any
//! state back to collecting, [`GenericSparsityPattern::apply`] seals the collected entries.
use crate::error::{Error, Result};
use crate::layout::OwnershipRange;
use log::debug;
use nalgebra_sparse::pattern::SparsityPattern as CompressedPattern;
use parking_lot::RwLock;
use rayon::slice::ParallelSliceMut;
use std::fmt::Debug;
use std::sync::Arc;

/// Sparsity pattern shared between a [`TensorLayout`](crate::layout::TensorLayout), the
/// assembly driver and the backend that allocates from it.
pub type SharedSparsityPattern = Arc<RwLock<dyn GenericSparsityPattern>>;

/// The capability a tensor layout needs from a sparsity pattern.
///
/// Indices passed to [`insert`](Self::insert) are always given in tensor order, i.e.
/// `entries[0]` holds indices along dimension 0 (rows) and `entries[1]` along dimension 1
/// (columns). Which of the two is stored as the major (compressed) index is decided by the
/// primary dimension of the pattern.
pub trait GenericSparsityPattern: Debug + Send + Sync {
    /// (Re)initialize the pattern for the given global shape and local ownership.
    ///
    /// Any previously collected or finalized structure is discarded.
    fn init(&mut self, shape: &[usize], ownership_range: &[OwnershipRange]) -> Result<()>;

    /// Rank of the pattern, or zero if it has not been initialized.
    fn rank(&self) -> usize;

    fn primary_dim(&self) -> usize;

    /// Register every entry of the tensor product `entries[0] x entries[1]` as a potential
    /// nonzero.
    fn insert(&mut self, entries: [&[usize]; 2]) -> Result<()>;

    /// Seal the pattern. No insertions are accepted afterwards.
    fn apply(&mut self) -> Result<()>;

    fn is_finalized(&self) -> bool;

    /// Number of distinct nonzeros in the locally owned major indices.
    fn num_nonzeros(&self) -> Result<usize>;

    /// Per owned major index, the number of nonzeros whose minor index is locally owned.
    fn num_nonzeros_diagonal(&self) -> Result<Vec<usize>>;

    /// Per owned major index, the number of nonzeros whose minor index is owned elsewhere.
    fn num_nonzeros_off_diagonal(&self) -> Result<Vec<usize>>;

    /// Per owned major index, the sorted minor indices inside the locally owned minor range.
    fn diagonal_pattern(&self) -> Result<Vec<Vec<usize>>>;

    /// Per owned major index, the sorted minor indices outside the locally owned minor range.
    fn off_diagonal_pattern(&self) -> Result<Vec<Vec<usize>>>;

    /// Entries (in tensor order) whose major index is owned by another partition.
    ///
    /// These are kept so that the distributed context can ship them to their owners.
    fn non_local_entries(&self) -> &[(usize, usize)];

    /// The compressed structure over owned major indices (local major x global minor).
    fn compressed(&self) -> Result<&CompressedPattern>;
}

/// Wrap a pattern into a shared handle.
pub fn shared<P: GenericSparsityPattern + 'static>(pattern: P) -> SharedSparsityPattern {
    Arc::new(RwLock::new(pattern))
}

/// Rank 2 sparsity pattern stored in compressed form over the locally owned major indices.
#[derive(Debug, Clone)]
pub struct SparsityPattern {
    primary_dim: usize,
    shape: Option<[usize; 2]>,
    major_range: OwnershipRange,
    minor_range: OwnershipRange,
    // (local major, global minor), possibly with duplicates until `apply`
    coordinates: Vec<(usize, usize)>,
    non_local: Vec<(usize, usize)>,
    compressed: Option<CompressedPattern>,
}

impl SparsityPattern {
    /// Create an uninitialized pattern with the given primary dimension (0 or 1).
    pub fn new(primary_dim: usize) -> Self {
        Self {
            primary_dim,
            shape: None,
            major_range: OwnershipRange::default(),
            minor_range: OwnershipRange::default(),
            coordinates: Vec::new(),
            non_local: Vec::new(),
            compressed: None,
        }
    }

    fn minor_dim(&self) -> usize {
        1 - self.primary_dim
    }

    fn finalized(&self) -> Result<&CompressedPattern> {
        self.compressed
            .as_ref()
            .ok_or_else(|| Error::invalid_state("sparsity pattern has not been finalized"))
    }

    fn split_minor_indices(&self, inside: bool) -> Result<Vec<Vec<usize>>> {
        let pattern = self.finalized()?;
        let minor_range = self.minor_range;
        Ok((0..pattern.major_dim())
            .map(|major| {
                pattern
                    .lane(major)
                    .iter()
                    .copied()
                    .filter(|j| minor_range.contains(*j) == inside)
                    .collect()
            })
            .collect())
    }
}

impl GenericSparsityPattern for SparsityPattern {
    fn init(&mut self, shape: &[usize], ownership_range: &[OwnershipRange]) -> Result<()> {
        if self.primary_dim > 1 {
            return Err(Error::invalid_argument(format!(
                "primary dimension {} is not valid for a rank 2 pattern",
                self.primary_dim
            )));
        }
        if shape.len() != 2 {
            return Err(Error::invalid_argument(format!(
                "sparsity patterns require rank 2, got rank {}",
                shape.len()
            )));
        }
        if ownership_range.len() != shape.len() {
            return Err(Error::invalid_argument(format!(
                "shape has {} dimensions but {} ownership ranges were given",
                shape.len(),
                ownership_range.len()
            )));
        }
        for (dim, (&size, range)) in shape.iter().zip(ownership_range).enumerate() {
            range.validate(dim, size)?;
        }

        self.shape = Some([shape[0], shape[1]]);
        self.major_range = ownership_range[self.primary_dim];
        self.minor_range = ownership_range[self.minor_dim()];
        self.coordinates.clear();
        self.non_local.clear();
        self.compressed = None;
        debug!(
            "Initialized sparsity pattern {}x{} (primary dim {}, owned major range {})",
            shape[0], shape[1], self.primary_dim, self.major_range
        );
        Ok(())
    }

    fn rank(&self) -> usize {
        self.shape.map(|s| s.len()).unwrap_or(0)
    }

    fn primary_dim(&self) -> usize {
        self.primary_dim
    }

    fn insert(&mut self, entries: [&[usize]; 2]) -> Result<()> {
        let shape = self
            .shape
            .ok_or_else(|| Error::invalid_state("cannot insert into an uninitialized sparsity pattern"))?;
        if self.compressed.is_some() {
            return Err(Error::invalid_state("cannot insert into a finalized sparsity pattern"));
        }
        for (dim, indices) in entries.iter().enumerate() {
            if let Some(&bad) = indices.iter().find(|&&i| i >= shape[dim]) {
                return Err(Error::out_of_range("tensor", bad, shape[dim]));
            }
        }

        let majors = entries[self.primary_dim];
        let minors = entries[self.minor_dim()];
        for &major in majors {
            if self.major_range.contains(major) {
                let local_major = major - self.major_range.begin;
                self.coordinates
                    .extend(minors.iter().map(|&minor| (local_major, minor)));
            } else {
                let primary_dim = self.primary_dim;
                self.non_local.extend(minors.iter().map(|&minor| {
                    if primary_dim == 0 {
                        (major, minor)
                    } else {
                        (minor, major)
                    }
                }));
            }
        }
        Ok(())
    }

    fn apply(&mut self) -> Result<()> {
        let shape = self
            .shape
            .ok_or_else(|| Error::invalid_state("cannot finalize an uninitialized sparsity pattern"))?;
        if self.compressed.is_some() {
            return Err(Error::invalid_state("sparsity pattern is already finalized"));
        }

        let mut coordinates = std::mem::take(&mut self.coordinates);
        coordinates.par_sort_unstable();
        coordinates.dedup();
        self.non_local.par_sort_unstable();
        self.non_local.dedup();

        let num_major = self.major_range.len();
        let minor_dim = shape[self.minor_dim()];
        let mut offsets = Vec::with_capacity(num_major + 1);
        let mut minor_indices = Vec::with_capacity(coordinates.len());
        offsets.push(0);
        for (major, minor) in coordinates {
            // Loop to account for empty lanes
            while major + 1 > offsets.len() {
                offsets.push(minor_indices.len());
            }
            minor_indices.push(minor);
        }
        while offsets.len() < num_major + 1 {
            offsets.push(minor_indices.len());
        }

        let pattern = CompressedPattern::try_from_offsets_and_indices(num_major, minor_dim, offsets, minor_indices)
            .map_err(|err| Error::invalid_state(format!("failed to compress sparsity pattern: {err}")))?;
        debug!(
            "Finalized sparsity pattern with {} local nonzeros and {} non-local entries",
            pattern.nnz(),
            self.non_local.len()
        );
        self.compressed = Some(pattern);
        Ok(())
    }

    fn is_finalized(&self) -> bool {
        self.compressed.is_some()
    }

    fn num_nonzeros(&self) -> Result<usize> {
        Ok(self.finalized()?.nnz())
    }

    fn num_nonzeros_diagonal(&self) -> Result<Vec<usize>> {
        Ok(self
            .diagonal_pattern()?
            .iter()
            .map(Vec::len)
            .collect())
    }

    fn num_nonzeros_off_diagonal(&self) -> Result<Vec<usize>> {
        Ok(self
            .off_diagonal_pattern()?
            .iter()
            .map(Vec::len)
            .collect())
    }

    fn diagonal_pattern(&self) -> Result<Vec<Vec<usize>>> {
        self.split_minor_indices(true)
    }

    fn off_diagonal_pattern(&self) -> Result<Vec<Vec<usize>>> {
        self.split_minor_indices(false)
    }

    fn non_local_entries(&self) -> &[(usize, usize)] {
        &self.non_local
    }

    fn compressed(&self) -> Result<&CompressedPattern> {
        self.finalized()
    }
}
