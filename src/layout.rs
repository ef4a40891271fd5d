//! Description of the size, partitioning and (optionally) sparsity of a global tensor.
//!
//! A [`TensorLayout`] is a passive descriptor. It never allocates tensor storage itself;
//! backends read it through [`LayoutBackend`](crate::backend::LayoutBackend) to do so.
use crate::error::{check_index, Error, Result};
use crate::sparsity::{shared, SharedSparsityPattern, SparsityPattern};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Half-open interval `[begin, end)` of global indices owned along one dimension.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnershipRange {
    pub begin: usize,
    pub end: usize,
}

impl OwnershipRange {
    pub fn new(begin: usize, end: usize) -> Self {
        Self { begin, end }
    }

    /// The full range `[0, size)`.
    pub fn full(size: usize) -> Self {
        Self::new(0, size)
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.begin)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, index: usize) -> bool {
        self.begin <= index && index < self.end
    }

    /// Check `begin <= end <= size` for the range of dimension `dim`.
    pub(crate) fn validate(&self, dim: usize, size: usize) -> Result<()> {
        if self.begin > self.end {
            Err(Error::invalid_argument(format!(
                "ownership range {self} of dimension {dim} has begin > end"
            )))
        } else if self.end > size {
            Err(Error::invalid_argument(format!(
                "ownership range {self} of dimension {dim} exceeds size {size}"
            )))
        } else {
            Ok(())
        }
    }
}

impl From<(usize, usize)> for OwnershipRange {
    fn from((begin, end): (usize, usize)) -> Self {
        Self::new(begin, end)
    }
}

impl From<OwnershipRange> for (usize, usize) {
    fn from(range: OwnershipRange) -> Self {
        (range.begin, range.end)
    }
}

impl fmt::Display for OwnershipRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}, {})", self.begin, self.end)
    }
}

/// Whether a tensor is stored densely or with an explicit sparsity pattern.
#[derive(Debug, Clone)]
pub enum TensorSparsity {
    Dense,
    Sparse(SharedSparsityPattern),
}

impl TensorSparsity {
    pub fn is_sparse(&self) -> bool {
        matches!(self, Self::Sparse(_))
    }

    pub fn pattern(&self) -> Option<&SharedSparsityPattern> {
        match self {
            Self::Dense => None,
            Self::Sparse(pattern) => Some(pattern),
        }
    }
}

/// Size, ownership and sparsity of a (possibly distributed) tensor.
///
/// Cloning a sparse layout shares its sparsity pattern with the clone.
#[derive(Debug, Clone)]
pub struct TensorLayout {
    primary_dim: usize,
    shape: Vec<usize>,
    ownership_range: Vec<OwnershipRange>,
    sparsity: TensorSparsity,
}

impl TensorLayout {
    /// Create a layout without shape, remembering only the primary dimension and whether a
    /// sparsity pattern will be attached.
    ///
    /// The layout must be given a shape with [`init`](Self::init) before use.
    pub fn empty(primary_dim: usize, sparse: bool) -> Self {
        let sparsity = if sparse {
            TensorSparsity::Sparse(shared(SparsityPattern::new(primary_dim)))
        } else {
            TensorSparsity::Dense
        };
        Self {
            primary_dim,
            shape: Vec::new(),
            ownership_range: Vec::new(),
            sparsity,
        }
    }

    /// Create a layout with the given global shape and local ownership ranges.
    pub fn new(
        shape: Vec<usize>,
        primary_dim: usize,
        ownership_range: Vec<OwnershipRange>,
        sparse: bool,
    ) -> Result<Self> {
        let mut layout = Self::empty(primary_dim, sparse);
        layout.init(shape, ownership_range)?;
        Ok(layout)
    }

    /// Create a layout with a user-supplied sparsity pattern.
    ///
    /// The pattern is (re)initialized with the layout's shape.
    pub fn with_sparsity_pattern(
        shape: Vec<usize>,
        primary_dim: usize,
        ownership_range: Vec<OwnershipRange>,
        pattern: SharedSparsityPattern,
    ) -> Result<Self> {
        let mut layout = Self {
            primary_dim,
            shape: Vec::new(),
            ownership_range: Vec::new(),
            sparsity: TensorSparsity::Sparse(pattern),
        };
        layout.init(shape, ownership_range)?;
        Ok(layout)
    }

    /// Replace shape and ownership data.
    ///
    /// On failure the layout is left untouched. If the layout is sparse, the attached pattern
    /// is reinitialized and must be collected and finalized again. The pattern handle is
    /// shared, so this also resets the pattern seen through clones of this layout and through
    /// [`sparsity_pattern`](Self::sparsity_pattern) handles, while the shape of those clones
    /// stays as it was.
    pub fn init(&mut self, shape: Vec<usize>, ownership_range: Vec<OwnershipRange>) -> Result<()> {
        if shape.len() != ownership_range.len() {
            return Err(Error::invalid_argument(format!(
                "shape has {} dimensions but {} ownership ranges were given",
                shape.len(),
                ownership_range.len()
            )));
        }
        if shape.is_empty() {
            return Err(Error::invalid_argument("tensor rank must be at least 1"));
        }
        if self.primary_dim > 1 || self.primary_dim >= shape.len() {
            return Err(Error::invalid_argument(format!(
                "primary dimension must be 0 (row-major) or 1 (column-major) and below rank {}, got {}",
                shape.len(),
                self.primary_dim
            )));
        }
        for (dim, (&size, range)) in shape.iter().zip(&ownership_range).enumerate() {
            range.validate(dim, size)?;
        }
        if let TensorSparsity::Sparse(pattern) = &self.sparsity {
            pattern.write().init(&shape, &ownership_range)?;
        }

        debug!(
            "Initialized tensor layout with shape {:?} and ownership {:?}",
            shape, ownership_range
        );
        self.shape = shape;
        self.ownership_range = ownership_range;
        Ok(())
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Global size of dimension `i`.
    pub fn size(&self, i: usize) -> Result<usize> {
        check_index("dimension", i, self.rank()).map(|i| self.shape[i])
    }

    /// Locally owned range of dimension `dim`.
    pub fn local_range(&self, dim: usize) -> Result<OwnershipRange> {
        check_index("dimension", dim, self.rank()).map(|dim| self.ownership_range[dim])
    }

    /// Number of locally owned indices of dimension `dim`.
    pub fn local_size(&self, dim: usize) -> Result<usize> {
        self.local_range(dim).map(|range| range.len())
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ownership_ranges(&self) -> &[OwnershipRange] {
        &self.ownership_range
    }

    /// Primary storage dimension (0 for row-major, 1 for column-major).
    pub fn primary_dim(&self) -> usize {
        self.primary_dim
    }

    pub fn sparsity(&self) -> &TensorSparsity {
        &self.sparsity
    }

    /// Shared handle to the sparsity pattern, or `None` if the tensor is dense.
    pub fn sparsity_pattern(&self) -> Option<SharedSparsityPattern> {
        self.sparsity.pattern().cloned()
    }

    pub fn is_sparse(&self) -> bool {
        self.sparsity.is_sparse()
    }
}

impl fmt::Display for TensorLayout {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "<TensorLayout of rank {} (primary dim {})>", self.rank(), self.primary_dim)?;
        for (dim, (size, range)) in self.shape.iter().zip(&self.ownership_range).enumerate() {
            writeln!(f, "  dim {dim}: size {size}, local range {range}")?;
        }
        match &self.sparsity {
            TensorSparsity::Dense => write!(f, "  dense"),
            TensorSparsity::Sparse(pattern) => {
                let pattern = pattern.read();
                match pattern.num_nonzeros() {
                    Ok(nnz) => write!(f, "  sparse ({nnz} local nonzeros)"),
                    Err(_) => write!(f, "  sparse (not finalized)"),
                }
            }
        }
    }
}
