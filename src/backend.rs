//! Allocation of local tensor storage from a finalized [`TensorLayout`].
//!
//! Backends allocate exactly what the layout describes: the locally owned part of the primary
//! dimension and, for sparse storage, exactly the nonzeros of the finalized pattern. Nothing
//! is reallocated while values are inserted.
use crate::error::{Error, Result};
use crate::layout::TensorLayout;
use nalgebra::{DMatrix, DVector, Scalar};
use nalgebra_sparse::{CscMatrix, CsrMatrix};
use num::Zero;

pub trait LayoutBackend: Sized {
    /// Allocate zero-initialized local storage for `layout`.
    fn init_from_layout(layout: &TensorLayout) -> Result<Self>;
}

fn require_rank(layout: &TensorLayout, rank: usize) -> Result<()> {
    if layout.rank() == rank {
        Ok(())
    } else {
        Err(Error::invalid_argument(format!(
            "backend requires a rank {rank} layout, got rank {}",
            layout.rank()
        )))
    }
}

/// Local extents: owned part of the primary dimension, full extent of the others.
fn local_extents(layout: &TensorLayout) -> Result<Vec<usize>> {
    (0..layout.rank())
        .map(|dim| {
            if dim == layout.primary_dim() {
                layout.local_size(dim)
            } else {
                layout.size(dim)
            }
        })
        .collect()
}

fn compressed_pattern(layout: &TensorLayout, primary_dim: usize) -> Result<nalgebra_sparse::pattern::SparsityPattern> {
    require_rank(layout, 2)?;
    if layout.primary_dim() != primary_dim {
        return Err(Error::invalid_argument(format!(
            "backend requires primary dimension {primary_dim}, layout has {}",
            layout.primary_dim()
        )));
    }
    let pattern = layout
        .sparsity_pattern()
        .ok_or_else(|| Error::invalid_argument("sparse backend requires a sparse tensor layout"))?;
    let pattern = pattern.read();
    Ok(pattern.compressed()?.clone())
}

impl<T: Scalar + Zero> LayoutBackend for DVector<T> {
    fn init_from_layout(layout: &TensorLayout) -> Result<Self> {
        require_rank(layout, 1)?;
        Ok(DVector::zeros(layout.local_size(0)?))
    }
}

impl<T: Scalar + Zero> LayoutBackend for DMatrix<T> {
    fn init_from_layout(layout: &TensorLayout) -> Result<Self> {
        require_rank(layout, 2)?;
        let extents = local_extents(layout)?;
        Ok(DMatrix::zeros(extents[0], extents[1]))
    }
}

impl<T: Scalar + Zero> LayoutBackend for CsrMatrix<T> {
    fn init_from_layout(layout: &TensorLayout) -> Result<Self> {
        let pattern = compressed_pattern(layout, 0)?;
        let values = vec![T::zero(); pattern.nnz()];
        CsrMatrix::try_from_pattern_and_values(pattern, values)
            .map_err(|err| Error::invalid_state(format!("failed to allocate CSR matrix: {err}")))
    }
}

impl<T: Scalar + Zero> LayoutBackend for CscMatrix<T> {
    fn init_from_layout(layout: &TensorLayout) -> Result<Self> {
        let pattern = compressed_pattern(layout, 1)?;
        let values = vec![T::zero(); pattern.nnz()];
        CscMatrix::try_from_pattern_and_values(pattern, values)
            .map_err(|err| Error::invalid_state(format!("failed to allocate CSC matrix: {err}")))
    }
}
