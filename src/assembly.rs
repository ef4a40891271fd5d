//! Two-pass global assembly driven by a [`DofMap`] and a [`TensorLayout`].
//!
//! The first pass ([`assemble_pattern`]) registers the entries touched by every cell in the
//! layout's sparsity pattern and finalizes it. A backend is then allocated from the layout
//! (see [`LayoutBackend`](crate::backend::LayoutBackend)) and the second pass adds element
//! contributions into it with a [`LayoutAssembler`].
//!
//! Only locally owned entries of the primary dimension are written. Contributions to rows
//! owned by other parts are skipped; they are assembled by their owners.
use crate::dofmap::DofMap;
use crate::error::Error;
use crate::layout::TensorLayout;
use eyre::eyre;
use log::debug;
use nalgebra::{DMatrix, DMatrixViewMut, DVector, DVectorViewMut, Scalar};
use nalgebra_sparse::CsrMatrix;
use num::Zero;
use std::cell::RefCell;
use std::ops::AddAssign;

/// Computes the local matrix of a cell.
///
/// The output has one row per local trial dof and one column per local test dof of the cell,
/// in the order given by [`DofMap::cell_trial_dofs`] and [`DofMap::cell_test_dofs`]. It is
/// zeroed before every call.
pub trait ElementMatrixAssembler<T: Scalar> {
    fn assemble_element_matrix_into(&self, cell_index: usize, output: DMatrixViewMut<T>) -> eyre::Result<()>;
}

/// Computes the local vector of a cell, with one entry per local trial dof.
pub trait ElementVectorAssembler<T: Scalar> {
    fn assemble_element_vector_into(&self, cell_index: usize, output: DVectorViewMut<T>) -> eyre::Result<()>;
}

/// First assembly pass: register every cell's entries in the pattern of `layout` and
/// finalize it.
pub fn assemble_pattern(dofmap: &DofMap, layout: &TensorLayout) -> crate::Result<()> {
    let pattern = layout
        .sparsity_pattern()
        .ok_or_else(|| Error::invalid_state("cannot assemble a sparsity pattern for a dense tensor layout"))?;
    let mut pattern = pattern.write();
    dofmap.insert_into(&mut *pattern)?;
    pattern.apply()?;
    debug!(
        "Assembled sparsity pattern with {} local nonzeros ({} off-diagonal, {} non-local entries)",
        pattern.num_nonzeros()?,
        pattern.num_nonzeros_off_diagonal()?.iter().sum::<usize>(),
        pattern.non_local_entries().len()
    );
    Ok(())
}

/// Second assembly pass into storage allocated from a [`TensorLayout`].
#[derive(Debug, Clone)]
pub struct LayoutAssembler<T: Scalar> {
    // Buffers reused between cells and between assembled tensors
    workspace: RefCell<LayoutAssemblerWorkspace<T>>,
}

#[derive(Debug, Clone)]
struct LayoutAssemblerWorkspace<T: Scalar> {
    element_matrix: DMatrix<T>,
    element_vector: DVector<T>,
}

impl<T: Scalar + Zero> Default for LayoutAssembler<T> {
    fn default() -> Self {
        Self {
            workspace: RefCell::new(LayoutAssemblerWorkspace {
                element_matrix: DMatrix::zeros(0, 0),
                element_vector: DVector::zeros(0),
            }),
        }
    }
}

/// Shape of the local block of a rank 2 layout.
fn local_matrix_shape(layout: &TensorLayout) -> crate::Result<(usize, usize)> {
    if layout.rank() != 2 {
        return Err(Error::invalid_argument(format!(
            "matrix assembly requires a rank 2 layout, got rank {}",
            layout.rank()
        )));
    }
    match layout.primary_dim() {
        0 => Ok((layout.local_size(0)?, layout.size(1)?)),
        _ => Ok((layout.size(0)?, layout.local_size(1)?)),
    }
}

impl<T> LayoutAssembler<T>
where
    T: Scalar + Zero + AddAssign,
{
    /// Add the element matrices of all cells into `csr`.
    ///
    /// `csr` must have been allocated from `layout` (which must be row-major) after the first
    /// pass. An element entry without a slot in the pattern is an error.
    pub fn assemble_into_csr(
        &self,
        csr: &mut CsrMatrix<T>,
        layout: &TensorLayout,
        dofmap: &DofMap,
        element_assembler: &dyn ElementMatrixAssembler<T>,
    ) -> eyre::Result<()> {
        if layout.primary_dim() != 0 || !layout.is_sparse() {
            return Err(Error::invalid_argument("CSR assembly requires a sparse row-major layout").into());
        }
        let (nrows, ncols) = local_matrix_shape(layout)?;
        if (csr.nrows(), csr.ncols()) != (nrows, ncols) {
            return Err(eyre!(
                "CSR matrix is {}x{} but the layout describes a local block of {}x{}",
                csr.nrows(),
                csr.ncols(),
                nrows,
                ncols
            ));
        }
        let rows = layout.local_range(0)?;

        let ws = &mut *self.workspace.borrow_mut();
        let element_matrix = &mut ws.element_matrix;
        let mut skipped = 0;
        for cell in 0..dofmap.num_cells() {
            let row_dofs = dofmap.cell_trial_dofs(cell)?;
            let col_dofs = dofmap.cell_test_dofs(cell)?;
            element_matrix.resize_mut(row_dofs.len(), col_dofs.len(), T::zero());
            element_matrix.fill(T::zero());
            element_assembler.assemble_element_matrix_into(cell, DMatrixViewMut::from(&mut *element_matrix))?;

            for (local_row, &global_row) in row_dofs.iter().enumerate() {
                if !rows.contains(global_row) {
                    skipped += 1;
                    continue;
                }
                let mut csr_row = csr.row_mut(global_row - rows.begin);
                let (columns, values) = csr_row.cols_and_values_mut();
                for (local_col, &global_col) in col_dofs.iter().enumerate() {
                    let idx = columns.binary_search(&global_col).map_err(|_| {
                        Error::invalid_state(format!(
                            "entry ({global_row}, {global_col}) of cell {cell} is not in the sparsity pattern"
                        ))
                    })?;
                    values[idx] += element_matrix[(local_row, local_col)].clone();
                }
            }
        }
        if skipped > 0 {
            debug!("Skipped {skipped} element rows owned by other parts during CSR assembly");
        }
        Ok(())
    }

    /// Add the element matrices of all cells into the dense local block `matrix`.
    ///
    /// `matrix` stores the owned part of the primary dimension and the full extent of the
    /// other one, as allocated by [`LayoutBackend`](crate::backend::LayoutBackend).
    pub fn assemble_into_dense(
        &self,
        matrix: &mut DMatrix<T>,
        layout: &TensorLayout,
        dofmap: &DofMap,
        element_assembler: &dyn ElementMatrixAssembler<T>,
    ) -> eyre::Result<()> {
        let (nrows, ncols) = local_matrix_shape(layout)?;
        if matrix.shape() != (nrows, ncols) {
            return Err(eyre!(
                "matrix is {}x{} but the layout describes a local block of {}x{}",
                matrix.nrows(),
                matrix.ncols(),
                nrows,
                ncols
            ));
        }
        let primary_dim = layout.primary_dim();
        let owned = layout.local_range(primary_dim)?;

        let ws = &mut *self.workspace.borrow_mut();
        let element_matrix = &mut ws.element_matrix;
        for cell in 0..dofmap.num_cells() {
            let row_dofs = dofmap.cell_trial_dofs(cell)?;
            let col_dofs = dofmap.cell_test_dofs(cell)?;
            element_matrix.resize_mut(row_dofs.len(), col_dofs.len(), T::zero());
            element_matrix.fill(T::zero());
            element_assembler.assemble_element_matrix_into(cell, DMatrixViewMut::from(&mut *element_matrix))?;

            for (local_row, &global_row) in row_dofs.iter().enumerate() {
                for (local_col, &global_col) in col_dofs.iter().enumerate() {
                    let mut entry = [global_row, global_col];
                    if !owned.contains(entry[primary_dim]) {
                        continue;
                    }
                    entry[primary_dim] -= owned.begin;
                    matrix[(entry[0], entry[1])] += element_matrix[(local_row, local_col)].clone();
                }
            }
        }
        Ok(())
    }

    /// Add the element vectors of all cells into the owned block `vector` of a rank 1 layout.
    pub fn assemble_into_vector(
        &self,
        vector: &mut DVector<T>,
        layout: &TensorLayout,
        dofmap: &DofMap,
        element_assembler: &dyn ElementVectorAssembler<T>,
    ) -> eyre::Result<()> {
        if layout.rank() != 1 {
            return Err(Error::invalid_argument(format!(
                "vector assembly requires a rank 1 layout, got rank {}",
                layout.rank()
            ))
            .into());
        }
        let owned = layout.local_range(0)?;
        if vector.len() != owned.len() {
            return Err(eyre!(
                "vector has length {} but the layout owns {} entries",
                vector.len(),
                owned.len()
            ));
        }

        let ws = &mut *self.workspace.borrow_mut();
        let element_vector = &mut ws.element_vector;
        for cell in 0..dofmap.num_cells() {
            let dofs = dofmap.cell_trial_dofs(cell)?;
            element_vector.resize_vertically_mut(dofs.len(), T::zero());
            element_vector.fill(T::zero());
            element_assembler.assemble_element_vector_into(cell, DVectorViewMut::from(&mut *element_vector))?;

            for (local, &global) in dofs.iter().enumerate() {
                if owned.contains(global) {
                    vector[global - owned.begin] += element_vector[local].clone();
                }
            }
        }
        Ok(())
    }
}
