//! Cached local-to-global dof maps for the trial and test side of an element on a mesh.
use crate::connectivity::Connectivity;
use crate::element::{BlockLayout, ElementSide, FiniteElement, SpaceDim, Test, Trial};
use crate::error::{check_index, Error, Result};
use crate::layout::{OwnershipRange, TensorLayout};
use crate::mesh::{Cell, Mesh};
use crate::partition::Partition;
use crate::space::FunctionSpace;
use crate::sparsity::GenericSparsityPattern;
use femlayout_traits::allocators::DimAllocator;
use femlayout_traits::Real;
use log::debug;
use nalgebra::DefaultAllocator;
use rustc_hash::FxHashMap;

/// Global dofs of every cell, stored back to back.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CellDofs {
    offsets: Vec<usize>,
    indices: Vec<usize>,
}

impl Default for CellDofs {
    fn default() -> Self {
        Self {
            offsets: vec![0],
            indices: Vec::new(),
        }
    }
}

impl CellDofs {
    fn num_cells(&self) -> usize {
        self.offsets.len() - 1
    }

    fn get(&self, cell: usize) -> Option<&[usize]> {
        let begin = *self.offsets.get(cell)?;
        let end = *self.offsets.get(cell + 1)?;
        Some(&self.indices[begin..end])
    }

    fn push_cell(&mut self, dofs: impl IntoIterator<Item = usize>) {
        self.indices.extend(dofs);
        self.offsets.push(self.indices.len());
    }

    fn max_index(&self) -> Option<usize> {
        self.indices.iter().copied().max()
    }
}

/// One side (trial or test) of a dof map.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct SideMap {
    cells: CellDofs,
    // Local offset of each component within a cell, plus the total local dimension
    component_offsets: Vec<usize>,
    dimension: usize,
    scalar_dimension: usize,
}

/// Local-to-global dof maps of an element on a collection of cells.
///
/// Trial dofs index the rows (dimension 0) of the global tensor and test dofs its columns
/// (dimension 1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DofMap {
    num_components: usize,
    block_layout: BlockLayout,
    trial: SideMap,
    test: SideMap,
}

impl DofMap {
    /// Build the dof map of `element` on every cell of `mesh`.
    pub fn build<T, P, Q, C, const K: usize>(element: &FiniteElement<T, P, Q, K>, mesh: &Mesh<T, P::Dim, C>) -> Result<Self>
    where
        T: Real,
        P: FunctionSpace<T>,
        Q: FunctionSpace<T, Dim = P::Dim>,
        C: Connectivity,
        DefaultAllocator: DimAllocator<T, P::Dim>,
    {
        Self::from_cells(element, mesh.cells())
    }

    /// Build the dof map of `element` on the given cells.
    ///
    /// Cells are numbered by their position in the iterator. The global dimensions are
    /// inferred from the largest dof index seen, so they only match the full space when the
    /// cells touch its last dof. Use [`from_cells_with_dimensions`](Self::from_cells_with_dimensions)
    /// for a subset of cells, such as the cells of one part.
    pub fn from_cells<'a, T, P, Q, const K: usize>(
        element: &FiniteElement<T, P, Q, K>,
        cells: impl IntoIterator<Item = Cell<'a, T, P::Dim>>,
    ) -> Result<Self>
    where
        T: Real,
        P: FunctionSpace<T>,
        Q: FunctionSpace<T, Dim = P::Dim>,
        DefaultAllocator: DimAllocator<T, P::Dim>,
    {
        Self::from_cells_impl(element, cells, None)
    }

    /// Build the dof map of `element` on the given cells, with the global scalar dimensions
    /// of the trial and test spaces given explicitly.
    ///
    /// Every part building from its own cells with the same dimensions gets the same global
    /// shape. Fails with `InvalidArgument` if a cell refers to a scalar dof at or beyond the
    /// given dimension, or if a contiguous block layout disagrees with it.
    pub fn from_cells_with_dimensions<'a, T, P, Q, const K: usize>(
        element: &FiniteElement<T, P, Q, K>,
        cells: impl IntoIterator<Item = Cell<'a, T, P::Dim>>,
        trial_scalar_dimension: usize,
        test_scalar_dimension: usize,
    ) -> Result<Self>
    where
        T: Real,
        P: FunctionSpace<T>,
        Q: FunctionSpace<T, Dim = P::Dim>,
        DefaultAllocator: DimAllocator<T, P::Dim>,
    {
        Self::from_cells_impl(element, cells, Some([trial_scalar_dimension, test_scalar_dimension]))
    }

    fn from_cells_impl<'a, T, P, Q, const K: usize>(
        element: &FiniteElement<T, P, Q, K>,
        cells: impl IntoIterator<Item = Cell<'a, T, P::Dim>>,
        scalar_dimensions: Option<[usize; 2]>,
    ) -> Result<Self>
    where
        T: Real,
        P: FunctionSpace<T>,
        Q: FunctionSpace<T, Dim = P::Dim>,
        DefaultAllocator: DimAllocator<T, P::Dim>,
    {
        let mut trial = CellDofs::default();
        let mut test = CellDofs::default();
        let mut trial_buffer = Vec::with_capacity(element.dim());
        let mut test_buffer = Vec::with_capacity(element.test_dim());

        for cell in cells {
            trial_buffer.clear();
            let mut cursor = element.trial_dofs();
            while !cursor.at_end() {
                trial_buffer.push(cursor.dof(&cell)?);
                cursor.advance()?;
            }
            trial.push_cell(trial_buffer.iter().copied());

            test_buffer.clear();
            let mut cursor = element.test_dofs();
            while !cursor.at_end() {
                test_buffer.push(cursor.dof(&cell)?);
                cursor.advance()?;
            }
            test.push_cell(test_buffer.iter().copied());
        }

        let block_layout = element.block_layout();
        let [trial_scalar_dimension, test_scalar_dimension] = match scalar_dimensions {
            Some([trial, test]) => [Some(trial), Some(test)],
            None => [None, None],
        };
        let trial = SideMap::from_cell_dofs::<T, P, Q, Trial, K>(element, trial, trial_scalar_dimension)?;
        let test = SideMap::from_cell_dofs::<T, P, Q, Test, K>(element, test, test_scalar_dimension)?;
        debug!(
            "Built dof map on {} cells: {} trial dofs and {} test dofs ({} components, {:?})",
            trial.cells.num_cells(),
            trial.dimension,
            test.dimension,
            K,
            block_layout
        );

        Ok(Self {
            num_components: K,
            block_layout,
            trial,
            test,
        })
    }

    pub fn num_cells(&self) -> usize {
        self.trial.cells.num_cells()
    }

    pub fn num_components(&self) -> usize {
        self.num_components
    }

    pub fn block_layout(&self) -> BlockLayout {
        self.block_layout
    }

    /// Global dimension of the trial space (number of rows of the global tensor).
    pub fn trial_dimension(&self) -> usize {
        self.trial.dimension
    }

    /// Global dimension of the test space (number of columns of the global tensor).
    pub fn test_dimension(&self) -> usize {
        self.test.dimension
    }

    /// Global trial dofs of `cell`, in local dof order.
    pub fn cell_trial_dofs(&self, cell: usize) -> Result<&[usize]> {
        self.trial
            .cells
            .get(cell)
            .ok_or_else(|| Error::out_of_range("cell", cell, self.num_cells()))
    }

    /// Global test dofs of `cell`, in local dof order.
    pub fn cell_test_dofs(&self, cell: usize) -> Result<&[usize]> {
        self.test
            .cells
            .get(cell)
            .ok_or_else(|| Error::out_of_range("cell", cell, self.num_cells()))
    }

    /// Register the trial x test dof block of every cell in `pattern`.
    pub fn insert_into(&self, pattern: &mut dyn GenericSparsityPattern) -> Result<()> {
        for cell in 0..self.num_cells() {
            pattern.insert([self.cell_trial_dofs(cell)?, self.cell_test_dofs(cell)?])?;
        }
        Ok(())
    }

    /// Register every cell's entries in the sparsity pattern attached to `layout`.
    pub fn build_sparsity(&self, layout: &TensorLayout) -> Result<()> {
        let pattern = layout
            .sparsity_pattern()
            .ok_or_else(|| Error::invalid_state("cannot build sparsity for a dense tensor layout"))?;
        let mut pattern = pattern.write();
        self.insert_into(&mut *pattern)
    }

    /// Layout of the global matrix with trial dofs as rows and test dofs as columns.
    ///
    /// The primary dimension is split between the parts of `partition` (keeping all
    /// components of a scalar dof in the same part); the other dimension is owned entirely.
    pub fn tensor_layout(&self, partition: &Partition, primary_dim: usize, sparse: bool) -> Result<TensorLayout> {
        let sides = [&self.trial, &self.test];
        let primary = sides
            .get(primary_dim)
            .ok_or_else(|| Error::invalid_argument(format!("primary dimension {primary_dim} is not 0 or 1")))?;

        let mut ownership = [
            OwnershipRange::full(self.trial.dimension),
            OwnershipRange::full(self.test.dimension),
        ];
        ownership[primary_dim] = self.side_ownership_range(primary, partition)?;

        TensorLayout::new(
            vec![self.trial.dimension, self.test.dimension],
            primary_dim,
            ownership.to_vec(),
            sparse,
        )
    }

    /// Dense rank 1 layout of the trial space, split between the parts of `partition`.
    pub fn vector_layout(&self, partition: &Partition) -> Result<TensorLayout> {
        let range = self.side_ownership_range(&self.trial, partition)?;
        TensorLayout::new(vec![self.trial.dimension], 0, vec![range], false)
    }

    fn side_ownership_range(&self, side: &SideMap, partition: &Partition) -> Result<OwnershipRange> {
        let scalar_range = partition.ownership_range(side.scalar_dimension);
        self.block_layout
            .ownership_range(self.num_components, scalar_range, side.scalar_dimension)
    }

    /// The scalar dof map of a single component.
    ///
    /// Returns the collapsed map together with the map from collapsed trial dofs to the
    /// corresponding trial dofs of this map.
    pub fn collapse(&self, component: usize) -> Result<(DofMap, FxHashMap<usize, usize>)> {
        let component = check_index("component", component, self.num_components)?;
        let mut collapsed_to_original = FxHashMap::default();
        let trial = self.collapse_side(&self.trial, component, Some(&mut collapsed_to_original))?;
        let test = self.collapse_side(&self.test, component, None)?;
        let collapsed = DofMap {
            num_components: 1,
            block_layout: BlockLayout::Interleaved,
            trial,
            test,
        };
        Ok((collapsed, collapsed_to_original))
    }

    fn collapse_side(
        &self,
        side: &SideMap,
        component: usize,
        mut collapsed_to_original: Option<&mut FxHashMap<usize, usize>>,
    ) -> Result<SideMap> {
        let begin = side.component_offsets[component];
        let end = side.component_offsets[component + 1];
        let mut cells = CellDofs::default();
        for cell in 0..side.cells.num_cells() {
            let dofs = side
                .cells
                .get(cell)
                .expect("Cell index is always in bounds");
            let mut collapsed = Vec::with_capacity(end - begin);
            for &global in &dofs[begin..end] {
                let (_, scalar) = self
                    .block_layout
                    .split_global_index(self.num_components, global)?;
                if let Some(map) = collapsed_to_original.as_deref_mut() {
                    map.insert(scalar, global);
                }
                collapsed.push(scalar);
            }
            cells.push_cell(collapsed);
        }
        let scalar_dimension = side.scalar_dimension;
        Ok(SideMap {
            cells,
            component_offsets: vec![0, end - begin],
            dimension: scalar_dimension,
            scalar_dimension,
        })
    }
}

impl SideMap {
    fn from_cell_dofs<T, P, Q, S, const K: usize>(
        element: &FiniteElement<T, P, Q, K>,
        cells: CellDofs,
        scalar_dimension: Option<usize>,
    ) -> Result<Self>
    where
        T: Real,
        S: ElementSide<P, Q>,
        S::Space: FunctionSpace<T>,
        DefaultAllocator: DimAllocator<T, SpaceDim<T, S::Space>>,
    {
        let mut component_offsets = Vec::with_capacity(K + 1);
        component_offsets.push(0);
        for c in 0..K {
            let space = S::space(element.component(c)?);
            let last = *component_offsets.last().expect("Offsets are never empty");
            component_offsets.push(last + space.dim());
        }

        let block_layout = element.block_layout();
        // Smallest scalar dimension covering every dof the cells refer to
        let required = match cells.max_index() {
            Some(max) => block_layout.split_global_index(K, max)?.1 + 1,
            None => 0,
        };
        let scalar_dimension = match (block_layout, scalar_dimension) {
            (BlockLayout::Contiguous { block_size }, Some(given)) if given != block_size => {
                return Err(Error::invalid_argument(format!(
                    "scalar dimension {given} does not match contiguous block size {block_size}"
                )));
            }
            (BlockLayout::Contiguous { block_size }, _) => block_size,
            (BlockLayout::Interleaved, Some(given)) => given,
            (BlockLayout::Interleaved, None) => required,
        };
        if required > scalar_dimension {
            return Err(Error::invalid_argument(format!(
                "cells refer to scalar dof {} but the scalar dimension is {scalar_dimension}",
                required - 1
            )));
        }
        let dimension = block_layout.global_dimension(K, scalar_dimension);

        Ok(Self {
            cells,
            component_offsets,
            dimension,
            scalar_dimension,
        })
    }
}
