//! Finite elements binding a trial and a test space, and cursors over their local dofs.
//!
//! Following Ciarlet's definition, a finite element here consists of
//!
//! 1. a reference cell,
//! 2. a local trial space `P` with a local-to-global map `I`,
//! 3. a local test space `Q` with a local-to-global map `J`.
//!
//! Trial and test spaces are kept distinct even when they coincide, so that non-symmetric
//! formulations can use different spaces.
//!
//! Vector-valued elements are compositions of `K` scalar elements. A [`FiniteElement`] with
//! `K = 1` is a scalar element; the same type with `K > 1` is its vector-valued
//! generalization, so dof mapping logic exists only once. Global indices of the components
//! are combined according to a [`BlockLayout`].
use crate::error::{check_index, Error, Result};
use crate::layout::OwnershipRange;
use crate::mesh::Cell;
use crate::space::{AffineMap, FunctionSpace, ScalarFunction};
use femlayout_traits::allocators::DimAllocator;
use femlayout_traits::Real;
use nalgebra::{DefaultAllocator, OPoint, OVector, SVector};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

/// Dimension of a function space.
pub type SpaceDim<T, Space> = <Space as FunctionSpace<T>>::Dim;

/// How global indices of the components of a vector-valued element are laid out.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockLayout {
    /// Component `c` of scalar dof `g` lands at `K * g + c`.
    ///
    /// A partition owning scalar dofs `[b, e)` owns the contiguous range `[K b, K e)`.
    #[default]
    Interleaved,
    /// Component `c` of scalar dof `g` lands at `c * block_size + g`.
    Contiguous { block_size: usize },
}

impl BlockLayout {
    /// Global index of component `component` of scalar dof `scalar_index`.
    pub fn global_index(&self, num_components: usize, component: usize, scalar_index: usize) -> Result<usize> {
        let component = check_index("component", component, num_components)?;
        match *self {
            Self::Interleaved => Ok(num_components * scalar_index + component),
            Self::Contiguous { block_size } => {
                let scalar_index = check_index("scalar dof", scalar_index, block_size)?;
                Ok(component * block_size + scalar_index)
            }
        }
    }

    /// Inverse of [`global_index`](Self::global_index): `(component, scalar_index)`.
    pub fn split_global_index(&self, num_components: usize, global_index: usize) -> Result<(usize, usize)> {
        if num_components == 0 {
            return Err(Error::invalid_argument("a block layout needs at least one component"));
        }
        match *self {
            Self::Interleaved => Ok((global_index % num_components, global_index / num_components)),
            Self::Contiguous { block_size } => {
                let bound = num_components * block_size;
                let global_index = check_index("global dof", global_index, bound)?;
                Ok((global_index / block_size, global_index % block_size))
            }
        }
    }

    /// Global dimension of a vector space built from scalar spaces of dimension `scalar_dim`.
    pub fn global_dimension(&self, num_components: usize, scalar_dim: usize) -> usize {
        match *self {
            Self::Interleaved => num_components * scalar_dim,
            Self::Contiguous { block_size } => num_components * block_size,
        }
    }

    /// The vector ownership range corresponding to a scalar ownership range.
    ///
    /// Contiguous blocks of a partitioned scalar space are not contiguous in the vector space,
    /// so for `num_components > 1` only the trivial (full) scalar range is accepted there.
    pub fn ownership_range(
        &self,
        num_components: usize,
        scalar_range: OwnershipRange,
        scalar_dim: usize,
    ) -> Result<OwnershipRange> {
        scalar_range.validate(0, scalar_dim)?;
        match *self {
            Self::Interleaved => Ok(OwnershipRange::new(
                num_components * scalar_range.begin,
                num_components * scalar_range.end,
            )),
            Self::Contiguous { block_size } => {
                if num_components == 1 {
                    Ok(scalar_range)
                } else if scalar_range == OwnershipRange::full(scalar_dim) {
                    Ok(OwnershipRange::full(num_components * block_size))
                } else {
                    Err(Error::invalid_argument(format!(
                        "contiguous block layout cannot represent partial scalar ownership {scalar_range}"
                    )))
                }
            }
        }
    }
}

/// The trial and test space of one (scalar) component.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementComponent<P, Q> {
    pub trial: P,
    pub test: Q,
}

/// A finite element with `K` components, each binding a trial space `P` and a test space `Q`.
#[derive(Debug, Clone, PartialEq)]
pub struct FiniteElement<T, P, Q = P, const K: usize = 1> {
    components: [ElementComponent<P, Q>; K],
    block_layout: BlockLayout,
    marker: PhantomData<T>,
}

/// A finite element with a single component.
pub type ScalarElement<T, P, Q = P> = FiniteElement<T, P, Q, 1>;

/// A vector-valued finite element with `K` components.
pub type VectorElement<T, P, Q, const K: usize> = FiniteElement<T, P, Q, K>;

impl<T, P, Q> FiniteElement<T, P, Q, 1> {
    /// Create a scalar element from its trial and test spaces.
    pub fn new(trial: P, test: Q) -> Self {
        Self {
            components: [ElementComponent { trial, test }],
            block_layout: BlockLayout::Interleaved,
            marker: PhantomData,
        }
    }

    fn into_component(self) -> ElementComponent<P, Q> {
        let [component] = self.components;
        component
    }
}

impl<T, P, Q, const K: usize> FiniteElement<T, P, Q, K> {
    /// Compose `K` independently constructed scalar elements into a vector-valued element.
    pub fn from_components(components: [ScalarElement<T, P, Q>; K], block_layout: BlockLayout) -> Result<Self> {
        if K == 0 {
            return Err(Error::invalid_argument("a vector element needs at least one component"));
        }
        Ok(Self {
            components: components.map(|element| element.into_component()),
            block_layout,
            marker: PhantomData,
        })
    }

    pub fn num_components(&self) -> usize {
        K
    }

    pub fn block_layout(&self) -> BlockLayout {
        self.block_layout
    }

    pub fn component(&self, component: usize) -> Result<&ElementComponent<P, Q>> {
        check_index("component", component, K).map(|c| &self.components[c])
    }

    pub fn trial_space(&self, component: usize) -> Result<&P> {
        self.component(component).map(|c| &c.trial)
    }

    pub fn test_space(&self, component: usize) -> Result<&Q> {
        self.component(component).map(|c| &c.test)
    }

    /// Cursor over the local trial dofs, starting at the first one.
    pub fn trial_dofs(&self) -> DofCursor<'_, T, P, Q, Trial, K>
    where
        T: Real,
        P: FunctionSpace<T>,
        DefaultAllocator: DimAllocator<T, SpaceDim<T, P>>,
    {
        DofCursor::new(self)
    }

    /// Cursor over the local test dofs, starting at the first one.
    pub fn test_dofs(&self) -> DofCursor<'_, T, P, Q, Test, K>
    where
        T: Real,
        Q: FunctionSpace<T>,
        DefaultAllocator: DimAllocator<T, SpaceDim<T, Q>>,
    {
        DofCursor::new(self)
    }
}

impl<T, P, Q, const K: usize> FiniteElement<T, P, Q, K>
where
    T: Real,
    P: FunctionSpace<T>,
    Q: FunctionSpace<T, Dim = P::Dim>,
    DefaultAllocator: DimAllocator<T, P::Dim>,
{
    /// Local dimension of the trial space (summed over components).
    pub fn dim(&self) -> usize {
        self.side_dim::<Trial>()
    }

    /// Local dimension of the test space (summed over components).
    pub fn test_dim(&self) -> usize {
        self.side_dim::<Test>()
    }

    /// Global index of local trial dof `local_index` on `cell`.
    pub fn trial_dof(&self, cell: &Cell<T, P::Dim>, local_index: usize) -> Result<usize> {
        self.side_dof::<Trial>(cell, local_index)
    }

    /// Global index of local test dof `local_index` on `cell`.
    pub fn test_dof(&self, cell: &Cell<T, P::Dim>, local_index: usize) -> Result<usize> {
        self.side_dof::<Test>(cell, local_index)
    }

    /// Rebind trial and test spaces of every component to a new reference-to-cell map.
    ///
    /// Cursors borrow the element, so none can be alive while this runs.
    pub fn update(&mut self, map: &AffineMap<T, P::Dim>) -> Result<()> {
        for component in &mut self.components {
            component.trial.update(map)?;
            component.test.update(map)?;
        }
        Ok(())
    }

    fn side_dim<S>(&self) -> usize
    where
        S: ElementSide<P, Q>,
        S::Space: FunctionSpace<T, Dim = P::Dim>,
    {
        self.components
            .iter()
            .map(|component| S::space(component).dim())
            .sum()
    }

    fn side_dof<S>(&self, cell: &Cell<T, P::Dim>, local_index: usize) -> Result<usize>
    where
        S: ElementSide<P, Q>,
        S::Space: FunctionSpace<T, Dim = P::Dim>,
    {
        let mut remaining = local_index;
        for (c, component) in self.components.iter().enumerate() {
            let space = S::space(component);
            if remaining < space.dim() {
                let scalar = space.global_dof(cell, remaining)?;
                return self.block_layout.global_index(K, c, scalar);
            }
            remaining -= space.dim();
        }
        Err(Error::out_of_range(S::NAME, local_index, self.side_dim::<S>()))
    }
}

mod internal {
    pub trait Sealed {}
}

/// Selects the trial or the test space of an element component.
///
/// This is the only access cursors have to the internals of a [`FiniteElement`].
pub trait ElementSide<P, Q>: internal::Sealed {
    type Space;

    const NAME: &'static str;

    fn space(component: &ElementComponent<P, Q>) -> &Self::Space;
}

/// Marker selecting the trial space.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Trial;

/// Marker selecting the test space.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Test;

impl internal::Sealed for Trial {}
impl internal::Sealed for Test {}

impl<P, Q> ElementSide<P, Q> for Trial {
    type Space = P;

    const NAME: &'static str = "local trial dof";

    fn space(component: &ElementComponent<P, Q>) -> &P {
        &component.trial
    }
}

impl<P, Q> ElementSide<P, Q> for Test {
    type Space = Q;

    const NAME: &'static str = "local test dof";

    fn space(component: &ElementComponent<P, Q>) -> &Q {
        &component.test
    }
}

/// Cursor over the trial dofs of an element.
pub type TrialDofCursor<'a, T, P, Q, const K: usize> = DofCursor<'a, T, P, Q, Trial, K>;

/// Cursor over the test dofs of an element.
pub type TestDofCursor<'a, T, P, Q, const K: usize> = DofCursor<'a, T, P, Q, Test, K>;

/// Forward-only cursor over the local dofs of one side (trial or test) of an element.
///
/// Components are visited in order, and within each component its local dofs in order.
/// [`at_end`](Self::at_end) must be checked before every use: reading or advancing an
/// exhausted cursor fails with [`Error::InvalidState`].
#[derive(Debug)]
pub struct DofCursor<'a, T, P, Q, S, const K: usize> {
    element: &'a FiniteElement<T, P, Q, K>,
    component: usize,
    local_index: usize,
    index: usize,
    side: PhantomData<S>,
}

impl<'a, T, P, Q, S, const K: usize> DofCursor<'a, T, P, Q, S, K>
where
    T: Real,
    S: ElementSide<P, Q>,
    S::Space: FunctionSpace<T>,
    DefaultAllocator: DimAllocator<T, SpaceDim<T, S::Space>>,
{
    fn new(element: &'a FiniteElement<T, P, Q, K>) -> Self {
        let mut cursor = Self {
            element,
            component: 0,
            local_index: 0,
            index: 0,
            side: PhantomData,
        };
        cursor.skip_exhausted_components();
        cursor
    }

    fn skip_exhausted_components(&mut self) {
        while self.component < K && self.local_index >= S::space(&self.element.components[self.component]).dim() {
            self.component += 1;
            self.local_index = 0;
        }
    }

    fn current_space(&self) -> Result<&'a S::Space> {
        if self.at_end() {
            Err(Error::invalid_state(format!("{} cursor is past its end", S::NAME)))
        } else {
            Ok(S::space(&self.element.components[self.component]))
        }
    }

    pub fn at_end(&self) -> bool {
        self.component >= K
    }

    /// Move to the next dof.
    pub fn advance(&mut self) -> Result<()> {
        self.current_space()?;
        self.local_index += 1;
        self.index += 1;
        self.skip_exhausted_components();
        Ok(())
    }

    /// Position of the cursor, counted over all components.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Component of the current dof.
    pub fn component(&self) -> usize {
        self.component
    }

    /// Index of the current dof within its component's scalar space.
    pub fn local_index(&self) -> usize {
        self.local_index
    }

    /// The shape function of the current dof.
    pub fn current(&self) -> Result<ShapeFunction<'a, T, S::Space, K>> {
        let space = self.current_space()?;
        Ok(ShapeFunction {
            space,
            component: self.component,
            local_index: self.local_index,
            marker: PhantomData,
        })
    }

    /// Global index of the current dof on `cell`.
    pub fn dof(&self, cell: &Cell<T, SpaceDim<T, S::Space>>) -> Result<usize> {
        let space = self.current_space()?;
        let scalar = space.global_dof(cell, self.local_index)?;
        self.element
            .block_layout
            .global_index(K, self.component, scalar)
    }

    /// Apply the functional of the current dof on `cell` to `f` at time `t`.
    pub fn evaluate_dof(
        &self,
        cell: &Cell<T, SpaceDim<T, S::Space>>,
        f: &ScalarFunction<T, SpaceDim<T, S::Space>>,
        t: T,
    ) -> Result<T> {
        self.current_space()?
            .evaluate_dof(cell, self.local_index, f, t)
    }
}

/// A (possibly vector-valued) shape function yielded by a [`DofCursor`].
///
/// The value has one slot per component and is zero in every slot except its own.
#[derive(Debug)]
pub struct ShapeFunction<'a, T, S, const K: usize> {
    space: &'a S,
    component: usize,
    local_index: usize,
    marker: PhantomData<T>,
}

impl<'a, T, S, const K: usize> Clone for ShapeFunction<'a, T, S, K> {
    fn clone(&self) -> Self {
        Self {
            space: self.space,
            component: self.component,
            local_index: self.local_index,
            marker: PhantomData,
        }
    }
}

impl<'a, T, S, const K: usize> ShapeFunction<'a, T, S, K>
where
    T: Real,
    S: FunctionSpace<T>,
    DefaultAllocator: DimAllocator<T, S::Dim>,
{
    pub fn component(&self) -> usize {
        self.component
    }

    pub fn local_index(&self) -> usize {
        self.local_index
    }

    /// Value of the nonzero component at reference coordinates `xi`.
    pub fn evaluate_scalar(&self, xi: &OPoint<T, S::Dim>) -> Result<T> {
        self.space.evaluate_basis(self.local_index, xi)
    }

    /// Vector value at reference coordinates `xi`.
    pub fn evaluate(&self, xi: &OPoint<T, S::Dim>) -> Result<SVector<T, K>> {
        let mut value = SVector::zeros();
        value[self.component] = self.evaluate_scalar(xi)?;
        Ok(value)
    }

    /// Gradient of the nonzero component at reference coordinates `xi`.
    pub fn evaluate_gradient(&self, xi: &OPoint<T, S::Dim>) -> Result<OVector<T, S::Dim>> {
        self.space.evaluate_basis_gradient(self.local_index, xi)
    }
}
