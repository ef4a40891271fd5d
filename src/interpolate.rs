//! Interpolation of functions onto the trial space of an element, and restriction of global
//! coefficient vectors to cells.
use crate::dofmap::DofMap;
use crate::element::{FiniteElement, ScalarElement};
use crate::error::{check_index, Result};
use crate::mesh::Cell;
use crate::space::FunctionSpace;
use femlayout_traits::allocators::DimAllocator;
use femlayout_traits::Real;
use nalgebra::{DVector, DVectorView, DefaultAllocator, OPoint, SVector, Scalar, Vector1};

/// Interpolate the vector-valued function `f` at time `t` onto the trial space of `element`.
///
/// Every trial dof of every cell is set to its functional applied to the matching component of
/// `f`. Dofs shared between cells are simply written once per cell. `output` is indexed by
/// global trial dof and must be large enough to hold all of them. Nothing is written unless
/// every dof is in bounds and every functional evaluates successfully.
pub fn interpolate<'a, T, P, Q, F, const K: usize>(
    element: &FiniteElement<T, P, Q, K>,
    cells: impl IntoIterator<Item = Cell<'a, T, P::Dim>>,
    f: F,
    t: T,
    output: &mut DVector<T>,
) -> Result<()>
where
    T: Real,
    P: FunctionSpace<T>,
    Q: FunctionSpace<T, Dim = P::Dim>,
    F: Fn(&OPoint<T, P::Dim>, T) -> SVector<T, K>,
    DefaultAllocator: DimAllocator<T, P::Dim>,
{
    let mut values = Vec::new();
    for cell in cells {
        let mut cursor = element.trial_dofs();
        while !cursor.at_end() {
            let dof = check_index("global dof", cursor.dof(&cell)?, output.len())?;
            let component = cursor.component();
            let component_fn = |x: &OPoint<T, P::Dim>, t: T| f(x, t)[component];
            values.push((dof, cursor.evaluate_dof(&cell, &component_fn, t)?));
            cursor.advance()?;
        }
    }
    for (dof, value) in values {
        output[dof] = value;
    }
    Ok(())
}

/// Interpolate the scalar function `f` at time `t` onto the trial space of `element`.
pub fn interpolate_scalar<'a, T, P, Q, F>(
    element: &ScalarElement<T, P, Q>,
    cells: impl IntoIterator<Item = Cell<'a, T, P::Dim>>,
    f: F,
    t: T,
    output: &mut DVector<T>,
) -> Result<()>
where
    T: Real,
    P: FunctionSpace<T>,
    Q: FunctionSpace<T, Dim = P::Dim>,
    F: Fn(&OPoint<T, P::Dim>, T) -> T,
    DefaultAllocator: DimAllocator<T, P::Dim>,
{
    interpolate(element, cells, |x, t| Vector1::new(f(x, t)), t, output)
}

/// The coefficients of `global` belonging to the trial dofs of `cell`, in local dof order.
pub fn restrict<'a, T: Scalar>(
    dofmap: &DofMap,
    global: impl Into<DVectorView<'a, T>>,
    cell: usize,
) -> Result<DVector<T>> {
    let global = global.into();
    let local = dofmap
        .cell_trial_dofs(cell)?
        .iter()
        .map(|&dof| check_index("global dof", dof, global.len()).map(|dof| global[dof].clone()))
        .collect::<Result<Vec<_>>>()?;
    Ok(DVector::from_vec(local))
}
