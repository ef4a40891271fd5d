//! Local function spaces on a reference cell.
//!
//! A [`FunctionSpace`] supplies the basis functions of one scalar space together with its
//! local-to-global dof map and its dof functionals. Finite elements compose two of them
//! (trial and test) and never evaluate basis functions themselves.
use crate::error::{check_index, Error, Result};
use crate::mesh::Cell;
use crate::SmallDim;
use femlayout_traits::allocators::DimAllocator;
use femlayout_traits::Real;
use nalgebra::{DefaultAllocator, OMatrix, OPoint, OVector};
use numeric_literals::replace_float_literals;
use std::marker::PhantomData;

/// A scalar function of space and time, as evaluated by dof functionals.
pub type ScalarFunction<'a, T, D> = dyn 'a + Fn(&OPoint<T, D>, T) -> T;

pub trait FunctionSpace<T>
where
    T: Real,
    DefaultAllocator: DimAllocator<T, Self::Dim>,
{
    /// Dimension of both the reference cell and the physical cell.
    type Dim: SmallDim;

    /// Number of basis functions (local dofs) per cell.
    fn dim(&self) -> usize;

    /// Value of basis function `local_index` at reference coordinates `xi`.
    fn evaluate_basis(&self, local_index: usize, xi: &OPoint<T, Self::Dim>) -> Result<T>;

    /// Gradient of basis function `local_index` at reference coordinates `xi`, pulled back
    /// through the map given to the last [`update`](Self::update). Before any update the
    /// reference gradient is returned.
    fn evaluate_basis_gradient(&self, local_index: usize, xi: &OPoint<T, Self::Dim>) -> Result<OVector<T, Self::Dim>>;

    /// Global index of local dof `local_index` on `cell`.
    fn global_dof(&self, cell: &Cell<T, Self::Dim>, local_index: usize) -> Result<usize>;

    /// Apply the functional defining local dof `local_index` on `cell` to `f` at time `t`.
    fn evaluate_dof(
        &self,
        cell: &Cell<T, Self::Dim>,
        local_index: usize,
        f: &ScalarFunction<T, Self::Dim>,
        t: T,
    ) -> Result<T>;

    /// Rebind the space to the given reference-to-cell map.
    ///
    /// The number and numbering of dofs never change, only their geometric meaning.
    fn update(&mut self, map: &AffineMap<T, Self::Dim>) -> Result<()>;
}

/// Affine map `x = J xi + b` from reference coordinates to physical coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct AffineMap<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    jacobian: OMatrix<T, D, D>,
    translation: OVector<T, D>,
}

impl<T, D> AffineMap<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub fn from_jacobian_and_translation(jacobian: OMatrix<T, D, D>, translation: OVector<T, D>) -> Self {
        Self { jacobian, translation }
    }

    pub fn identity() -> Self {
        Self::from_jacobian_and_translation(OMatrix::<T, D, D>::identity(), OVector::<T, D>::zeros())
    }

    /// The map taking the reference simplex with corners `(-1, ..., -1)` and
    /// `(-1, ..., -1) + 2 e_i` onto the simplex with the given vertices.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn from_simplex_vertices(vertices: &[OPoint<T, D>]) -> Result<Self> {
        let d = D::dim();
        if vertices.len() != d + 1 {
            return Err(Error::invalid_argument(format!(
                "a simplex in dimension {d} has {} vertices, got {}",
                d + 1,
                vertices.len()
            )));
        }
        let x0 = &vertices[0];
        let jacobian = OMatrix::<T, D, D>::from_fn(|i, j| 0.5 * (vertices[j + 1][i] - x0[i]));
        let translation = &x0.coords + &jacobian * OVector::<T, D>::repeat(1.0);
        Ok(Self::from_jacobian_and_translation(jacobian, translation))
    }

    /// The simplex map of a cell.
    pub fn from_cell(cell: &Cell<T, D>) -> Result<Self> {
        let vertices: Vec<_> = (0..cell.num_vertices())
            .map(|i| cell.vertex(i).cloned())
            .collect::<Result<_>>()?;
        Self::from_simplex_vertices(&vertices)
    }

    pub fn jacobian(&self) -> &OMatrix<T, D, D> {
        &self.jacobian
    }

    pub fn translation(&self) -> &OVector<T, D> {
        &self.translation
    }

    pub fn map_reference_coords(&self, xi: &OPoint<T, D>) -> OPoint<T, D> {
        OPoint::from(&self.jacobian * &xi.coords + &self.translation)
    }

    /// `J^{-T}`, used to pull reference gradients back to the physical cell.
    pub fn inverse_transpose_jacobian(&self) -> Result<OMatrix<T, D, D>> {
        self.jacobian
            .clone()
            .try_inverse()
            .map(|j_inv| j_inv.transpose())
            .ok_or_else(|| Error::invalid_argument("cell map has a singular Jacobian"))
    }
}

/// Continuous piecewise linear Lagrange space on simplices.
///
/// The reference simplex has corners `(-1, ..., -1)` and `(-1, ..., -1) + 2 e_i`. Local dof
/// `i` is point evaluation at corner `i`, whose global index is the global index of vertex `i`
/// of the cell.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearLagrange<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    inverse_transpose_jacobian: Option<OMatrix<T, D, D>>,
    marker: PhantomData<T>,
}

impl<T, D> Default for LinearLagrange<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn default() -> Self {
        Self {
            inverse_transpose_jacobian: None,
            marker: PhantomData,
        }
    }
}

impl<T, D> LinearLagrange<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Reference coordinates of the node of local dof `local_index`.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn reference_node(&self, local_index: usize) -> Result<OPoint<T, D>> {
        let local_index = check_index("local dof", local_index, self.dim())?;
        let mut node = OPoint::from(OVector::<T, D>::repeat(-1.0));
        if local_index > 0 {
            node[local_index - 1] = 1.0;
        }
        Ok(node)
    }

    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn reference_gradient(&self, local_index: usize) -> Result<OVector<T, D>> {
        let local_index = check_index("local dof", local_index, self.dim())?;
        if local_index == 0 {
            Ok(OVector::<T, D>::repeat(-0.5))
        } else {
            let mut gradient = OVector::<T, D>::zeros();
            gradient[local_index - 1] = 0.5;
            Ok(gradient)
        }
    }
}

impl<T, D> FunctionSpace<T> for LinearLagrange<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    type Dim = D;

    fn dim(&self) -> usize {
        D::dim() + 1
    }

    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn evaluate_basis(&self, local_index: usize, xi: &OPoint<T, D>) -> Result<T> {
        let local_index = check_index("local dof", local_index, self.dim())?;
        // Barycentric coordinates of xi
        let lambda = |i: usize| 0.5 * (xi[i] + 1.0);
        if local_index == 0 {
            Ok((0..D::dim()).fold(1.0, |acc, i| acc - lambda(i)))
        } else {
            Ok(lambda(local_index - 1))
        }
    }

    fn evaluate_basis_gradient(&self, local_index: usize, _xi: &OPoint<T, D>) -> Result<OVector<T, D>> {
        let gradient = self.reference_gradient(local_index)?;
        Ok(match &self.inverse_transpose_jacobian {
            Some(j_inv_t) => j_inv_t * gradient,
            None => gradient,
        })
    }

    fn global_dof(&self, cell: &Cell<T, D>, local_index: usize) -> Result<usize> {
        let local_index = check_index("local dof", local_index, self.dim())?;
        cell.vertex_indices()
            .get(local_index)
            .copied()
            .ok_or_else(|| Error::out_of_range("cell vertex", local_index, cell.num_vertices()))
    }

    fn evaluate_dof(&self, cell: &Cell<T, D>, local_index: usize, f: &ScalarFunction<T, D>, t: T) -> Result<T> {
        let local_index = check_index("local dof", local_index, self.dim())?;
        let x = cell.vertex(local_index)?;
        Ok(f(x, t))
    }

    fn update(&mut self, map: &AffineMap<T, D>) -> Result<()> {
        self.inverse_transpose_jacobian = Some(map.inverse_transpose_jacobian()?);
        Ok(())
    }
}
