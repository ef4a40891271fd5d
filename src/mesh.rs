//! Minimal mesh representation consumed by dof maps and function spaces.
//!
//! Meshes are owned by the caller; the rest of the crate only ever sees a [`Cell`] view.
use crate::connectivity::{Connectivity, Segment2Connectivity, Tet4Connectivity, Tri3Connectivity};
use crate::error::{check_index, Error, Result};
use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, DimName, OPoint, Scalar, U1, U2, U3};
use serde::{Deserialize, Serialize};

pub mod procedural;

/// Index-based data structure for conforming meshes (i.e. no hanging nodes).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: Deserialize<'de>"))]
pub struct Mesh<T: Scalar, D, C>
where
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    #[serde(bound(
        serialize = "<DefaultAllocator as Allocator<T, D>>::Buffer: Serialize",
        deserialize = "<DefaultAllocator as Allocator<T, D>>::Buffer: Deserialize<'de>"
    ))]
    vertices: Vec<OPoint<T, D>>,
    #[serde(bound(serialize = "C: Serialize", deserialize = "C: Deserialize<'de>"))]
    connectivity: Vec<C>,
}

pub type SegmentMesh1d<T> = Mesh<T, U1, Segment2Connectivity>;
pub type TriangleMesh2d<T> = Mesh<T, U2, Tri3Connectivity>;
pub type Tet4Mesh<T> = Mesh<T, U3, Tet4Connectivity>;

impl<T, D, C> Mesh<T, D, C>
where
    T: Scalar,
    D: DimName,
    C: Connectivity,
    DefaultAllocator: Allocator<T, D>,
{
    /// Construct a mesh from vertices and connectivity.
    ///
    /// Fails with [`Error::OutOfRange`] if any connectivity references a vertex that does not
    /// exist.
    pub fn try_from_vertices_and_connectivity(vertices: Vec<OPoint<T, D>>, connectivity: Vec<C>) -> Result<Self> {
        for conn in &connectivity {
            if let Some(&bad) = conn
                .vertex_indices()
                .iter()
                .find(|&&v| v >= vertices.len())
            {
                return Err(Error::out_of_range("vertex", bad, vertices.len()));
            }
        }
        Ok(Self { vertices, connectivity })
    }

    pub fn vertices(&self) -> &[OPoint<T, D>] {
        &self.vertices
    }

    pub fn connectivity(&self) -> &[C] {
        &self.connectivity
    }

    pub fn num_cells(&self) -> usize {
        self.connectivity.len()
    }

    pub fn cell(&self, index: usize) -> Result<Cell<'_, T, D>> {
        let index = check_index("cell", index, self.num_cells())?;
        Ok(Cell::from_parts(
            index,
            self.connectivity[index].vertex_indices(),
            &self.vertices,
        ))
    }

    pub fn cells(&self) -> impl '_ + Iterator<Item = Cell<'_, T, D>> {
        self.connectivity
            .iter()
            .enumerate()
            .map(move |(index, conn)| Cell::from_parts(index, conn.vertex_indices(), &self.vertices))
    }
}

/// A view of one cell of a mesh.
#[derive(Debug)]
pub struct Cell<'a, T, D>
where
    T: Scalar,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    index: usize,
    vertex_indices: &'a [usize],
    mesh_vertices: &'a [OPoint<T, D>],
}

impl<'a, T, D> Clone for Cell<'a, T, D>
where
    T: Scalar,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, T, D> Copy for Cell<'a, T, D>
where
    T: Scalar,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
}

impl<'a, T, D> Cell<'a, T, D>
where
    T: Scalar,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    /// Build a cell view from its index, its vertex indices and *all* vertices of the mesh.
    ///
    /// External mesh types use this to hand cells to the dof machinery.
    pub fn from_parts(index: usize, vertex_indices: &'a [usize], mesh_vertices: &'a [OPoint<T, D>]) -> Self {
        Self {
            index,
            vertex_indices,
            mesh_vertices,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn num_vertices(&self) -> usize {
        self.vertex_indices.len()
    }

    pub fn vertex_indices(&self) -> &'a [usize] {
        self.vertex_indices
    }

    /// Coordinates of local vertex `i`.
    pub fn vertex(&self, i: usize) -> Result<&'a OPoint<T, D>> {
        let i = check_index("cell vertex", i, self.num_vertices())?;
        let global = self.vertex_indices[i];
        self.mesh_vertices
            .get(global)
            .ok_or_else(|| Error::out_of_range("vertex", global, self.mesh_vertices.len()))
    }

    pub fn vertices(&self) -> impl 'a + Iterator<Item = &'a OPoint<T, D>> {
        let mesh_vertices = self.mesh_vertices;
        self.vertex_indices
            .iter()
            .filter_map(move |&v| mesh_vertices.get(v))
    }
}
