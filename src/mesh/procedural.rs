//! Basic procedural mesh generation routines.
use crate::connectivity::{Segment2Connectivity, Tri3Connectivity};
use crate::mesh::{SegmentMesh1d, TriangleMesh2d};
use nalgebra::{Point1, Point2, RealField};

fn coordinate<T: RealField>(i: usize, cells_per_dim: usize) -> T {
    let i = T::from_usize(i).expect("Must be able to fit usize in T");
    let n = T::from_usize(cells_per_dim).expect("Must be able to fit usize in T");
    i / n
}

/// Uniform mesh of the unit interval `[0, 1]` with `cells_per_dim` segments.
pub fn create_unit_interval_uniform_mesh_1d<T>(cells_per_dim: usize) -> SegmentMesh1d<T>
where
    T: RealField,
{
    if cells_per_dim == 0 {
        return SegmentMesh1d::try_from_vertices_and_connectivity(Vec::new(), Vec::new())
            .expect("Empty mesh is always valid");
    }
    let vertices = (0..=cells_per_dim)
        .map(|i| Point1::new(coordinate(i, cells_per_dim)))
        .collect();
    let connectivity = (0..cells_per_dim)
        .map(|i| Segment2Connectivity([i, i + 1]))
        .collect();
    SegmentMesh1d::try_from_vertices_and_connectivity(vertices, connectivity)
        .expect("Procedural connectivity is always in bounds")
}

/// Uniform triangle mesh of the unit square `[0, 1]^2`.
///
/// Each of the `cells_per_dim x cells_per_dim` squares is split into two counter-clockwise
/// triangles along its diagonal from the lower left to the upper right corner. Vertices are
/// numbered row by row from the lower left corner.
pub fn create_unit_square_uniform_tri_mesh_2d<T>(cells_per_dim: usize) -> TriangleMesh2d<T>
where
    T: RealField,
{
    if cells_per_dim == 0 {
        return TriangleMesh2d::try_from_vertices_and_connectivity(Vec::new(), Vec::new())
            .expect("Empty mesh is always valid");
    }

    let n = cells_per_dim;
    let to_global_vertex_index = |i: usize, j: usize| (n + 1) * j + i;

    let mut vertices = Vec::with_capacity((n + 1) * (n + 1));
    for j in 0..=n {
        for i in 0..=n {
            vertices.push(Point2::new(coordinate(i, n), coordinate(j, n)));
        }
    }

    let mut connectivity = Vec::with_capacity(2 * n * n);
    for j in 0..n {
        for i in 0..n {
            let v00 = to_global_vertex_index(i, j);
            let v10 = to_global_vertex_index(i + 1, j);
            let v01 = to_global_vertex_index(i, j + 1);
            let v11 = to_global_vertex_index(i + 1, j + 1);
            connectivity.push(Tri3Connectivity([v00, v10, v11]));
            connectivity.push(Tri3Connectivity([v00, v11, v01]));
        }
    }

    TriangleMesh2d::try_from_vertices_and_connectivity(vertices, connectivity)
        .expect("Procedural connectivity is always in bounds")
}
