//! Cell connectivities: the vertex indices of each cell of a mesh.
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::ops::Deref;

pub trait Connectivity: Clone + Debug {
    /// Global indices of the vertices of the cell, in reference order.
    fn vertex_indices(&self) -> &[usize];

    fn num_vertices(&self) -> usize {
        self.vertex_indices().len()
    }
}

macro_rules! impl_simplex_connectivity {
    ($connectivity:ident, $n:expr) => {
        impl Connectivity for $connectivity {
            fn vertex_indices(&self) -> &[usize] {
                &self.0
            }
        }

        impl Deref for $connectivity {
            type Target = [usize];

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl From<[usize; $n]> for $connectivity {
            fn from(indices: [usize; $n]) -> Self {
                Self(indices)
            }
        }
    };
}

/// Connectivity for a line segment with two vertices.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Segment2Connectivity(pub [usize; 2]);

/// Connectivity for a triangle with three vertices, given counter-clockwise.
///
/// ```text
/// 2
/// | \
/// |   \
/// 0----1
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tri3Connectivity(pub [usize; 3]);

/// Connectivity for a tetrahedron with four vertices.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tet4Connectivity(pub [usize; 4]);

impl_simplex_connectivity!(Segment2Connectivity, 2);
impl_simplex_connectivity!(Tri3Connectivity, 3);
impl_simplex_connectivity!(Tet4Connectivity, 4);
