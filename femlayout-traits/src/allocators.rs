//! Helper traits for allocator trait bounds.
use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, DimName, Scalar, U1};

/// Allocator bounds needed for points, vectors and square maps in a single (reference or
/// geometric) dimension.
pub trait DimAllocator<T: Scalar, D: DimName>: Allocator<T, D> + Allocator<T, D, D> + Allocator<T, U1, D> {}

impl<T, D> DimAllocator<T, D> for DefaultAllocator
where
    T: Scalar,
    D: DimName,
    DefaultAllocator: Allocator<T, D> + Allocator<T, D, D> + Allocator<T, U1, D>,
{
}
