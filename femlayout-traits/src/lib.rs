use nalgebra::RealField;

pub use nalgebra;

/// Scalar type used for basis function values and dof functionals.
pub trait Real: RealField + Copy {}

impl<T: RealField + Copy> Real for T {}

pub mod allocators;
