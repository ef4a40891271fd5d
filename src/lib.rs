//! Tensor layouts, sparsity patterns and degree-of-freedom maps for finite element assembly.
//!
//! Assembly of a global matrix happens in two passes:
//!
//! 1. The [`DofMap`](dofmap::DofMap) of a [`FiniteElement`](element::FiniteElement) enumerates
//!    for each cell the global rows and columns it touches. These are registered in the
//!    sparsity pattern attached to a [`TensorLayout`](layout::TensorLayout), which is then
//!    finalized.
//! 2. A backend allocates its storage from the finalized layout and local element
//!    contributions are added into it.
use nalgebra::{DimMin, DimName};

pub mod assembly;
pub mod backend;
pub mod connectivity;
pub mod dofmap;
pub mod element;
pub mod error;
pub mod interpolate;
pub mod layout;
pub mod mesh;
pub mod partition;
pub mod sparsity;
pub mod space;

#[cfg(feature = "proptest")]
pub mod proptest;

pub extern crate eyre;
pub extern crate nalgebra;
pub extern crate nalgebra_sparse;

pub use error::{Error, Result};
pub use femlayout_traits::Real;

/// A small, fixed-size dimension.
///
/// Used as a trait alias for various traits frequently needed by generic `femlayout` routines.
pub trait SmallDim: DimName + DimMin<Self, Output = Self> {}

impl<D> SmallDim for D where D: DimName + DimMin<Self, Output = Self> {}
