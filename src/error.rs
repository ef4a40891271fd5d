//! Error type shared by layouts, sparsity patterns and dof maps.
//!
//! Every variant describes a precondition violated by the caller. None of them are transient:
//! retrying the same operation with the same arguments always fails the same way.
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A dimension, component or local index is outside its valid bound.
    #[error("{what} index {index} is out of range (bound is {bound})")]
    OutOfRange {
        what: &'static str,
        index: usize,
        bound: usize,
    },
    /// Shape and ownership data are inconsistent, or an interval is malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A cursor was used past its end, or a finalized structure was mutated.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn out_of_range(what: &'static str, index: usize, bound: usize) -> Self {
        Self::OutOfRange { what, index, bound }
    }

    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub(crate) fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }
}

/// Returns `index` unchanged if it is below `bound`.
pub(crate) fn check_index(what: &'static str, index: usize, bound: usize) -> Result<usize> {
    if index < bound {
        Ok(index)
    } else {
        Err(Error::out_of_range(what, index, bound))
    }
}
