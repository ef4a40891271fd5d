use nalgebra::{DMatrix, Scalar};
use num::{One, Zero};

/// Poor man's approx assertion for matrices
#[macro_export]
macro_rules! assert_approx_matrix_eq {
    ($x:expr, $y:expr, abstol = $tol:expr) => {{
        let diff = $x - $y;

        let max_absdiff = diff.abs().max();
        let approx_eq = max_absdiff <= $tol;

        if !approx_eq {
            println!("abstol: {:e}", $tol);
            println!("left: {}", $x);
            println!("right: {}", $y);
            println!("diff: {:e}", diff);
        }
        assert!(approx_eq);
    }};
}

/// Dense 0/1 matrix with ones at the given `(row, col)` entries.
///
/// Handy for comparing sparsity patterns against hand-written expectations.
pub fn indicator_matrix<T>(nrows: usize, ncols: usize, entries: impl IntoIterator<Item = (usize, usize)>) -> DMatrix<T>
where
    T: Scalar + Zero + One,
{
    let mut matrix = DMatrix::zeros(nrows, ncols);
    for (i, j) in entries {
        matrix[(i, j)] = T::one();
    }
    matrix
}
