//! Dense symmetric eigendecomposition and SVD, delegated to nalgebra.
//!
//! Inputs and outputs stay ndarray matrices; results are reordered so the
//! largest eigenvalue comes first.

use crate::error::{Error, Result};
use crate::{Matrix, Vector};
use nalgebra::{DMatrix, SymmetricEigen, SVD};
use std::cmp::Ordering;

const MAX_ITERATIONS: usize = 1000;

fn to_nalgebra(matrix: &Matrix) -> DMatrix<f64> {
    DMatrix::from_fn(matrix.nrows(), matrix.ncols(), |i, j| matrix[[i, j]])
}

fn from_nalgebra(matrix: &DMatrix<f64>) -> Matrix {
    Matrix::from_shape_fn((matrix.nrows(), matrix.ncols()), |(i, j)| matrix[(i, j)])
}

/// Eigenvalues in descending order, with the matching unit eigenvectors
/// stored as the columns of the returned matrix.
pub(crate) fn symmetric_eigen(matrix: &Matrix) -> Result<(Vector, Matrix)> {
    let n = matrix.nrows();
    if n != matrix.ncols() {
        return Err(Error::DimensionMismatch {
            expected: n,
            found: matrix.ncols(),
        });
    }
    if n == 0 {
        return Ok((Vector::zeros(0), Matrix::zeros((0, 0))));
    }

    let eigen = SymmetricEigen::try_new(to_nalgebra(matrix), f64::EPSILON, MAX_ITERATIONS).ok_or(
        Error::Convergence {
            solver: "symmetric eigensolver",
            iterations: MAX_ITERATIONS,
        },
    )?;

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        eigen.eigenvalues[b]
            .partial_cmp(&eigen.eigenvalues[a])
            .unwrap_or(Ordering::Equal)
    });

    let eigenvalues: Vector = order.iter().map(|&i| eigen.eigenvalues[i]).collect();
    let eigenvectors = Matrix::from_shape_fn((n, n), |(row, col)| eigen.eigenvectors[(row, order[col])]);

    Ok((eigenvalues, eigenvectors))
}

/// `m = U diag(s) Vᵀ`, returned as `(U, s, V)`.
pub(crate) fn svd(matrix: &Matrix) -> Result<(Matrix, Vector, Matrix)> {
    let failed = Error::Convergence {
        solver: "singular value decomposition",
        iterations: MAX_ITERATIONS,
    };
    let decomposition = SVD::try_new(to_nalgebra(matrix), true, true, f64::EPSILON, MAX_ITERATIONS);
    let Some(SVD {
        u: Some(u),
        v_t: Some(v_t),
        singular_values,
        ..
    }) = decomposition
    else {
        return Err(failed);
    };

    let singular: Vector = singular_values.iter().copied().collect();
    Ok((from_nalgebra(&u), singular, from_nalgebra(&v_t).reversed_axes()))
}
