use matrix::Matrix;
use nalgebra::{DMatrix, SymmetricEigen};
use thiserror::Error;
use types::c64;

#[derive(Debug, Error)]
pub enum LinalgError {
    #[error("overlap matrix of dimension {0} is not positive definite")]
    OverlapNotPositiveDefinite(usize),

    #[error("triangular solve failed for dimension {0}")]
    SingularFactor(usize),
}

/// Eigenpairs of a Hermitian matrix, eigenvalues in ascending order and
/// eigenvectors stored as columns in the same order.
pub fn eigh(mat: &Matrix<c64>) -> (Vec<f64>, Matrix<c64>) {
    let mut a = mat.to_dmatrix();
    hermitianize(&mut a);

    let eig = SymmetricEigen::new(a);

    sorted_pairs(eig.eigenvalues.as_slice(), &eig.eigenvectors)
}

/// Solves H c = e S c for Hermitian H and Hermitian positive definite S.
///
/// S = L L^H, A = L^{-1} H L^{-H}, A y = e y, c = L^{-H} y.
/// The returned eigenvectors are S-orthonormal.
pub fn eigh_generalized(h: &Matrix<c64>, s: &Matrix<c64>) -> Result<(Vec<f64>, Matrix<c64>), LinalgError> {
    let n = h.nrow();

    assert_eq!(h.ncol(), n);
    assert_eq!(s.nrow(), n);
    assert_eq!(s.ncol(), n);

    let mut sm = s.to_dmatrix();
    hermitianize(&mut sm);

    let chol = sm
        .cholesky()
        .ok_or(LinalgError::OverlapNotPositiveDefinite(n))?;

    let l = chol.l();

    let x = l
        .solve_lower_triangular(&h.to_dmatrix())
        .ok_or(LinalgError::SingularFactor(n))?;

    let mut a = l
        .solve_lower_triangular(&x.adjoint())
        .ok_or(LinalgError::SingularFactor(n))?;

    hermitianize(&mut a);

    let eig = SymmetricEigen::new(a);

    let y = eig.eigenvectors;

    let c = l
        .adjoint()
        .solve_upper_triangular(&y)
        .ok_or(LinalgError::SingularFactor(n))?;

    Ok(sorted_pairs(eig.eigenvalues.as_slice(), &c))
}

fn hermitianize(a: &mut DMatrix<c64>) {
    let n = a.nrows();

    for i in 0..n {
        for j in i..n {
            let v = 0.5 * (a[(j, i)] + a[(i, j)].conj());
            a[(j, i)] = v;
            a[(i, j)] = v.conj();
        }
    }
}

fn sorted_pairs(evals: &[f64], evecs: &DMatrix<c64>) -> (Vec<f64>, Matrix<c64>) {
    let n = evals.len();

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| evals[a].total_cmp(&evals[b]));

    let nrow = evecs.nrows();

    let mut sorted_vals = Vec::with_capacity(n);
    let mut sorted_vecs = Matrix::<c64>::new(nrow, n);

    for (j, &i) in order.iter().enumerate() {
        sorted_vals.push(evals[i]);
        let col: Vec<c64> = evecs.column(i).iter().cloned().collect();
        sorted_vecs.set_col(j, &col);
    }

    (sorted_vals, sorted_vecs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use matrix::Dot;

    fn hermitian_3x3() -> Matrix<c64> {
        Matrix::<c64>::from_row_slice(
            3,
            3,
            &[
                c64::new(2.0, 0.0),
                c64::new(0.5, 0.2),
                c64::new(0.0, -0.1),
                c64::new(0.5, -0.2),
                c64::new(1.0, 0.0),
                c64::new(0.3, 0.0),
                c64::new(0.0, 0.1),
                c64::new(0.3, 0.0),
                c64::new(-1.0, 0.0),
            ],
        )
    }

    #[test]
    fn test_eigh_residual_and_order() {
        let cm = hermitian_3x3();

        let (e, v) = eigh(&cm);

        assert!(e[0] <= e[1] && e[1] <= e[2]);

        for i in 0..3 {
            let x = v.get_col(i).to_vec();
            let hx = cm.dot(&x);

            for j in 0..3 {
                assert_relative_eq!((hx[j] - x[j] * e[i]).norm(), 0.0, epsilon = 1E-10);
            }
        }
    }

    #[test]
    fn test_generalized_with_identity_overlap_matches_standard() {
        let cm = hermitian_3x3();

        let (e0, _) = eigh(&cm);
        let (e1, _) = eigh_generalized(&cm, &Matrix::<c64>::identity(3)).unwrap();

        for i in 0..3 {
            assert_relative_eq!(e0[i], e1[i], epsilon = 1E-10);
        }
    }

    #[test]
    fn test_generalized_eigenvectors_are_overlap_orthonormal() {
        let h = hermitian_3x3();

        let s = Matrix::<c64>::from_row_slice(
            3,
            3,
            &[
                c64::new(1.0, 0.0),
                c64::new(0.1, 0.05),
                c64::new(0.0, 0.0),
                c64::new(0.1, -0.05),
                c64::new(1.2, 0.0),
                c64::new(0.0, 0.0),
                c64::new(0.0, 0.0),
                c64::new(0.0, 0.0),
                c64::new(0.9, 0.0),
            ],
        );

        let (e, c) = eigh_generalized(&h, &s).unwrap();

        let csc = c.adjoint().dot(&s.dot(&c));

        for i in 0..3 {
            for j in 0..3 {
                let target = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(csc[[i, j]].re, target, epsilon = 1E-10);
                assert_relative_eq!(csc[[i, j]].im, 0.0, epsilon = 1E-10);
            }

            let x = c.get_col(i).to_vec();
            let hx = h.dot(&x);
            let sx = s.dot(&x);

            for j in 0..3 {
                assert_relative_eq!((hx[j] - sx[j] * e[i]).norm(), 0.0, epsilon = 1E-10);
            }
        }
    }

    #[test]
    fn test_generalized_rejects_indefinite_overlap() {
        let h = Matrix::<c64>::identity(2);
        let s = Matrix::<c64>::from_row_slice(
            2,
            2,
            &[
                c64::new(1.0, 0.0),
                c64::new(0.0, 0.0),
                c64::new(0.0, 0.0),
                c64::new(-1.0, 0.0),
            ],
        );

        assert!(eigh_generalized(&h, &s).is_err());
    }
}
