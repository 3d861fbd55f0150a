mod davidson;
pub use davidson::*;

mod pcg;
pub use pcg::*;

use linalg::LinalgError;
use matrix::Matrix;
use thiserror::Error;
use types::c64;

/// Bookkeeping of one diagonalization pass.
#[derive(Debug, Clone, Default)]
pub struct EigenStats {
    pub n_iter: usize,
    pub n_hpsi: usize,
    pub max_residual: f64,
    pub residuals: Vec<f64>,
}

#[derive(Debug, Error)]
pub enum EigenSolverError {
    /// The best approximation found is left in `evecs`/`evals`.
    #[error("{n_unconverged} band(s) not converged after {n_iter} iterations (max residual {max_residual:.3E})")]
    NonConvergence {
        n_unconverged: usize,
        n_iter: usize,
        n_hpsi: usize,
        max_residual: f64,
        residuals: Vec<f64>,
    },

    #[error("subspace diagonalization failed: {0}")]
    Linalg(#[from] LinalgError),

    #[error("unknown eigensolver scheme '{0}'")]
    UnknownScheme(String),

    #[error("cannot find {nev} eigenpairs in a basis of {n} plane waves")]
    BasisTooSmall { n: usize, nev: usize },

    #[error("block of {nrow} x {ncol} with {ndiag} diagonal elements does not fit a solver for {nev} eigenpairs in dimension {n}")]
    ShapeMismatch {
        n: usize,
        nev: usize,
        nrow: usize,
        ncol: usize,
        ndiag: usize,
    },
}

impl EigenSolverError {
    /// Hamiltonian applications spent before giving up.
    pub fn get_n_hpsi(&self) -> usize {
        match self {
            EigenSolverError::NonConvergence { n_hpsi, .. } => *n_hpsi,
            _ => 0,
        }
    }
}

pub trait EigenSolver: Send {
    /// Lowest `evals.len()` eigenpairs of H.
    ///
    /// `evecs` holds the initial guess on input and the eigenvectors on output,
    /// also when the pass fails to converge. A band counts as converged when
    /// its residual norm |H x - e x| drops below `ethr`; bands with zero
    /// occupation are allowed a looser tolerance.
    fn compute(
        &mut self,
        ham_on_psi: &mut dyn FnMut(&[c64], &mut [c64]),
        ham_diag: &[f64],
        evecs: &mut Matrix<c64>,
        evals: &mut [f64],
        occ: &[f64],
        ethr: f64,
        max_iter: usize,
    ) -> Result<EigenStats, EigenSolverError>;
}

pub fn new(solver_scheme: &str, n: usize, nev: usize) -> Result<Box<dyn EigenSolver>, EigenSolverError> {
    let sparse: Box<dyn EigenSolver> = match solver_scheme {
        "davidson" => Box::new(EigenSolverDavidson::new(n, nev)?),

        "pcg" => Box::new(EigenSolverPCG::new(n, nev)?),

        other => return Err(EigenSolverError::UnknownScheme(other.to_string())),
    };

    Ok(sparse)
}

pub(crate) fn check_dimensions(n: usize, nev: usize) -> Result<(), EigenSolverError> {
    if nev > n {
        return Err(EigenSolverError::BasisTooSmall { n, nev });
    }

    Ok(())
}

// evecs is n x nb and the diagonal has n elements, with nb <= nev
pub(crate) fn check_block(
    n: usize,
    nev: usize,
    ham_diag: &[f64],
    evecs: &Matrix<c64>,
    nb: usize,
) -> Result<(), EigenSolverError> {
    if nb > nev || evecs.nrow() != n || evecs.ncol() != nb || ham_diag.len() != n {
        return Err(EigenSolverError::ShapeMismatch {
            n,
            nev,
            nrow: evecs.nrow(),
            ncol: evecs.ncol(),
            ndiag: ham_diag.len(),
        });
    }

    Ok(())
}

/// Residual tolerance of one band.
pub(crate) fn band_tolerance(ethr: f64, occ: &[f64], iband: usize) -> f64 {
    match occ.get(iband) {
        Some(f) if *f < dwconsts::EPS3 => (5.0 * ethr).max(dwconsts::EPS5),
        _ => ethr,
    }
}

/// |H x - e x|
pub(crate) fn residual_norm(x: &[c64], hx: &[c64], e: f64) -> f64 {
    x.iter()
        .zip(hx.iter())
        .map(|(a, b)| (*b - e * *a).norm_sqr())
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use matrix::Dot;
    use rand::{rngs::StdRng, SeedableRng};

    pub(crate) fn toy_problem(n: usize, nev: usize, seed: u64) -> (Matrix<c64>, Vec<f64>, Matrix<c64>) {
        let m = utility::make_matrix(n);

        let h_diag = (0..n).map(|i| m[[i, i]].re).collect();

        let mut rng = StdRng::seed_from_u64(seed);

        let mut evecs = Matrix::new(n, nev);

        for i in 0..nev {
            utility::make_normalized_rand_vector(&mut rng, evecs.get_mut_col(i));
        }

        (m, h_diag, evecs)
    }

    pub(crate) fn matrix_action(m: &Matrix<c64>) -> impl FnMut(&[c64], &mut [c64]) + '_ {
        move |v: &[c64], vp: &mut [c64]| {
            let x = m.dot(&v.to_vec());
            vp.copy_from_slice(&x);
        }
    }

    #[test]
    fn test_factory() {
        assert!(new("davidson", 10, 2).is_ok());
        assert!(new("pcg", 10, 2).is_ok());
        assert!(matches!(new("lanczos", 10, 2), Err(EigenSolverError::UnknownScheme(_))));
    }

    #[test]
    fn test_basis_smaller_than_band_count() {
        for scheme in ["davidson", "pcg"].iter() {
            assert!(matches!(
                new(scheme, 1, 12),
                Err(EigenSolverError::BasisTooSmall { n: 1, nev: 12 })
            ));
        }

        // a block that does not match the solver is rejected, not indexed out of bounds
        let (m, h_diag, mut evecs) = toy_problem(10, 2, 3);
        let mut m_dot_v = matrix_action(&m);

        let mut evals = vec![0.0; 3];
        let occ = vec![1.0; 3];

        for scheme in ["davidson", "pcg"].iter() {
            let mut solver = new(scheme, 10, 3).unwrap();

            let r = solver.compute(&mut m_dot_v, &h_diag, &mut evecs, &mut evals, &occ, 1E-8, 10);

            assert!(matches!(r, Err(EigenSolverError::ShapeMismatch { ncol: 2, .. })));
        }
    }

    #[test]
    fn test_band_tolerance() {
        let occ = [2.0, 2.0, 0.0];

        assert_eq!(band_tolerance(1E-8, &occ, 0), 1E-8);
        assert_eq!(band_tolerance(1E-8, &occ, 2), 1E-5);
        assert_eq!(band_tolerance(1E-2, &occ, 2), 5E-2);

        // no occupations known yet
        assert_eq!(band_tolerance(1E-8, &[], 2), 1E-8);
    }

    #[test]
    fn test_solvers_agree_with_dense_diagonalization() {
        let n = 60;
        let nev = 8;

        let (m, h_diag, guess) = toy_problem(n, nev, 7);
        let (es, _) = linalg::eigh(&m);

        let occ = vec![1.0; nev];
        let ethr = 1E-8;

        for scheme in ["davidson", "pcg"].iter() {
            let mut solver = new(scheme, n, nev).unwrap();

            let mut evecs = guess.clone();
            let mut evals = vec![0.0; nev];

            let mut hpsi = matrix_action(&m);

            let stats = solver
                .compute(&mut hpsi, &h_diag, &mut evecs, &mut evals, &occ, ethr, 500)
                .unwrap();

            assert!(stats.n_hpsi > 0);
            assert!(stats.max_residual < ethr);

            for i in 0..nev {
                assert!((evals[i] - es[i]).abs() < ethr, "{} band {}: {} vs {}", scheme, i, evals[i], es[i]);
            }
        }
    }
}
