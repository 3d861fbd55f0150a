use crate::{band_tolerance, check_block, check_dimensions, residual_norm, EigenSolver, EigenSolverError, EigenStats};
use dwconsts::*;
use itertools::multizip;
use matrix::Matrix;
use num_traits::identities::Zero;
use types::c64;

/// Block Davidson with subspace restart.
///
/// The trial space starts from the guess block and grows by one preconditioned
/// residual per unconverged band. Once it would exceed `2 * nev` vectors it is
/// collapsed onto the current Ritz vectors.
pub struct EigenSolverDavidson {
    n: usize,
    nev: usize,
    nvecx: usize,

    // work space
    t: Vec<c64>,
    ht: Vec<c64>,
}

impl EigenSolverDavidson {
    pub fn new(n: usize, nev: usize) -> Result<EigenSolverDavidson, EigenSolverError> {
        check_dimensions(n, nev)?;

        Ok(EigenSolverDavidson {
            n,
            nev,
            nvecx: (2 * nev).min(n),
            t: vec![c64::zero(); n],
            ht: vec![c64::zero(); n],
        })
    }

    pub fn get_max_subspace(&self) -> usize {
        self.nvecx
    }
}

impl EigenSolver for EigenSolverDavidson {
    fn compute(
        &mut self,
        ham_on_psi: &mut dyn FnMut(&[c64], &mut [c64]),
        ham_diag: &[f64],
        evecs: &mut Matrix<c64>,
        evals: &mut [f64],
        occ: &[f64],
        ethr: f64,
        max_iter: usize,
    ) -> Result<EigenStats, EigenSolverError> {
        let n = self.n;
        let nb = evals.len();

        check_block(n, self.nev, ham_diag, evecs, nb)?;

        let mut n_hpsi = 0;

        let mut basis = Matrix::<c64>::new(n, 0);
        let mut h_basis = Matrix::<c64>::new(n, 0);

        // orthonormal start block

        for i in 0..nb {
            self.t.copy_from_slice(evecs.get_col(i));

            if !orthonormalize_against(&basis, &mut self.t) {
                fallback_direction(&basis, i, &mut self.t);
            }

            ham_on_psi(&self.t, &mut self.ht);
            n_hpsi += 1;

            basis.push_col(&self.t);
            h_basis.push_col(&self.ht);
        }

        let mut x = Matrix::<c64>::new(n, nb);
        let mut hx = Matrix::<c64>::new(n, nb);

        let mut residuals = vec![0.0; nb];

        let max_iter = max_iter.max(1);
        let mut n_iter = 0;

        for iter in 1..=max_iter {
            n_iter = iter;

            let hsub = project(&basis, &h_basis);
            let ssub = project(&basis, &basis);

            let (e, c) = linalg::eigh_generalized(&hsub, &ssub)?;

            ritz_vectors(&basis, &c, &mut x);
            ritz_vectors(&h_basis, &c, &mut hx);

            evals.copy_from_slice(&e[..nb]);

            let mut unconverged = Vec::new();

            for i in 0..nb {
                residuals[i] = residual_norm(x.get_col(i), hx.get_col(i), e[i]);

                if residuals[i] >= band_tolerance(ethr, occ, i) {
                    unconverged.push(i);
                }
            }

            if unconverged.is_empty() {
                for i in 0..nb {
                    evecs.set_col(i, x.get_col(i));
                }

                return Ok(EigenStats {
                    n_iter,
                    n_hpsi,
                    max_residual: max_of(&residuals),
                    residuals,
                });
            }

            if iter == max_iter {
                break;
            }

            // restart on the Ritz vectors when the space is full

            if basis.ncol() + unconverged.len() > self.nvecx {
                basis = x.clone();
                h_basis = hx.clone();
            }

            let mut n_added = 0;

            for &i in unconverged.iter() {
                let ei = e[i];

                for (t, hxi, xi, hd) in multizip((
                    self.t.iter_mut(),
                    hx.get_col(i).iter(),
                    x.get_col(i).iter(),
                    ham_diag.iter(),
                )) {
                    *t = (*hxi - ei * *xi) / preconditioner(*hd - ei);
                }

                if !orthonormalize_against(&basis, &mut self.t) {
                    continue;
                }

                ham_on_psi(&self.t, &mut self.ht);
                n_hpsi += 1;

                basis.push_col(&self.t);
                h_basis.push_col(&self.ht);

                n_added += 1;
            }

            // no new direction left outside the current space
            if n_added == 0 {
                log::debug!("davidson: trial space exhausted at iteration {}", iter);
                break;
            }
        }

        for i in 0..nb {
            evecs.set_col(i, x.get_col(i));
        }

        let n_unconverged = (0..nb)
            .filter(|&i| residuals[i] >= band_tolerance(ethr, occ, i))
            .count();

        Err(EigenSolverError::NonConvergence {
            n_unconverged,
            n_iter,
            n_hpsi,
            max_residual: max_of(&residuals),
            residuals,
        })
    }
}

// 1 / (H_GG - e), kept away from zero
fn preconditioner(x: f64) -> f64 {
    0.5 * (1.0 + x + (1.0 + (x - 1.0) * (x - 1.0)).sqrt())
}

fn max_of(v: &[f64]) -> f64 {
    v.iter().fold(0.0, |m, x| x.max(m))
}

// A^H B
fn project(a: &Matrix<c64>, b: &Matrix<c64>) -> Matrix<c64> {
    let mut m = Matrix::<c64>::new(a.ncol(), b.ncol());

    for j in 0..b.ncol() {
        for i in 0..a.ncol() {
            m[[i, j]] = utility::zdot_product(a.get_col(i), b.get_col(j));
        }
    }

    m
}

// x[:, i] = sum_j v[:, j] c[j, i] for the leading columns of c
fn ritz_vectors(v: &Matrix<c64>, c: &Matrix<c64>, x: &mut Matrix<c64>) {
    x.set_zeros();

    for i in 0..x.ncol() {
        let xi = x.get_mut_col(i);

        for j in 0..v.ncol() {
            let f = c[[j, i]];

            for (a, b) in xi.iter_mut().zip(v.get_col(j).iter()) {
                *a += f * b;
            }
        }
    }
}

/// Removes the components along the columns of `basis` (twice, for stability)
/// and normalizes. Returns false if nothing significant is left.
fn orthonormalize_against(basis: &Matrix<c64>, v: &mut [c64]) -> bool {
    if utility::normalize_vector_c64(v) < EPS30 {
        return false;
    }

    for _ in 0..2 {
        for j in 0..basis.ncol() {
            let b = basis.get_col(j);
            let proj = utility::zdot_product(b, v);

            utility::add_and_zscale(b, v, -proj);
        }
    }

    utility::normalize_vector_c64(v) > EPS8
}

// unit vectors are tried in turn when the guess is linearly dependent
fn fallback_direction(basis: &Matrix<c64>, start: usize, v: &mut [c64]) {
    let n = v.len();

    for k in 0..n {
        v.iter_mut().for_each(|x| *x = c64::zero());
        v[(start + k) % n] = ONE_C64;

        if orthonormalize_against(basis, v) {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{matrix_action, toy_problem};

    #[test]
    fn test_davidson_warm_start_is_cheap() {
        let n = 80;
        let nev = 6;

        let (m, h_diag, mut evecs) = toy_problem(n, nev, 11);
        let occ = vec![1.0; nev];
        let mut evals = vec![0.0; nev];

        let mut solver = EigenSolverDavidson::new(n, nev).unwrap();
        assert_eq!(solver.get_max_subspace(), 12);

        let mut hpsi = matrix_action(&m);

        let cold = solver
            .compute(&mut hpsi, &h_diag, &mut evecs, &mut evals, &occ, 1E-9, 300)
            .unwrap();

        let warm = solver
            .compute(&mut hpsi, &h_diag, &mut evecs, &mut evals, &occ, 1E-9, 300)
            .unwrap();

        // converged input needs only the initial block and one Rayleigh-Ritz step
        assert_eq!(warm.n_iter, 1);
        assert_eq!(warm.n_hpsi, nev);
        assert!(cold.n_hpsi > warm.n_hpsi);

        // the vectors come back orthonormal
        for i in 0..nev {
            for j in 0..nev {
                let s = utility::zdot_product(evecs.get_col(i), evecs.get_col(j));
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((s.re - expected).abs() < 1E-10 && s.im.abs() < 1E-10);
            }
        }
    }

    #[test]
    fn test_davidson_reports_non_convergence_with_partial_block() {
        let n = 80;
        let nev = 6;

        let (m, h_diag, mut evecs) = toy_problem(n, nev, 3);
        let occ = vec![1.0; nev];
        let mut evals = vec![0.0; nev];

        let mut solver = EigenSolverDavidson::new(n, nev).unwrap();
        let mut hpsi = matrix_action(&m);

        let err = solver
            .compute(&mut hpsi, &h_diag, &mut evecs, &mut evals, &occ, 1E-12, 2)
            .unwrap_err();

        match err {
            EigenSolverError::NonConvergence {
                n_unconverged,
                n_iter,
                n_hpsi,
                max_residual,
                residuals,
            } => {
                assert!(n_unconverged > 0 && n_unconverged <= nev);
                assert_eq!(n_iter, 2);
                assert!(n_hpsi > nev);
                assert_eq!(residuals.len(), nev);
                assert!(max_residual >= 1E-12);
            }

            other => panic!("unexpected error {:?}", other),
        }

        // partial Ritz values are ordered and finite
        for i in 1..nev {
            assert!(evals[i].is_finite());
            assert!(evals[i] >= evals[i - 1]);
        }

        // the partial block is a usable warm start
        let stats = solver
            .compute(&mut hpsi, &h_diag, &mut evecs, &mut evals, &occ, 1E-9, 300)
            .unwrap();

        assert!(stats.max_residual < 1E-9);
    }

    #[test]
    fn test_linearly_dependent_guess_is_repaired() {
        let n = 30;
        let nev = 3;

        let (m, h_diag, _) = toy_problem(n, nev, 5);
        let (es, _) = linalg::eigh(&m);

        // all guess vectors identical
        let mut evecs = Matrix::<c64>::new(n, nev);
        for i in 0..nev {
            evecs.get_mut_col(i).iter_mut().for_each(|x| *x = ONE_C64);
        }

        let occ = vec![1.0; nev];
        let mut evals = vec![0.0; nev];

        let mut solver = EigenSolverDavidson::new(n, nev).unwrap();
        let mut hpsi = matrix_action(&m);

        solver
            .compute(&mut hpsi, &h_diag, &mut evecs, &mut evals, &occ, 1E-9, 300)
            .unwrap();

        for i in 0..nev {
            assert!((evals[i] - es[i]).abs() < 1E-9);
        }
    }
}
