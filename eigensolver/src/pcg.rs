use crate::{band_tolerance, check_block, check_dimensions, residual_norm, EigenSolver, EigenSolverError, EigenStats};
use dwconsts::*;
use matrix::*;
use num_traits::identities::Zero;
use types::c64;

/// Band-by-band preconditioned conjugate gradient on the Rayleigh quotient.
///
/// Every sweep over the bands ends with a Rayleigh-Ritz step in the span of
/// the block, which also gives the residuals the convergence test uses.
pub struct EigenSolverPCG {
    npw: usize,
    nband: usize,

    // work space
    x0: Vec<c64>,
    h_x0: Vec<c64>,
    d0: Vec<c64>,
    p0: Vec<c64>,
    h_p0: Vec<c64>,
    g1: Vec<c64>,
    pg0: Vec<c64>,
    pg1: Vec<c64>,
    precond: Vec<c64>,
}

/// CG steps between two direct applications of H to the current band.
const REFRESH_STEPS: usize = 10;

/// Sweeps over the block before giving up.
const MAX_SWEEPS: usize = 4;

impl EigenSolverPCG {
    pub fn new(npw: usize, nband: usize) -> Result<EigenSolverPCG, EigenSolverError> {
        check_dimensions(npw, nband)?;

        let zeros = vec![c64::zero(); npw];

        Ok(EigenSolverPCG {
            npw,
            nband,
            x0: zeros.clone(),
            h_x0: zeros.clone(),
            d0: zeros.clone(),
            p0: zeros.clone(),
            h_p0: zeros.clone(),
            g1: zeros.clone(),
            pg0: zeros.clone(),
            pg1: zeros.clone(),
            precond: zeros,
        })
    }

    // x0 orthonormalized to the lower bands, H x0 applied directly; returns <x0|H|x0>
    fn refresh(
        &mut self,
        ham_on_psi: &mut dyn FnMut(&[c64], &mut [c64]),
        evecs: &Matrix<c64>,
        iband: usize,
    ) -> f64 {
        orthogonalize_to_lower_bands(evecs, iband, &mut self.x0);

        if utility::normalize_vector_c64(&mut self.x0) < EPS14 {
            // the guess lies in the span of the lower bands
            for k in 0..self.npw {
                self.x0.iter_mut().for_each(|x| *x = c64::zero());
                self.x0[(iband + k) % self.npw] = ONE_C64;

                orthogonalize_to_lower_bands(evecs, iband, &mut self.x0);

                if utility::normalize_vector_c64(&mut self.x0) > EPS8 {
                    break;
                }
            }
        }

        ham_on_psi(&self.x0, &mut self.h_x0);

        utility::zdot_product(&self.x0, &self.h_x0).re
    }

    // CG on band iband until its gradient, projected out of the lower bands,
    // drops below tol; returns (CG steps, H applications)
    fn minimize_band(
        &mut self,
        ham_on_psi: &mut dyn FnMut(&[c64], &mut [c64]),
        ham_diag: &[f64],
        evecs: &mut Matrix<c64>,
        iband: usize,
        tol: f64,
        max_iter: usize,
    ) -> (usize, usize) {
        let npw = self.npw;

        self.x0.copy_from_slice(evecs.get_col(iband));

        let mut omega = self.refresh(ham_on_psi, evecs, iband);
        let mut n_hpsi = 1;

        // H x0 is applied directly, not accumulated from the rotations
        let mut fresh = true;
        let mut since_refresh = 0;

        let mut gpg0 = 0.0;
        let mut cg_iter = 0;

        loop {
            for i in 0..npw {
                self.g1[i] = self.h_x0[i] - omega * self.x0[i];
            }

            orthogonalize_to_lower_bands(evecs, iband, &mut self.g1);

            let converged = utility::l2_norm(&self.g1) < tol;

            if (converged && !fresh) || since_refresh == REFRESH_STEPS {
                omega = self.refresh(ham_on_psi, evecs, iband);
                n_hpsi += 1;

                // the search direction stays valid, only H x0 is corrected
                fresh = true;
                since_refresh = 0;

                continue;
            }

            if converged || cg_iter == max_iter {
                break;
            }

            cg_iter += 1;

            compute_preconditioner(&self.x0, ham_diag, &mut self.precond);

            for i in 0..npw {
                self.pg1[i] = self.g1[i] * self.precond[i];
            }

            orthogonalize_to_lower_bands(evecs, iband, &mut self.pg1);

            let gpg1 = utility::zdot_product(&self.g1, &self.pg1).re;

            let beta = if cg_iter == 1 || gpg0 <= 0.0 {
                0.0
            } else {
                // Polak-Ribiere
                let xx = gpg1 - utility::zdot_product(&self.g1, &self.pg0).re;

                (xx / gpg0).max(0.0)
            };

            for i in 0..npw {
                self.d0[i] = -self.pg1[i] + beta * self.d0[i];
            }

            let proj = utility::zdot_product(&self.x0, &self.d0);

            utility::add_and_zscale(&self.x0, &mut self.d0, -proj); // d0 = d0 - proj*x0

            let dnorm = utility::l2_norm(&self.d0);

            if dnorm < EPS14 {
                break;
            }

            for i in 0..npw {
                self.p0[i] = self.d0[i] / dnorm;
            }

            ham_on_psi(&self.p0, &mut self.h_p0);
            n_hpsi += 1;

            let alpha = get_alpha(&self.x0, &self.p0, &self.h_x0, &self.h_p0);

            let t = (1.0 + alpha.norm_sqr()).sqrt();
            let cs = 1.0 / t;
            let sn = alpha / t;

            for i in 0..npw {
                self.x0[i] = cs * self.x0[i] + sn * self.p0[i];
                self.h_x0[i] = cs * self.h_x0[i] + sn * self.h_p0[i];
            }

            omega = utility::zdot_product(&self.x0, &self.h_x0).re;

            self.pg0.copy_from_slice(&self.pg1);
            gpg0 = gpg1;

            fresh = false;
            since_refresh += 1;
        }

        evecs.set_col(iband, &self.x0);

        (cg_iter, n_hpsi)
    }
}

impl EigenSolver for EigenSolverPCG {
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
        check_block(self.npw, self.nband, ham_diag, evecs, evals.len())?;

        let nband = evals.len();

        let mut n_hpsi = 0;
        let mut n_iter = 0;
        let mut residuals = vec![0.0; nband];

        let mut h_evecs = Matrix::<c64>::new(self.npw, nband);

        for sweep in 0..MAX_SWEEPS {
            // each sweep asks the bands for more, so a band that already meets
            // its tolerance still improves when its neighbours hold it back
            let reduction = EPS1.powi(sweep as i32 + 1);

            for iband in 0..nband {
                let tol = band_tolerance(ethr, occ, iband) * reduction;

                let (cg_iter, hpsi) = self.minimize_band(ham_on_psi, ham_diag, evecs, iband, tol, max_iter);

                n_iter = n_iter.max(cg_iter);
                n_hpsi += hpsi;
            }

            n_hpsi += rayleigh_ritz(ham_on_psi, evecs, &mut h_evecs, evals)?;

            for (iband, r) in residuals.iter_mut().enumerate() {
                *r = residual_norm(evecs.get_col(iband), h_evecs.get_col(iband), evals[iband]);
            }

            if (0..nband).all(|i| residuals[i] < band_tolerance(ethr, occ, i)) {
                break;
            }
        }

        let max_residual = residuals.iter().fold(0.0, |m: f64, x| x.max(m));

        let n_unconverged = (0..nband)
            .filter(|&i| residuals[i] >= band_tolerance(ethr, occ, i))
            .count();

        if n_unconverged > 0 {
            return Err(EigenSolverError::NonConvergence {
                n_unconverged,
                n_iter,
                n_hpsi,
                max_residual,
                residuals,
            });
        }

        Ok(EigenStats {
            n_iter,
            n_hpsi,
            max_residual,
            residuals,
        })
    }
}

/// Rotation x0 + alpha d0 that minimizes the Rayleigh quotient in span{x0, d0},
/// for orthonormal x0 and d0.
///
/// The lower eigenvector of [[a, b], [b*, c]] is (1, -b* / (h + sqrt(h^2 + |b|^2)))
/// with h = (c - a) / 2, which stays accurate when b is small.
pub fn get_alpha(x0: &[c64], d0: &[c64], h_x0: &[c64], h_d0: &[c64]) -> c64 {
    let a = utility::zdot_product(x0, h_x0).re;
    let b = utility::zdot_product(x0, h_d0);
    let c = utility::zdot_product(d0, h_d0).re;

    let h = 0.5 * (c - a);
    let den = h + (h * h + b.norm_sqr()).sqrt();

    if den <= 0.0 {
        return c64::zero();
    }

    -b.conj() / den
}

// Rayleigh-Ritz in the span of the columns of evecs, with H applied directly;
// leaves the Ritz vectors in evecs and H times them in h_evecs
fn rayleigh_ritz(
    ham_on_psi: &mut dyn FnMut(&[c64], &mut [c64]),
    evecs: &mut Matrix<c64>,
    h_evecs: &mut Matrix<c64>,
    evals: &mut [f64],
) -> Result<usize, EigenSolverError> {
    let nband = evecs.ncol();

    for i in 0..nband {
        ham_on_psi(evecs.get_col(i), h_evecs.get_mut_col(i));
    }

    let mut hsub = Matrix::<c64>::new(nband, nband);
    let mut ssub = Matrix::<c64>::new(nband, nband);

    for i in 0..nband {
        for j in 0..nband {
            hsub[[j, i]] = utility::zdot_product(evecs.get_col(j), h_evecs.get_col(i));
            ssub[[j, i]] = utility::zdot_product(evecs.get_col(j), evecs.get_col(i));
        }
    }

    let (es, c) = linalg::eigh_generalized(&hsub, &ssub)?;

    *evecs = rotate(evecs, &c);
    *h_evecs = rotate(h_evecs, &c);

    evals.copy_from_slice(&es[..nband]);

    Ok(nband)
}

// column i of the result is sum_j v_j c[j, i]
fn rotate(v: &Matrix<c64>, c: &Matrix<c64>) -> Matrix<c64> {
    let mut out = Matrix::<c64>::new(v.nrow(), c.ncol());

    for i in 0..c.ncol() {
        let col = out.get_mut_col(i);

        for j in 0..v.ncol() {
            let f = c[[j, i]];

            for (x, y) in col.iter_mut().zip(v.get_col(j).iter()) {
                *x += *y * f;
            }
        }
    }

    out
}

// Teter-Payne-Allan preconditioner built on the diagonal of H
fn compute_preconditioner(psi: &[c64], kin: &[f64], kgg: &mut [c64]) {
    let ek = psi
        .iter()
        .zip(kin.iter())
        .map(|(psig, ekg)| psig.norm_sqr() * ekg.abs())
        .sum::<f64>()
        .max(EPS8);

    for (&ekg, k) in kin.iter().zip(kgg.iter_mut()) {
        let x = ekg.abs() / (ek * 1.5);

        let x2 = x * x;
        let x3 = x * x2;
        let x4 = x * x3;

        let y = 27.0 + 18.0 * x + 12.0 * x2 + 8.0 * x3;

        *k = c64::new(y / (y + 16.0 * x4) * 2.0 / (1.5 * ek), 0.0);
    }
}

fn orthogonalize_to_lower_bands(evecs: &Matrix<c64>, ibnd: usize, y: &mut [c64]) {
    // Classical Gram-Schmidt: all projections first
    let proj: Vec<c64> = (0..ibnd)
        .map(|i| utility::zdot_product(evecs.get_col(i), y))
        .collect();

    for (i, &proj_coeff) in proj.iter().enumerate() {
        let psi = evecs.get_col(i);

        y.iter_mut().zip(psi.iter()).for_each(|(yi, &psi_i)| {
            *yi -= proj_coeff * psi_i;
        });
    }
}
