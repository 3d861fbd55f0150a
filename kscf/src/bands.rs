use crate::KSCF;
use dwconsts::*;
use eigensolver::{EigenSolverError, EigenStats};
use matrix::Matrix;
use ndarray::Array3;
use rand::{rngs::StdRng, SeedableRng};
use rayon::prelude::*;
use rgtransform::RGTransform;
use thiserror::Error;
use types::c64;

/// Wavefunctions and eigenvalues of one k-point, kept across SCF iterations
/// as the starting guess of the next diagonalization.
#[derive(Debug, Clone)]
pub struct KPointState {
    pub evecs: Matrix<c64>,
    pub evals: Vec<f64>,
    pub n_iter: usize,
    pub n_hpsi: usize,
    pub converged: bool,
    pub max_residual: f64,
}

impl KPointState {
    fn new(evecs: Matrix<c64>, evals: Vec<f64>) -> KPointState {
        KPointState {
            evecs,
            evals,
            n_iter: 0,
            n_hpsi: 0,
            converged: false,
            max_residual: 0.0,
        }
    }
}

#[derive(Debug, Error)]
pub enum WarmStartError {
    #[error("saved state has {found} k-points, run has {expected}")]
    KPointCount { expected: usize, found: usize },

    #[error("k-point {ik}: saved block is {found:?}, expected {expected:?}")]
    Shape { ik: usize, expected: [usize; 2], found: [usize; 2] },
}

/// Per-k solver state threaded through the SCF iterations.
pub struct SolverContext {
    states: Vec<KPointState>,
}

impl SolverContext {
    /// Random start; k-point ik draws from its own generator seeded with seed + ik,
    /// so the guess does not depend on the scheduling of the k-points.
    pub fn new_random(kscfs: &[KSCF], nband: usize, seed: u64) -> SolverContext {
        let states = kscfs
            .iter()
            .map(|kscf| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(kscf.get_ik() as u64));

                let mut evecs = Matrix::<c64>::new(kscf.get_n_plane_waves(), nband);

                kscf.randomize_wavefunctions(&mut rng, &mut evecs);

                KPointState::new(evecs, vec![0.0; nband])
            })
            .collect();

        SolverContext { states }
    }

    /// Warm start from saved wavefunctions.
    pub fn from_wavefunctions(
        kscfs: &[KSCF],
        blocks: Vec<(Matrix<c64>, Vec<f64>)>,
    ) -> Result<SolverContext, WarmStartError> {
        if blocks.len() != kscfs.len() {
            return Err(WarmStartError::KPointCount {
                expected: kscfs.len(),
                found: blocks.len(),
            });
        }

        let mut states = Vec::with_capacity(blocks.len());

        for (ik, (kscf, (evecs, evals))) in kscfs.iter().zip(blocks.into_iter()).enumerate() {
            let expected = [kscf.get_n_plane_waves(), kscf.get_nbands()];
            let found = [evecs.nrow(), evecs.ncol()];

            if expected != found || evals.len() != found[1] {
                return Err(WarmStartError::Shape { ik, expected, found });
            }

            states.push(KPointState::new(evecs, evals));
        }

        Ok(SolverContext { states })
    }

    pub fn get_n_kpoints(&self) -> usize {
        self.states.len()
    }

    pub fn get_state(&self, ik: usize) -> &KPointState {
        &self.states[ik]
    }

    pub fn get_states(&self) -> &[KPointState] {
        &self.states
    }

    /// Eigenvalues of all k-points in sample order.
    pub fn get_evals_table(&self) -> Vec<Vec<f64>> {
        self.states.iter().map(|s| s.evals.clone()).collect()
    }
}

/// Outcome of one pass of diagonalizations over all k-points.
#[derive(Debug, Default)]
pub struct DiagonalizationReport {
    pub n_iter: Vec<usize>,
    pub n_hpsi: Vec<usize>,
    pub failures: Vec<(usize, EigenSolverError)>,
}

impl DiagonalizationReport {
    pub fn get_total_hpsi(&self) -> usize {
        self.n_hpsi.iter().sum()
    }

    /// Eigensolver iterations averaged over k-points.
    pub fn get_average_iterations(&self) -> f64 {
        if self.n_iter.is_empty() {
            return 0.0;
        }

        self.n_iter.iter().sum::<usize>() as f64 / self.n_iter.len() as f64
    }

    pub fn all_converged(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Diagonalizes all k-points in parallel with the same potential and threshold.
///
/// The k-points share no mutable state; the results are joined in sample order.
pub fn diagonalize_all(
    kscfs: &[KSCF],
    ctx: &mut SolverContext,
    rgtrans: &RGTransform,
    vloc_3d: &Array3<c64>,
    ethr: f64,
) -> DiagonalizationReport {
    assert_eq!(kscfs.len(), ctx.states.len());

    let results: Vec<Result<EigenStats, EigenSolverError>> = kscfs
        .par_iter()
        .zip(ctx.states.par_iter_mut())
        .map(|(kscf, state)| {
            let result = kscf.run(rgtrans, vloc_3d, ethr, &mut state.evals, &mut state.evecs);

            match &result {
                Ok(stats) => {
                    state.n_iter = stats.n_iter;
                    state.n_hpsi = stats.n_hpsi;
                    state.max_residual = stats.max_residual;
                    state.converged = true;
                }

                Err(EigenSolverError::NonConvergence {
                    n_iter,
                    n_hpsi,
                    max_residual,
                    ..
                }) => {
                    state.n_iter = *n_iter;
                    state.n_hpsi = *n_hpsi;
                    state.max_residual = *max_residual;
                    state.converged = false;
                }

                Err(_) => {
                    state.converged = false;
                }
            }

            result
        })
        .collect();

    let mut report = DiagonalizationReport::default();

    for (ik, (state, result)) in ctx.states.iter().zip(results.into_iter()).enumerate() {
        report.n_iter.push(state.n_iter);
        report.n_hpsi.push(state.n_hpsi);

        if let Err(e) = result {
            log::warn!("k-point {}: {}", ik + 1, e);
            report.failures.push((ik, e));
        }
    }

    report
}

/// Band quantities needed by the energy and the final report.
#[derive(Debug, Clone)]
pub struct BandSummary {
    /// sum_k w_k sum_n f_nk e_nk
    pub eband: f64,
    /// highest eigenvalue with non-negligible occupation
    pub homo: f64,
    /// lowest eigenvalue without occupation, if any band is empty
    pub lumo: Option<f64>,
}

pub fn summarize_bands(kscfs: &[KSCF], ctx: &SolverContext) -> BandSummary {
    let mut eband = 0.0;
    let mut homo = f64::NEG_INFINITY;
    let mut lumo: Option<f64> = None;

    for (kscf, state) in kscfs.iter().zip(ctx.states.iter()) {
        eband += kscf.get_k_weight() * kscf.get_band_structure_energy(&state.evals);

        for (&f, &e) in kscf.get_occ().iter().zip(state.evals.iter()) {
            if f > EPS5 {
                homo = homo.max(e);
            } else {
                lumo = Some(lumo.map_or(e, |l| l.min(e)));
            }
        }
    }

    BandSummary { eband, homo, lumo }
}
