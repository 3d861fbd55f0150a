mod bands;
pub use bands::*;

mod subspace;

use control::Control;
use dwconsts::*;
use eigensolver::{EigenSolverError, EigenStats};
use gvector::GVector;
use hpsi::Hamiltonian;
use matrix::Matrix;
use ndarray::Array3;
use pwbasis::PWBasis;
use rand::Rng;
use rgtransform::RGTransform;
use types::c64;
use vnl::VNL;

// Per-k-point SCF worker.
//
// Holds what is needed to set up the Kohn-Sham Hamiltonian and solve the
// eigenproblem at one k-point. The potential is passed in on every call,
// so distinct k-points can be worked on concurrently.
pub struct KSCF<'a> {
    control: &'a Control,
    gvec: &'a GVector,
    pwwfc: &'a PWBasis,
    vnl: &'a VNL,

    ik: usize,
    k_weight: f64,
    occ: Vec<f64>,
    volume: f64,
    fft_linear_index: Vec<usize>,
}

impl<'a> KSCF<'a> {
    pub fn new(
        control: &'a Control,
        gvec: &'a GVector,
        pwwfc: &'a PWBasis,
        vnl: &'a VNL,
        fft_shape: [usize; 3],
        volume: f64,
        nband: usize,
        ik: usize,
        k_weight: f64,
    ) -> KSCF<'a> {
        // cached G -> FFT grid mapping for the local potential
        let fft_linear_index =
            utility::compute_fft_linear_index_map(gvec.get_miller(), pwwfc.get_gindex(), fft_shape);

        KSCF {
            control,
            gvec,
            pwwfc,
            vnl,
            ik,
            k_weight,
            occ: vec![0.0; nband],
            volume,
            fft_linear_index,
        }
    }

    pub fn get_ik(&self) -> usize {
        self.ik
    }

    pub fn get_pwwfc(&self) -> &PWBasis {
        self.pwwfc
    }

    pub fn get_gvec(&self) -> &GVector {
        self.gvec
    }

    pub fn get_vnl(&self) -> &VNL {
        self.vnl
    }

    pub fn get_n_plane_waves(&self) -> usize {
        self.pwwfc.get_n_plane_waves()
    }

    pub fn get_fft_linear_index(&self) -> &[usize] {
        &self.fft_linear_index
    }

    pub fn get_nbands(&self) -> usize {
        self.occ.len()
    }

    pub fn get_k_weight(&self) -> f64 {
        self.k_weight
    }

    pub fn get_occ(&self) -> &[f64] {
        &self.occ
    }

    pub fn set_occ(&mut self, occ: &[f64]) {
        self.occ.copy_from_slice(occ);
    }

    pub fn get_total_occ(&self) -> f64 {
        self.occ.iter().sum()
    }

    /// Occupation-weighted eigenvalue sum for this k-point, without the k weight.
    pub fn get_band_structure_energy(&self, evals: &[f64]) -> f64 {
        self.occ
            .iter()
            .zip(evals.iter())
            .filter(|(&f, _)| f > EPS20)
            .map(|(f, e)| f * e)
            .sum()
    }

    /// Random start vectors damped by 1/(1 + |k+G|^2 / 2).
    pub fn randomize_wavefunctions<R: Rng>(&self, rng: &mut R, evecs: &mut Matrix<c64>) {
        let kg = self.pwwfc.get_kg();

        for ib in 0..evecs.ncol() {
            let evec = evecs.get_mut_col(ib);

            utility::make_normalized_rand_vector(rng, evec);

            for (c, g) in evec.iter_mut().zip(kg.iter()) {
                *c /= 0.5 * g * g + 1.0;
            }

            utility::normalize_vector_c64(evec);
        }
    }

    pub fn get_unk(
        &self,
        rgtrans: &RGTransform,
        evecs: &Matrix<c64>,
        ib: usize,
        unk: &mut Array3<c64>,
        fft_workspace: &mut Array3<c64>,
    ) {
        // periodic part u_nk(r) from the plane-wave coefficients
        hpsi::compute_unk_3d(
            rgtrans,
            self.volume,
            &self.fft_linear_index,
            evecs.get_col(ib),
            unk,
            fft_workspace,
        );
    }

    /// Diagonalizes H[vloc_3d] to precision `ethr`, starting from `evecs`.
    ///
    /// On NonConvergence the best vectors found are still written back.
    pub fn run(
        &self,
        rgtrans: &RGTransform,
        vloc_3d: &Array3<c64>,
        ethr: f64,
        evals: &mut [f64],
        evecs: &mut Matrix<c64>,
    ) -> Result<EigenStats, EigenSolverError> {
        let npw_wfc = self.pwwfc.get_n_plane_waves();

        let mut ham = Hamiltonian::new(
            self.pwwfc,
            &self.fft_linear_index,
            self.vnl,
            rgtrans,
            vloc_3d,
            self.volume,
        );

        let ham_diag = ham.diagonal();

        let mut hamiltonian_on_psi = |vin: &[c64], vout: &mut [c64]| ham.apply(vin, vout);

        let scheme = self.control.get_eigen_solver();

        let mut sparse = eigensolver::new(scheme, npw_wfc, evals.len())?;

        let result = sparse.compute(
            &mut hamiltonian_on_psi,
            &ham_diag,
            evecs,
            evals,
            &self.occ,
            ethr,
            self.control.get_diago_max_iter(),
        );

        // band-by-band solvers leave the block unrotated
        if scheme == "pcg" {
            let t_evecs = evecs.clone();

            subspace::rotate_wfc(&mut hamiltonian_on_psi, &t_evecs, evecs, evals);
        }

        // keep eigenpairs in ascending order
        sort_eigen_values_and_vectors(evals, evecs);

        result
    }
}

/// Fills the lowest bands with two electrons each; a fractional remainder goes to the next band.
pub fn aufbau_occupations(nband: usize, nelec: f64) -> Vec<f64> {
    let mut left = nelec;

    (0..nband)
        .map(|_| {
            let f = left.min(2.0).max(0.0);
            left -= f;
            f
        })
        .collect()
}

fn sort_eigen_values_and_vectors(evals: &mut [f64], evecs: &mut Matrix<c64>) {
    let sort_idx = utility::argsort(evals);

    if sort_idx.iter().enumerate().all(|(i, &j)| i == j) {
        return;
    }

    let tmp_evals = evals.to_vec();
    let tmp_evecs = evecs.clone();

    for i in 0..evals.len() {
        let j = sort_idx[i];

        evals[i] = tmp_evals[j];

        evecs.set_col(i, tmp_evecs.get_col(j));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aufbau_occupations() {
        assert_eq!(aufbau_occupations(4, 8.0), vec![2.0, 2.0, 2.0, 2.0]);
        assert_eq!(aufbau_occupations(5, 7.0), vec![2.0, 2.0, 2.0, 1.0, 0.0]);
        assert_eq!(aufbau_occupations(2, 8.0), vec![2.0, 2.0]);
    }

    #[test]
    fn test_sort_eigen_pairs() {
        let mut evals = vec![0.3, -1.0, 0.1];
        let mut evecs = Matrix::<c64>::new(2, 3);

        for i in 0..3 {
            evecs[[0, i]] = c64::new(evals[i], 0.0);
        }

        sort_eigen_values_and_vectors(&mut evals, &mut evecs);

        assert_eq!(evals, vec![-1.0, 0.1, 0.3]);

        for i in 0..3 {
            assert_eq!(evecs[[0, i]].re, evals[i]);
        }
    }
}
