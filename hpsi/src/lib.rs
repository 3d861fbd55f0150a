use itertools::multizip;
use matrix::Matrix;
use ndarray::Array3;
use pwbasis::PWBasis;
use rayon::prelude::*;
use rgtransform::RGTransform;
use types::c64;
use vnl::VNL;

const PARALLEL_MIN_LEN: usize = 8192;

#[inline]
fn use_parallel_for_len(len: usize) -> bool {
    len >= PARALLEL_MIN_LEN && rayon::current_num_threads() > 1
}

/// Kohn-Sham Hamiltonian of one k-point acting on plane-wave coefficients,
///
///   H = T + V_nl + V_loc(r)
///
/// where V_loc is the total local potential (pseudo + Hartree + xc) on the FFT grid.
pub struct Hamiltonian<'a> {
    kin: Vec<f64>,
    vnl: &'a VNL,
    rgtrans: &'a RGTransform,
    vloc_3d: &'a Array3<c64>,
    fft_linear_index: &'a [usize],
    volume: f64,
    unk_3d: Array3<c64>,
    vunkg_3d: Array3<c64>,
    fft_workspace: Array3<c64>,
}

impl<'a> Hamiltonian<'a> {
    pub fn new(
        pwwfc: &PWBasis,
        fft_linear_index: &'a [usize],
        vnl: &'a VNL,
        rgtrans: &'a RGTransform,
        vloc_3d: &'a Array3<c64>,
        volume: f64,
    ) -> Hamiltonian<'a> {
        assert_eq!(fft_linear_index.len(), pwwfc.get_n_plane_waves());

        let kin = pwwfc.get_kg().iter().map(|g| 0.5 * g * g).collect();

        let shape = vloc_3d.shape();

        Hamiltonian {
            kin,
            vnl,
            rgtrans,
            vloc_3d,
            fft_linear_index,
            volume,
            unk_3d: Array3::<c64>::new(shape),
            vunkg_3d: Array3::<c64>::new(shape),
            fft_workspace: Array3::<c64>::new(shape),
        }
    }

    pub fn get_n_plane_waves(&self) -> usize {
        self.kin.len()
    }

    pub fn get_kinetic(&self) -> &[f64] {
        &self.kin
    }

    /// vout = H vin
    pub fn apply(&mut self, vin: &[c64], vout: &mut [c64]) {
        assert_eq!(vin.len(), self.kin.len());
        assert_eq!(vout.len(), self.kin.len());

        vloc_on_psi(
            self.rgtrans,
            self.volume,
            self.fft_linear_index,
            self.vloc_3d,
            &mut self.vunkg_3d,
            &mut self.unk_3d,
            &mut self.fft_workspace,
            vin,
            vout,
        );

        kinetic_on_psi(&self.kin, vin, vout);

        self.vnl.apply(vin, vout);
    }

    /// H applied to every column of `vin`.
    pub fn apply_block(&mut self, vin: &Matrix<c64>, vout: &mut Matrix<c64>) {
        assert_eq!(vin.ncol(), vout.ncol());

        for i in 0..vin.ncol() {
            self.apply(vin.get_col(i), vout.get_mut_col(i));
        }
    }

    /// Approximate <G|H|G>: kinetic plus nonlocal diagonal plus the average local potential.
    pub fn diagonal(&self) -> Vec<f64> {
        let npw = self.kin.len();

        let vavg = self.vloc_3d.as_slice().iter().map(|v| v.re).sum::<f64>() / self.vloc_3d.len() as f64;

        let vnl_diag = self.vnl.get_diagonal(npw);

        multizip((self.kin.iter(), vnl_diag.iter()))
            .map(|(t, d)| t + d + vavg)
            .collect()
    }
}

/// vout += kin * vin
pub fn kinetic_on_psi(kin: &[f64], vin: &[c64], vout: &mut [c64]) {
    debug_assert_eq!(kin.len(), vin.len());
    debug_assert_eq!(vin.len(), vout.len());

    if use_parallel_for_len(vout.len()) {
        vout.par_iter_mut()
            .zip(kin.par_iter())
            .zip(vin.par_iter())
            .for_each(|((z, x), y)| {
                *z += (*x) * (*y);
            });
    } else {
        for (x, y, z) in multizip((kin.iter(), vin.iter(), vout.iter_mut())) {
            *z += (*x) * (*y);
        }
    }
}

/// vout = V_loc vin, overwriting vout
pub fn vloc_on_psi(
    rgtrans: &RGTransform,
    volume: f64,
    fft_linear_index: &[usize],
    vloc_3d: &Array3<c64>,
    vunkg_3d: &mut Array3<c64>,
    unk_3d: &mut Array3<c64>,
    fft_workspace: &mut Array3<c64>,
    vin: &[c64],
    vout: &mut [c64],
) {
    // from cnk in G space to get unk in r space

    compute_unk_3d(rgtrans, volume, fft_linear_index, vin, unk_3d, fft_workspace);

    // (v_xc + v_h + v_psloc)|psi> in r space

    Array3::hadamard_product(vloc_3d, unk_3d, fft_workspace);

    rgtrans.r3d_to_g3d(fft_workspace.as_slice(), vunkg_3d.as_mut_slice());

    vunkg_3d.scale(volume.sqrt());

    // keep only the plane waves of the wavefunction basis

    utility::map_3d_to_1d_with_linear_index(fft_linear_index, vunkg_3d, vout);
}

/// u_nk(r) = 1/sqrt(volume) sum_G c_nk(G) exp(i(k+G)r), without the exp(ikr) factor.
pub fn compute_unk_3d(
    rgtrans: &RGTransform,
    volume: f64,
    fft_linear_index: &[usize],
    v: &[c64],
    unk_3d: &mut Array3<c64>,
    fft_workspace: &mut Array3<c64>,
) {
    utility::map_1d_to_3d_with_linear_index(fft_linear_index, v, fft_workspace);

    rgtrans.g3d_to_r3d(fft_workspace.as_slice(), unk_3d.as_mut_slice());
    unk_3d.scale(1.0 / volume.sqrt());
}
