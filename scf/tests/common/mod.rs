#![allow(dead_code)]

use control::Control;
use crystal::Crystal;
use fftgrid::FFTGrid;
use gvector::GVector;
use kpts::{KptsMesh, KPTS};
use kscf::KSCF;
use lattice::Lattice;
use pspot::{AtomPSP, PSPot, GTH};
use pwbasis::PWBasis;
use pwdensity::PWDensity;
use rgtransform::RGTransform;
use symmetry::SymmetryOps;
use vector3::Vector3f64;
use vnl::VNL;

/// Bulk silicon, two atoms in the fcc cell, GTH LDA pseudopotential.
pub struct Silicon {
    pub control: Control,
    pub crystal: Crystal,
    pub pots: PSPot,
    pub gvec: GVector,
    pub pwden: PWDensity,
    pub rgtrans: RGTransform,
    pub fft_shape: [usize; 3],
    pub pwwfcs: Vec<PWBasis>,
    pub vnls: Vec<VNL>,
    pub k_weights: Vec<f64>,
    pub symmetry: SymmetryOps,
}

/// Production-like settings: 40 Ry, 16 k-points.
pub const CONTROL_40RY: &str = "
ecut_wfc = 40.0
scf_conv_thr = 1E-6
scf_rho_mix_scheme = broyden
scf_rho_mix_beta = 0.7
scf_rho_mix_history_steps = 8
scf_max_iter = 30
random_seed = 1
";

/// Small settings for tests that run several SCFs.
pub const CONTROL_12RY: &str = "
ecut_wfc = 12.0
scf_conv_thr = 1E-6
scf_rho_mix_beta = 0.7
scf_rho_mix_history_steps = 8
scf_max_iter = 30
random_seed = 1
";

pub fn silicon_pots() -> PSPot {
    let si = GTH::new(
        "Si",
        4.0,
        0.44,
        &[-7.33610297],
        vec![
            (
                0.42273813,
                vec![vec![5.90692831, -1.26189397], vec![-1.26189397, 3.25819622]],
            ),
            (0.48427842, vec![vec![2.72701346]]),
        ],
    )
    .unwrap();

    PSPot::from_pots(vec![("Si".to_string(), Box::new(si) as Box<dyn AtomPSP>)])
}

pub fn silicon(control_text: &str, k_mesh: [usize; 3]) -> Silicon {
    let control = Control::from_str(control_text).unwrap();

    let a = 10.2;
    let latt = Lattice::new(
        &[0.0, 0.5 * a, 0.5 * a],
        &[0.5 * a, 0.0, 0.5 * a],
        &[0.5 * a, 0.5 * a, 0.0],
    );

    let crystal = Crystal::new(
        latt.clone(),
        vec!["Si".to_string(), "Si".to_string()],
        vec![Vector3f64::zeros(), Vector3f64::new(0.25, 0.25, 0.25)],
    )
    .unwrap();

    let pots = silicon_pots();

    let fftgrid = FFTGrid::new(&latt, control.get_ecutrho());
    let fft_shape = fftgrid.get_size();

    let gvec = GVector::new(&latt, fft_shape);
    let pwden = PWDensity::new(control.get_ecutrho(), &gvec);
    let rgtrans = RGTransform::new(fft_shape[0], fft_shape[1], fft_shape[2]);

    let kpts = KptsMesh::new(k_mesh, [0, 0, 0], false).unwrap();
    let blatt = latt.reciprocal();

    let mut pwwfcs = Vec::new();
    let mut vnls = Vec::new();
    let mut k_weights = Vec::new();

    for ik in 0..kpts.get_n_kpts() {
        let k_cart = kpts.frac_to_cart(&kpts.get_k_frac(ik), &blatt);

        let pwwfc = PWBasis::new(k_cart, ik, control.get_ecut(), &gvec);
        let vnl = VNL::new(ik, &pots, &pwwfc, &gvec, &crystal).unwrap();

        pwwfcs.push(pwwfc);
        vnls.push(vnl);
        k_weights.push(kpts.get_k_weight(ik));
    }

    Silicon {
        control,
        crystal,
        pots,
        gvec,
        pwden,
        rgtrans,
        fft_shape,
        pwwfcs,
        vnls,
        k_weights,
        symmetry: SymmetryOps::identity(),
    }
}

impl Silicon {
    pub fn kscfs(&self) -> Vec<KSCF> {
        let volume = self.crystal.get_latt().volume();
        let nband = self.control.get_nband_for(8.0);

        self.pwwfcs
            .iter()
            .zip(self.vnls.iter())
            .zip(self.k_weights.iter())
            .enumerate()
            .map(|(ik, ((pwwfc, vnl), &w))| {
                KSCF::new(&self.control, &self.gvec, pwwfc, vnl, self.fft_shape, volume, nband, ik, w)
            })
            .collect()
    }
}
