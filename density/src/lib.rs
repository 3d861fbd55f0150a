mod atomic;
pub use atomic::*;

use dwconsts::*;
use gvector::GVector;
use kscf::{SolverContext, KSCF};
use ndarray::Array3;
use num_traits::identities::Zero;
use pwdensity::PWDensity;
use rayon::prelude::*;
use rgtransform::RGTransform;
use symmetry::SymmetryDriver;
use types::*;

/// Electron count and sign checks of a density on the real-space grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChargeCheck {
    /// volume * rho(G = 0)
    pub integral: f64,
    pub expected: f64,
    /// integral of max(0, -Re rho(r))
    pub negative_charge: f64,
    /// integral of |Im rho(r)|
    pub imaginary_charge: f64,
}

impl ChargeCheck {
    pub fn new(rhog: &[c64], rho_3d: &Array3<c64>, volume: f64, expected: f64) -> ChargeCheck {
        let integral = volume * rhog.first().map_or(0.0, |x| x.re);

        let dv = volume / rho_3d.len().max(1) as f64;

        let negative_charge = dv * rho_3d.as_slice().iter().map(|x| (-x.re).max(0.0)).sum::<f64>();
        let imaginary_charge = dv * rho_3d.as_slice().iter().map(|x| x.im.abs()).sum::<f64>();

        ChargeCheck {
            integral,
            expected,
            negative_charge,
            imaginary_charge,
        }
    }

    pub fn deviation(&self) -> f64 {
        (self.integral - self.expected).abs()
    }

    /// Integral matches the electron count and the density is real and non-negative,
    /// all within `tol` electrons.
    pub fn is_physical(&self, tol: f64) -> bool {
        self.deviation() <= tol && self.negative_charge <= tol && self.imaginary_charge <= tol
    }
}

/// Output density of one SCF iteration, rho(G) on the density sphere and rho(r) on the grid.
pub struct DensityBuilder<'a> {
    rgtrans: &'a RGTransform,
    gvec: &'a GVector,
    pwden: &'a PWDensity,
    symmetry: &'a dyn SymmetryDriver,
    volume: f64,
}

impl<'a> DensityBuilder<'a> {
    pub fn new(
        rgtrans: &'a RGTransform,
        gvec: &'a GVector,
        pwden: &'a PWDensity,
        symmetry: &'a dyn SymmetryDriver,
        volume: f64,
    ) -> DensityBuilder<'a> {
        DensityBuilder {
            rgtrans,
            gvec,
            pwden,
            symmetry,
            volume,
        }
    }

    /// rho = sum_k w_k sum_n f_nk |psi_nk|^2, plus the augmentation charges,
    /// symmetrized and truncated to the density sphere.
    ///
    /// `augmentation` holds one rho(G) per atomic site; it is empty for
    /// norm-conserving pseudopotentials.
    pub fn build(
        &self,
        kscfs: &[KSCF],
        ctx: &SolverContext,
        augmentation: &[Vec<c64>],
        nelec: f64,
        rhog: &mut [c64],
        rho_3d: &mut Array3<c64>,
    ) -> ChargeCheck {
        compute_charge_density(kscfs, ctx, self.rgtrans, rho_3d);

        self.rgtrans
            .r3d_to_g1d(self.gvec, self.pwden, rho_3d.as_slice(), rhog);

        for site in augmentation.iter() {
            for (x, y) in rhog.iter_mut().zip(site.iter()) {
                *x += *y;
            }
        }

        let n_dropped = symmetry::symmetrize_rhog(self.symmetry, self.gvec, self.pwden, rhog);

        if n_dropped > 0 {
            log::warn!("{} symmetry images fell outside the density sphere", n_dropped);
        }

        self.rgtrans
            .g1d_to_r3d(self.gvec, self.pwden, rhog, rho_3d.as_mut_slice());

        ChargeCheck::new(rhog, rho_3d, self.volume, nelec)
    }
}

/// Unsymmetrized sum of |psi_nk(r)|^2 over all k-points.
///
/// Each k-point fills its own grid in parallel; the grids are then added in
/// sample order, which keeps the result independent of the thread schedule.
pub fn compute_charge_density(kscfs: &[KSCF], ctx: &SolverContext, rgtrans: &RGTransform, rho_3d: &mut Array3<c64>) {
    let shape = rho_3d.shape();

    let partial: Vec<Array3<c64>> = kscfs
        .par_iter()
        .zip(ctx.get_states().par_iter())
        .map(|(kscf, state)| {
            let mut rho_k = Array3::<c64>::new(shape);
            let mut unk = Array3::<c64>::new(shape);
            let mut fft_work = Array3::<c64>::new(shape);

            let w = kscf.get_k_weight();

            for (ib, &f) in kscf.get_occ().iter().enumerate() {
                if f < EPS20 {
                    continue;
                }

                kscf.get_unk(rgtrans, &state.evecs, ib, &mut unk, &mut fft_work);

                rho_k.scaled_sqr_add(&unk, f * w);
            }

            rho_k
        })
        .collect();

    rho_3d.set_value(c64::zero());

    for rho_k in partial.iter() {
        rho_3d.add_from(rho_k);
    }
}

/// Hartree energy of the density difference,
///
///   dr2 = 1/2 * 4pi * volume * sum_{G != 0} |rho_out(G) - rho_in(G)|^2 / G^2
///
/// in Hartree; an upper estimate of the error of the total energy.
pub fn get_scf_accuracy_estimate(rhog_in: &[c64], rhog_out: &[c64], pwden: &PWDensity, volume: f64) -> f64 {
    let g = pwden.get_g();

    let sum: f64 = rhog_in
        .iter()
        .zip(rhog_out.iter())
        .zip(g.iter())
        .skip(1)
        .filter(|(_, &g)| g > EPS8)
        .map(|((a, b), &g)| (b - a).norm_sqr() / (g * g))
        .sum();

    0.5 * FOURPI * volume * sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use control::Control;
    use lattice::Lattice;
    use pwbasis::PWBasis;
    use symmetry::SymmetryOps;
    use vector3::Vector3f64;
    use vnl::VNL;

    #[test]
    fn test_free_electron_density_integrates_to_nelec() {
        let a = 6.0;
        let latt = Lattice::new(&[a, 0.0, 0.0], &[0.0, a, 0.0], &[0.0, 0.0, a]);
        let blatt = latt.reciprocal();
        let volume = latt.volume();

        let shape = [12, 12, 12];
        let gvec = GVector::new(&latt, shape);
        let pwden = PWDensity::new(15.0, &gvec);
        let rgtrans = RGTransform::new(shape[0], shape[1], shape[2]);

        let control = Control::from_str("ecut_wfc = 5").unwrap();

        let kfrac = [Vector3f64::zeros(), Vector3f64::new(0.25, 0.25, 0.0)];
        let pwwfcs: Vec<PWBasis> = kfrac
            .iter()
            .enumerate()
            .map(|(ik, k)| PWBasis::new(blatt.frac_to_cart(k), ik, control.get_ecut(), &gvec))
            .collect();
        let vnls: Vec<VNL> = (0..2).map(VNL::empty).collect();

        let nelec = 4.0;
        let nband = 3;

        let occ = kscf::aufbau_occupations(nband, nelec);

        let kscfs: Vec<KSCF> = pwwfcs
            .iter()
            .zip(vnls.iter())
            .enumerate()
            .map(|(ik, (pwwfc, vnl))| {
                let mut k = KSCF::new(&control, &gvec, pwwfc, vnl, shape, volume, nband, ik, 0.5);
                k.set_occ(&occ);
                k
            })
            .collect();

        // any block of normalized vectors yields the right count
        let ctx = SolverContext::new_random(&kscfs, nband, 3);

        let sym = SymmetryOps::identity();
        let builder = DensityBuilder::new(&rgtrans, &gvec, &pwden, &sym, volume);

        let mut rhog = vec![c64::zero(); pwden.get_n_plane_waves()];
        let mut rho_3d = Array3::<c64>::new(shape);

        let check = builder.build(&kscfs, &ctx, &[], nelec, &mut rhog, &mut rho_3d);

        assert!(check.deviation() < 1E-10, "{:?}", check);
        assert!(check.imaginary_charge < 1E-10);

        // an extra site charge moves the integral
        let mut aug = vec![c64::zero(); rhog.len()];
        aug[0] = c64::new(0.5 / volume, 0.0);

        let check = builder.build(&kscfs, &ctx, &[aug], nelec, &mut rhog, &mut rho_3d);

        assert!((check.integral - 4.5).abs() < 1E-10);
        assert!(!check.is_physical(1E-3));
    }

    #[test]
    fn test_scf_accuracy_estimate() {
        let latt = Lattice::new(&[6.0, 0.0, 0.0], &[0.0, 6.0, 0.0], &[0.0, 0.0, 6.0]);
        let gvec = GVector::new(&latt, [12, 12, 12]);
        let pwden = PWDensity::new(4.0, &gvec);

        let n = pwden.get_n_plane_waves();
        let rho_in = vec![c64::new(0.1, 0.0); n];

        let mut rho_out = rho_in.clone();
        assert_eq!(get_scf_accuracy_estimate(&rho_in, &rho_out, &pwden, latt.volume()), 0.0);

        // G = 0 does not contribute
        rho_out[0] += 1.0;
        assert_eq!(get_scf_accuracy_estimate(&rho_in, &rho_out, &pwden, latt.volume()), 0.0);

        let i = pwden.find_miller(vector3::Vector3i32::new(1, 0, 0)).unwrap();
        rho_out[i] += 0.01;

        let g = TWOPI / 6.0;
        let expected = 0.5 * FOURPI * latt.volume() * 1E-4 / (g * g);

        let dr2 = get_scf_accuracy_estimate(&rho_in, &rho_out, &pwden, latt.volume());
        assert!((dr2 - expected).abs() < 1E-12 * expected.max(1.0));
    }
}
