mod fixed;
use fixed::*;

mod smeared;
use smeared::*;

use kscf::KSCF;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FermiLevelError {
    #[error("{nband} bands cannot hold {nelec} electrons")]
    TooFewBands { nband: usize, nelec: f64 },

    #[error("Fermi level search did not bracket {nelec} electrons")]
    NoBracket { nelec: f64 },
}

/// Occupations of all k-points from the eigenvalues, spin-unpolarized.
pub trait FermiLevel: Send + Sync {
    /// Writes the occupations into every KSCF and returns the Fermi level.
    fn set_occupations(&self, vkscf: &mut [KSCF], vevals: &[Vec<f64>], nelec: f64) -> Result<f64, FermiLevelError>;

    /// -TS, zero for fixed occupations.
    fn get_smearing_energy(&self, vkscf: &[KSCF], vevals: &[Vec<f64>], fermi_level: f64) -> f64;
}

pub fn new(smearing_scheme: &str, temperature: f64) -> Box<dyn FermiLevel> {
    match smearing::new(smearing_scheme) {
        Some(smearing) => Box::new(FermiLevelSmeared::new(smearing, temperature)),
        None => Box::new(FermiLevelFixed::new()),
    }
}

fn check_capacity(vkscf: &[KSCF], nelec: f64) -> Result<(), FermiLevelError> {
    let nband = vkscf.iter().map(|k| k.get_nbands()).min().unwrap_or(0);

    if 2.0 * nband as f64 + dwconsts::EPS8 < nelec {
        return Err(FermiLevelError::TooFewBands { nband, nelec });
    }

    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use control::Control;
    use gvector::GVector;
    use lattice::Lattice;
    use pwbasis::PWBasis;
    use vector3::Vector3f64;
    use vnl::VNL;

    pub struct Fixture {
        pub control: Control,
        pub gvec: GVector,
        pub pwwfcs: Vec<PWBasis>,
        pub vnls: Vec<VNL>,
    }

    pub fn fixture(nk: usize) -> Fixture {
        let a = 5.0;
        let latt = Lattice::new(&[a, 0.0, 0.0], &[0.0, a, 0.0], &[0.0, 0.0, a]);
        let gvec = GVector::new(&latt, [8, 8, 8]);

        let control = Control::from_str("ecut_wfc = 4").unwrap();

        let pwwfcs = (0..nk)
            .map(|ik| PWBasis::new(Vector3f64::zeros(), ik, control.get_ecut(), &gvec))
            .collect();

        let vnls = (0..nk).map(VNL::empty).collect();

        Fixture {
            control,
            gvec,
            pwwfcs,
            vnls,
        }
    }

    pub fn make_kscfs<'a>(fx: &'a Fixture, nband: usize, weights: &[f64]) -> Vec<KSCF<'a>> {
        fx.pwwfcs
            .iter()
            .zip(fx.vnls.iter())
            .enumerate()
            .map(|(ik, (pwwfc, vnl))| KSCF::new(&fx.control, &fx.gvec, pwwfc, vnl, [8, 8, 8], 125.0, nband, ik, weights[ik]))
            .collect()
    }

    #[test]
    fn test_factory_picks_scheme() {
        let fx = fixture(1);
        let mut vkscf = make_kscfs(&fx, 3, &[1.0]);

        let vevals = vec![vec![-1.0, 0.0, 1.0]];

        let fixed = new("fixed", 0.0);
        fixed.set_occupations(&mut vkscf, &vevals, 2.0).unwrap();
        assert_eq!(vkscf[0].get_occ(), &[2.0, 0.0, 0.0]);

        let smeared = new("fd", 300.0);
        smeared.set_occupations(&mut vkscf, &vevals, 2.0).unwrap();
        assert!((vkscf[0].get_occ()[0] - 2.0).abs() < 1E-8);
    }

    #[test]
    fn test_too_few_bands() {
        let fx = fixture(1);
        let mut vkscf = make_kscfs(&fx, 2, &[1.0]);

        let vevals = vec![vec![-1.0, 0.0]];

        assert!(matches!(
            new("fixed", 0.0).set_occupations(&mut vkscf, &vevals, 6.0),
            Err(FermiLevelError::TooFewBands { nband: 2, .. })
        ));
    }
}
