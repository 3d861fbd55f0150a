use crate::{check_capacity, FermiLevel, FermiLevelError};
use kscf::KSCF;

/// Insulator filling: the same lowest bands are doubly occupied at every k-point.
/// The returned level is the highest occupied eigenvalue.
pub struct FermiLevelFixed {}

impl FermiLevelFixed {
    pub fn new() -> FermiLevelFixed {
        FermiLevelFixed {}
    }
}

impl FermiLevel for FermiLevelFixed {
    fn set_occupations(&self, vkscf: &mut [KSCF], vevals: &[Vec<f64>], nelec: f64) -> Result<f64, FermiLevelError> {
        check_capacity(vkscf, nelec)?;

        let mut homo = f64::NEG_INFINITY;

        for (kscf, evals) in vkscf.iter_mut().zip(vevals.iter()) {
            let occ = kscf::aufbau_occupations(kscf.get_nbands(), nelec);

            for (f, e) in occ.iter().zip(evals.iter()) {
                if *f > 0.0 {
                    homo = homo.max(*e);
                }
            }

            kscf.set_occ(&occ);
        }

        Ok(homo)
    }

    fn get_smearing_energy(&self, _vkscf: &[KSCF], _vevals: &[Vec<f64>], _fermi_level: f64) -> f64 {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::*;

    #[test]
    fn test_fixed_fill_returns_homo() {
        let fx = fixture(2);
        let mut vkscf = make_kscfs(&fx, 4, &[0.5, 0.5]);

        let vevals = vec![vec![-0.5, 0.1, 0.2, 0.9], vec![-0.4, 0.05, 0.3, 0.8]];

        let homo = FermiLevelFixed::new().set_occupations(&mut vkscf, &vevals, 6.0).unwrap();

        assert_eq!(homo, 0.3);

        for kscf in vkscf.iter() {
            assert_eq!(kscf.get_occ(), &[2.0, 2.0, 2.0, 0.0]);
        }
    }
}
