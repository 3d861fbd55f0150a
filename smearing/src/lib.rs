mod fd;
use fd::*;
mod gs;
use gs::*;
mod mp1;
use mp1::*;
mod mp2;
use mp2::*;

use dwconsts::*;

/// Broadening of the step function, in the reduced variable x = (e - ef) / kT.
pub trait Smearing: Send + Sync {
    /// Occupation of one spin orbital, 1 deep below and 0 far above the Fermi level.
    fn occupation(&self, x: f64) -> f64;

    /// Generalized entropy s(x); the free energy carries -kT s per spin orbital.
    fn entropy(&self, x: f64) -> f64;

    fn get_occupation_number(&self, fermi_level: f64, temperature: f64, electron_energy: f64) -> f64 {
        self.occupation(reduced_energy(fermi_level, temperature, electron_energy))
    }
}

/// `None` for schemes without broadening ("fixed").
pub fn new(smearing_scheme: &str) -> Option<Box<dyn Smearing>> {
    match smearing_scheme {
        "fd" => Some(Box::new(SmearingFD {})),
        "gs" => Some(Box::new(SmearingGS {})),
        "mp1" => Some(Box::new(SmearingMP1 {})),
        "mp2" => Some(Box::new(SmearingMP2 {})),
        _ => None,
    }
}

pub fn kbt(temperature: f64) -> f64 {
    (BOLTZMANN_CONSTANT * temperature).max(EPS30)
}

pub fn reduced_energy(fermi_level: f64, temperature: f64, electron_energy: f64) -> f64 {
    (electron_energy - fermi_level) / kbt(temperature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_limits_and_symmetry() {
        for scheme in ["fd", "gs", "mp1", "mp2"].iter() {
            let s = new(scheme).unwrap();

            assert_relative_eq!(s.occupation(-30.0), 1.0, epsilon = 1E-10);
            assert_relative_eq!(s.occupation(30.0), 0.0, epsilon = 1E-10);
            assert_relative_eq!(s.occupation(0.0), 0.5, epsilon = 1E-12);

            // f(x) + f(-x) = 1
            for x in [0.3, 1.1, 2.5].iter() {
                assert_relative_eq!(s.occupation(*x) + s.occupation(-x), 1.0, epsilon = 1E-12);
            }

            assert!(s.entropy(40.0).abs() < 1E-12);
        }

        assert!(new("fixed").is_none());
    }

    #[test]
    fn test_fermi_dirac_entropy() {
        let s = new("fd").unwrap();

        // maximal at the Fermi level, ln 2
        assert_relative_eq!(s.entropy(0.0), 2f64.ln(), epsilon = 1E-12);
        assert!(s.entropy(1.0) < s.entropy(0.0));
    }

    #[test]
    fn test_occupation_in_kelvin() {
        let s = new("fd").unwrap();

        let ef = 0.2;

        assert!(s.get_occupation_number(ef, 300.0, ef - 0.1) > 0.999);
        assert!(s.get_occupation_number(ef, 300.0, ef + 0.1) < 0.001);
    }
}
