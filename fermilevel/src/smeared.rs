use crate::{check_capacity, FermiLevel, FermiLevelError};
use dwconsts::*;
use kscf::KSCF;
use smearing::Smearing;

const MAX_STEPS: usize = 500;

/// Fermi level by bisection on the smeared electron count.
pub struct FermiLevelSmeared {
    smearing: Box<dyn Smearing>,
    temperature: f64,
}

impl FermiLevelSmeared {
    pub fn new(smearing: Box<dyn Smearing>, temperature: f64) -> FermiLevelSmeared {
        FermiLevelSmeared { smearing, temperature }
    }

    fn total_electrons(&self, vkscf: &mut [KSCF], vevals: &[Vec<f64>], fermi: f64) -> f64 {
        let mut ntot = 0.0;

        for (kscf, evals) in vkscf.iter_mut().zip(vevals.iter()) {
            let occ: Vec<f64> = evals
                .iter()
                .map(|&e| 2.0 * self.smearing.get_occupation_number(fermi, self.temperature, e))
                .collect();

            kscf.set_occ(&occ);

            ntot += kscf.get_total_occ() * kscf.get_k_weight();
        }

        ntot
    }
}

impl FermiLevel for FermiLevelSmeared {
    fn set_occupations(&self, vkscf: &mut [KSCF], vevals: &[Vec<f64>], nelec: f64) -> Result<f64, FermiLevelError> {
        check_capacity(vkscf, nelec)?;

        let mut fermi_level = get_initial_fermi_level(nelec, vevals);

        let step = smearing::kbt(self.temperature).max(EPS2 * EV_TO_HA);

        let mut ntot = self.total_electrons(vkscf, vevals, fermi_level);

        let mut upper = fermi_level;
        let mut lower = fermi_level;

        let mut n = 0;

        while ntot < nelec && n < MAX_STEPS {
            upper += step;
            ntot = self.total_electrons(vkscf, vevals, upper);
            n += 1;
        }

        while ntot > nelec && n < MAX_STEPS {
            lower -= step;
            ntot = self.total_electrons(vkscf, vevals, lower);
            n += 1;
        }

        if n == MAX_STEPS {
            return Err(FermiLevelError::NoBracket { nelec });
        }

        for _ in 0..MAX_STEPS {
            if (ntot - nelec).abs() <= EPS12 {
                break;
            }

            fermi_level = 0.5 * (upper + lower);
            ntot = self.total_electrons(vkscf, vevals, fermi_level);

            if ntot > nelec {
                upper = fermi_level;
            } else {
                lower = fermi_level;
            }
        }

        Ok(fermi_level)
    }

    fn get_smearing_energy(&self, vkscf: &[KSCF], vevals: &[Vec<f64>], fermi_level: f64) -> f64 {
        let kbt = smearing::kbt(self.temperature);

        let mut ts = 0.0;

        for (kscf, evals) in vkscf.iter().zip(vevals.iter()) {
            let s: f64 = evals
                .iter()
                .map(|&e| self.smearing.entropy(smearing::reduced_energy(fermi_level, self.temperature, e)))
                .sum();

            ts += 2.0 * kscf.get_k_weight() * kbt * s;
        }

        -ts
    }
}

// midgap between the nominal valence and conduction bands
fn get_initial_fermi_level(nelec: f64, vevals: &[Vec<f64>]) -> f64 {
    let nvbands = ((nelec / 2.0).ceil() as usize).max(1);

    let mut homo = f64::NEG_INFINITY;
    let mut lumo = f64::INFINITY;

    for evals in vevals.iter() {
        if let Some(e) = evals.get(nvbands - 1) {
            homo = homo.max(*e);
        }

        if let Some(e) = evals.get(nvbands) {
            lumo = lumo.min(*e);
        }
    }

    if lumo.is_finite() {
        0.5 * (homo + lumo)
    } else {
        homo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::*;

    #[test]
    fn test_smeared_count_matches_nelec() {
        let fx = fixture(2);
        let weights = [0.25, 0.75];
        let mut vkscf = make_kscfs(&fx, 4, &weights);

        let vevals = vec![vec![-0.5, 0.10, 0.12, 0.9], vec![-0.4, 0.11, 0.13, 0.8]];

        let fl = FermiLevelSmeared::new(smearing::new("gs").unwrap(), 2000.0);

        let ef = fl.set_occupations(&mut vkscf, &vevals, 5.0).unwrap();

        let ntot: f64 = vkscf.iter().map(|k| k.get_total_occ() * k.get_k_weight()).sum();

        assert!((ntot - 5.0).abs() < 1E-10);
        assert!(ef > 0.10 && ef < 0.13);

        // partially filled levels carry entropy
        assert!(fl.get_smearing_energy(&vkscf, &vevals, ef) < 0.0);
    }

    #[test]
    fn test_initial_level_is_midgap() {
        let vevals = vec![vec![-1.0, 0.0, 1.0], vec![-0.8, 0.2, 0.6]];

        assert!((get_initial_fermi_level(4.0, &vevals) - 0.4).abs() < 1E-12);
    }
}
