use crystal::Crystal;
use gvector::GVector;
use itertools::multizip;
use num_traits::identities::Zero;
use pspot::{AtomPSP, PSPot, PspError};
use pwdensity::PWDensity;
use types::*;
use vector3::*;

/// Local pseudopotential V_ps(G) on the density sphere, summed over all atoms.
///
/// The divergent G = 0 Coulomb tail is left out; it cancels against the
/// G = 0 parts of the Hartree and Ewald energies.
pub fn from_atomic_super_position(
    pspot: &PSPot,
    crystal: &Crystal,
    gvec: &GVector,
    pwden: &PWDensity,
) -> Result<Vec<c64>, PspError> {
    let volume = crystal.get_latt().volume();

    let mut vlocg = vec![c64::zero(); pwden.get_n_plane_waves()];

    for (isp, sp) in crystal.get_unique_species().iter().enumerate() {
        let atpsp = pspot.get_psp(sp)?;

        let atom_positions = crystal.get_atom_positions_of_specie(isp);

        let vlocg_one = atom_super_pos_one_specie(atpsp, &atom_positions, pwden, gvec, volume);

        for (x, y) in multizip((vlocg_one.iter(), vlocg.iter_mut())) {
            *y += *x;
        }
    }

    Ok(vlocg)
}

fn atom_super_pos_one_specie(
    atompsp: &dyn AtomPSP,
    atom_positions: &[Vector3f64],
    pwden: &PWDensity,
    gvec: &GVector,
    volume: f64,
) -> Vec<c64> {
    let gshell_index = pwden.get_gshell_index();

    // structure factor

    let sfact = fhkl::compute_structure_factor(gvec.get_miller(), pwden.get_gindex(), atom_positions);

    // form factor on G shells

    let ffact_vloc = vloc_of_g_on_shells(atompsp, pwden, volume);

    sfact
        .iter()
        .zip(gshell_index.iter())
        .map(|(s, &ish)| ffact_vloc[ish] * *s)
        .collect()
}

pub fn vloc_of_g_on_shells(atompsp: &dyn AtomPSP, pwden: &PWDensity, volume: f64) -> Vec<f64> {
    pwden
        .get_gshell_norms()
        .iter()
        .map(|&g| atompsp.get_vloc_q(g) / volume)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dwconsts::*;
    use lattice::Lattice;
    use pspot::GTH;

    #[test]
    fn test_vloc_of_diamond_silicon() {
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

        let si = GTH::new("Si", 4.0, 0.44, &[-7.33610297], vec![]).unwrap();
        let gth0 = si.get_vloc_q(0.0);

        let pots = PSPot::from_pots(vec![("Si".to_string(), Box::new(si) as Box<dyn AtomPSP>)]);

        let gvec = GVector::new(&latt, [15, 15, 15]);
        let pwden = PWDensity::new(20.0, &gvec);

        let vlocg = from_atomic_super_position(&pots, &crystal, &gvec, &pwden).unwrap();

        assert!((vlocg[0].re - 2.0 * gth0 / latt.volume()).abs() < 1E-12);

        // (200)-type reflections vanish in diamond
        let ig = pwden.find_miller(Vector3i32::new(1, 1, 0)).unwrap();
        assert!(vlocg[ig].norm() < EPS12);

        // the local potential is attractive at long wavelengths
        let ig = pwden.find_miller(Vector3i32::new(1, 0, 0)).unwrap();
        assert!(vlocg[ig].re < 0.0);
    }
}
