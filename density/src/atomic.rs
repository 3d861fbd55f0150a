use crystal::Crystal;
use gvector::GVector;
use itertools::multizip;
use ndarray::Array3;
use num_traits::identities::Zero;
use pspot::{AtomPSP, PSPot, PspError};
use pwdensity::PWDensity;
use rgtransform::RGTransform;
use types::*;
use vector3::*;

/// Starting density: isolated-atom valence densities placed on the atomic sites,
///
///   rho(G) = 1/volume * sum_a rho_at(|G|) exp(-iG.tau_a)
///
/// rescaled so that it holds exactly `nelec` electrons.
pub fn from_atomic_super_position(
    pspot: &PSPot,
    crystal: &Crystal,
    rgtrans: &RGTransform,
    gvec: &GVector,
    pwden: &PWDensity,
    nelec: f64,
    rhog: &mut [c64],
    rho_3d: &mut Array3<c64>,
) -> Result<(), PspError> {
    let volume = crystal.get_latt().volume();

    rhog.iter_mut().for_each(|x| *x = c64::zero());

    for (isp, sp) in crystal.get_unique_species().iter().enumerate() {
        let atpsp = pspot.get_psp(sp)?;

        let atom_positions = crystal.get_atom_positions_of_specie(isp);

        let rhog_one = atom_super_pos_one_specie(atpsp, &atom_positions, pwden, gvec, volume);

        for (x, y) in multizip((rhog.iter_mut(), rhog_one.iter())) {
            *x += *y;
        }
    }

    let charge = volume * rhog[0].re;

    if charge > 0.0 && (charge - nelec).abs() > 1.0E-8 {
        log::debug!("atomic density holds {:.6} electrons, rescaled to {:.6}", charge, nelec);

        let f = nelec / charge;

        rhog.iter_mut().for_each(|x| *x *= f);
    }

    // 1D rho(G) -> 3D rho(r)

    rgtrans.g1d_to_r3d(gvec, pwden, rhog, rho_3d.as_mut_slice());

    Ok(())
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

    let ffact_rho: Vec<f64> = pwden
        .get_gshell_norms()
        .iter()
        .map(|&g| atompsp.get_rho_atom_q(g) / volume)
        .collect();

    sfact
        .iter()
        .zip(gshell_index.iter())
        .map(|(s, &ish)| ffact_rho[ish] * *s)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice::Lattice;
    use pspot::GTH;

    #[test]
    fn test_atomic_density_of_silicon() {
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
        let pots = PSPot::from_pots(vec![("Si".to_string(), Box::new(si) as Box<dyn AtomPSP>)]);

        let shape = [18, 18, 18];
        let gvec = GVector::new(&latt, shape);
        let pwden = PWDensity::new(20.0, &gvec);
        let rgtrans = RGTransform::new(shape[0], shape[1], shape[2]);

        let mut rhog = vec![c64::zero(); pwden.get_n_plane_waves()];
        let mut rho_3d = Array3::<c64>::new(shape);

        from_atomic_super_position(&pots, &crystal, &rgtrans, &gvec, &pwden, 8.0, &mut rhog, &mut rho_3d).unwrap();

        assert!((rhog[0].re * latt.volume() - 8.0).abs() < 1E-10);

        // grid average is rho(G = 0)
        let avg = rho_3d.sum() / rho_3d.len() as f64;
        assert!((avg - rhog[0]).norm() < 1E-10);

        // real field
        assert!(rho_3d.max_imaginary() < 1E-10);

        // a charged cell is rescaled
        from_atomic_super_position(&pots, &crystal, &rgtrans, &gvec, &pwden, 7.0, &mut rhog, &mut rho_3d).unwrap();
        assert!((rhog[0].re * latt.volume() - 7.0).abs() < 1E-10);
    }
}
