use crystal::Crystal;
use gvector::GVector;
use itertools::multizip;
use matrix::Matrix;
use num_traits::identities::Zero;
use pspot::{AtomPSP, PSPot, PspError};
use pwbasis::PWBasis;
use types::c64;

/// Nonlocal projectors of all atoms at one k-point,
///
///   V_nl = sum_a sum_{ij,m} |beta_a,im> D_ij <beta_a,jm|
///
/// with <k+G|beta_a,im> = beta_i(|k+G|) Y_lm(k+G) exp(-iG.tau_a) / sqrt(volume).
/// The (-i)^l and exp(-ik.tau) phases cancel between bra and ket and are dropped.
pub struct VNL {
    ik: usize,
    atoms: Vec<AtomProjectors>,
}

struct AtomProjectors {
    // one column per (beta, m)
    beta: Matrix<c64>,
    // coupling between the columns of beta
    dij: Matrix<f64>,
}

impl VNL {
    pub fn new(
        ik: usize,
        pots: &PSPot,
        pwwfc: &PWBasis,
        gvec: &GVector,
        crystal: &Crystal,
    ) -> Result<VNL, PspError> {
        let volume = crystal.get_latt().volume();
        let fact = 1.0 / volume.sqrt();

        let kg = pwwfc.get_kg();
        let npw = pwwfc.get_n_plane_waves();

        let gcart = gvec.get_cart();
        let xk = pwwfc.get_k_cart();

        let mut atoms = Vec::new();

        for (isp, sp) in crystal.get_unique_species().iter().enumerate() {
            let atpsp = pots.get_psp(sp)?;

            if atpsp.get_nbeta() == 0 {
                continue;
            }

            // radial tables and angular parts are shared by all atoms of this specie

            let (columns, dij) = projector_layout(atpsp);

            let mut radial_angular = Matrix::<f64>::new(npw, columns.len());

            for (icol, &(ibeta, l, m)) in columns.iter().enumerate() {
                for (ipw, &ig) in pwwfc.get_gindex().iter().enumerate() {
                    let ylm = special::real_spherical_harmonics(l, m, xk + gcart[ig])
                        .ok_or(PspError::UnsupportedProjector { l, i: ibeta + 1 })?;

                    radial_angular[[ipw, icol]] = fact * atpsp.get_beta_q(ibeta, kg[ipw]) * ylm;
                }
            }

            for tau in crystal.get_atom_positions_of_specie(isp).iter() {
                let sfact = fhkl::compute_structure_factor_for_many_g_one_atom(
                    gvec.get_miller(),
                    pwwfc.get_gindex(),
                    *tau,
                );

                let mut beta = Matrix::<c64>::new(npw, columns.len());

                for icol in 0..columns.len() {
                    for (b, s, r) in multizip((
                        beta.get_mut_col(icol).iter_mut(),
                        sfact.iter(),
                        radial_angular.get_col(icol).iter(),
                    )) {
                        *b = *s * *r;
                    }
                }

                atoms.push(AtomProjectors {
                    beta,
                    dij: dij.clone(),
                });
            }
        }

        Ok(VNL { ik, atoms })
    }

    /// No projectors, e.g. for local-only pseudopotentials.
    pub fn empty(ik: usize) -> VNL {
        VNL {
            ik,
            atoms: Vec::new(),
        }
    }

    pub fn get_k_index(&self) -> usize {
        self.ik
    }

    pub fn get_n_projectors(&self) -> usize {
        self.atoms.iter().map(|a| a.beta.ncol()).sum()
    }

    /// vout += V_nl vin
    pub fn apply(&self, vin: &[c64], vout: &mut [c64]) {
        for atom in self.atoms.iter() {
            let nproj = atom.beta.ncol();

            // <beta_j|psi>
            let becp: Vec<c64> = (0..nproj)
                .map(|j| utility::zdot_product(atom.beta.get_col(j), vin))
                .collect();

            for i in 0..nproj {
                let mut f = c64::zero();

                for j in 0..nproj {
                    f += atom.dij[[i, j]] * becp[j];
                }

                if f.norm_sqr() == 0.0 {
                    continue;
                }

                for (o, b) in vout.iter_mut().zip(atom.beta.get_col(i).iter()) {
                    *o += f * *b;
                }
            }
        }
    }

    /// <G|V_nl|G> for the preconditioner.
    pub fn get_diagonal(&self, npw: usize) -> Vec<f64> {
        let mut diag = vec![0.0; npw];

        for atom in self.atoms.iter() {
            let nproj = atom.beta.ncol();

            for i in 0..nproj {
                for j in 0..nproj {
                    let d = atom.dij[[i, j]];

                    if d == 0.0 {
                        continue;
                    }

                    for (x, bi, bj) in multizip((
                        diag.iter_mut(),
                        atom.beta.get_col(i).iter(),
                        atom.beta.get_col(j).iter(),
                    )) {
                        *x += d * (*bi * bj.conj()).re;
                    }
                }
            }
        }

        diag
    }
}

// (ibeta, l, m) for every projector column and the D matrix over these columns
fn projector_layout(atpsp: &dyn AtomPSP) -> (Vec<(usize, usize, i32)>, Matrix<f64>) {
    let mut columns = Vec::new();

    for ibeta in 0..atpsp.get_nbeta() {
        let l = atpsp.get_lbeta(ibeta);

        for m in special::get_quant_num_m(l) {
            columns.push((ibeta, l, m));
        }
    }

    let ncol = columns.len();

    let mut dij = Matrix::<f64>::new(ncol, ncol);

    for (i, &(ib, li, mi)) in columns.iter().enumerate() {
        for (j, &(jb, lj, mj)) in columns.iter().enumerate() {
            if li == lj && mi == mj {
                dij[[i, j]] = atpsp.get_dij(ib, jb);
            }
        }
    }

    (columns, dij)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice::Lattice;
    use pspot::GTH;
    use vector3::*;

    fn silicon() -> (Crystal, PSPot, GVector) {
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

        let pots = PSPot::from_pots(vec![("Si".to_string(), Box::new(si) as Box<dyn AtomPSP>)]);

        let gvec = GVector::new(&latt, [16, 16, 16]);

        (crystal, pots, gvec)
    }

    #[test]
    fn test_vnl_is_hermitian() {
        let (crystal, pots, gvec) = silicon();

        let xk = crystal
            .get_latt()
            .reciprocal()
            .frac_to_cart(&Vector3f64::new(0.25, 0.0, 0.125));

        let pwwfc = PWBasis::new(xk, 0, 5.0, &gvec);
        let npw = pwwfc.get_n_plane_waves();

        let vnl = VNL::new(0, &pots, &pwwfc, &gvec, &crystal).unwrap();

        // 2 atoms x (2 s + 3 p)
        assert_eq!(vnl.get_n_projectors(), 10);

        let u: Vec<c64> = (0..npw).map(|i| c64::new((i as f64).sin(), 0.3 * i as f64 / npw as f64)).collect();
        let v: Vec<c64> = (0..npw).map(|i| c64::new(1.0 / (1.0 + i as f64), (i as f64).cos())).collect();

        let mut vnl_v = vec![c64::zero(); npw];
        let mut vnl_u = vec![c64::zero(); npw];

        vnl.apply(&v, &mut vnl_v);
        vnl.apply(&u, &mut vnl_u);

        let uv = utility::zdot_product(&u, &vnl_v);
        let vu = utility::zdot_product(&v, &vnl_u).conj();

        assert!((uv - vu).norm() < 1E-10 * uv.norm().max(1.0));

        // diagonal agrees with the full operator on unit vectors
        let diag = vnl.get_diagonal(npw);

        for ipw in [0, 3, npw - 1].iter() {
            let mut e = vec![c64::zero(); npw];
            e[*ipw] = c64::new(1.0, 0.0);

            let mut ve = vec![c64::zero(); npw];
            vnl.apply(&e, &mut ve);

            assert!((ve[*ipw].re - diag[*ipw]).abs() < 1E-10);
        }
    }
}
