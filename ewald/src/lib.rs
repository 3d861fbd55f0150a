use crystal::*;
use dwconsts::*;
use gvector::*;
use num_traits::identities::Zero;
use pwdensity::*;
use types::*;
use vector3::*;

/// Ion-ion energy of point charges zion in a neutralizing background,
/// split into real-space, G-space and G = 0 parts with the Gaussian width eta.
pub struct Ewald {
    energy: f64,
    eta: f64,
}

impl Ewald {
    pub fn new(crystal: &Crystal, zions: &[f64], gvec: &GVector, pwden: &PWDensity) -> Ewald {
        // cutoff in G space
        let eta = get_eta_based_on_gcut(pwden, 1E-30);

        Ewald::with_eta(crystal, zions, gvec, pwden, eta)
    }

    pub fn with_eta(crystal: &Crystal, zions: &[f64], gvec: &GVector, pwden: &PWDensity, eta: f64) -> Ewald {
        // cutoff in R space
        let rmax = get_rmax_based_on_eta(eta, 1E-30);

        let nn_cells = make_near_cells(crystal, rmax);

        let energy_r = compute_energy_real_space_part(crystal, zions, eta, &nn_cells);
        let energy_g = compute_energy_g_space_part(crystal, zions, gvec, pwden, eta);
        let energy_g0 = compute_energy_g0_part(crystal, zions, eta);

        Ewald {
            energy: energy_r + energy_g + energy_g0,
            eta,
        }
    }

    pub fn get_energy(&self) -> f64 {
        self.energy
    }

    pub fn get_eta(&self) -> f64 {
        self.eta
    }
}

fn make_near_cells(crystal: &Crystal, rmax: f64) -> Vec<Vector3i32> {
    let latt = crystal.get_latt();

    let a = latt.get_vector_a();
    let b = latt.get_vector_b();
    let c = latt.get_vector_c();

    let na = (rmax / a.norm2()).ceil() as i32 + 2;
    let nb = (rmax / b.norm2()).ceil() as i32 + 2;
    let nc = (rmax / c.norm2()).ceil() as i32 + 2;

    let mut t_rs: Vec<Vector3i32> = Vec::new();
    let mut t_r2: Vec<f64> = Vec::new();

    for ia in -na..=na {
        for ib in -nb..=nb {
            for ic in -nc..=nc {
                let x = a.x * ia as f64 + b.x * ib as f64 + c.x * ic as f64;
                let y = a.y * ia as f64 + b.y * ib as f64 + c.y * ic as f64;
                let z = a.z * ia as f64 + b.z * ib as f64 + c.z * ic as f64;

                let r2 = x * x + y * y + z * z;

                if r2 < rmax * rmax {
                    t_r2.push(r2);
                    t_rs.push(Vector3i32::new(ia, ib, ic));
                }
            }
        }
    }

    // nearest cells first
    utility::argsort(&t_r2).iter().map(|&j| t_rs[j]).collect()
}

// 4pi/G^2*exp(-G^2/4/eta) = eps

fn get_eta_based_on_gcut(pwden: &PWDensity, eps: f64) -> f64 {
    let gmax = pwden.get_gmax();

    let g2 = gmax * gmax;

    -0.25 * g2 / (eps * g2 / FOURPI).ln()
}

fn get_rmax_based_on_eta(eta: f64, eps: f64) -> f64 {
    let mut rmax = 0.0;

    while special::erfc(rmax * eta.sqrt()) > rmax * eps {
        rmax += 0.1;
    }

    rmax
}

fn compute_energy_real_space_part(crystal: &Crystal, zions: &[f64], eta: f64, nn_cells: &[Vector3i32]) -> f64 {
    let latt = crystal.get_latt();

    let a = latt.get_vector_a();
    let b = latt.get_vector_b();
    let c = latt.get_vector_c();

    let atoms = crystal.get_atom_positions();

    let eta_sqrt = eta.sqrt();

    let mut sum = 0.0;

    for cell in nn_cells.iter() {
        let home = cell.x == 0 && cell.y == 0 && cell.z == 0;

        for (i, ati) in atoms.iter().enumerate() {
            for (j, atj) in atoms.iter().enumerate() {
                // an ion does not interact with itself, but with its periodic images
                if home && j == i {
                    continue;
                }

                // d_i - d_j - R, crystal coordinates

                let fa = ati.x - atj.x - cell.x as f64;
                let fb = ati.y - atj.y - cell.y as f64;
                let fc = ati.z - atj.z - cell.z as f64;

                // get cartesion coordinates

                let dx = a.x * fa + b.x * fb + c.x * fc;
                let dy = a.y * fa + b.y * fb + c.y * fc;
                let dz = a.z * fa + b.z * fb + c.z * fc;

                let r = (dx * dx + dy * dy + dz * dz).sqrt();

                sum += 0.5 * zions[i] * zions[j] / r * special::erfc(eta_sqrt * r);
            }
        }
    }

    sum
}

fn compute_energy_g_space_part(crystal: &Crystal, zions: &[f64], gvec: &GVector, pwden: &PWDensity, eta: f64) -> f64 {
    let g = pwden.get_g();

    let gidx = pwden.get_gindex();

    let miller = gvec.get_miller();

    let atoms = crystal.get_atom_positions();

    let mut sum = 0.0;

    for (&ig, &gnorm) in gidx.iter().zip(g.iter()).skip(1) {
        let mill = miller[ig];
        let g2 = gnorm * gnorm;

        let mut s = c64::zero();

        for (iat, atom) in atoms.iter().enumerate() {
            let gd = TWOPI * (atom.x * mill.x as f64 + atom.y * mill.y as f64 + atom.z * mill.z as f64);

            s += zions[iat] * c64::new(gd.cos(), gd.sin());
        }

        sum += s.norm_sqr() * (-g2 / 4.0 / eta).exp() / g2;
    }

    let volume = crystal.get_latt().volume();

    sum * FOURPI / 2.0 / volume
}

fn compute_energy_g0_part(crystal: &Crystal, zions: &[f64], eta: f64) -> f64 {
    let volume = crystal.get_latt().volume();

    let s: f64 = zions.iter().sum();
    let s2: f64 = zions.iter().map(|x| x * x).sum();

    -(eta / PI).sqrt() * s2 - 0.5 * s * s * FOURPI / volume / 4.0 / eta
}
