use crate::{apply_lda, ldax::evx_slater, XC};
use dwconsts::*;
use ndarray::Array3;
use types::c64;

const T13: f64 = 1.0 / 3.0;

/// Slater exchange with Perdew-Zunger correlation.
pub struct XCLDAPZ {}

impl XCLDAPZ {
    pub fn new() -> XCLDAPZ {
        XCLDAPZ {}
    }
}

impl XC for XCLDAPZ {
    fn potential_and_energy(&self, rho: &Array3<c64>, vxc: &mut Array3<c64>, exc: &mut Array3<c64>) {
        apply_lda(rho, vxc, exc, |t| {
            let (vx, ex) = evx_slater(t);
            let (vc, ec) = evc_pz(t);

            (vx + vc, ex + ec)
        });
    }
}

fn evc_pz(rho: f64) -> (f64, f64) {
    let rs = (3.0 / FOURPI / rho).powf(T13);

    if rs > 1.0 {
        const GAMMA: f64 = -0.1423;
        const BETA1: f64 = 1.0529;
        const BETA2: f64 = 0.3334;

        let rroot = rs.sqrt();

        let dt = 1.0 + BETA1 * rroot + BETA2 * rs;

        let ec = GAMMA / dt;

        let nt = 1.0 + 7.0 / 6.0 * BETA1 * rroot + 4.0 / 3.0 * BETA2 * rs;

        let vc = ec * nt / dt;

        (vc, ec)
    } else {
        const A: f64 = 0.0311;
        const B: f64 = -0.048;
        const C: f64 = 0.0020;
        const D: f64 = -0.0116;

        let rln = rs.ln();

        let vc = A * rln + (B - A / 3.0) + 2.0 / 3.0 * C * rs * rln + 1.0 / 3.0 * (2.0 * D - C) * rs;

        let ec = A * rln + B + C * rs * rln + D * rs;

        (vc, ec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn rho_of_rs(rs: f64) -> f64 {
        3.0 / (FOURPI * rs * rs * rs)
    }

    #[test]
    fn test_pz_branches_meet_at_rs_one() {
        let (_, ec_lo) = evc_pz(rho_of_rs(1.0 + 1E-9));
        let (_, ec_hi) = evc_pz(rho_of_rs(1.0 - 1E-9));

        assert_relative_eq!(ec_lo, ec_hi, epsilon = 1E-4);
        assert_relative_eq!(ec_lo, -0.0596, epsilon = 1E-4);
    }

    #[test]
    fn test_potential_is_energy_derivative() {
        // v = d(rho e)/d rho
        for rho in [1E-3, 0.02, 0.3, 2.0].iter() {
            let f = |r: f64| {
                let (_, ex) = evx_slater(r);
                let (_, ec) = evc_pz(r);
                r * (ex + ec)
            };

            let h = rho * 1E-5;
            let dfdr = (f(rho + h) - f(rho - h)) / (2.0 * h);

            let (vx, _) = evx_slater(*rho);
            let (vc, _) = evc_pz(*rho);

            assert_relative_eq!(vx + vc, dfdr, max_relative = 1E-6);
        }
    }
}
