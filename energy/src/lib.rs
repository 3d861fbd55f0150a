use dwconsts::*;
use itertools::multizip;
use kscf::KSCF;
use ndarray::Array3;
use num_traits::identities::Zero;
use pwdensity::PWDensity;
use types::c64;

const OUT_WIDTH1: usize = 20;
const OUT_WIDTH2: usize = 22;

/// Pieces of the total energy, all in Hartree,
///
///   E = eband + deband + E_H + E_xc + E_ewald - TS
///
/// with deband = -int rho V_Hxc[rho_in] removing the double counting from
/// the band energy. Evaluated at rho_in this is the Harris-Foulkes functional,
/// at rho_out the Kohn-Sham one.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EnergyTerms {
    pub eband: f64,
    pub deband: f64,
    pub hartree: f64,
    pub xc: f64,
    pub ewald: f64,
    pub smearing: f64,
}

impl EnergyTerms {
    pub fn total(&self) -> f64 {
        self.eband + self.deband + self.hartree + self.xc + self.ewald + self.smearing
    }

    pub fn display(&self, title: &str) {
        log::info!("");
        log::info!("      {:-^44}", format!(" {} (Ry) ", title));
        log::info!("");

        let rows = [
            ("bands", self.eband),
            ("double counting", self.deband),
            ("Hartree (wo G0)", self.hartree),
            ("E_xc", self.xc),
            ("Ewald", self.ewald),
            ("-TS", self.smearing),
            ("total_energy", self.total()),
        ];

        for (name, value) in rows.iter() {
            log::info!(
                "      {:<width1$} = {:>width2$.12}",
                name,
                value * HA_TO_RY,
                width1 = OUT_WIDTH1,
                width2 = OUT_WIDTH2
            );
        }
    }
}

/// E_H = 1/2 * 4pi * volume * sum_{G != 0} |rho(G)|^2 / G^2
pub fn hartree(pwden: &PWDensity, volume: f64, rhog: &[c64]) -> f64 {
    let g_pwden = pwden.get_g();

    let mut etot_hartree = 0.0f64;

    for (rho, &g) in rhog.iter().zip(g_pwden.iter()).skip(1) {
        etot_hartree += rho.norm_sqr() / (g * g);
    }

    etot_hartree * 0.5 * volume * FOURPI
}

/// V_H(G) = 4pi rho(G) / G^2; the G = 0 term is cancelled by the ionic background.
pub fn hartree_potential(pwden: &PWDensity, rhog: &[c64], vhg: &mut [c64]) {
    let g_pwden = pwden.get_g();

    for (v, rho, &g) in multizip((vhg.iter_mut(), rhog.iter(), g_pwden.iter())) {
        *v = if g > EPS8 { *rho * (FOURPI / (g * g)) } else { c64::zero() };
    }
}

/// E_xc = int rho(r) e_xc(r) dr
pub fn exc(volume: f64, rho_3d: &Array3<c64>, exc_3d: &Array3<c64>) -> f64 {
    integral_rho_v(volume, rho_3d, exc_3d)
}

/// int rho(r) v(r) dr on the real-space grid.
pub fn integral_rho_v(volume: f64, rho_3d: &Array3<c64>, v_3d: &Array3<c64>) -> f64 {
    let mut sum = 0.0;

    for (r, v) in multizip((rho_3d.as_slice().iter(), v_3d.as_slice().iter())) {
        sum += r.re * v.re;
    }

    sum * volume / rho_3d.len() as f64
}

/// sum_k w_k sum_n f_nk e_nk
pub fn band_structure(kscfs: &[KSCF], evals: &[Vec<f64>]) -> f64 {
    kscfs
        .iter()
        .zip(evals.iter())
        .map(|(kscf, e)| kscf.get_band_structure_energy(e) * kscf.get_k_weight())
        .sum()
}
