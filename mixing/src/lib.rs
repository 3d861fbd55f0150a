mod linear;
pub use linear::*;

mod pulay;
pub use pulay::*;

mod broyden;
pub use broyden::*;

use control::Control;
use thiserror::Error;
use types::c64;

#[derive(Debug, Error)]
pub enum MixingError {
    #[error("unknown density mixing scheme '{0}'")]
    UnknownScheme(String),
}

/// Density mixer, owning its history of past (input, residual) pairs.
///
/// Given the same sequence of calls every scheme produces the same densities.
pub trait Mixing: Send {
    /// Overwrites `inp` with the next input density. `res` is rho_out - rho_in,
    /// `gs` the lengths |G| of the coefficients. Returns the L2 norm of `res`.
    fn compute_next_density(&mut self, gs: &[f64], inp: &mut [c64], res: &[c64]) -> f64;

    /// Number of (input, residual) pairs currently kept.
    fn get_history_len(&self) -> usize;

    fn reset(&mut self);
}

pub fn new(control: &Control) -> Result<Box<dyn Mixing>, MixingError> {
    let mixing: Box<dyn Mixing> = match control.get_scf_rho_mix_scheme() {
        "linear" => Box::new(MixingLinear::new(control.get_scf_rho_mix_beta())),

        "pulay" => Box::new(MixingPulay::new(control)),

        "broyden" => Box::new(MixingBroyden::new(control)),

        other => return Err(MixingError::UnknownScheme(other.to_string())),
    };

    Ok(mixing)
}

/// L2 norm of a residual on the density sphere, as returned by every scheme.
pub fn get_residual_norm(res: &[c64]) -> f64 {
    utility::l2_norm(res)
}

/// A history step is at most this many linear steps beta * |R| long.
pub const MAX_STEP_OVER_LINEAR: f64 = 4.0;

/// Largest |rho_next - rho_in| any scheme takes for a residual of norm `res_norm`:
/// min(4 beta, 1) * |R|, so never farther than the undamped residual either.
pub fn get_max_step(beta: f64, res_norm: f64) -> f64 {
    (MAX_STEP_OVER_LINEAR * beta).min(1.0) * res_norm
}

pub(crate) fn limit_step(prev: &[c64], next: &mut [c64], max_norm: f64) {
    let norm = prev
        .iter()
        .zip(next.iter())
        .map(|(a, b)| (b - a).norm_sqr())
        .sum::<f64>()
        .sqrt();

    if norm <= max_norm || norm == 0.0 {
        return;
    }

    let f = max_norm / norm;

    for (a, b) in prev.iter().zip(next.iter_mut()) {
        *b = *a + (*b - *a) * f;
    }
}
