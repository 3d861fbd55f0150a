use crate::Smearing;
use dwconsts::*;
use special;

/// Methfessel-Paxton, second order.
pub struct SmearingMP2 {}

impl Smearing for SmearingMP2 {
    fn occupation(&self, x: f64) -> f64 {
        0.5 * (1.0 - special::erf(x) - 1.0 / SQRT_PI * x * (7.0 / 4.0 - 0.5 * x * x) * (-x * x).exp())
    }

    // A_2 H_4(x) exp(-x^2) / 2, A_2 = 1/(32 sqrt(pi))
    fn entropy(&self, x: f64) -> f64 {
        let x2 = x * x;

        (16.0 * x2 * x2 - 48.0 * x2 + 12.0) * (-x2).exp() / (64.0 * SQRT_PI)
    }
}
