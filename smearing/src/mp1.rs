use crate::Smearing;
use dwconsts::*;
use special;

/// Methfessel-Paxton, first order.
pub struct SmearingMP1 {}

impl Smearing for SmearingMP1 {
    fn occupation(&self, x: f64) -> f64 {
        0.5 * (1.0 - special::erf(x) - 1.0 / SQRT_PI * x * (-x * x).exp())
    }

    // A_1 H_2(x) exp(-x^2) / 2, A_1 = -1/(4 sqrt(pi))
    fn entropy(&self, x: f64) -> f64 {
        (1.0 - 2.0 * x * x) * (-x * x).exp() / (4.0 * SQRT_PI)
    }
}
