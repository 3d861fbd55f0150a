use crate::Smearing;
use dwconsts::*;
use special;

pub struct SmearingGS {}

impl Smearing for SmearingGS {
    fn occupation(&self, x: f64) -> f64 {
        0.5 * special::erfc(x)
    }

    fn entropy(&self, x: f64) -> f64 {
        0.5 / SQRT_PI * (-x * x).exp()
    }
}
