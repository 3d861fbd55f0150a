use crate::{apply_lda, XC};
use dwconsts::*;
use ndarray::Array3;
use types::c64;

const T13: f64 = 1.0 / 3.0;

/// Slater exchange only.
pub struct XCLDAX {}

impl XCLDAX {
    pub fn new() -> XCLDAX {
        XCLDAX {}
    }
}

impl XC for XCLDAX {
    fn potential_and_energy(&self, rho: &Array3<c64>, vxc: &mut Array3<c64>, exc: &mut Array3<c64>) {
        apply_lda(rho, vxc, exc, evx_slater);
    }
}

pub(crate) fn evx_slater(rho: f64) -> (f64, f64) {
    let cx: f64 = -(3.0 / PI).powf(T13);

    let vx = cx * rho.powf(T13);

    let ex = 0.75 * vx;

    (vx, ex)
}
