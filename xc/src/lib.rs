mod error;
pub use error::*;

mod ldapz;
pub use ldapz::*;

mod ldax;
pub use ldax::*;

use ndarray::Array3;
use types::c64;

/// Densities below this are treated as vacuum.
pub const RHO_THRESHOLD: f64 = 1E-10;

/// Local exchange-correlation functional on the real-space grid.
pub trait XC: Send + Sync {
    /// vxc(r) = d(rho e_xc)/d rho and the energy per electron e_xc(r).
    /// Only the real part of rho is used; slightly negative values are folded to |rho|.
    fn potential_and_energy(&self, rho: &Array3<c64>, vxc: &mut Array3<c64>, exc: &mut Array3<c64>);
}

pub fn new(xc_scheme: &str) -> Result<Box<dyn XC>, XCError> {
    match xc_scheme {
        "lda-pz" => Ok(Box::new(XCLDAPZ::new())),
        "lda-x" => Ok(Box::new(XCLDAX::new())),
        other => Err(XCError::UnknownScheme(other.to_string())),
    }
}

// applies a pointwise (v, e) = f(rho) kernel over the grid
pub(crate) fn apply_lda<F>(rho: &Array3<c64>, vxc: &mut Array3<c64>, exc: &mut Array3<c64>, kernel: F)
where
    F: Fn(f64) -> (f64, f64),
{
    assert_eq!(rho.shape(), vxc.shape());
    assert_eq!(rho.shape(), exc.shape());

    let vxc = vxc.as_mut_slice();
    let exc = exc.as_mut_slice();

    for (i, r) in rho.as_slice().iter().enumerate() {
        let t = r.re.abs();

        let (v, e) = if t > RHO_THRESHOLD { kernel(t) } else { (0.0, 0.0) };

        vxc[i] = c64 { re: v, im: 0.0 };
        exc[i] = c64 { re: e, im: 0.0 };
    }
}
