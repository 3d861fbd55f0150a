use crate::Array3;

use itertools::multizip;
use rayon::prelude::*;

use types::*;

const PARALLEL_MIN_LEN: usize = 8192;

#[inline]
fn use_parallel_for_len(len: usize) -> bool {
    len >= PARALLEL_MIN_LEN && rayon::current_num_threads() > 1
}

impl Array3<c64> {
    pub fn scale(&mut self, f: f64) {
        self.data.iter_mut().for_each(|x| *x *= f);
    }

    pub fn norm2(&self) -> f64 {
        self.data.iter().map(|x| x.norm_sqr()).sum::<f64>().sqrt()
    }

    /// self += factor * |rhs|^2, elementwise
    pub fn scaled_sqr_add(&mut self, rhs: &Array3<c64>, factor: f64) {
        let psrc = rhs.as_slice();
        let pdst = self.as_mut_slice();

        assert_eq!(psrc.len(), pdst.len());

        if use_parallel_for_len(pdst.len()) {
            pdst.par_iter_mut().zip(psrc.par_iter()).for_each(|(d, s)| {
                *d += s.norm_sqr() * factor;
            });
        } else {
            for (s, d) in multizip((psrc.iter(), pdst.iter_mut())) {
                *d += s.norm_sqr() * factor;
            }
        }
    }

    /// Multiplies the grid pointwise by a real field of the same shape.
    pub fn multiply_real(&mut self, field: &Array3<c64>) {
        let psrc = field.as_slice();
        let pdst = self.as_mut_slice();

        assert_eq!(psrc.len(), pdst.len());

        for (s, d) in multizip((psrc.iter(), pdst.iter_mut())) {
            *d *= s.re;
        }
    }

    pub fn max_imaginary(&self) -> f64 {
        self.data.iter().fold(0.0, |m, x| x.im.abs().max(m))
    }

    pub fn min_real(&self) -> f64 {
        self.data.iter().fold(f64::INFINITY, |m, x| x.re.min(m))
    }
}

#[test]
fn test_array3_c64_accumulate() {
    let mut m = Array3::<c64>::new([4, 3, 2]);
    let mut psi = Array3::<c64>::new([4, 3, 2]);

    psi.set_value(c64::new(0.0, 2.0));

    m.scaled_sqr_add(&psi, 0.5);

    assert_eq!(m.sum(), c64::new(2.0 * 24.0, 0.0));
    assert_eq!(m.max_imaginary(), 0.0);
    assert_eq!(m.min_real(), 2.0);

    let field = m.clone();
    m.multiply_real(&field);
    assert_eq!(m[[3, 2, 1]], c64::new(4.0, 0.0));

    m.scale(0.25);
    assert!((m.norm2() - (24.0f64).sqrt()).abs() < 1E-12);
}
