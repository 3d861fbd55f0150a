use crate::Matrix;

use dwconsts::*;
use nalgebra::DMatrix;

impl Matrix<f64> {
    pub fn identity(n: usize) -> Matrix<f64> {
        let mut mat = Matrix::<f64>::new(n, n);

        for i in 0..n {
            mat[[i, i]] = 1.0;
        }

        mat
    }

    pub fn inv(&mut self) {
        assert_eq!(self.nrow, self.ncol, "Matrix::inv requires a square matrix");

        let mat = DMatrix::<f64>::from_column_slice(self.nrow, self.ncol, self.as_slice());

        if let Some(inv) = mat.try_inverse() {
            self.data.copy_from_slice(inv.as_slice());
        } else {
            self.pinv();
        }
    }

    /// https://software.intel.com/content/www/us/en/develop/articles/implement-pseudoinverse-of-a-matrix-by-intel-mkl.html
    pub fn pinv(&mut self) {
        assert_eq!(self.nrow, self.ncol, "Matrix::pinv requires a square matrix");

        let mat = DMatrix::<f64>::from_column_slice(self.nrow, self.ncol, self.as_slice());

        match mat.svd(true, true).pseudo_inverse(EPS20) {
            Ok(pinv) => self.data.copy_from_slice(pinv.as_slice()),
            Err(_) => self.set_zeros(),
        }
    }

    pub fn determinant(&self) -> f64 {
        assert_eq!(self.nrow, self.ncol);

        DMatrix::<f64>::from_column_slice(self.nrow, self.ncol, self.as_slice()).determinant()
    }
}
