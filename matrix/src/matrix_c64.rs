use crate::Matrix;
use dwconsts::*;

use nalgebra::DMatrix;
use num_traits::Zero;
use types::c64;

impl Matrix<c64> {
    pub fn identity(n: usize) -> Matrix<c64> {
        let mut mat = Matrix::<c64>::new(n, n);

        for i in 0..n {
            mat[[i, i]] = ONE_C64;
        }

        mat
    }

    pub fn adjoint(&self) -> Matrix<c64> {
        let mut data = Vec::with_capacity(self.nrow * self.ncol);
        for i in 0..self.nrow {
            for j in 0..self.ncol {
                data.push(self[[i, j]].conj())
            }
        }
        Matrix {
            nrow: self.ncol,
            ncol: self.nrow,
            data,
        }
    }

    pub fn sum(&self) -> c64 {
        self.data.iter().sum()
    }

    /// Replaces the matrix by (A + A^H) / 2.
    pub fn hermitianize(&mut self) {
        assert_eq!(self.nrow, self.ncol);

        for i in 0..self.ncol {
            for j in i..self.nrow {
                let a = 0.5 * (self[[j, i]] + self[[i, j]].conj());
                self[[j, i]] = a;
                self[[i, j]] = a.conj();
            }
        }
    }

    /// vout = A * vin
    pub fn action(&self, vin: &[c64], vout: &mut [c64]) {
        vout.iter_mut().for_each(|x| *x = c64::zero());

        for i in 0..self.ncol {
            let f = vin[i];
            for j in 0..self.nrow {
                vout[j] += self[[j, i]] * f;
            }
        }
    }

    pub fn inv(&mut self) {
        assert_eq!(self.nrow, self.ncol, "Matrix::inv requires a square matrix");

        let mat = DMatrix::<c64>::from_column_slice(self.nrow, self.ncol, self.as_slice());

        if let Some(inv) = mat.try_inverse() {
            self.data.copy_from_slice(inv.as_slice());
        } else {
            self.pinv();
        }
    }

    /// Pseudo-inverse through SVD. A matrix whose SVD cannot be formed is zeroed,
    /// which turns any extrapolation built on it into a plain damped step.
    pub fn pinv(&mut self) {
        assert_eq!(self.nrow, self.ncol, "Matrix::pinv requires a square matrix");

        let mat = DMatrix::<c64>::from_column_slice(self.nrow, self.ncol, self.as_slice());

        match mat.svd(true, true).pseudo_inverse(EPS20) {
            Ok(pinv) => self.data.copy_from_slice(pinv.as_slice()),
            Err(_) => self.set_zeros(),
        }
    }

    pub fn to_dmatrix(&self) -> DMatrix<c64> {
        DMatrix::<c64>::from_column_slice(self.nrow, self.ncol, self.as_slice())
    }

    pub fn from_dmatrix(m: &DMatrix<c64>) -> Matrix<c64> {
        Matrix {
            nrow: m.nrows(),
            ncol: m.ncols(),
            data: m.as_slice().to_vec(),
        }
    }
}
