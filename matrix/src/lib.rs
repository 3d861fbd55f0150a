// column-major memory layout
// [i,j] : i + j * nrow
//   0,0 0,1 0,2        0 2 4
//   1,0 1,1 1,2        1 3 5

mod matrix_c64;
pub use matrix_c64::*;

mod matrix_f64;
pub use matrix_f64::*;

//////////////////////////////////////////

use itertools::multizip;
use std::ops::*;
use std::{
    fmt,
    fmt::{Debug, Display},
};

pub trait Dot<RHS = Self> {
    type Output;

    fn dot(&self, other: &RHS) -> Self::Output;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Matrix<T> {
    nrow: usize,
    ncol: usize,
    data: Vec<T>,
}

impl<T> Dot<Matrix<T>> for Matrix<T>
where
    T: num_traits::identities::Zero + Default + Copy + AddAssign + Mul<Output = T>,
{
    type Output = Self;

    fn dot(&self, rhs: &Matrix<T>) -> Self::Output {
        assert_eq!(self.ncol(), rhs.nrow());

        let nr_lhs = self.nrow();
        let nc_lhs = self.ncol();

        let nc_rhs = rhs.ncol();

        let mut mdot = Matrix::<T>::new(nr_lhs, nc_rhs);

        for j in 0..nc_rhs {
            for k in 0..nc_lhs {
                let f = rhs[[k, j]];
                for i in 0..nr_lhs {
                    mdot[[i, j]] += self[[i, k]] * f;
                }
            }
        }

        mdot
    }
}

impl<T> Dot<Vec<T>> for Matrix<T>
where
    T: num_traits::identities::Zero + Default + Copy + AddAssign + Mul<Output = T>,
{
    type Output = Vec<T>;

    fn dot(&self, rhs: &Vec<T>) -> Self::Output {
        assert_eq!(self.ncol(), rhs.len());

        let mut v = vec![T::zero(); self.nrow()];

        for (i, &fact) in rhs.iter().enumerate() {
            for (d, &s) in multizip((v.iter_mut(), self.get_col(i).iter())) {
                *d += fact * s;
            }
        }

        v
    }
}

impl<T: num_traits::identities::Zero + Default + Copy> Matrix<T> {
    pub fn new(nrow: usize, ncol: usize) -> Matrix<T> {
        Matrix {
            nrow,
            ncol,
            data: vec![T::zero(); nrow * ncol],
        }
    }

    pub fn from_row_slice(nrow: usize, ncol: usize, s: &[T]) -> Matrix<T> {
        assert_eq!(s.len(), nrow * ncol);

        let mut data: Vec<T> = vec![T::zero(); nrow * ncol];
        let mut n = 0;
        for i in 0..nrow {
            for j in 0..ncol {
                data[i + j * nrow] = s[n];
                n += 1;
            }
        }
        Matrix { nrow, ncol, data }
    }

    pub fn from_column_slice(nrow: usize, ncol: usize, s: &[T]) -> Matrix<T> {
        assert_eq!(s.len(), nrow * ncol);

        Matrix {
            nrow,
            ncol,
            data: s.to_vec(),
        }
    }

    pub fn nrow(&self) -> usize {
        self.nrow
    }

    pub fn ncol(&self) -> usize {
        self.ncol
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn set_zeros(&mut self) {
        self.data.iter_mut().for_each(|x| *x = T::zero());
    }

    pub fn set_col(&mut self, icol: usize, v: &[T]) {
        let n1 = icol * self.nrow;
        let n2 = n1 + self.nrow;

        self.data[n1..n2].copy_from_slice(v);
    }

    pub fn get_col(&self, icol: usize) -> &[T] {
        let n1 = icol * self.nrow;
        let n2 = n1 + self.nrow;

        &self.data[n1..n2]
    }

    pub fn get_mut_col(&mut self, icol: usize) -> &mut [T] {
        let n1 = icol * self.nrow;
        let n2 = n1 + self.nrow;

        &mut self.data[n1..n2]
    }

    /// Keeps the leading `ncol` columns.
    pub fn truncate_cols(&mut self, ncol: usize) {
        assert!(ncol <= self.ncol);

        self.data.truncate(ncol * self.nrow);
        self.ncol = ncol;
    }

    /// Appends one column at the end. The row count must match.
    pub fn push_col(&mut self, v: &[T]) {
        assert_eq!(v.len(), self.nrow);

        self.data.extend_from_slice(v);
        self.ncol += 1;
    }

    pub fn transpose(&self) -> Matrix<T> {
        let mut data = Vec::with_capacity(self.nrow * self.ncol);
        for i in 0..self.nrow {
            for j in 0..self.ncol {
                data.push(self[[i, j]])
            }
        }
        Matrix {
            nrow: self.ncol,
            ncol: self.nrow,
            data,
        }
    }
}

impl<T> Index<[usize; 2]> for Matrix<T> {
    type Output = T;

    fn index(&self, idx: [usize; 2]) -> &T {
        &self.data[idx[0] + idx[1] * self.nrow]
    }
}

impl<T> IndexMut<[usize; 2]> for Matrix<T> {
    fn index_mut(&mut self, idx: [usize; 2]) -> &mut Self::Output {
        &mut self.data[idx[0] + idx[1] * self.nrow]
    }
}

impl<T: Debug + Display> fmt::Display for Matrix<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for i in 0..self.nrow {
            write!(f, " | ")?;
            for j in 0..self.ncol {
                write!(f, "{:+8.3} ", self[[i, j]])?;
            }
            writeln!(f, "|")?;
        }
        Ok(())
    }
}
