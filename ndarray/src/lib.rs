mod array3_c64;

use ndarray_crate::{Array3 as NdArray3, ShapeBuilder, Zip};
use num_traits::Zero;
use std::ops::{Index, IndexMut};

/// Dense 3d grid in first-index-fastest (Fortran) order, which is the order
/// the FFT grid and the linear G-vector index map assume.
#[derive(Debug, Clone)]
pub struct Array3<T> {
    shape: [usize; 3],
    data: NdArray3<T>,
}

impl<T: Default + Clone> Default for Array3<T> {
    fn default() -> Self {
        Self {
            shape: [0, 0, 0],
            data: NdArray3::from_elem((0, 0, 0).f(), T::default()),
        }
    }
}

impl<T: Default + Copy + Zero + std::ops::Mul<Output = T>> Array3<T> {
    pub fn new(shape: [usize; 3]) -> Array3<T> {
        Array3 {
            shape,
            data: NdArray3::from_elem((shape[0], shape[1], shape[2]).f(), T::zero()),
        }
    }

    /// `data` must be laid out first-index-fastest and hold exactly
    /// `shape[0] * shape[1] * shape[2]` elements.
    pub fn from_vec(shape: [usize; 3], data: Vec<T>) -> Option<Array3<T>> {
        NdArray3::from_shape_vec((shape[0], shape[1], shape[2]).f(), data)
            .ok()
            .map(|data| Array3 { shape, data })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn sum(&self) -> T {
        self.data.iter().fold(T::zero(), |s, v| s + *v)
    }

    pub fn set_value(&mut self, value: T) {
        self.data.fill(value);
    }

    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    pub fn as_slice(&self) -> &[T] {
        // a Fortran-ordered owned array is always contiguous in memory order
        self.data.as_slice_memory_order().unwrap_or_default()
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        self.data.as_slice_memory_order_mut().unwrap_or_default()
    }

    pub fn hadamard_product(src1: &Array3<T>, src2: &Array3<T>, dst: &mut Array3<T>) {
        assert_eq!(src1.shape, src2.shape);
        assert_eq!(src1.shape, dst.shape);

        Zip::from(dst.data.view_mut())
            .and(src1.data.view())
            .and(src2.data.view())
            .for_each(|z, &x, &y| *z = x * y);
    }

    pub fn assign(&mut self, rhs: &Array3<T>) {
        assert_eq!(self.shape, rhs.shape);
        self.data.assign(&rhs.data);
    }

    pub fn add_from(&mut self, rhs: &Array3<T>) {
        assert_eq!(self.shape, rhs.shape);
        Zip::from(self.data.view_mut())
            .and(rhs.data.view())
            .for_each(|d, &s| *d = *d + s);
    }
}

impl<T> Index<[usize; 3]> for Array3<T> {
    type Output = T;

    fn index(&self, idx: [usize; 3]) -> &T {
        &self.data[[idx[0], idx[1], idx[2]]]
    }
}

impl<T> IndexMut<[usize; 3]> for Array3<T> {
    fn index_mut(&mut self, idx: [usize; 3]) -> &mut Self::Output {
        &mut self.data[[idx[0], idx[1], idx[2]]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array3_indexing_and_shape_contract() {
        let a = Array3::from_vec([2, 2, 2], vec![0i32, 1, 2, 3, 4, 5, 6, 7]).unwrap();

        // first index fastest
        assert_eq!(a[[0, 0, 0]], 0);
        assert_eq!(a[[1, 0, 0]], 1);
        assert_eq!(a[[0, 1, 0]], 2);
        assert_eq!(a[[0, 0, 1]], 4);
        assert_eq!(a[[1, 1, 1]], 7);
        assert_eq!(a.shape(), [2, 2, 2]);
        assert_eq!(a.len(), 8);
        assert_eq!(a.as_slice(), &[0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_array3_rejects_wrong_length() {
        assert!(Array3::from_vec([2, 2, 2], vec![0.0f64; 7]).is_none());
    }

    #[test]
    fn test_array3_arithmetic_helpers() {
        let mut a = Array3::from_vec([2, 2, 1], vec![1.0f64, 2.0, 3.0, 4.0]).unwrap();
        let b = Array3::from_vec([2, 2, 1], vec![10.0f64, 20.0, 30.0, 40.0]).unwrap();
        let mut dst = Array3::new([2, 2, 1]);

        Array3::hadamard_product(&a, &b, &mut dst);
        assert_eq!(dst.as_slice(), &[10.0, 40.0, 90.0, 160.0]);

        a.add_from(&b);
        assert_eq!(a.as_slice(), &[11.0, 22.0, 33.0, 44.0]);

        let mut assigned = Array3::new([2, 2, 1]);
        assigned.assign(&b);
        assert_eq!(assigned.as_slice(), b.as_slice());

        assigned.set_value(5.0);
        assert_eq!(assigned.sum(), 20.0);
    }
}
