use matrix::*;
use vector3::*;

use std::{f64::consts, fmt};

/// Lattice vectors stored as the columns of a 3x3 matrix, in bohr.
#[derive(Debug, Default, Clone)]
pub struct Lattice {
    data: Matrix<f64>,
}

impl Lattice {
    pub fn new(a: &[f64], b: &[f64], c: &[f64]) -> Lattice {
        let mut data = Matrix::<f64>::new(3, 3);

        data.set_col(0, a);
        data.set_col(1, b);
        data.set_col(2, c);

        Lattice { data }
    }

    pub fn as_matrix(&self) -> &Matrix<f64> {
        &self.data
    }

    // ( a x b ) . c
    pub fn volume(&self) -> f64 {
        let a = self.get_vector_a();
        let b = self.get_vector_b();
        let c = self.get_vector_c();

        a.cross_product(&b).dot_product(&c)
    }

    // ra = 2 x PI x (b x c) / volume
    // rb = 2 x PI x (c x a) / volume
    // rc = 2 x PI x (a x b) / volume
    pub fn reciprocal(&self) -> Lattice {
        let factor = 2.0 * consts::PI / self.volume();

        let a = self.get_vector_a();
        let b = self.get_vector_b();
        let c = self.get_vector_c();

        let blatt_a = b.cross_product(&c) * factor;
        let blatt_b = c.cross_product(&a) * factor;
        let blatt_c = a.cross_product(&b) * factor;

        Lattice::new(
            &blatt_a.to_array(),
            &blatt_b.to_array(),
            &blatt_c.to_array(),
        )
    }

    pub fn get_vector_a(&self) -> Vector3f64 {
        self.get_vector(0)
    }

    pub fn get_vector_b(&self) -> Vector3f64 {
        self.get_vector(1)
    }

    pub fn get_vector_c(&self) -> Vector3f64 {
        self.get_vector(2)
    }

    fn get_vector(&self, icol: usize) -> Vector3f64 {
        let v = self.data.get_col(icol);

        Vector3f64::new(v[0], v[1], v[2])
    }

    pub fn scaled_by(&mut self, f: f64) {
        self.data.as_mut_slice().iter_mut().for_each(|v| *v *= f);
    }

    pub fn frac_to_cart(&self, pos_f: &Vector3f64) -> Vector3f64 {
        self.get_vector_a() * pos_f.x + self.get_vector_b() * pos_f.y + self.get_vector_c() * pos_f.z
    }
}

impl fmt::Display for Lattice {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let a = self.get_vector_a();
        let b = self.get_vector_b();
        let c = self.get_vector_c();

        write!(
            f,
            "{:16.8}{:16.8}{:16.8}\n{:16.8}{:16.8}{:16.8}\n{:16.8}{:16.8}{:16.8}",
            a.x, a.y, a.z, b.x, b.y, b.z, c.x, c.y, c.z
        )
    }
}

#[test]
fn test_lattice_reciprocal_is_dual() {
    let latt = Lattice::new(&[1.0, 0.1, 0.0], &[0.0, 1.0, 0.2], &[0.0, 0.3, 1.0]);

    let blatt = latt.reciprocal();

    // a_i . b_j = 2 pi delta_ij
    let prod = latt.as_matrix().transpose().dot(blatt.as_matrix());

    for i in 0..3 {
        for j in 0..3 {
            let target = if i == j { 2.0 * consts::PI } else { 0.0 };
            assert!((prod[[i, j]] - target).abs() < 1E-12);
        }
    }

    let mut latt_1 = latt.clone();
    latt_1.scaled_by(2.0);
    assert!((latt_1.volume() - 8.0 * latt.volume()).abs() < 1E-12);

    let pos_c = latt.frac_to_cart(&Vector3f64::new(0.0, 1.0, 0.0));
    assert_eq!(pos_c, latt.get_vector_b());
}
