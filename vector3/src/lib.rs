mod vector3_f64;
pub use vector3_f64::*;

mod vector3_i32;
pub use vector3_i32::*;

///////////////////////////////////////////////////

#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Vector3<T> {
    pub x: T,
    pub y: T,
    pub z: T,
}

impl<T: num_traits::identities::Zero + Copy> Vector3<T> {
    #[inline]
    pub fn new(x: T, y: T, z: T) -> Self {
        Vector3 { x, y, z }
    }

    #[inline]
    pub fn zeros() -> Vector3<T> {
        Vector3 {
            x: T::zero(),
            y: T::zero(),
            z: T::zero(),
        }
    }

    pub fn to_array(&self) -> [T; 3] {
        [self.x, self.y, self.z]
    }

    pub fn from_array(v: [T; 3]) -> Self {
        Vector3 {
            x: v[0],
            y: v[1],
            z: v[2],
        }
    }
}

#[test]
fn test_vector3f64_products() {
    let a = Vector3f64::new(1.0, 0.0, 0.0);
    let b = Vector3f64::new(0.0, 1.0, 0.0);

    let c = a.cross_product(&b);

    assert_eq!(c, Vector3f64::new(0.0, 0.0, 1.0));
    assert_eq!(a.dot_product(&b), 0.0);
    assert_eq!((a + b - a).norm2(), 1.0);
    assert_eq!((2.0 * a).x, 2.0);
}

#[test]
fn test_vector3i32_rotation() {
    // fourfold rotation about z
    let rot = [[0, -1, 0], [1, 0, 0], [0, 0, 1]];

    let m = Vector3i32::new(1, 2, 3);

    assert_eq!(m.rotate(&rot), Vector3i32::new(-2, 1, 3));
    assert_eq!(m.to_array(), [1, 2, 3]);
    assert_eq!(-m, Vector3i32::new(-1, -2, -3));
}
