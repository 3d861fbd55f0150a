use crate::Vector3;

pub type Vector3i32 = Vector3<i32>;

use std::fmt;
use std::ops::{Add, Neg};

impl Vector3i32 {
    /// Applies an integer rotation given in row-major order, `rot[i][j]`.
    pub fn rotate(&self, rot: &[[i32; 3]; 3]) -> Vector3i32 {
        Vector3i32 {
            x: rot[0][0] * self.x + rot[0][1] * self.y + rot[0][2] * self.z,
            y: rot[1][0] * self.x + rot[1][1] * self.y + rot[1][2] * self.z,
            z: rot[2][0] * self.x + rot[2][1] * self.y + rot[2][2] * self.z,
        }
    }
}

impl Add<Vector3i32> for Vector3i32 {
    type Output = Vector3i32;

    fn add(self, rhs: Vector3i32) -> Vector3i32 {
        Vector3i32 {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
            z: self.z + rhs.z,
        }
    }
}

impl Neg for Vector3i32 {
    type Output = Vector3i32;

    fn neg(self) -> Vector3i32 {
        Vector3i32 {
            x: -self.x,
            y: -self.y,
            z: -self.z,
        }
    }
}

impl fmt::Display for Vector3i32 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} {}", self.x, self.y, self.z)
    }
}
