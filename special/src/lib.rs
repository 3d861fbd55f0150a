use std::f64::consts;
use vector3::*;

pub fn erf(x: f64) -> f64 {
    libm::erf(x)
}

pub fn erfc(x: f64) -> f64 {
    libm::erfc(x)
}

/// Real spherical harmonics Y_lm(v/|v|) for l <= 3.
///
/// m < 0 are the sine-like combinations, m > 0 the cosine-like ones.
/// Returns `None` for (l, m) outside the table.
pub fn real_spherical_harmonics(l: usize, lm: i32, v: Vector3f64) -> Option<f64> {
    let x = v.x;
    let y = v.y;
    let z = v.z;

    let mut rnorm = v.norm2();

    // the direction of the zero vector is arbitrary, only l = 0 survives there
    if rnorm < dwconsts::EPS16 {
        if l == 0 && lm == 0 {
            return Some(0.5 / (consts::PI).sqrt());
        }

        rnorm = 1.0;
    }

    let ylm = match (l, lm) {
        (0, 0) => 0.5 / (consts::PI).sqrt(),

        (1, -1) => -1.0 * (3.0 / 4.0 / consts::PI).sqrt() * y / rnorm,

        (1, 0) => (3.0 / 4.0 / consts::PI).sqrt() * z / rnorm,

        (1, 1) => -1.0 * (3.0 / 4.0 / consts::PI).sqrt() * x / rnorm,

        (2, -2) => 1.0 / 2.0 * (15.0 / consts::PI).sqrt() * x * y / rnorm / rnorm,

        (2, -1) => 1.0 / 2.0 * (15.0 / consts::PI).sqrt() * y * z / rnorm / rnorm,

        (2, 0) => {
            1.0 / 4.0 * (5.0 / consts::PI).sqrt() * (-x * x - y * y + 2.0 * z * z) / rnorm / rnorm
        }

        (2, 1) => 1.0 / 2.0 * (15.0 / consts::PI).sqrt() * z * x / (rnorm * rnorm),

        (2, 2) => 1.0 / 4.0 * (15.0 / consts::PI).sqrt() * (x * x - y * y) / (rnorm * rnorm),

        (3, -3) => {
            -1.0 / 4.0 * (35.0 / 2.0 / consts::PI).sqrt() * (3.0 * x * x - y * y) * y
                / (rnorm * rnorm * rnorm)
        }

        (3, -2) => 1.0 / 2.0 * (105.0 / consts::PI).sqrt() * x * y * z / (rnorm * rnorm * rnorm),

        (3, -1) => {
            -1.0 / 4.0 * (21.0 / 2.0 / consts::PI).sqrt() * y * (4.0 * z * z - x * x - y * y)
                / (rnorm * rnorm * rnorm)
        }

        (3, 0) => {
            1.0 / 4.0 * (7.0 / consts::PI).sqrt() * z * (2.0 * z * z - 3.0 * x * x - 3.0 * y * y)
                / (rnorm * rnorm * rnorm)
        }

        (3, 1) => {
            -1.0 / 4.0 * (21.0 / 2.0 / consts::PI).sqrt() * x * (4.0 * z * z - x * x - y * y)
                / (rnorm * rnorm * rnorm)
        }

        (3, 2) => {
            1.0 / 4.0 * (105.0 / consts::PI).sqrt() * (x * x - y * y) * z / rnorm / rnorm / rnorm
        }

        (3, 3) => {
            -1.0 / 4.0 * (35.0 / 2.0 / consts::PI).sqrt() * (x * x - 3.0 * y * y) * x
                / rnorm
                / rnorm
                / rnorm
        }

        _ => return None,
    };

    Some(ylm)
}

pub fn get_quant_num_m(l: usize) -> Vec<i32> {
    (0..2 * l + 1).map(|im| im as i32 - l as i32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_real_spherical_harmonics_addition_theorem() {
        // sum_m Y_lm(v)^2 = (2l+1) / 4pi for every direction

        let v = Vector3f64::new(0.3, -1.1, 0.7);

        for l in 0..4 {
            let s: f64 = get_quant_num_m(l)
                .iter()
                .map(|&m| real_spherical_harmonics(l, m, v).unwrap_or(0.0).powi(2))
                .sum();

            assert_relative_eq!(s, (2 * l + 1) as f64 / 4.0 / consts::PI, epsilon = 1E-12);
        }
    }

    #[test]
    fn test_real_spherical_harmonics_out_of_range() {
        assert!(real_spherical_harmonics(4, 0, Vector3f64::new(0.0, 0.0, 1.0)).is_none());
        assert!(real_spherical_harmonics(1, 2, Vector3f64::new(0.0, 0.0, 1.0)).is_none());
    }

    #[test]
    fn test_erfc_complements_erf() {
        for &x in [0.0, 0.3, 1.7, 4.2].iter() {
            assert_relative_eq!(erf(x) + erfc(x), 1.0, epsilon = 1E-14);
        }
    }
}
