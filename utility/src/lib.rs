use dwconsts::*;
use itertools::multizip;
use matrix::*;
use ndarray::*;
use rand::Rng;
use std::f64::consts;
use types::*;
use vector3::*;

pub fn add_and_zscale(inp: &[c64], out: &mut [c64], factor: c64) {
    assert_eq!(inp.len(), out.len());

    for (x, y) in multizip((inp.iter(), out.iter_mut())) {
        *y += *x * factor;
    }
}

pub fn dot_product_v3i32_v3f64(g: Vector3i32, r: Vector3f64) -> f64 {
    f64::from(g.x) * r.x + f64::from(g.y) * r.y + f64::from(g.z) * r.z
}

/// sum_i conj(u_i) * v_i
pub fn zdot_product(u: &[c64], v: &[c64]) -> c64 {
    assert_eq!(u.len(), v.len());

    multizip((u.iter(), v.iter()))
        .map(|(x, y)| x.conj() * (*y))
        .sum()
}

pub fn zdot_product_metric(u: &[c64], v: &[c64], metric: &[f64]) -> c64 {
    assert_eq!(u.len(), v.len());

    multizip((u.iter(), v.iter(), metric.iter()))
        .map(|(x, y, m)| x.conj() * (*m) * (*y))
        .sum()
}

pub fn l2_norm(v: &[c64]) -> f64 {
    v.iter().map(|x| x.norm_sqr()).sum::<f64>().sqrt()
}

/// Normalizes in place and returns the norm it divided by. A zero vector is left untouched.
pub fn normalize_vector_c64(v: &mut [c64]) -> f64 {
    let s = l2_norm(v);

    if s > EPS30 {
        v.iter_mut().for_each(|x| *x /= s);
    }

    s
}

/// Random complex vector with unit norm. The caller owns the generator so
/// seeded runs stay reproducible.
pub fn make_normalized_rand_vector<R: Rng>(rng: &mut R, v: &mut [c64]) {
    for y in v.iter_mut() {
        let t = rng.gen_range(-0.5f64, 0.5f64);
        let theta = t * 2.0 * consts::PI;

        let re = t * theta.cos();
        let im = t * theta.sin();

        *y = c64 { re, im };
    }

    normalize_vector_c64(v);
}

/// Small dense Hermitian matrix with closed-form entries, used to check eigensolvers.
///
/// Diagonal i + 0.9, couplings decaying with the distance from the diagonal.
pub fn make_matrix(n: usize) -> Matrix<c64> {
    let mut m = Matrix::<c64>::new(n, n);

    for i in 0..n {
        for j in (i + 1)..n {
            let d = (j - i) as f64;

            m[[j, i]] = c64 {
                re: 0.2 / (1.0 + d),
                im: 0.05 / (1.0 + d * d),
            };

            m[[i, j]] = m[[j, i]].conj();
        }
        m[[i, i]] = c64 {
            re: ((i + 1) as f64) * 1.0 - 0.1,
            im: 0.0,
        };
    }

    m
}

pub fn argsort(v: &[f64]) -> Vec<usize> {
    let mut idx = (0..v.len()).collect::<Vec<_>>();

    idx.sort_by(|&i, &j| v[i].total_cmp(&v[j]));

    idx
}

/// N even, 8
///
/// n : 0 1 2 3 4 5 6 7
///
/// i : 0 1 2 3 4 -3 -2 -1
///
/// N Odd, 7
///
/// n : 0 1 2 3 4 5 6
///
/// i : 0 1 2 3 -3 -2 -1
pub fn fft_left_end(n: usize) -> i32 {
    let nn = n as i32;

    if n % 2 == 0 {
        -(nn - 2) / 2
    } else {
        -(nn - 1) / 2
    }
}

pub fn fft_right_end(n: usize) -> i32 {
    let nn = n as i32;

    if n % 2 == 0 {
        nn / 2
    } else {
        (nn - 1) / 2
    }
}

pub fn fft_i2n(i: i32, ntot: usize) -> usize {
    if i < 0 {
        (i + ntot as i32) as usize
    } else {
        i as usize
    }
}

pub fn compute_fft_linear_index_map(
    miller: &[Vector3i32],
    gindex: &[usize],
    fft_shape: [usize; 3],
) -> Vec<usize> {
    let [n1, n2, n3] = fft_shape;

    let mut linear_index = Vec::with_capacity(gindex.len());

    for ig in gindex.iter() {
        let mi = miller[*ig];

        let idx0 = fft_i2n(mi.x, n1);
        let idx1 = fft_i2n(mi.y, n2);
        let idx2 = fft_i2n(mi.z, n3);

        debug_assert!(idx2 < n3);
        linear_index.push(idx0 + idx1 * n1 + idx2 * n1 * n2);
    }

    linear_index
}

pub fn map_3d_to_1d_with_linear_index(linear_index: &[usize], v3d: &Array3<c64>, v1d: &mut [c64]) {
    assert_eq!(linear_index.len(), v1d.len());

    let v3d_slice = v3d.as_slice();
    for (i, &idx) in linear_index.iter().enumerate() {
        v1d[i] = v3d_slice[idx];
    }
}

pub fn map_1d_to_3d_with_linear_index(linear_index: &[usize], v1d: &[c64], v3d: &mut Array3<c64>) {
    assert_eq!(linear_index.len(), v1d.len());
    v3d.set_value(ZERO_C64);

    let v3d_slice = v3d.as_mut_slice();
    for (i, &idx) in linear_index.iter().enumerate() {
        v3d_slice[idx] = v1d[i];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_fft_ends_cover_the_grid() {
        for n in 7..9 {
            let n1 = fft_left_end(n);
            let n2 = fft_right_end(n);

            assert_eq!((n2 - n1 + 1) as usize, n);

            let mut seen: Vec<usize> = (n1..n2 + 1).map(|i| fft_i2n(i, n)).collect();
            seen.sort_unstable();
            assert_eq!(seen, (0..n).collect::<Vec<usize>>());
        }
    }

    #[test]
    fn test_linear_index_roundtrip() {
        let miller = vec![
            Vector3i32::new(0, 0, 0),
            Vector3i32::new(1, -1, 0),
            Vector3i32::new(-2, 0, 1),
        ];
        let gindex = vec![0, 1, 2];

        let idx = compute_fft_linear_index_map(&miller, &gindex, [5, 4, 3]);
        assert_eq!(idx, vec![0, 1 + 3 * 5, 3 + 1 * 20]);

        let v1d = vec![c64::new(1.0, 0.0), c64::new(2.0, 1.0), c64::new(0.0, -3.0)];
        let mut v3d = Array3::<c64>::new([5, 4, 3]);
        map_1d_to_3d_with_linear_index(&idx, &v1d, &mut v3d);

        let mut back = vec![c64::new(0.0, 0.0); 3];
        map_3d_to_1d_with_linear_index(&idx, &v3d, &mut back);

        assert_eq!(back, v1d);
    }

    #[test]
    fn test_seeded_random_vectors_are_reproducible() {
        let mut a = vec![c64::new(0.0, 0.0); 16];
        let mut b = vec![c64::new(0.0, 0.0); 16];

        make_normalized_rand_vector(&mut StdRng::seed_from_u64(7), &mut a);
        make_normalized_rand_vector(&mut StdRng::seed_from_u64(7), &mut b);

        assert_eq!(a, b);
        assert!((l2_norm(&a) - 1.0).abs() < 1E-12);
    }

    #[test]
    fn test_argsort() {
        assert_eq!(argsort(&[3.0, -1.0, 2.0]), vec![1, 2, 0]);
    }
}
