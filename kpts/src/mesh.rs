use vector3::*;

use std::path::Path;

use crate::{check_weights, parse_numbers, read_file_data_to_vec, KptsError, KPTS};

/// Monkhorst-Pack mesh, optionally folded by time reversal k ~ -k.
#[derive(Debug, Clone)]
pub struct KptsMesh {
    k_frac: Vec<Vector3f64>,
    k_weight: Vec<f64>,
    k_mesh: [usize; 3],
}

impl KptsMesh {
    /// `is_shift[i]` = 1 shifts the mesh by half a step along b_i.
    pub fn new(k_mesh: [usize; 3], is_shift: [usize; 3], time_reversal: bool) -> Result<KptsMesh, KptsError> {
        if k_mesh.iter().any(|&n| n == 0) || is_shift.iter().any(|&s| s > 1) {
            return Err(KptsError::InvalidMesh(k_mesh));
        }

        let [nk1, nk2, nk3] = k_mesh;

        let coord = |i: usize, n: usize, s: usize| -> f64 {
            let x = (i as f64 + 0.5 * s as f64) / n as f64;
            wrap_centered(x)
        };

        let mut k_frac: Vec<Vector3f64> = Vec::with_capacity(nk1 * nk2 * nk3);
        let mut k_weight: Vec<f64> = Vec::with_capacity(nk1 * nk2 * nk3);

        let w = 1.0 / (nk1 * nk2 * nk3) as f64;

        for i in 0..nk1 {
            for j in 0..nk2 {
                for k in 0..nk3 {
                    let xk = Vector3f64::new(
                        coord(i, nk1, is_shift[0]),
                        coord(j, nk2, is_shift[1]),
                        coord(k, nk3, is_shift[2]),
                    );

                    let partner = if time_reversal {
                        k_frac.iter().position(|&q| is_same_kpoint(q, xk * -1.0))
                    } else {
                        None
                    };

                    match partner {
                        Some(ik) => k_weight[ik] += w,
                        None => {
                            k_frac.push(xk);
                            k_weight.push(w);
                        }
                    }
                }
            }
        }

        // make the sum exact after the folding
        let wsum: f64 = k_weight.iter().sum();
        k_weight.iter_mut().for_each(|w| *w /= wsum);

        check_weights(&k_weight)?;

        Ok(KptsMesh {
            k_frac,
            k_weight,
            k_mesh,
        })
    }

    /// Reads in.kmesh:
    ///
    /// line 1: nk1 nk2 nk3
    /// line 2: shift1 shift2 shift3 (0/1)
    /// line 3 (optional): time_reversal = true/false, defaults to false
    pub fn from_file(kfile: &Path) -> Result<KptsMesh, KptsError> {
        let lines = read_file_data_to_vec(kfile)?;

        if lines.len() < 2 {
            return Err(KptsError::Parse {
                path: kfile.to_path_buf(),
                line: lines.len(),
                msg: "expected mesh and shift lines".to_string(),
            });
        }

        let m = parse_numbers::<usize>(kfile, 0, &lines[0], 3)?;
        let s = parse_numbers::<usize>(kfile, 1, &lines[1], 3)?;

        let time_reversal = match lines.get(2).map(|l| l.trim()) {
            Some("time_reversal = true") | Some("true") => true,
            Some("time_reversal = false") | Some("false") | Some("") | None => false,
            Some(other) => {
                return Err(KptsError::Parse {
                    path: kfile.to_path_buf(),
                    line: 3,
                    msg: format!("unknown option '{}'", other),
                })
            }
        };

        KptsMesh::new([m[0], m[1], m[2]], [s[0], s[1], s[2]], time_reversal)
    }

    pub fn get_k_mesh(&self) -> [usize; 3] {
        self.k_mesh
    }
}

impl KPTS for KptsMesh {
    fn get_k_frac(&self, k_index: usize) -> Vector3f64 {
        self.k_frac[k_index]
    }

    fn get_k_weight(&self, k_index: usize) -> f64 {
        self.k_weight[k_index]
    }

    fn get_n_kpts(&self) -> usize {
        self.k_frac.len()
    }
}

// map into (-0.5, 0.5]
fn wrap_centered(x: f64) -> f64 {
    let mut y = x - x.round();

    if y <= -0.5 + 1.0E-10 {
        y += 1.0;
    }

    y
}

fn is_same_kpoint(a: Vector3f64, b: Vector3f64) -> bool {
    let d = a - b;

    [d.x, d.y, d.z]
        .iter()
        .all(|v| (v - v.round()).abs() < 1.0E-8)
}
