use vector3::*;

use std::path::Path;

use crate::{check_weights, parse_numbers, read_file_data_to_vec, KptsError, KPTS};

/// Explicit list of k-points with weights.
#[derive(Debug, Clone)]
pub struct KptsList {
    k_frac: Vec<Vector3f64>,
    k_weight: Vec<f64>,
}

impl KptsList {
    pub fn new(k_frac: Vec<Vector3f64>, k_weight: Vec<f64>) -> Result<KptsList, KptsError> {
        if k_frac.len() != k_weight.len() {
            return Err(KptsError::Empty);
        }

        check_weights(&k_weight)?;

        Ok(KptsList { k_frac, k_weight })
    }

    /// Reads in.kpts:
    ///
    /// line 1: nkpt
    /// next nkpt lines: k1 k2 k3 w (fractional, arbitrary weight scale)
    ///
    /// The weights are rescaled to sum to one.
    pub fn from_file(kfile: &Path) -> Result<KptsList, KptsError> {
        let lines = read_file_data_to_vec(kfile)?;

        let lines: Vec<(usize, &String)> = lines
            .iter()
            .enumerate()
            .filter(|(_, l)| !l.trim().is_empty())
            .collect();

        let (il, first) = lines.first().ok_or(KptsError::Empty)?;
        let nk = parse_numbers::<usize>(kfile, *il, first, 1)?[0];

        if lines.len() < nk + 1 {
            return Err(KptsError::Parse {
                path: kfile.to_path_buf(),
                line: lines.len(),
                msg: format!("expected {} k-points", nk),
            });
        }

        let mut k_frac = Vec::with_capacity(nk);
        let mut k_weight = Vec::with_capacity(nk);

        for (il, line) in lines[1..nk + 1].iter() {
            let v = parse_numbers::<f64>(kfile, *il, line, 4)?;

            k_frac.push(Vector3f64::new(v[0], v[1], v[2]));
            k_weight.push(v[3]);
        }

        let wsum: f64 = k_weight.iter().sum();

        if wsum > 0.0 {
            k_weight.iter_mut().for_each(|w| *w /= wsum);
        }

        KptsList::new(k_frac, k_weight)
    }
}

impl KPTS for KptsList {
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
