mod list;
pub use list::*;

mod mesh;
pub use mesh::*;

use lattice::Lattice;
use vector3::Vector3f64;

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use thiserror::Error;

/// Tolerance on |sum(w) - 1| accepted at construction.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1.0E-8;

#[derive(Debug, Error)]
pub enum KptsError {
    #[error("k-point set is empty")]
    Empty,

    #[error("k-point {0} has non-positive weight {1}")]
    NonPositiveWeight(usize, f64),

    #[error("k-point weights sum to {0}, expected 1")]
    WeightsNotNormalized(f64),

    #[error("invalid k-point mesh {0:?}")]
    InvalidMesh([usize; 3]),

    #[error("unsupported k-point scheme '{0}'")]
    UnknownScheme(String),

    #[error("cannot read k-points from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: line {line}: {msg}")]
    Parse {
        path: PathBuf,
        line: usize,
        msg: String,
    },
}

// K-point provider interface.
//
// Implementations expose a unified view of:
// - fractional coordinates
// - integration weights, normalized to one
pub trait KPTS: Send + Sync {
    fn get_k_frac(&self, k_index: usize) -> Vector3f64;
    fn get_k_weight(&self, k_index: usize) -> f64;
    fn get_n_kpts(&self) -> usize;

    // k_cart = k1*b1 + k2*b2 + k3*b3
    fn frac_to_cart(&self, k_frac: &Vector3f64, blatt: &Lattice) -> Vector3f64 {
        blatt.frac_to_cart(k_frac)
    }

    fn display(&self) {
        log::info!("   {:-^88}", " k-points (fractional) ");
        log::info!("");
        log::info!("{:12} {:^6} {}", "", "nkpt =", self.get_n_kpts());
        log::info!("");

        log::info!(
            "{:12} {:^6} {:^16} {:^16} {:^16} {:^12}",
            "",
            "index",
            "k1",
            "k2",
            "k3",
            "weight"
        );

        for ik in 0..self.get_n_kpts() {
            let xk_frac = self.get_k_frac(ik);

            log::info!(
                "{:12} {:^6} {:16.12} {:16.12} {:16.12} {:12.8}",
                "",
                ik + 1,
                xk_frac.x,
                xk_frac.y,
                xk_frac.z,
                self.get_k_weight(ik)
            );
        }

        log::info!("");
    }
}

// Factory for k-point generation modes.
pub fn new(scheme: &str, kfile: &Path) -> Result<Box<dyn KPTS>, KptsError> {
    match scheme {
        "kmesh" => Ok(Box::new(KptsMesh::from_file(kfile)?)),
        "klist" => Ok(Box::new(KptsList::from_file(kfile)?)),
        other => Err(KptsError::UnknownScheme(other.to_string())),
    }
}

/// Weights must be positive and sum to one.
pub fn check_weights(k_weight: &[f64]) -> Result<(), KptsError> {
    if k_weight.is_empty() {
        return Err(KptsError::Empty);
    }

    if let Some((ik, w)) = k_weight.iter().enumerate().find(|(_, w)| **w <= 0.0) {
        return Err(KptsError::NonPositiveWeight(ik, *w));
    }

    let sum: f64 = k_weight.iter().sum();

    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(KptsError::WeightsNotNormalized(sum));
    }

    Ok(())
}

// Lightweight line reader used by k-point input parsers.
fn read_file_data_to_vec(kfile: &Path) -> Result<Vec<String>, KptsError> {
    let file = File::open(kfile).map_err(|source| KptsError::Io {
        path: kfile.to_path_buf(),
        source,
    })?;

    BufReader::new(file)
        .lines()
        .map(|l| {
            l.map_err(|source| KptsError::Io {
                path: kfile.to_path_buf(),
                source,
            })
        })
        .collect()
}

fn parse_numbers<T: std::str::FromStr>(
    kfile: &Path,
    iline: usize,
    line: &str,
    n: usize,
) -> Result<Vec<T>, KptsError> {
    let err = || KptsError::Parse {
        path: kfile.to_path_buf(),
        line: iline + 1,
        msg: format!("expected {} numbers, found '{}'", n, line),
    };

    let v: Vec<T> = line
        .split_whitespace()
        .map(|t| t.parse::<T>().map_err(|_| err()))
        .collect::<Result<_, _>>()?;

    if v.len() != n {
        return Err(err());
    }

    Ok(v)
}
