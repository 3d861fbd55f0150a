use kscf::SolverContext;
use matrix::Matrix;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use types::c64;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("cannot access state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed state file {path}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("saved state does not fit this run: {0}")]
    Mismatch(String),
}

// complex numbers are stored as [re, im]

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SerializableBlock {
    ik: usize,
    npw: usize,
    nband: usize,
    evals: Vec<f64>,
    /// column by column
    evecs: Vec<[f64; 2]>,
}

/// Converged density and wavefunctions, keyed by k-point index, for a warm start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SCFState {
    nelec: f64,
    rhog: Vec<[f64; 2]>,
    kpoints: Vec<SerializableBlock>,
}

impl SCFState {
    pub fn new(nelec: f64, rhog: &[c64], ctx: &SolverContext) -> SCFState {
        let kpoints = ctx
            .get_states()
            .iter()
            .enumerate()
            .map(|(ik, state)| {
                let npw = state.evecs.nrow();
                let nband = state.evecs.ncol();

                let mut evecs = Vec::with_capacity(npw * nband);

                for ib in 0..nband {
                    evecs.extend(state.evecs.get_col(ib).iter().map(|c| [c.re, c.im]));
                }

                SerializableBlock {
                    ik,
                    npw,
                    nband,
                    evals: state.evals.clone(),
                    evecs,
                }
            })
            .collect();

        SCFState {
            nelec,
            rhog: rhog.iter().map(|c| [c.re, c.im]).collect(),
            kpoints,
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), StateError> {
        let json = serde_json::to_string(self).map_err(|source| StateError::Format {
            path: path.to_path_buf(),
            source,
        })?;

        fs::write(path, json).map_err(|source| StateError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        log::info!("   scf state saved to {}", path.display());

        Ok(())
    }

    pub fn load(path: &Path) -> Result<SCFState, StateError> {
        let content = fs::read_to_string(path).map_err(|source| StateError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let state: SCFState = serde_json::from_str(&content).map_err(|source| StateError::Format {
            path: path.to_path_buf(),
            source,
        })?;

        for (ik, block) in state.kpoints.iter().enumerate() {
            if block.ik != ik || block.evecs.len() != block.npw * block.nband || block.evals.len() != block.nband {
                return Err(StateError::Mismatch(format!("k-point block {} is inconsistent", ik + 1)));
            }
        }

        Ok(state)
    }

    pub fn get_nelec(&self) -> f64 {
        self.nelec
    }

    pub fn get_n_kpoints(&self) -> usize {
        self.kpoints.len()
    }

    pub fn get_n_plane_waves_rho(&self) -> usize {
        self.rhog.len()
    }

    /// rho(G) and the (evecs, evals) block of every k-point.
    pub fn into_parts(self) -> (Vec<c64>, Vec<(Matrix<c64>, Vec<f64>)>) {
        let rhog = self.rhog.iter().map(|x| c64::new(x[0], x[1])).collect();

        let blocks = self
            .kpoints
            .into_iter()
            .map(|block| {
                let data: Vec<c64> = block.evecs.iter().map(|x| c64::new(x[0], x[1])).collect();

                (Matrix::from_column_slice(block.npw, block.nband, &data), block.evals)
            })
            .collect();

        (rhog, blocks)
    }
}
