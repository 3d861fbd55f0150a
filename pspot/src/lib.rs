mod gth;
pub use gth::GTH;

use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PspError {
    #[error("cannot read pseudopotential input {path}: {source}")]
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

    #[error("no pseudopotential for specie '{0}'")]
    MissingSpecie(String),

    #[error("unsupported projector channel l = {l}, i = {i}")]
    UnsupportedProjector { l: usize, i: usize },
}

/// Pseudopotential of one atomic specie, expressed directly in reciprocal space.
///
/// q is |k+G| or |G| in 1/bohr; energies are in Hartree.
pub trait AtomPSP: Send + Sync {
    fn get_symbol(&self) -> &str;

    fn get_zion(&self) -> f64;

    fn get_lmax(&self) -> usize;

    /// Number of radial projectors, each of which carries 2l+1 angular components.
    fn get_nbeta(&self) -> usize;

    fn get_lbeta(&self, ibeta: usize) -> usize;

    /// beta_i(q) = 4pi int r^2 j_l(qr) p_i(r) dr, without the 1/sqrt(volume) factor.
    fn get_beta_q(&self, ibeta: usize, q: f64) -> f64;

    /// Coupling matrix between projectors, zero unless both share the same l.
    fn get_dij(&self, ibeta: usize, jbeta: usize) -> f64;

    /// volume * V_loc(q) for q > 0. At q = 0 the Coulomb divergence is dropped
    /// and the finite remainder is returned.
    fn get_vloc_q(&self, q: f64) -> f64;

    /// Fourier transform of the isolated-atom valence density, equal to zion at q = 0.
    fn get_rho_atom_q(&self, q: f64) -> f64;
}

/// All pseudopotentials of a calculation, keyed by specie symbol.
#[derive(Default)]
pub struct PSPot {
    pots: BTreeMap<String, Box<dyn AtomPSP>>,
    atpsp_file: BTreeMap<String, String>,
}

impl PSPot {
    /// Reads `inpfile` with lines of `specie  file`, the file names being relative to `potdir`.
    pub fn new(inpfile: &Path, potdir: &Path) -> Result<PSPot, PspError> {
        let pspfiles = get_psp_files(inpfile)?;

        let mut pspot = PSPot::default();

        for (sp, spfile) in pspfiles.iter() {
            let path = potdir.join(spfile);

            let psp_one = GTH::from_file(&path)?;

            pspot.atpsp_file.insert(sp.clone(), path.display().to_string());
            pspot.pots.insert(sp.clone(), Box::new(psp_one));
        }

        Ok(pspot)
    }

    pub fn from_pots(pots: Vec<(String, Box<dyn AtomPSP>)>) -> PSPot {
        let mut pspot = PSPot::default();

        for (sp, psp) in pots.into_iter() {
            pspot.atpsp_file.insert(sp.clone(), psp.get_symbol().to_string());
            pspot.pots.insert(sp, psp);
        }

        pspot
    }

    pub fn get_psp(&self, sp: &str) -> Result<&dyn AtomPSP, PspError> {
        self.pots
            .get(sp)
            .map(|p| p.as_ref())
            .ok_or_else(|| PspError::MissingSpecie(sp.to_string()))
    }

    pub fn get_max_lmax(&self) -> usize {
        self.pots.values().map(|p| p.get_lmax()).max().unwrap_or(0)
    }

    pub fn display(&self) {
        for (sp, file) in self.atpsp_file.iter() {
            log::info!("   {} : {}", sp, file);
        }
    }
}

pub fn get_psp_files(inpfile: &Path) -> Result<Vec<(String, String)>, PspError> {
    let file = File::open(inpfile).map_err(|source| PspError::Io {
        path: inpfile.to_path_buf(),
        source,
    })?;

    let mut pspmap = Vec::new();

    for (iline, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|source| PspError::Io {
            path: inpfile.to_path_buf(),
            source,
        })?;

        let s: Vec<&str> = line.split_whitespace().collect();

        match s.len() {
            0 => continue,
            2 => pspmap.push((s[0].to_string(), s[1].to_string())),
            _ => {
                return Err(PspError::Parse {
                    path: inpfile.to_path_buf(),
                    line: iline + 1,
                    msg: format!("expected 'specie file', found '{}'", line),
                })
            }
        }
    }

    Ok(pspmap)
}
