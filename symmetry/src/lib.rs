use crystal::Crystal;
use gvector::GVector;
use num_traits::identities::Zero;
use pwdensity::PWDensity;
use types::c64;
use vector3::Vector3i32;

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use thiserror::Error;

/// Positions are compared modulo lattice translations with this tolerance.
pub const SYMPREC: f64 = 1.0E-6;

#[derive(Debug, Error)]
pub enum SymmetryError {
    #[error("cannot read symmetry operations from {path}: {source}")]
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

    #[error("no symmetry operations given")]
    Empty,

    #[error("operation {0} is not a proper or improper rotation (det = {1})")]
    NotUnimodular(usize, i32),

    #[error("operation {isym} maps atom {iat} onto no atom of the same specie")]
    NotASymmetry { isym: usize, iat: usize },
}

/// Space-group operations {R|t} in crystal coordinates, r' = R r + t.
pub trait SymmetryDriver: Send + Sync {
    fn get_n_sym_ops(&self) -> usize;
    fn get_rotation(&self, isym: usize) -> &[[i32; 3]; 3];
    fn get_translation(&self, isym: usize) -> &[f64; 3];

    fn operation_on_vector(&self, isym: usize, v: &mut [f64; 3]) {
        *v = apply_operation(self.get_rotation(isym), self.get_translation(isym), *v);
    }

    fn display(&self) {
        log::info!("   {:-^88}", " symmetry ");
        log::info!("");
        log::info!("{:12} {:^6} {}", "", "nsym =", self.get_n_sym_ops());

        for isym in 0..self.get_n_sym_ops() {
            log::debug!(
                "{:12} op {:3}  R = {:?}  t = {:?}",
                "",
                isym + 1,
                self.get_rotation(isym),
                self.get_translation(isym)
            );
        }

        log::info!("");
    }
}

#[derive(Clone, Debug)]
pub struct SymmetryOps {
    rotations: Vec<[[i32; 3]; 3]>,
    translations: Vec<[f64; 3]>,
}

impl SymmetryOps {
    /// Only the identity; symmetrization is then a no-op.
    pub fn identity() -> SymmetryOps {
        SymmetryOps {
            rotations: vec![[[1, 0, 0], [0, 1, 0], [0, 0, 1]]],
            translations: vec![[0.0; 3]],
        }
    }

    pub fn new(rotations: Vec<[[i32; 3]; 3]>, translations: Vec<[f64; 3]>) -> Result<SymmetryOps, SymmetryError> {
        if rotations.is_empty() || rotations.len() != translations.len() {
            return Err(SymmetryError::Empty);
        }

        for (isym, r) in rotations.iter().enumerate() {
            let det = determinant(r);

            if det.abs() != 1 {
                return Err(SymmetryError::NotUnimodular(isym, det));
            }
        }

        let translations = translations
            .iter()
            .map(|t| [wrap_unit(t[0]), wrap_unit(t[1]), wrap_unit(t[2])])
            .collect();

        Ok(SymmetryOps {
            rotations,
            translations,
        })
    }

    /// One operation per line: the nine integers of R row by row, then t1 t2 t3.
    /// Blank lines and text after '#' are ignored.
    pub fn from_file(path: &Path) -> Result<SymmetryOps, SymmetryError> {
        let file = File::open(path).map_err(|source| SymmetryError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut rotations = Vec::new();
        let mut translations = Vec::new();

        for (iline, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| SymmetryError::Io {
                path: path.to_path_buf(),
                source,
            })?;

            let content = line.split('#').next().unwrap_or("").trim();

            if content.is_empty() {
                continue;
            }

            let parse_error = |msg: &str| SymmetryError::Parse {
                path: path.to_path_buf(),
                line: iline + 1,
                msg: msg.to_string(),
            };

            let tokens: Vec<&str> = content.split_whitespace().collect();

            if tokens.len() != 12 {
                return Err(parse_error("expected 9 integers and 3 reals"));
            }

            let mut r = [[0i32; 3]; 3];

            for i in 0..3 {
                for j in 0..3 {
                    r[i][j] = tokens[3 * i + j]
                        .parse()
                        .map_err(|_| parse_error("rotation entries must be integers"))?;
                }
            }

            let mut t = [0.0; 3];

            for (d, tok) in t.iter_mut().zip(tokens[9..].iter()) {
                *d = tok.parse().map_err(|_| parse_error("invalid translation"))?;
            }

            rotations.push(r);
            translations.push(t);
        }

        SymmetryOps::new(rotations, translations)
    }

    /// For every atom and operation the index of the image atom.
    pub fn get_sym_atom(&self, crystal: &Crystal) -> Result<Vec<Vec<usize>>, SymmetryError> {
        let positions = crystal.get_atom_positions();
        let species = crystal.get_atom_species();

        let mut sym_atom = Vec::with_capacity(positions.len());

        for (iat, pos) in positions.iter().enumerate() {
            let mut images = Vec::with_capacity(self.get_n_sym_ops());

            for isym in 0..self.get_n_sym_ops() {
                let mapped = apply_operation(&self.rotations[isym], &self.translations[isym], pos.to_array());

                let jat = positions
                    .iter()
                    .zip(species.iter())
                    .position(|(target, sp)| {
                        *sp == species[iat]
                            && (0..3).all(|d| wrap_centered(mapped[d] - target.to_array()[d]).abs() < SYMPREC)
                    })
                    .ok_or(SymmetryError::NotASymmetry { isym, iat })?;

                images.push(jat);
            }

            sym_atom.push(images);
        }

        Ok(sym_atom)
    }
}

impl SymmetryDriver for SymmetryOps {
    fn get_n_sym_ops(&self) -> usize {
        self.rotations.len()
    }

    fn get_rotation(&self, isym: usize) -> &[[i32; 3]; 3] {
        &self.rotations[isym]
    }

    fn get_translation(&self, isym: usize) -> &[f64; 3] {
        &self.translations[isym]
    }
}

/// Averages rho(G) over the group.
///
/// rho(Rr + t) = rho(r) gives rho(R^T m) = rho(m) exp(i2pi m.t) for the Miller index m,
/// so every coefficient is replaced by the mean over its star. Images that fall
/// outside the density sphere are dropped and counted in the return value.
pub fn symmetrize_rhog(
    sym: &dyn SymmetryDriver,
    gvec: &GVector,
    pwden: &PWDensity,
    rhog: &mut [c64],
) -> usize {
    let nsym = sym.get_n_sym_ops();

    if nsym <= 1 {
        return 0;
    }

    let miller = gvec.get_miller();

    let mut rhog_sym = vec![c64::zero(); rhog.len()];
    let mut n_dropped = 0;

    for (i, &ig) in pwden.get_gindex().iter().enumerate() {
        let m = miller[ig];

        for isym in 0..nsym {
            let r = sym.get_rotation(isym);
            let t = sym.get_translation(isym);

            let mt = Vector3i32::new(
                r[0][0] * m.x + r[1][0] * m.y + r[2][0] * m.z,
                r[0][1] * m.x + r[1][1] * m.y + r[2][1] * m.z,
                r[0][2] * m.x + r[1][2] * m.y + r[2][2] * m.z,
            );

            match pwden.find_miller(mt) {
                Some(j) => {
                    let arg = dwconsts::TWOPI * (m.x as f64 * t[0] + m.y as f64 * t[1] + m.z as f64 * t[2]);

                    rhog_sym[j] += rhog[i] * c64::new(arg.cos(), arg.sin());
                }

                None => n_dropped += 1,
            }
        }
    }

    let fact = 1.0 / nsym as f64;

    for (x, y) in rhog.iter_mut().zip(rhog_sym.iter()) {
        *x = *y * fact;
    }

    n_dropped
}

fn determinant(r: &[[i32; 3]; 3]) -> i32 {
    r[0][0] * (r[1][1] * r[2][2] - r[1][2] * r[2][1]) - r[0][1] * (r[1][0] * r[2][2] - r[1][2] * r[2][0])
        + r[0][2] * (r[1][0] * r[2][1] - r[1][1] * r[2][0])
}

fn apply_operation(rotation: &[[i32; 3]; 3], translation: &[f64; 3], v: [f64; 3]) -> [f64; 3] {
    let mut out = [0.0; 3];

    for i in 0..3 {
        out[i] = rotation[i][0] as f64 * v[0] + rotation[i][1] as f64 * v[1] + rotation[i][2] as f64 * v[2]
            + translation[i];
    }

    out
}

// [0, 1)
fn wrap_unit(x: f64) -> f64 {
    let w = x - x.floor();

    if (1.0 - w).abs() < 1.0E-12 {
        0.0
    } else {
        w
    }
}

// [-0.5, 0.5)
fn wrap_centered(x: f64) -> f64 {
    x - x.round()
}
