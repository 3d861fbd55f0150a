use dwconsts::*;
use itertools::Itertools;
use lattice::Lattice;
use pspot::{PSPot, PspError};
use vector3::*;

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrystalError {
    #[error("cannot read crystal structure {path}: {source}")]
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

    #[error("crystal structure has no atoms")]
    NoAtoms,
}

// Crystal structure container.
//
// Coordinates:
// - lattice vectors stored in Bohr
// - atomic positions stored in fractional coordinates
// - helper conversions provide Cartesian views when needed
#[derive(Debug, Default, Clone)]
pub struct Crystal {
    latt: Lattice,
    atom_positions: Vec<Vector3f64>,
    atom_species: Vec<String>,
    atom_indices_by_specie: Vec<Vec<usize>>,
}

impl Crystal {
    pub fn new(
        latt: Lattice,
        atom_species: Vec<String>,
        atom_positions: Vec<Vector3f64>,
    ) -> Result<Crystal, CrystalError> {
        if atom_positions.is_empty() || atom_species.len() != atom_positions.len() {
            return Err(CrystalError::NoAtoms);
        }

        let mut crystal = Crystal {
            latt,
            atom_positions,
            atom_species,
            atom_indices_by_specie: Vec::new(),
        };

        // Build specie -> atom-index lookup for grouped operations.

        let unique_species = crystal.get_unique_species();

        crystal.atom_indices_by_specie = unique_species
            .iter()
            .map(|sp| {
                crystal
                    .atom_species
                    .iter()
                    .enumerate()
                    .filter(|(_, at)| *at == sp)
                    .map(|(i, _)| i)
                    .collect()
            })
            .collect();

        Ok(crystal)
    }

    /// Parses in.crystal:
    ///
    /// line 1: scale_a scale_b scale_c (Angstrom)
    /// line 2-4: lattice vectors in units of the scales
    /// remaining lines: specie x y z (fractional atomic positions)
    pub fn from_file(inpfile: &Path) -> Result<Crystal, CrystalError> {
        let file = File::open(inpfile).map_err(|source| CrystalError::Io {
            path: inpfile.to_path_buf(),
            source,
        })?;

        let parse_error = |line: usize, msg: String| CrystalError::Parse {
            path: inpfile.to_path_buf(),
            line,
            msg,
        };

        let mut scale = [1.0; 3];
        let mut vecs = [[0.0; 3]; 3];

        let mut atom_species = Vec::new();
        let mut atom_positions = Vec::new();

        for (i, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| CrystalError::Io {
                path: inpfile.to_path_buf(),
                source,
            })?;

            let s: Vec<&str> = line.split_whitespace().collect();

            let numbers = |toks: &[&str]| -> Result<Vec<f64>, CrystalError> {
                toks.iter()
                    .map(|t| {
                        t.parse::<f64>()
                            .map_err(|_| parse_error(i + 1, format!("'{}' is not a number", t)))
                    })
                    .collect()
            };

            match i {
                0 => {
                    // Independent scale factors for three lattice vectors.
                    let v = numbers(&s)?;

                    if v.len() != 3 {
                        return Err(parse_error(i + 1, "expected three scale factors".into()));
                    }

                    scale.copy_from_slice(&v);
                }

                1..=3 => {
                    let v = numbers(&s)?;

                    if v.len() != 3 {
                        return Err(parse_error(i + 1, "expected three components".into()));
                    }

                    for iv in 0..3 {
                        vecs[i - 1][iv] = v[iv] * scale[i - 1] * ANG_TO_BOHR;
                    }
                }

                // atoms
                _ => {
                    if s.is_empty() {
                        continue;
                    }

                    if s.len() != 4 {
                        return Err(parse_error(i + 1, "expected 'specie x y z'".into()));
                    }

                    let v = numbers(&s[1..])?;

                    // Atomic position remains fractional.
                    atom_species.push(s[0].to_string());
                    atom_positions.push(Vector3f64::new(v[0], v[1], v[2]));
                }
            }
        }

        let latt = Lattice::new(&vecs[0], &vecs[1], &vecs[2]);

        Crystal::new(latt, atom_species, atom_positions)
    }

    pub fn get_n_total_electrons(&self, pots: &PSPot) -> Result<f64, PspError> {
        // Sum valence electrons by species multiplicity.
        let mut sum = 0.0;

        for (isp, sp) in self.get_unique_species().iter().enumerate() {
            let natom_for_this_specie = self.atom_indices_by_specie[isp].len();

            let zion = pots.get_psp(sp)?.get_zion();

            sum += zion * natom_for_this_specie as f64;
        }

        Ok(sum)
    }

    pub fn get_zions(&self, pots: &PSPot) -> Result<Vec<f64>, PspError> {
        // Per-atom ionic charges aligned with atom ordering.
        let mut zions = vec![0.0; self.get_n_atoms()];

        for (isp, sp) in self.get_unique_species().iter().enumerate() {
            let zion = pots.get_psp(sp)?.get_zion();

            for idx in self.atom_indices_by_specie[isp].iter() {
                zions[*idx] = zion;
            }
        }

        Ok(zions)
    }

    pub fn get_atom_indices_of_specie(&self, isp: usize) -> &[usize] {
        &self.atom_indices_by_specie[isp]
    }

    pub fn get_latt(&self) -> &Lattice {
        &self.latt
    }

    pub fn get_unique_species(&self) -> Vec<String> {
        // Preserve first-occurrence order while removing duplicates.
        self.atom_species.iter().cloned().unique().collect()
    }

    pub fn get_n_unique_species(&self) -> usize {
        self.atom_species.iter().unique().count()
    }

    pub fn get_atom_positions_of_specie(&self, isp: usize) -> Vec<Vector3f64> {
        self.get_atom_indices_of_specie(isp)
            .iter()
            .map(|&idx| self.atom_positions[idx])
            .collect()
    }

    pub fn get_n_atoms(&self) -> usize {
        self.atom_positions.len()
    }

    pub fn get_atom_positions(&self) -> &[Vector3f64] {
        &self.atom_positions
    }

    pub fn get_atom_positions_cart(&self) -> Vec<Vector3f64> {
        self.atom_positions
            .iter()
            .map(|p| self.latt.frac_to_cart(p))
            .collect()
    }

    pub fn get_atom_species(&self) -> &[String] {
        &self.atom_species
    }

    pub fn display(&self) {
        log::info!("   {:-^88}", " crystal structure ");
        log::info!("");

        log::info!("   lattice_vectors (A)");
        log::info!("");

        let names = ["a", "b", "c"];
        let vecs = [
            self.latt.get_vector_a(),
            self.latt.get_vector_b(),
            self.latt.get_vector_c(),
        ];

        for (name, v) in names.iter().zip(vecs.iter()) {
            log::info!(
                "   {} = {:20.12}  {:20.12}  {:20.12}",
                name,
                v.x * BOHR_TO_ANG,
                v.y * BOHR_TO_ANG,
                v.z * BOHR_TO_ANG
            );
        }

        log::info!("");
        log::info!("   natoms = {}", self.get_n_atoms());
        log::info!("   atom_positions\n");
        log::info!("                fractional                                                cartesian (A)");
        log::info!("");

        for (i, (atom, pos_c)) in self
            .atom_positions
            .iter()
            .zip(self.get_atom_positions_cart().iter())
            .enumerate()
        {
            log::info!(
                "   {:<3} {:>4} : {:16.12}  {:16.12}  {:16.12}  {:20.12}  {:20.12}  {:20.12}",
                i + 1,
                self.atom_species[i],
                atom.x,
                atom.y,
                atom.z,
                pos_c.x * BOHR_TO_ANG,
                pos_c.y * BOHR_TO_ANG,
                pos_c.z * BOHR_TO_ANG
            );
        }

        log::info!("");
    }
}
