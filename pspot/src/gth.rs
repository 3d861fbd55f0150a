use crate::{AtomPSP, PspError};
use dwconsts::*;

use std::{
    fs,
    path::{Path, PathBuf},
};

/// Separable dual-space Gaussian pseudopotential (Goedecker-Teter-Hutter,
/// Hartwigsen-Goedecker-Hutter) with analytic Fourier transforms.
#[derive(Debug, Clone)]
pub struct GTH {
    symbol: String,
    zion: f64,
    rloc: f64,
    cloc: [f64; 4],
    channels: Vec<GTHChannel>,
    // flattened projector list, (l, i) of each beta
    betas: Vec<(usize, usize)>,
}

#[derive(Debug, Clone)]
struct GTHChannel {
    r: f64,
    h: Vec<Vec<f64>>,
}

impl GTH {
    /// `channels[l]` holds (r_l, h_l) with h_l a full symmetric matrix.
    pub fn new(
        symbol: &str,
        zion: f64,
        rloc: f64,
        cloc: &[f64],
        channels: Vec<(f64, Vec<Vec<f64>>)>,
    ) -> Result<GTH, PspError> {
        let mut c = [0.0; 4];

        for (i, v) in cloc.iter().take(4).enumerate() {
            c[i] = *v;
        }

        let mut betas = Vec::new();

        for (l, (_, h)) in channels.iter().enumerate() {
            for i in 0..h.len() {
                if !projector_supported(l, i) {
                    return Err(PspError::UnsupportedProjector { l, i: i + 1 });
                }

                betas.push((l, i));
            }
        }

        let channels = channels
            .into_iter()
            .map(|(r, h)| GTHChannel { r, h })
            .collect();

        Ok(GTH {
            symbol: symbol.to_string(),
            zion,
            rloc,
            cloc: c,
            channels,
            betas,
        })
    }

    /// Reads the CP2K-style layout:
    ///
    /// ```text
    /// Si GTH-LDA-q4
    ///     2    2
    ///      0.44000000    1    -7.33610297
    ///     2
    ///      0.42273813    2     5.90692831    -1.26189397
    ///                                         3.25819622
    ///      0.48427842    1     2.72701346
    /// ```
    ///
    /// The second line holds the valence electrons per angular momentum.
    /// Each projector block lists the upper triangle of h row by row.
    pub fn from_file(path: &Path) -> Result<GTH, PspError> {
        let text = fs::read_to_string(path).map_err(|source| PspError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let lines: Vec<(usize, Vec<&str>)> = text
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l.split('#').next().unwrap_or("").split_whitespace().collect()))
            .filter(|(_, s): &(usize, Vec<&str>)| !s.is_empty())
            .collect();

        let mut reader = LineReader {
            path: path.to_path_buf(),
            lines: &lines,
            pos: 0,
        };

        let symbol = reader.next_line()?.1[0].to_string();

        // valence electrons

        let (iline, s) = reader.next_line()?;
        let mut zion = 0.0;
        for tok in s.iter() {
            zion += reader.parse_f64(iline, tok)?;
        }

        // local part

        let (iline, s) = reader.next_line()?;
        if s.len() < 2 {
            return Err(reader.error(iline, "expected 'rloc nexp c1 ...'"));
        }

        let rloc = reader.parse_f64(iline, s[0])?;
        let nexp = reader.parse_usize(iline, s[1])?;

        if nexp > 4 || s.len() != 2 + nexp {
            return Err(reader.error(iline, "expected up to four local coefficients"));
        }

        let mut cloc = Vec::with_capacity(nexp);
        for tok in s[2..].iter() {
            cloc.push(reader.parse_f64(iline, tok)?);
        }

        // nonlocal part

        let (iline, s) = reader.next_line()?;
        let nchannel = reader.parse_usize(iline, s[0])?;

        let mut channels = Vec::with_capacity(nchannel);

        for _l in 0..nchannel {
            let (iline, s) = reader.next_line()?;

            if s.len() < 2 {
                return Err(reader.error(iline, "expected 'r nprj h11 ...'"));
            }

            let r = reader.parse_f64(iline, s[0])?;
            let nprj = reader.parse_usize(iline, s[1])?;

            let mut h = vec![vec![0.0; nprj]; nprj];

            let mut row = s[2..].to_vec();
            let mut row_line = iline;

            for i in 0..nprj {
                if i > 0 {
                    let (il, s) = reader.next_line()?;
                    row = s.clone();
                    row_line = il;
                }

                if row.len() != nprj - i {
                    return Err(reader.error(row_line, "wrong number of h coefficients"));
                }

                for (j, tok) in row.iter().enumerate() {
                    let v = reader.parse_f64(row_line, tok)?;
                    h[i][i + j] = v;
                    h[i + j][i] = v;
                }
            }

            channels.push((r, h));
        }

        GTH::new(&symbol, zion, rloc, &cloc, channels)
    }

    pub fn get_rloc(&self) -> f64 {
        self.rloc
    }
}

struct LineReader<'a> {
    path: PathBuf,
    lines: &'a [(usize, Vec<&'a str>)],
    pos: usize,
}

impl<'a> LineReader<'a> {
    fn next_line(&mut self) -> Result<(usize, Vec<&'a str>), PspError> {
        let line = self.lines.get(self.pos).cloned().ok_or_else(|| {
            let last = self.lines.last().map(|(i, _)| *i).unwrap_or(0);
            self.error(last, "unexpected end of file")
        })?;

        self.pos += 1;

        Ok(line)
    }

    fn parse_f64(&self, line: usize, tok: &str) -> Result<f64, PspError> {
        tok.parse::<f64>()
            .map_err(|_| self.error(line, &format!("'{}' is not a number", tok)))
    }

    fn parse_usize(&self, line: usize, tok: &str) -> Result<usize, PspError> {
        tok.parse::<usize>()
            .map_err(|_| self.error(line, &format!("'{}' is not a count", tok)))
    }

    fn error(&self, line: usize, msg: &str) -> PspError {
        PspError::Parse {
            path: self.path.clone(),
            line,
            msg: msg.to_string(),
        }
    }
}

fn projector_supported(l: usize, i: usize) -> bool {
    match l {
        0 | 1 => i < 3,
        2 => i < 2,
        _ => false,
    }
}

// HGH, PRB 58, 3641 (1998), Eq. 18
fn projector_q(l: usize, i: usize, r: f64, q: f64) -> f64 {
    let p = PI.powf(1.25);

    let x2 = q * q * r * r;
    let e = (-0.5 * x2).exp();

    match (l, i) {
        (0, 0) => 4.0 * (2.0 * r.powi(3)).sqrt() * p * e,
        (0, 1) => 8.0 * (2.0 * r.powi(3) / 15.0).sqrt() * p * (3.0 - x2) * e,
        (0, 2) => {
            16.0 / 3.0 * (2.0 * r.powi(3) / 105.0).sqrt() * p * (15.0 - 10.0 * x2 + x2 * x2) * e
        }
        (1, 0) => 8.0 * (r.powi(5) / 3.0).sqrt() * p * q * e,
        (1, 1) => 16.0 * (r.powi(5) / 105.0).sqrt() * p * q * (5.0 - x2) * e,
        (1, 2) => {
            32.0 / 3.0 * (r.powi(5) / 1155.0).sqrt() * p * q * (35.0 - 14.0 * x2 + x2 * x2) * e
        }
        (2, 0) => 8.0 * (2.0 * r.powi(7) / 15.0).sqrt() * p * q * q * e,
        (2, 1) => 16.0 / 3.0 * (2.0 * r.powi(7) / 105.0).sqrt() * p * q * q * (7.0 - x2) * e,
        _ => 0.0,
    }
}

impl AtomPSP for GTH {
    fn get_symbol(&self) -> &str {
        &self.symbol
    }

    fn get_zion(&self) -> f64 {
        self.zion
    }

    fn get_lmax(&self) -> usize {
        self.channels.len().saturating_sub(1)
    }

    fn get_nbeta(&self) -> usize {
        self.betas.len()
    }

    fn get_lbeta(&self, ibeta: usize) -> usize {
        self.betas[ibeta].0
    }

    fn get_beta_q(&self, ibeta: usize, q: f64) -> f64 {
        let (l, i) = self.betas[ibeta];

        projector_q(l, i, self.channels[l].r, q)
    }

    fn get_dij(&self, ibeta: usize, jbeta: usize) -> f64 {
        let (li, i) = self.betas[ibeta];
        let (lj, j) = self.betas[jbeta];

        if li != lj {
            return 0.0;
        }

        self.channels[li].h[i][j]
    }

    fn get_vloc_q(&self, q: f64) -> f64 {
        let [c1, c2, c3, c4] = self.cloc;

        let rloc = self.rloc;
        let z = self.zion;

        let f = (8.0 * PI * PI * PI).sqrt() * rloc.powi(3);

        if q < EPS8 {
            return TWOPI * z * rloc * rloc + f * (c1 + 3.0 * c2 + 15.0 * c3 + 105.0 * c4);
        }

        let x2 = q * q * rloc * rloc;
        let x4 = x2 * x2;
        let x6 = x4 * x2;

        let e = (-0.5 * x2).exp();

        let poly = c1
            + c2 * (3.0 - x2)
            + c3 * (15.0 - 10.0 * x2 + x4)
            + c4 * (105.0 - 105.0 * x2 + 21.0 * x4 - x6);

        -FOURPI * z / (q * q) * e + f * e * poly
    }

    fn get_rho_atom_q(&self, q: f64) -> f64 {
        // gaussian guess, roughly the size of the valence shell
        let a = 3.5 * self.rloc;

        self.zion * (-0.25 * q * q * a * a).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SI_GTH: &str = "Si GTH-LDA-q4
    2    2
     0.44000000    1    -7.33610297
    2
     0.42273813    2     5.90692831    -1.26189397
                                        3.25819622
     0.48427842    1     2.72701346
";

    fn write_tmp(name: &str, text: &str) -> PathBuf {
        let path = std::env::temp_dir().join(name);
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_read_silicon() {
        let path = write_tmp("pspot_test_si.gth", SI_GTH);

        let si = GTH::from_file(&path).unwrap();

        assert_eq!(si.get_symbol(), "Si");
        assert_eq!(si.get_zion(), 4.0);
        assert_eq!(si.get_lmax(), 1);
        assert_eq!(si.get_nbeta(), 3);
        assert_eq!(si.get_lbeta(2), 1);

        assert_eq!(si.get_dij(0, 1), -1.26189397);
        assert_eq!(si.get_dij(1, 0), -1.26189397);
        assert_eq!(si.get_dij(1, 1), 3.25819622);
        assert_eq!(si.get_dij(0, 2), 0.0);
    }

    #[test]
    fn test_truncated_file_is_rejected() {
        let path = write_tmp("pspot_test_truncated.gth", "Si GTH\n 2 2\n 0.44 1 -7.3\n 2\n");

        match GTH::from_file(&path) {
            Err(PspError::Parse { .. }) => {}
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_vloc_small_q_limit() {
        let si = GTH::new("Si", 4.0, 0.44, &[-7.33610297], vec![]).unwrap();

        // adding back the Coulomb tail reproduces the q = 0 value
        let q = 1E-4;
        let v = si.get_vloc_q(q) + FOURPI * 4.0 / (q * q);

        assert_relative_eq!(v, si.get_vloc_q(0.0), epsilon = 1E-4);
    }

    #[test]
    fn test_projector_normalization() {
        // int beta(q)^2 q^2 dq = 8 pi^3 for a normalized p(r)

        let si = GTH::new(
            "Si",
            4.0,
            0.44,
            &[-7.33610297],
            vec![
                (0.42273813, vec![vec![5.9, 0.0], vec![0.0, 3.2]]),
                (0.48427842, vec![vec![2.7]]),
            ],
        )
        .unwrap();

        let dq = 1E-3;

        for ibeta in 0..si.get_nbeta() {
            let s: f64 = (1..40000)
                .map(|i| {
                    let q = i as f64 * dq;
                    let b = si.get_beta_q(ibeta, q);
                    b * b * q * q
                })
                .sum::<f64>()
                * dq
                / (8.0 * PI * PI * PI);

            assert_relative_eq!(s, 1.0, epsilon = 1E-6);
        }
    }

    #[test]
    fn test_unsupported_channel() {
        let r = GTH::new("X", 1.0, 0.5, &[], vec![(0.5, vec![vec![0.0; 4]; 4])]);

        assert!(matches!(r, Err(PspError::UnsupportedProjector { l: 0, i: 4 })));
    }
}
