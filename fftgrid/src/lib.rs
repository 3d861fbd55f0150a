use lattice::Lattice;
use std::{f64::consts, fmt};

/// Real-space grid large enough to hold every G of the density sphere
/// without aliasing. Dimensions only contain the factors 2, 3, 5 and 7.
#[derive(Debug, Clone)]
pub struct FFTGrid {
    n1: usize,
    n2: usize,
    n3: usize,
}

impl FFTGrid {
    /// `ecutrho` in Hartree.
    pub fn new(latt: &Lattice, ecutrho: f64) -> FFTGrid {
        let gmax = (2.0 * ecutrho).sqrt();

        let twopi = 2.0 * consts::PI;

        let n1 = (2.0 * gmax * latt.get_vector_a().norm2() / twopi).ceil() as usize + 1;
        let n2 = (2.0 * gmax * latt.get_vector_b().norm2() / twopi).ceil() as usize + 1;
        let n3 = (2.0 * gmax * latt.get_vector_c().norm2() / twopi).ceil() as usize + 1;

        FFTGrid {
            n1: good_fft_size(n1),
            n2: good_fft_size(n2),
            n3: good_fft_size(n3),
        }
    }

    pub fn get_ntotf64(&self) -> f64 {
        self.get_ntot() as f64
    }

    pub fn get_ntot(&self) -> usize {
        self.n1 * self.n2 * self.n3
    }

    pub fn get_size(&self) -> [usize; 3] {
        [self.n1, self.n2, self.n3]
    }
}

impl fmt::Display for FFTGrid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} x {} x {}", self.n1, self.n2, self.n3)
    }
}

fn good_fft_size(n: usize) -> usize {
    (n.max(1)..).find(|&m| has_small_factors(m)).unwrap_or(n)
}

fn has_small_factors(n_to_check: usize) -> bool {
    const FACTORS: [usize; 4] = [2, 3, 5, 7];

    let mut tn = n_to_check;

    for fi in FACTORS.iter() {
        while tn % fi == 0 && tn != 1 {
            tn /= fi;
        }
    }

    tn == 1
}

#[test]
fn test_fft_grid_sizes() {
    assert!(has_small_factors(30));
    assert!(!has_small_factors(22));
    assert_eq!(good_fft_size(11), 12);
    assert_eq!(good_fft_size(1), 1);

    let latt = Lattice::new(&[10.0, 0.0, 0.0], &[0.0, 10.0, 0.0], &[0.0, 0.0, 5.0]);
    let grid = FFTGrid::new(&latt, 8.0);

    let [n1, n2, n3] = grid.get_size();

    // gmax = 4, 2 * gmax * a / 2pi = 12.7
    assert!(n1 >= 14 && has_small_factors(n1));
    assert_eq!(n1, n2);
    assert!(n3 < n1);
    assert_eq!(grid.get_ntot(), n1 * n2 * n3);
}
