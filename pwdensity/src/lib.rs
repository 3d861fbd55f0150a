use gvector::GVector;
use std::collections::HashMap;
use vector3::{Vector3f64, Vector3i32};

/// G vectors of the density sphere |G|^2/2 <= ecutrho, sorted by length,
/// grouped into shells of equal norm.
pub struct PWDensity {
    gindex: Vec<usize>,
    g: Vec<f64>, // storing the norm of the vectors G
    gshell: Vec<f64>,         // the norm of unique Gs size
    gshell_index: Vec<usize>, // each G vector size's index in gshell
    lookup: HashMap<[i32; 3], usize>,
}

impl PWDensity {
    pub fn new(ecut: f64, gvec: &GVector) -> PWDensity {
        let gindex = gvec.get_g_vector_index(ecut, Vector3f64::zeros());

        let gcart = gvec.get_cart();

        let g: Vec<f64> = gindex.iter().map(|&j| gcart[j].norm2()).collect();

        let (gshell, gshell_index) = make_g_shells(&g);

        let miller = gvec.get_miller();

        let lookup = gindex
            .iter()
            .enumerate()
            .map(|(i, &j)| (miller[j].to_array(), i))
            .collect();

        PWDensity {
            gindex,
            g,
            gshell,
            gshell_index,
            lookup,
        }
    }

    pub fn get_g(&self) -> &[f64] {
        self.g.as_slice()
    }

    pub fn get_gmax(&self) -> f64 {
        self.g.last().copied().unwrap_or(0.0)
    }

    pub fn get_gindex(&self) -> &[usize] {
        self.gindex.as_slice()
    }

    pub fn get_n_plane_waves(&self) -> usize {
        self.gindex.len()
    }

    pub fn get_n_gshell(&self) -> usize {
        self.gshell.len()
    }

    pub fn get_gshell_norms(&self) -> &[f64] {
        self.gshell.as_slice()
    }

    pub fn get_gshell_index(&self) -> &[usize] {
        self.gshell_index.as_slice()
    }

    /// Position of the G vector with the given Miller index inside the density sphere.
    pub fn find_miller(&self, m: Vector3i32) -> Option<usize> {
        self.lookup.get(&m.to_array()).copied()
    }
}

fn make_g_shells(g: &[f64]) -> (Vec<f64>, Vec<usize>) {
    let mut shell = Vec::new();
    let mut index = Vec::with_capacity(g.len());

    let mut glen: f64 = -1.0;

    for x in g.iter() {
        if x - glen > 1.0E-10 {
            glen = *x;
            shell.push(glen);
        }

        index.push(shell.len() - 1);
    }

    (shell, index)
}

#[test]
fn test_pwdensity_shells_and_lookup() {
    use lattice::Lattice;

    let latt = Lattice::new(&[6.0, 0.0, 0.0], &[0.0, 6.0, 0.0], &[0.0, 0.0, 6.0]);
    let gvec = GVector::new(&latt, [12, 12, 12]);

    let pwden = PWDensity::new(4.0, &gvec);

    assert_eq!(pwden.get_g()[0], 0.0);
    assert_eq!(pwden.get_gshell_norms()[0], 0.0);
    assert_eq!(pwden.get_gshell_index()[0], 0);

    // the 6 vectors (+-1,0,0), (0,+-1,0), (0,0,+-1) form the first non-zero shell
    for i in 1..7 {
        assert_eq!(pwden.get_gshell_index()[i], 1);
    }
    assert_eq!(pwden.get_gshell_index()[7], 2);

    let i = pwden.find_miller(Vector3i32::new(0, -1, 0)).unwrap();
    assert_eq!(pwden.get_gshell_index()[i], 1);

    assert!(pwden.find_miller(Vector3i32::new(40, 0, 0)).is_none());
    assert!(pwden.get_n_gshell() > 2);
}
