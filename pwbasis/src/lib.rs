use gvector::GVector;
use vector3::Vector3f64;

/// Plane-wave basis of one k-point: the G vectors with |k+G|^2/2 <= ecut,
/// ordered by |k+G|. Its size differs from k-point to k-point.
#[derive(Debug, Default, Clone)]
pub struct PWBasis {
    k_cart: Vector3f64, // in cartesian coordinates
    k_index: usize,     // index of this xk in all xks
    gindex: Vec<usize>, // indices of G vectors used in this set of plane wave basis
    kg: Vec<f64>,       // norms of the vectors xk+gvec
}

impl PWBasis {
    pub fn new(k_cart: Vector3f64, k_index: usize, ecut: f64, gvec: &GVector) -> PWBasis {
        let t_gindex = gvec.get_g_vector_index(ecut, k_cart);

        let gcart = gvec.get_cart();

        let t_kg: Vec<f64> = t_gindex
            .iter()
            .map(|&j| (k_cart + gcart[j]).norm2())
            .collect();

        // sort |k+G|

        let ordered_index = utility::argsort(&t_kg);

        let gindex = ordered_index.iter().map(|&j| t_gindex[j]).collect();
        let kg = ordered_index.iter().map(|&j| t_kg[j]).collect();

        PWBasis {
            k_cart,
            k_index,
            gindex,
            kg,
        }
    }

    pub fn get_kg(&self) -> &[f64] {
        self.kg.as_slice()
    }

    pub fn get_k_cart(&self) -> Vector3f64 {
        self.k_cart
    }

    pub fn get_k_index(&self) -> usize {
        self.k_index
    }

    pub fn get_gindex(&self) -> &[usize] {
        self.gindex.as_slice()
    }

    pub fn get_n_plane_waves(&self) -> usize {
        self.gindex.len()
    }
}

#[test]
fn test_pwbasis_depends_on_k() {
    use lattice::Lattice;

    let latt = Lattice::new(&[5.0, 0.0, 0.0], &[0.0, 5.0, 0.0], &[0.0, 0.0, 5.0]);
    let gvec = GVector::new(&latt, [16, 16, 16]);

    let ecut = 5.0;

    let gamma = PWBasis::new(Vector3f64::zeros(), 0, ecut, &gvec);

    let b = latt.reciprocal().get_vector_a();
    let xk = b * 0.5;
    let zone_edge = PWBasis::new(xk, 1, ecut, &gvec);

    assert!(gamma.get_n_plane_waves() > 0);
    assert_ne!(gamma.get_n_plane_waves(), zone_edge.get_n_plane_waves());

    for w in zone_edge.get_kg().windows(2) {
        assert!(w[0] <= w[1]);
    }

    assert!(zone_edge.get_kg().iter().all(|&kg| 0.5 * kg * kg <= ecut));
    assert_eq!(gamma.get_kg()[0], 0.0);
    assert_eq!(zone_edge.get_k_index(), 1);
}
