use itertools::multizip;
use lattice::Lattice;
use vector3::{Vector3f64, Vector3i32};

/// All reciprocal lattice vectors representable on an FFT grid, sorted by length.
#[derive(Debug)]
pub struct GVector {
    miller: Vec<Vector3i32>,
    cart: Vec<Vector3f64>,
}

impl GVector {
    pub fn new(latt: &Lattice, fft_shape: [usize; 3]) -> GVector {
        let blatt = latt.reciprocal();

        let [n1, n2, n3] = fft_shape;

        // generate miller index

        let t_miller = make_miller(n1, n2, n3);

        // calculate cartesian coordinates of miller index

        let t_cart = miller_to_cart(&t_miller, &blatt);

        // calculate the length of each G vector

        let t_g: Vec<f64> = t_cart.iter().map(|g| g.norm2()).collect();

        // order G vectors according to length

        let ordered_index = utility::argsort(&t_g);

        let cart = ordered_index.iter().map(|&j| t_cart[j]).collect();
        let miller = ordered_index.iter().map(|&j| t_miller[j]).collect();

        GVector { miller, cart }
    }

    pub fn get_miller(&self) -> &[Vector3i32] {
        self.miller.as_slice()
    }

    pub fn get_cart(&self) -> &[Vector3f64] {
        self.cart.as_slice()
    }

    // |k+G|^2 <= 2*Ecut, Ecut in Hartree
    pub fn get_g_vector_index(&self, ecut: f64, xk: Vector3f64) -> Vec<usize> {
        let two_ecut = 2.0 * ecut;

        self.cart
            .iter()
            .enumerate()
            .filter(|(_, g)| {
                let kg = xk + **g;
                kg.dot_product(&kg) <= two_ecut
            })
            .map(|(i, _)| i)
            .collect()
    }

    pub fn get_n_plane_waves(&self, ecut: f64, xk: Vector3f64) -> usize {
        self.get_g_vector_index(ecut, xk).len()
    }
}

// x = i * a.x + j * b.x + k * c.x
// y = i * a.y + j * b.y + k * c.y
// z = i * a.z + j * b.z + k * c.z
fn miller_to_cart(miller: &[Vector3i32], blatt: &Lattice) -> Vec<Vector3f64> {
    let a = blatt.get_vector_a();
    let b = blatt.get_vector_b();
    let c = blatt.get_vector_c();

    let mut cart = vec![Vector3f64::zeros(); miller.len()];

    for (ct, mi) in multizip((cart.iter_mut(), miller.iter())) {
        *ct = a * mi.x as f64 + b * mi.y as f64 + c * mi.z as f64;
    }

    cart
}

fn make_miller(n1: usize, n2: usize, n3: usize) -> Vec<Vector3i32> {
    let i1 = utility::fft_left_end(n1);
    let i2 = utility::fft_left_end(n2);
    let i3 = utility::fft_left_end(n3);

    let j1 = utility::fft_right_end(n1);
    let j2 = utility::fft_right_end(n2);
    let j3 = utility::fft_right_end(n3);

    let mut miller = Vec::with_capacity(n1 * n2 * n3);

    for i in i1..j1 + 1 {
        for j in i2..j2 + 1 {
            for k in i3..j3 + 1 {
                miller.push(Vector3i32::new(i, j, k));
            }
        }
    }

    miller
}

#[test]
fn test_gvector_sorted_and_truncated() {
    let latt = Lattice::new(&[6.0, 0.0, 0.0], &[0.0, 6.0, 0.0], &[0.0, 0.0, 6.0]);

    let gvec = GVector::new(&latt, [12, 12, 12]);

    assert_eq!(gvec.get_miller().len(), 12 * 12 * 12);
    assert_eq!(gvec.get_miller()[0], Vector3i32::new(0, 0, 0));

    let cart = gvec.get_cart();
    for w in cart.windows(2) {
        assert!(w[0].norm2() <= w[1].norm2() + 1E-12);
    }

    // the first shell of a simple cubic lattice holds 6 vectors of length 2pi/a
    let g1 = 2.0 * std::f64::consts::PI / 6.0;
    let ecut = 0.5 * g1 * g1 * 1.0001;

    assert_eq!(gvec.get_n_plane_waves(ecut, Vector3f64::zeros()), 7);
}
