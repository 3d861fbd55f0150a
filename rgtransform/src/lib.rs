use dwfft3d::DWFFT3D;
use gvector::*;
use ndarray::*;
use pwdensity::*;
use types::c64;

use std::cell::RefCell;
use std::collections::HashMap;

thread_local! {
    static THREAD_WORKSPACE: RefCell<HashMap<[usize; 3], Array3<c64>>> = RefCell::new(HashMap::new());
}

/// Transforms between the density sphere in G space and the real-space FFT grid.
///
/// r -> G divides by the number of grid points, G -> r does not, so that
/// f(r) = sum_G f(G) exp(iG.r) holds for fields stored in both spaces.
pub struct RGTransform {
    fftmesh: [usize; 3],
    pfft: DWFFT3D,
}

impl RGTransform {
    pub fn new(n1: usize, n2: usize, n3: usize) -> RGTransform {
        RGTransform {
            fftmesh: [n1, n2, n3],
            pfft: DWFFT3D::new(n1, n2, n3),
        }
    }

    pub fn get_fft_shape(&self) -> [usize; 3] {
        self.fftmesh
    }

    fn with_workspace<R>(&self, f: impl FnOnce(&mut Array3<c64>) -> R) -> R {
        THREAD_WORKSPACE.with(|workspaces| {
            let mut workspaces = workspaces.borrow_mut();

            let fft_work = workspaces
                .entry(self.fftmesh)
                .or_insert_with(|| Array3::<c64>::new(self.fftmesh));

            f(fft_work)
        })
    }

    pub fn r3d_to_g1d(&self, gvec: &GVector, pwden: &PWDensity, rho_3d: &[c64], rhog_1d: &mut [c64]) {
        let linear_index =
            utility::compute_fft_linear_index_map(gvec.get_miller(), pwden.get_gindex(), self.fftmesh);

        self.r3d_to_g1d_with_linear_index(&linear_index, rho_3d, rhog_1d);
    }

    pub fn g1d_to_r3d(&self, gvec: &GVector, pwden: &PWDensity, rhog_1d: &[c64], rho_3d: &mut [c64]) {
        let linear_index =
            utility::compute_fft_linear_index_map(gvec.get_miller(), pwden.get_gindex(), self.fftmesh);

        self.g1d_to_r3d_with_linear_index(&linear_index, rhog_1d, rho_3d);
    }

    /// Same as `r3d_to_g1d` with a precomputed map from sphere index to grid offset.
    pub fn r3d_to_g1d_with_linear_index(&self, linear_index: &[usize], r_3d: &[c64], g_1d: &mut [c64]) {
        self.with_workspace(|fft_work| {
            forward(&self.pfft, r_3d, fft_work.as_mut_slice());

            utility::map_3d_to_1d_with_linear_index(linear_index, fft_work, g_1d);
        });
    }

    pub fn g1d_to_r3d_with_linear_index(&self, linear_index: &[usize], g_1d: &[c64], r_3d: &mut [c64]) {
        self.with_workspace(|fft_work| {
            utility::map_1d_to_3d_with_linear_index(linear_index, g_1d, fft_work);

            backward(&self.pfft, fft_work.as_slice(), r_3d);
        });
    }

    pub fn r3d_to_g3d(&self, r: &[c64], g: &mut [c64]) {
        forward(&self.pfft, r, g);
    }

    pub fn g3d_to_r3d(&self, g: &[c64], r: &mut [c64]) {
        backward(&self.pfft, g, r);
    }
}

fn forward(pfft: &DWFFT3D, r: &[c64], g: &mut [c64]) {
    pfft.fft3d(r, g);

    let ng_f64 = g.len() as f64;

    g.iter_mut().for_each(|x| *x /= ng_f64);
}

fn backward(pfft: &DWFFT3D, g: &[c64], r: &mut [c64]) {
    pfft.ifft3d(g, r);
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice::Lattice;

    #[test]
    fn test_density_sphere_roundtrip() {
        let latt = Lattice::new(&[5.0, 0.0, 0.0], &[0.0, 5.0, 0.0], &[0.0, 0.0, 5.0]);
        let shape = [12, 12, 12];

        let gvec = GVector::new(&latt, shape);
        let pwden = PWDensity::new(10.0, &gvec);

        let npw = pwden.get_n_plane_waves();

        // arbitrary complex coefficients, not necessarily a real field
        let rhog: Vec<c64> = (0..npw)
            .map(|i| c64::new(1.0 / (1.0 + i as f64), 0.1 * i as f64))
            .collect();

        let rgtrans = RGTransform::new(shape[0], shape[1], shape[2]);

        let mut rho_3d = vec![c64::new(0.0, 0.0); 12 * 12 * 12];
        rgtrans.g1d_to_r3d(&gvec, &pwden, &rhog, &mut rho_3d);

        let mut back = vec![c64::new(0.0, 0.0); npw];
        rgtrans.r3d_to_g1d(&gvec, &pwden, &rho_3d, &mut back);

        for (a, b) in back.iter().zip(rhog.iter()) {
            assert!((a - b).norm() < 1E-10);
        }

        // G = 0 component is the grid average
        let avg = rho_3d.iter().sum::<c64>() / rho_3d.len() as f64;
        assert!((avg - rhog[0]).norm() < 1E-10);
    }
}
