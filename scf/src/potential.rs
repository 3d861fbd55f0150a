use crystal::Crystal;
use gvector::GVector;
use ndarray::Array3;
use num_traits::identities::Zero;
use pspot::{PSPot, PspError};
use pwdensity::PWDensity;
use rgtransform::RGTransform;
use types::c64;
use xc::{XCError, XC};

/// Local potential seen by the electrons for a given input density.
pub struct EffectivePotential {
    /// V_ps + V_H + V_xc
    pub vloc_3d: Array3<c64>,
    /// V_H + V_xc, for the double counting correction
    pub vhxc_3d: Array3<c64>,
    /// E_H of the input density
    pub hartree: f64,
    /// E_xc of the input density
    pub xc: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum PotentialError {
    #[error(transparent)]
    Psp(#[from] PspError),

    #[error(transparent)]
    XC(#[from] XCError),
}

/// rho -> V_loc. The pseudopotential part depends only on the ions and is computed once.
pub struct PotentialBuilder<'a> {
    gvec: &'a GVector,
    pwden: &'a PWDensity,
    rgtrans: &'a RGTransform,
    xc: Box<dyn XC>,
    vpslocg: Vec<c64>,
    volume: f64,
}

impl<'a> PotentialBuilder<'a> {
    pub fn new(
        pots: &PSPot,
        crystal: &Crystal,
        gvec: &'a GVector,
        pwden: &'a PWDensity,
        rgtrans: &'a RGTransform,
        xc_scheme: &str,
    ) -> Result<PotentialBuilder<'a>, PotentialError> {
        let vpslocg = vloc::from_atomic_super_position(pots, crystal, gvec, pwden)?;

        let xc = xc::new(xc_scheme)?;

        Ok(PotentialBuilder {
            gvec,
            pwden,
            rgtrans,
            xc,
            vpslocg,
            volume: crystal.get_latt().volume(),
        })
    }

    pub fn get_vpslocg(&self) -> &[c64] {
        &self.vpslocg
    }

    /// V_loc = V_ps + V_H[rho] + V_xc[rho], summed in G space on the density sphere.
    pub fn build(&self, rhog: &[c64], rho_3d: &Array3<c64>) -> EffectivePotential {
        let shape = rho_3d.shape();
        let npw_rho = self.pwden.get_n_plane_waves();

        // v_h

        let mut vhg = vec![c64::zero(); npw_rho];
        energy::hartree_potential(self.pwden, rhog, &mut vhg);

        let hartree = energy::hartree(self.pwden, self.volume, rhog);

        // v_xc in r space, then G

        let mut vxc_3d = Array3::<c64>::new(shape);
        let mut exc_3d = Array3::<c64>::new(shape);

        self.xc.potential_and_energy(rho_3d, &mut vxc_3d, &mut exc_3d);

        let xc = energy::exc(self.volume, rho_3d, &exc_3d);

        let mut vxcg = vec![c64::zero(); npw_rho];
        self.rgtrans
            .r3d_to_g1d(self.gvec, self.pwden, vxc_3d.as_slice(), &mut vxcg);

        // v_h + v_xc, then + v_psloc

        let vhxcg: Vec<c64> = vhg.iter().zip(vxcg.iter()).map(|(h, x)| h + x).collect();
        let vlocg: Vec<c64> = vhxcg.iter().zip(self.vpslocg.iter()).map(|(v, p)| v + p).collect();

        let mut vhxc_3d = Array3::<c64>::new(shape);
        self.rgtrans
            .g1d_to_r3d(self.gvec, self.pwden, &vhxcg, vhxc_3d.as_mut_slice());

        let mut vloc_3d = Array3::<c64>::new(shape);
        self.rgtrans
            .g1d_to_r3d(self.gvec, self.pwden, &vlocg, vloc_3d.as_mut_slice());

        EffectivePotential {
            vloc_3d,
            vhxc_3d,
            hartree,
            xc,
        }
    }

    pub fn hartree_energy(&self, rhog: &[c64]) -> f64 {
        energy::hartree(self.pwden, self.volume, rhog)
    }

    pub fn xc_energy(&self, rho_3d: &Array3<c64>) -> f64 {
        let shape = rho_3d.shape();

        let mut vxc_3d = Array3::<c64>::new(shape);
        let mut exc_3d = Array3::<c64>::new(shape);

        self.xc.potential_and_energy(rho_3d, &mut vxc_3d, &mut exc_3d);

        energy::exc(self.volume, rho_3d, &exc_3d)
    }
}
