use dwconsts::*;
use num_traits::Zero;
use types::c64;
use vector3::*;

/// exp(-i 2pi m.tau) for Miller index m and fractional position tau.
#[inline]
pub fn phase(m: Vector3i32, tau: Vector3f64) -> c64 {
    let gr = utility::dot_product_v3i32_v3f64(m, tau);

    (-I_C64 * TWOPI * gr).exp()
}

/// S(G) = sum_tau exp(-i G.tau) over the given atoms, for every G in `gindex`.
pub fn compute_structure_factor(
    miller: &[Vector3i32],
    gindex: &[usize],
    atom_positions: &[Vector3f64],
) -> Vec<c64> {
    gindex
        .iter()
        .map(|&ig| {
            atom_positions
                .iter()
                .fold(c64::zero(), |s, at| s + phase(miller[ig], *at))
        })
        .collect()
}

pub fn compute_structure_factor_for_many_g_one_atom(
    miller: &[Vector3i32],
    gindex: &[usize],
    atom_position: Vector3f64,
) -> Vec<c64> {
    gindex
        .iter()
        .map(|&ig| phase(miller[ig], atom_position))
        .collect()
}
