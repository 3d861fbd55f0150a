// Modified Broyden mixing, D. D. Johnson, Phys. Rev. B 38, 12807 (1988)

use control::Control;
use fifo::*;
use matrix::*;
use num_traits::identities::Zero;
use types::*;

use crate::Mixing;

// weight keeping the inverse Jacobian close to the previous one
const OMEGA0: f64 = 0.01;

pub struct MixingBroyden {
    beta: f64,
    vin: FIFO<Vec<c64>>,
    vout: FIFO<Vec<c64>>,
}

impl MixingBroyden {
    pub fn new(control: &Control) -> MixingBroyden {
        MixingBroyden::with_params(control.get_scf_rho_mix_beta(), control.get_scf_rho_mix_history_steps())
    }

    pub fn with_params(beta: f64, nhistory: usize) -> MixingBroyden {
        MixingBroyden {
            beta,
            vin: FIFO::new(nhistory),
            vout: FIFO::new(nhistory),
        }
    }
}

impl Mixing for MixingBroyden {
    fn compute_next_density(&mut self, _gs: &[f64], inp: &mut [c64], res: &[c64]) -> f64 {
        let res_norm = crate::get_residual_norm(res);

        let prev = inp.to_vec();

        self.vin.push(inp.to_vec());
        self.vout.push(res.to_vec());

        for (x, r) in inp.iter_mut().zip(res.iter()) {
            *x += self.beta * *r;
        }

        if self.vin.len() > 1 {
            let (dres, drho) = compute_differences(&self.vin, &self.vout);

            let a = compute_a(&dres);
            let beta = compute_beta(&a);
            let c = compute_c(&dres, res);

            let m = dres.len();

            for n in 0..m {
                let mut gamma = c64::zero();

                for k in 0..m {
                    gamma += c[k] * beta[[k, n]];
                }

                for (x, (df, dr)) in inp.iter_mut().zip(dres[n].iter().zip(drho[n].iter())) {
                    *x -= gamma * (self.beta * *df + *dr);
                }
            }

            crate::limit_step(&prev, inp, crate::get_max_step(self.beta, res_norm));
        }

        res_norm
    }

    fn get_history_len(&self) -> usize {
        self.vin.len()
    }

    fn reset(&mut self) {
        self.vin.clear();
        self.vout.clear();
    }
}

// dF_n and drho_n between consecutive entries, both divided by |dF_n|
fn compute_differences(vin: &FIFO<Vec<c64>>, vout: &FIFO<Vec<c64>>) -> (Vec<Vec<c64>>, Vec<Vec<c64>>) {
    let m = vin.len() - 1;

    let mut dres = Vec::with_capacity(m);
    let mut drho = Vec::with_capacity(m);

    for n in 0..m {
        let mut df: Vec<c64> = vout[n + 1].iter().zip(vout[n].iter()).map(|(a, b)| *a - *b).collect();
        let mut dr: Vec<c64> = vin[n + 1].iter().zip(vin[n].iter()).map(|(a, b)| *a - *b).collect();

        let norm = utility::l2_norm(&df);

        if norm > 0.0 {
            df.iter_mut().for_each(|x| *x /= norm);
            dr.iter_mut().for_each(|x| *x /= norm);
        }

        dres.push(df);
        drho.push(dr);
    }

    (dres, drho)
}

// a_ij = <dF_j|dF_i>
fn compute_a(dres: &[Vec<c64>]) -> Matrix<c64> {
    let m = dres.len();

    let mut a = Matrix::<c64>::new(m, m);

    for i in 0..m {
        for j in 0..m {
            a[[i, j]] = utility::zdot_product(&dres[j], &dres[i]);
        }
    }

    a
}

// (omega0^2 + a)^-1
fn compute_beta(a: &Matrix<c64>) -> Matrix<c64> {
    let mut m = a.clone();

    for i in 0..m.nrow() {
        m[[i, i]] += OMEGA0 * OMEGA0;
    }

    m.inv();

    m
}

// c_k = <dF_k|F>
fn compute_c(dres: &[Vec<c64>], res: &[c64]) -> Vec<c64> {
    dres.iter().map(|df| utility::zdot_product(df, res)).collect()
}
