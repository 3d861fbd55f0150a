// Pulay (DIIS) mixing with the metric (q0^2 + q^2) / q^2 favouring long wavelengths.

use control::Control;
use fifo::*;
use matrix::*;
use num_traits::identities::Zero;
use types::*;

use crate::Mixing;

pub struct MixingPulay {
    metric_weight: f64,
    beta: f64,

    vin: FIFO<Vec<c64>>,
    vout: FIFO<Vec<c64>>,
}

impl MixingPulay {
    pub fn new(control: &Control) -> MixingPulay {
        MixingPulay::with_params(
            control.get_scf_rho_mix_beta(),
            control.get_scf_rho_mix_history_steps(),
            control.get_scf_rho_mix_pulay_metric_weight(),
        )
    }

    pub fn with_params(beta: f64, nhistory: usize, metric_weight: f64) -> MixingPulay {
        MixingPulay {
            metric_weight,
            beta,
            vin: FIFO::new(nhistory),
            vout: FIFO::new(nhistory),
        }
    }
}

impl Mixing for MixingPulay {
    fn compute_next_density(&mut self, gs: &[f64], inp: &mut [c64], res: &[c64]) -> f64 {
        let res_norm = crate::get_residual_norm(res);

        self.vin.push(inp.to_vec());
        self.vout.push(res.to_vec());

        if self.vin.len() == 1 {
            for (x, r) in inp.iter_mut().zip(res.iter()) {
                *x += self.beta * *r;
            }
        } else {
            let prev = inp.to_vec();

            let coef = compute_coef(self.metric_weight, gs, &self.vout);

            for z in inp.iter_mut() {
                *z = c64::zero();
            }

            for (j, c) in coef.iter().enumerate() {
                for (x, (tin, tout)) in inp.iter_mut().zip(self.vin[j].iter().zip(self.vout[j].iter())) {
                    *x += *c * (*tin + self.beta * *tout);
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

// minimize |sum_j c_j R_j| in the metric subject to sum_j c_j = 1
fn compute_coef(weight: f64, gs: &[f64], vout: &FIFO<Vec<c64>>) -> Vec<c64> {
    let n = vout.len();

    let mut a = Matrix::<c64>::new(n, n);

    // G = 0 carries no information once the charge is conserved
    let metric: Vec<f64> = gs
        .iter()
        .map(|&q| {
            if q > 0.0 {
                let q2 = q * q;
                (weight + q2) / q2
            } else {
                0.0
            }
        })
        .collect();

    for i in 0..n {
        for j in 0..n {
            a[[j, i]] = utility::zdot_product_metric(&vout[j], &vout[i], &metric);
        }
    }

    a.pinv();

    let s = a.sum();

    (0..n)
        .map(|i| {
            let mut f = c64::zero();

            for j in 0..n {
                f += a[[j, i]];
            }

            f / s
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::*;

    #[test]
    fn test_pulay_beats_linear() {
        let sys = LinearResponse::new(6);

        let mut mixing = MixingPulay::with_params(0.3, 8, 1.0);
        let n = iterate(&mut mixing, &sys, 1E-8, 40).unwrap();

        assert!(n <= 20, "{}", n);
        assert!(mixing.get_history_len() <= 8);
    }

    #[test]
    fn test_coefficients_sum_to_one() {
        let mut hist = FIFO::new(3);

        hist.push(vec![c64::new(1.0, 0.0), c64::new(0.5, 0.0), c64::new(0.0, 0.2)]);
        hist.push(vec![c64::new(0.4, 0.0), c64::new(-0.2, 0.1), c64::new(0.1, 0.0)]);
        hist.push(vec![c64::new(0.1, 0.1), c64::new(0.0, -0.1), c64::new(0.05, 0.0)]);

        let coef = compute_coef(1.0, &[0.0, 1.0, 2.0], &hist);

        let s: c64 = coef.iter().sum();
        assert!((s - c64::new(1.0, 0.0)).norm() < 1E-10);
    }
}
