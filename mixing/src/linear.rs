use crate::Mixing;
use types::c64;

/// rho_next = rho_in + beta * (rho_out - rho_in)
pub struct MixingLinear {
    beta: f64,
}

impl MixingLinear {
    pub fn new(beta: f64) -> MixingLinear {
        MixingLinear { beta }
    }
}

impl Mixing for MixingLinear {
    fn compute_next_density(&mut self, _gs: &[f64], inp: &mut [c64], res: &[c64]) -> f64 {
        for (x, r) in inp.iter_mut().zip(res.iter()) {
            *x += self.beta * *r;
        }

        crate::get_residual_norm(res)
    }

    fn get_history_len(&self) -> usize {
        0
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::*;

    #[test]
    fn test_linear_step() {
        let mut mixing = MixingLinear::new(0.25);

        let mut inp = vec![c64::new(1.0, 1.0); 3];
        let res = vec![c64::new(4.0, 0.0), c64::new(0.0, -4.0), c64::new(0.0, 0.0)];

        let norm = mixing.compute_next_density(&[0.0, 1.0, 2.0], &mut inp, &res);

        assert!((norm - 32f64.sqrt()).abs() < 1E-14);
        assert_eq!(inp, vec![c64::new(2.0, 1.0), c64::new(1.0, 0.0), c64::new(1.0, 1.0)]);
        assert_eq!(mixing.get_history_len(), 0);
    }

    #[test]
    fn test_linear_converges_slowly() {
        let sys = LinearResponse::new(6);

        // the m = 0 component contracts by 0.7 per step
        let mut mixing = MixingLinear::new(0.3);
        let n = iterate(&mut mixing, &sys, 1E-8, 200).unwrap();

        assert!(n > 30, "{}", n);
    }
}
