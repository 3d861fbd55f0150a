// Precision requested from the eigensolver, coupled to the density error.
//
// ethr starts loose and is tightened to 0.1 * dr2 / nelec as the density
// converges. If the first diagonalization of an iteration already gives a
// density error that the eigenvalue error could account for, the same
// potential is diagonalized again with the lowered threshold.

/// Lower bound of ethr.
pub const ETHR_MIN: f64 = 1E-13;

/// Re-diagonalizations allowed per SCF iteration.
pub const MAX_RETRIES: usize = 1;

/// What to do after a diagonalization pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThresholdDecision {
    Proceed,
    RetryWithThreshold(f64),
}

#[derive(Debug, Clone)]
pub struct AdaptiveThreshold {
    ethr: f64,
    nelec: f64,
}

impl AdaptiveThreshold {
    /// ethr = diago_thr_init / max(1, nelec)
    pub fn new(diago_thr_init: f64, nelec: f64) -> AdaptiveThreshold {
        let nelec = nelec.max(1.0);

        AdaptiveThreshold {
            ethr: (diago_thr_init / nelec).max(ETHR_MIN),
            nelec,
        }
    }

    pub fn get_ethr(&self) -> f64 {
        self.ethr
    }

    /// Threshold of the first pass of an iteration, given dr2 of the previous one.
    pub fn start_iteration(&mut self, last_dr2: Option<f64>) -> f64 {
        if let Some(dr2) = last_dr2 {
            self.ethr = self.ethr.min(0.1 * dr2 / self.nelec).max(ETHR_MIN);
        }

        self.ethr
    }

    /// Decides after pass `n_retries` (0 for the first) whether the eigenvalue
    /// error may dominate `dr2`. A retry always asks for a strictly smaller ethr.
    pub fn decide(&mut self, dr2: f64, n_retries: usize) -> ThresholdDecision {
        if n_retries >= MAX_RETRIES || dr2 >= self.ethr * self.nelec {
            return ThresholdDecision::Proceed;
        }

        let lowered = (0.1 * dr2 / self.nelec).max(ETHR_MIN);

        if lowered < self.ethr {
            self.ethr = lowered;

            ThresholdDecision::RetryWithThreshold(lowered)
        } else {
            ThresholdDecision::Proceed
        }
    }
}
