use dwconsts::*;
use energy::EnergyTerms;
use ndarray::Array3;
use types::c64;

const OUT_WIDTH1: usize = 28;

/// Input density of an SCF iteration, rho(G) on the density sphere and rho(r) on the grid.
#[derive(Debug, Clone)]
pub struct Density {
    pub rhog: Vec<c64>,
    pub rho_3d: Array3<c64>,
}

/// One row of the SCF log; energies in Hartree.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationRecord {
    pub iter: usize,
    /// ethr of every diagonalization pass, in order; more than one after a retry
    pub ethr: Vec<f64>,
    /// eigensolver iterations averaged over k-points, summed over passes
    pub avg_diag_iter: f64,
    pub n_hpsi: usize,
    pub fermi_level: f64,
    /// electrons in the output density
    pub charge: f64,
    pub energy_ks: f64,
    pub energy_hf: f64,
    /// estimated scf accuracy, dr2
    pub accuracy: f64,
    /// L2 norm of rho_out - rho_in
    pub residual: f64,
    /// mixing history when the iteration started
    pub mix_history_len: usize,
}

impl IterationRecord {
    /// Threshold the output density was built with.
    pub fn get_ethr(&self) -> f64 {
        self.ethr.last().copied().unwrap_or(0.0)
    }

    pub fn get_n_retries(&self) -> usize {
        self.ethr.len().saturating_sub(1)
    }

    pub fn display_header() {
        log::info!(
            "    {:>4} {:>10} {:>8} {:>12} {:>22} {:>22} {:>12}",
            "iter",
            "ethr",
            "avg_diag",
            "charge",
            "E_ks(Ry)",
            "E_hf(Ry)",
            "accuracy(Ry)"
        );
    }

    pub fn display(&self) {
        log::info!(
            "    {:>4} {:>10.3E} {:>8.1} {:>12.6} {:>22.10} {:>22.10} {:>12.3E}",
            self.iter,
            self.get_ethr(),
            self.avg_diag_iter,
            self.charge,
            self.energy_ks * HA_TO_RY,
            self.energy_hf * HA_TO_RY,
            self.accuracy * HA_TO_RY
        );
    }
}

/// Anomalies that do not stop the run.
#[derive(Debug, Clone, PartialEq)]
pub enum SCFWarning {
    /// The output density is not a real, non-negative charge of the right size.
    NegativeOrComplexDensity {
        iter: usize,
        integral: f64,
        expected: f64,
        negative_charge: f64,
        imaginary_charge: f64,
    },

    /// The eigensolver stopped short of ethr; the best vectors were kept.
    EigensolverDegraded {
        iter: usize,
        ik: usize,
        max_residual: f64,
    },
}

/// Outcome of a converged run.
#[derive(Debug, Clone)]
pub struct SCFReport {
    /// Kohn-Sham energy terms of the last iteration
    pub energy: EnergyTerms,
    pub energy_hf: f64,
    pub fermi_level: f64,
    pub homo: f64,
    pub lumo: Option<f64>,
    /// eigenvalues per k-point in sample order, ascending
    pub evals: Vec<Vec<f64>>,
    pub occ: Vec<Vec<f64>>,
    pub n_iter: usize,
    pub accuracy: f64,
    pub records: Vec<IterationRecord>,
    pub warnings: Vec<SCFWarning>,
    /// output density of the last iteration
    pub density: Density,
}

impl SCFReport {
    pub fn get_total_energy(&self) -> f64 {
        self.energy.total()
    }

    pub fn display(&self) {
        log::info!("");

        for (ik, (evals, occ)) in self.evals.iter().zip(self.occ.iter()).enumerate() {
            display_eigen_values(ik, evals, occ);
        }

        log::info!("");
        log::info!("     {:<width$} = {:16.6} eV", "highest occupied level", self.homo * HA_TO_EV, width = OUT_WIDTH1);

        if let Some(lumo) = self.lumo {
            log::info!("     {:<width$} = {:16.6} eV", "lowest unoccupied level", lumo * HA_TO_EV, width = OUT_WIDTH1);
        }

        log::info!("     {:<width$} = {:16.6} eV", "Fermi level", self.fermi_level * HA_TO_EV, width = OUT_WIDTH1);

        self.energy.display("total energy");

        log::info!("");
        log::info!("     {:<width$} = {:22.10} Ry", "Harris-Foulkes estimate", self.energy_hf * HA_TO_RY, width = OUT_WIDTH1);
        log::info!("     {:<width$} = {:22.3E} Ry", "estimated scf accuracy", self.accuracy * HA_TO_RY, width = OUT_WIDTH1);
        log::info!("");
        log::info!("     convergence has been achieved in {} iterations", self.n_iter);

        for w in self.warnings.iter() {
            log::warn!("     {:?}", w);
        }
    }
}

/// State of the run when the iteration budget ran out.
#[derive(Debug, Clone)]
pub struct SCFFailure {
    pub n_iter: usize,
    pub accuracy: f64,
    pub residual: f64,
    pub energy: EnergyTerms,
    pub energy_hf: f64,
    pub evals: Vec<Vec<f64>>,
    pub records: Vec<IterationRecord>,
    pub warnings: Vec<SCFWarning>,
    /// output density of the last iteration
    pub density: Density,
}

pub fn display_eigen_values(ik: usize, evals: &[f64], occ: &[f64]) {
    log::info!("");
    log::info!("   kpoint-{} nband = {}", ik + 1, evals.len());
    log::info!("");

    for (i, (e, f)) in evals.iter().zip(occ.iter()).enumerate() {
        log::info!("       {:<6} {:16.6} {:12.6}", i + 1, e * HA_TO_EV, f);
    }
}
