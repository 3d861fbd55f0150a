mod observer;
pub use observer::*;

mod potential;
pub use potential::*;

mod report;
pub use report::*;

mod state;
pub use state::*;

mod threshold;
pub use threshold::*;

use control::{ConfigurationError, Control};
use crystal::Crystal;
use density::DensityBuilder;
use dwconsts::*;
use eigensolver::EigenSolverError;
use energy::EnergyTerms;
use ewald::Ewald;
use fermilevel::{FermiLevel, FermiLevelError};
use gvector::GVector;
use kscf::{SolverContext, WarmStartError, KSCF};
use mixing::{Mixing, MixingError};
use ndarray::Array3;
use num_traits::identities::Zero;
use pspot::{PSPot, PspError};
use pwdensity::PWDensity;
use rgtransform::RGTransform;
use symmetry::SymmetryDriver;
use thiserror::Error;
use types::c64;

#[derive(Debug, Error)]
pub enum SCFError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Psp(#[from] PspError),

    #[error(transparent)]
    Potential(#[from] PotentialError),

    #[error(transparent)]
    Mixing(#[from] MixingError),

    #[error(transparent)]
    Fermi(#[from] FermiLevelError),

    #[error(transparent)]
    WarmStart(#[from] WarmStartError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("iteration {iter}, k-point {ik}: {source}")]
    Eigensolver {
        iter: usize,
        ik: usize,
        #[source]
        source: EigenSolverError,
    },

    #[error(
        "scf not converged after {} iterations, estimated accuracy {:.3E} Ry",
        .0.n_iter,
        .0.accuracy * HA_TO_RY
    )]
    SCFNonConvergence(Box<SCFFailure>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SCFPhase {
    Init,
    Iterating(usize),
    Converged,
    Failed,
}

/// Drives the self-consistent field iterations for one ionic configuration.
///
/// Each iteration diagonalizes H[rho_in] at all k-points, builds rho_out
/// from the occupied states and mixes the two into the next rho_in. The
/// potential of the next iteration is always built from the mixed density.
pub struct SCFDriver<'a> {
    control: &'a Control,
    gvec: &'a GVector,
    pwden: &'a PWDensity,
    rgtrans: &'a RGTransform,
    crystal: &'a Crystal,
    pots: &'a PSPot,
    symmetry: &'a dyn SymmetryDriver,
    observer: &'a dyn SCFObserver,

    potential: PotentialBuilder<'a>,
    fermi: Box<dyn FermiLevel>,
    mixing: Box<dyn Mixing>,
    augmentation: Vec<Vec<c64>>,

    nelec: f64,
    ewald: f64,
    phase: SCFPhase,
}

impl<'a> SCFDriver<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        control: &'a Control,
        crystal: &'a Crystal,
        pots: &'a PSPot,
        gvec: &'a GVector,
        pwden: &'a PWDensity,
        rgtrans: &'a RGTransform,
        symmetry: &'a dyn SymmetryDriver,
        observer: &'a dyn SCFObserver,
    ) -> Result<SCFDriver<'a>, SCFError> {
        control.validate()?;

        let nelec = match control.get_nelec() {
            Some(n) => n,
            None => crystal.get_n_total_electrons(pots)?,
        };

        let zions = crystal.get_zions(pots)?;
        let ewald = Ewald::new(crystal, &zions, gvec, pwden).get_energy();

        let potential = PotentialBuilder::new(pots, crystal, gvec, pwden, rgtrans, control.get_xc_scheme())?;

        let fermi = fermilevel::new(control.get_smearing_scheme(), control.get_temperature());

        let mixing = mixing::new(control)?;

        Ok(SCFDriver {
            control,
            gvec,
            pwden,
            rgtrans,
            crystal,
            pots,
            symmetry,
            observer,
            potential,
            fermi,
            mixing,
            augmentation: Vec::new(),
            nelec,
            ewald,
            phase: SCFPhase::Init,
        })
    }

    /// Additive charges per atomic site, added to every output density.
    pub fn set_augmentation(&mut self, augmentation: Vec<Vec<c64>>) {
        self.augmentation = augmentation;
    }

    pub fn get_phase(&self) -> SCFPhase {
        self.phase
    }

    pub fn get_nelec(&self) -> f64 {
        self.nelec
    }

    pub fn get_ewald_energy(&self) -> f64 {
        self.ewald
    }

    /// Starting density and wavefunctions: a saved state if given, otherwise
    /// the superposition of atomic densities and seeded random vectors.
    pub fn initialize(
        &mut self,
        kscfs: &[KSCF],
        saved: Option<SCFState>,
    ) -> Result<(SolverContext, Density), SCFError> {
        let shape = self.rgtrans.get_fft_shape();
        let npw_rho = self.pwden.get_n_plane_waves();

        self.phase = SCFPhase::Init;
        self.mixing.reset();

        // the eigensolver needs at least nband plane waves at every k-point
        if let Some(kscf) = kscfs.iter().find(|k| k.get_nbands() > k.get_n_plane_waves()) {
            return Err(ConfigurationError::OutOfRange {
                key: "nband",
                value: format!("{} (k-point {} has {} plane waves)", kscf.get_nbands(), kscf.get_ik(), kscf.get_n_plane_waves()),
                reason: "more bands than plane waves, raise ecut_wfc",
            }
            .into());
        }

        let mut rho_3d = Array3::<c64>::new(shape);

        let (ctx, rhog) = match saved {
            Some(state) => {
                if state.get_n_plane_waves_rho() != npw_rho {
                    return Err(StateError::Mismatch(format!(
                        "density has {} coefficients, run has {}",
                        state.get_n_plane_waves_rho(),
                        npw_rho
                    ))
                    .into());
                }

                if (state.get_nelec() - self.nelec).abs() > EPS8 {
                    log::warn!(
                        "saved state holds {} electrons, run has {}",
                        state.get_nelec(),
                        self.nelec
                    );
                }

                let (rhog, blocks) = state.into_parts();

                let ctx = SolverContext::from_wavefunctions(kscfs, blocks)?;

                self.rgtrans
                    .g1d_to_r3d(self.gvec, self.pwden, &rhog, rho_3d.as_mut_slice());

                log::info!("   warm start from saved density and wavefunctions");

                (ctx, rhog)
            }

            None => {
                let mut rhog = vec![c64::zero(); npw_rho];

                density::from_atomic_super_position(
                    self.pots,
                    self.crystal,
                    self.rgtrans,
                    self.gvec,
                    self.pwden,
                    self.nelec,
                    &mut rhog,
                    &mut rho_3d,
                )?;

                let nband = kscfs.first().map_or(0, |k| k.get_nbands());

                let ctx = SolverContext::new_random(kscfs, nband, self.control.get_random_seed());

                log::info!("   construct charge density from constituent atoms");

                (ctx, rhog)
            }
        };

        Ok((ctx, Density { rhog, rho_3d }))
    }

    /// Iterates to self-consistency starting from `density`.
    ///
    /// Returns the report of the converged run, or `SCFNonConvergence` with the
    /// last accuracy once `scf_max_iter` iterations are spent.
    pub fn run(
        &mut self,
        kscfs: &mut [KSCF],
        ctx: &mut SolverContext,
        density: Density,
    ) -> Result<SCFReport, SCFError> {
        let Density {
            rhog: mut rhog_in,
            rho_3d: mut rho_in_3d,
        } = density;

        let shape = self.rgtrans.get_fft_shape();
        let npw_rho = self.pwden.get_n_plane_waves();
        let volume = self.crystal.get_latt().volume();
        let max_iter = self.control.get_scf_max_iter();
        let conv_thr = self.control.get_scf_conv_thr();

        let builder = DensityBuilder::new(self.rgtrans, self.gvec, self.pwden, self.symmetry, volume);

        let mut threshold = AdaptiveThreshold::new(self.control.get_diago_thr_init(), self.nelec);

        let mut rhog_out = vec![c64::zero(); npw_rho];
        let mut rho_out_3d = Array3::<c64>::new(shape);

        let mut records: Vec<IterationRecord> = Vec::new();
        let mut warnings: Vec<SCFWarning> = Vec::new();
        let mut last_dr2: Option<f64> = None;

        // potential of the starting density

        let mut pot = timed(self.observer, "v_loc", || self.potential.build(&rhog_in, &rho_in_3d));

        log::info!("");
        log::info!("   {:*^88}", " self-consistent field ");
        log::info!("");
        IterationRecord::display_header();

        for iter in 1..=max_iter {
            self.phase = SCFPhase::Iterating(iter);

            let mix_history_len = self.mixing.get_history_len();

            let mut ethr = threshold.start_iteration(last_dr2);
            let mut passes: Vec<f64> = Vec::new();
            let mut diag_iter = 0.0;
            let mut n_hpsi = 0;

            // diagonalize, occupy and build rho_out; retried with a lower ethr
            // on the same potential while the density error is below what ethr allows

            let (fermi_level, check, dr2) = loop {
                passes.push(ethr);

                let report = timed(self.observer, "diagonalize", || {
                    kscf::diagonalize_all(kscfs, ctx, self.rgtrans, &pot.vloc_3d, ethr)
                });

                self.observer.add_count("h_psi", report.get_total_hpsi());
                self.observer.add_count("diagonalize", kscfs.len());

                diag_iter += report.get_average_iterations();
                n_hpsi += report.get_total_hpsi();

                for (ik, err) in report.failures.into_iter() {
                    let degraded = match &err {
                        EigenSolverError::NonConvergence { max_residual, .. } => Some(*max_residual),
                        _ => None,
                    };

                    match degraded {
                        Some(max_residual) if !self.control.get_diago_abort_on_failure() => {
                            warnings.push(SCFWarning::EigensolverDegraded { iter, ik, max_residual });
                        }

                        _ => {
                            self.phase = SCFPhase::Failed;

                            return Err(SCFError::Eigensolver { iter, ik, source: err });
                        }
                    }
                }

                let fermi_level = self
                    .fermi
                    .set_occupations(kscfs, &ctx.get_evals_table(), self.nelec)?;

                let check = timed(self.observer, "density", || {
                    builder.build(kscfs, ctx, &self.augmentation, self.nelec, &mut rhog_out, &mut rho_out_3d)
                });

                let dr2 = density::get_scf_accuracy_estimate(&rhog_in, &rhog_out, self.pwden, volume);

                match threshold.decide(dr2, passes.len() - 1) {
                    ThresholdDecision::Proceed => break (fermi_level, check, dr2),

                    ThresholdDecision::RetryWithThreshold(lowered) => {
                        log::info!("");
                        log::info!("     threshold (ethr) on eigenvalues was too large:");
                        log::info!("     diagonalizing with lowered threshold {:.3E}", lowered);
                        log::info!("");

                        self.observer.add_count("ethr_retry", 1);

                        ethr = lowered;
                    }
                }
            };

            if !check.is_physical(self.control.get_charge_tolerance()) {
                log::warn!(
                    "iteration {}: density holds {:.6} electrons (expected {:.6}), negative {:.3E}, imaginary {:.3E}",
                    iter,
                    check.integral,
                    check.expected,
                    check.negative_charge,
                    check.imaginary_charge
                );

                warnings.push(SCFWarning::NegativeOrComplexDensity {
                    iter,
                    integral: check.integral,
                    expected: check.expected,
                    negative_charge: check.negative_charge,
                    imaginary_charge: check.imaginary_charge,
                });
            }

            // energies

            let evals = ctx.get_evals_table();

            let bands = kscf::summarize_bands(kscfs, ctx);
            let smearing = self.fermi.get_smearing_energy(kscfs, &evals, fermi_level);

            let energy_hf = EnergyTerms {
                eband: bands.eband,
                deband: -energy::integral_rho_v(volume, &rho_in_3d, &pot.vhxc_3d),
                hartree: pot.hartree,
                xc: pot.xc,
                ewald: self.ewald,
                smearing,
            };

            let energy_ks = EnergyTerms {
                eband: bands.eband,
                deband: -energy::integral_rho_v(volume, &rho_out_3d, &pot.vhxc_3d),
                hartree: self.potential.hartree_energy(&rhog_out),
                xc: self.potential.xc_energy(&rho_out_3d),
                ewald: self.ewald,
                smearing,
            };

            let converged = dr2 < conv_thr;
            let last = iter == max_iter;

            // mix once per iteration, whatever the number of diagonalization passes;
            // the mixer reports the residual norm of the iterations it mixes

            let res: Vec<c64> = rhog_out.iter().zip(rhog_in.iter()).map(|(o, i)| o - i).collect();

            let residual = if converged || last {
                mixing::get_residual_norm(&res)
            } else {
                timed(self.observer, "mixing", || {
                    self.mixing
                        .compute_next_density(self.pwden.get_g(), &mut rhog_in, &res)
                })
            };

            let record = IterationRecord {
                iter,
                ethr: passes,
                avg_diag_iter: diag_iter,
                n_hpsi,
                fermi_level,
                charge: check.integral,
                energy_ks: energy_ks.total(),
                energy_hf: energy_hf.total(),
                accuracy: dr2,
                residual,
                mix_history_len,
            };

            record.display();
            self.observer.on_iteration(&record);

            records.push(record);

            last_dr2 = Some(dr2);

            if converged {
                self.phase = SCFPhase::Converged;

                log::info!("");
                log::info!("     {:<28}", "scf_convergence_success");

                let occ = kscfs.iter().map(|k| k.get_occ().to_vec()).collect();

                return Ok(SCFReport {
                    energy: energy_ks,
                    energy_hf: energy_hf.total(),
                    fermi_level,
                    homo: bands.homo,
                    lumo: bands.lumo,
                    evals,
                    occ,
                    n_iter: iter,
                    accuracy: dr2,
                    records,
                    warnings,
                    density: Density {
                        rhog: rhog_out,
                        rho_3d: rho_out_3d,
                    },
                });
            }

            if last {
                self.phase = SCFPhase::Failed;

                log::info!("");
                log::info!("     {:<28}", "scf_convergence_failure");

                return Err(SCFError::SCFNonConvergence(Box::new(SCFFailure {
                    n_iter: iter,
                    accuracy: dr2,
                    residual,
                    energy: energy_ks,
                    energy_hf: energy_hf.total(),
                    evals,
                    records,
                    warnings,
                    density: Density {
                        rhog: rhog_out,
                        rho_3d: rho_out_3d,
                    },
                })));
            }

            // next potential from the mixed density

            self.rgtrans
                .g1d_to_r3d(self.gvec, self.pwden, &rhog_in, rho_in_3d.as_mut_slice());

            pot = timed(self.observer, "v_loc", || self.potential.build(&rhog_in, &rho_in_3d));
        }

        // max_iter >= 1 is validated, so the loop always returns
        self.phase = SCFPhase::Failed;

        Err(ConfigurationError::OutOfRange {
            key: "scf_max_iter",
            value: max_iter.to_string(),
            reason: "must be at least 1",
        }
        .into())
    }
}
