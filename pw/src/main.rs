use anyhow::Context;
use clap::Parser;
use control::Control;
use crystal::Crystal;
use dwconsts::*;
use fftgrid::FFTGrid;
use gvector::GVector;
use kpts::KPTS;
use kscf::KSCF;
use pspot::PSPot;
use pwbasis::PWBasis;
use pwdensity::PWDensity;
use rgtransform::RGTransform;
use scf::{Instrumentation, SCFDriver, SCFError, SCFState};
use std::path::{Path, PathBuf};
use symmetry::{SymmetryDriver, SymmetryOps};
use vnl::VNL;

#[derive(Debug, Parser)]
#[command(name = "pw")]
#[command(about = "Plane-wave Kohn-Sham self-consistent field")]
struct Cli {
    /// Run parameters
    #[arg(long, value_name = "path", default_value = "in.ctrl")]
    control: PathBuf,

    /// Lattice and atomic positions
    #[arg(long, value_name = "path", default_value = "in.crystal")]
    crystal: PathBuf,

    /// 'specie file' lines naming the pseudopotentials
    #[arg(long, value_name = "path", default_value = "in.pot")]
    pot: PathBuf,

    /// Directory of the pseudopotential files
    #[arg(long, value_name = "path", default_value = ".")]
    pot_dir: PathBuf,

    /// k-point mesh or list; in.kmesh or in.kpts by default
    #[arg(long, value_name = "path")]
    kpts: Option<PathBuf>,

    /// Symmetry operations, used when symmetry = true; in.sym by default
    #[arg(long, value_name = "path")]
    symmetry: Option<PathBuf>,

    /// Overrides scf_max_iter
    #[arg(long)]
    max_iter: Option<usize>,

    /// Overrides random_seed
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .target(env_logger::Target::Stdout)
        .format_timestamp(None)
        .format_target(false)
        .init();

    let cli = Cli::parse();

    let stopwatch_main = std::time::Instant::now();

    let instrumentation = Instrumentation::new();

    let result = run(&cli, &instrumentation);

    instrumentation.display();

    let elapsed_main_seconds = stopwatch_main.elapsed().as_secs_f64();
    log::info!(
        "   {:16}{:5}{:16.2} seconds {:16.2} hours",
        "Total",
        ":",
        elapsed_main_seconds,
        elapsed_main_seconds / 3600.0
    );

    result
}

fn run(cli: &Cli, instrumentation: &Instrumentation) -> anyhow::Result<()> {
    // control parameters

    let mut control = Control::from_file(&cli.control)?;

    if let Some(n) = cli.max_iter {
        control.set_scf_max_iter(n);
    }

    if let Some(seed) = cli.seed {
        control.set_random_seed(seed);
    }

    control.validate()?;
    control.display();

    // crystal and pseudopotentials

    let crystal = Crystal::from_file(&cli.crystal)?;
    crystal.display();

    let pots = PSPot::new(&cli.pot, &cli.pot_dir)?;
    pots.display();

    // k-points

    let default_kfile = match control.get_kpts_scheme() {
        "klist" => "in.kpts",
        _ => "in.kmesh",
    };

    let kfile = cli.kpts.clone().unwrap_or_else(|| PathBuf::from(default_kfile));

    let kpts = kpts::new(control.get_kpts_scheme(), &kfile)?;
    kpts.display();

    // symmetry

    let symdrv: Box<dyn SymmetryDriver> = if control.get_symmetry() {
        let symfile = cli.symmetry.clone().unwrap_or_else(|| PathBuf::from("in.sym"));

        let ops = SymmetryOps::from_file(&symfile)?;

        // the operations have to map the crystal onto itself
        ops.get_sym_atom(&crystal)?;

        Box::new(ops)
    } else {
        Box::new(SymmetryOps::identity())
    };

    symdrv.display();

    // grids

    let fftgrid = FFTGrid::new(crystal.get_latt(), control.get_ecutrho());
    let fft_shape = fftgrid.get_size();

    log::info!("   FFTGrid : {}", fftgrid);

    let rgtrans = RGTransform::new(fft_shape[0], fft_shape[1], fft_shape[2]);

    let gvec = GVector::new(crystal.get_latt(), fft_shape);

    let pwden = PWDensity::new(control.get_ecutrho(), &gvec);

    log::info!("   npw_rho = {}", pwden.get_n_plane_waves());

    // driver

    let mut driver = SCFDriver::new(
        &control,
        &crystal,
        &pots,
        &gvec,
        &pwden,
        &rgtrans,
        symdrv.as_ref(),
        instrumentation,
    )?;

    let nelec = driver.get_nelec();
    let nband = control.get_nband_for(nelec);

    log::info!("   nelec = {:.6}  nband = {}", nelec, nband);
    log::info!("   Ewald = {:.12} Ry", driver.get_ewald_energy() * HA_TO_RY);

    // per-k bases and projectors

    let blatt = crystal.get_latt().reciprocal();
    let nkpt = kpts.get_n_kpts();

    let mut vpwwfc = Vec::<PWBasis>::with_capacity(nkpt);
    let mut vvnl = Vec::<VNL>::with_capacity(nkpt);

    for ik in 0..nkpt {
        let k_cart = kpts.frac_to_cart(&kpts.get_k_frac(ik), &blatt);

        let pwwfc = PWBasis::new(k_cart, ik, control.get_ecut(), &gvec);

        vvnl.push(VNL::new(ik, &pots, &pwwfc, &gvec, &crystal)?);
        vpwwfc.push(pwwfc);
    }

    let volume = crystal.get_latt().volume();

    let mut vkscf: Vec<KSCF> = vpwwfc
        .iter()
        .zip(vvnl.iter())
        .enumerate()
        .map(|(ik, (pwwfc, vnl))| {
            KSCF::new(
                &control,
                &gvec,
                pwwfc,
                vnl,
                fft_shape,
                volume,
                nband,
                ik,
                kpts.get_k_weight(ik),
            )
        })
        .collect();

    // starting point

    let state_file = Path::new(control.get_state_file());

    let saved = if control.get_restart() {
        Some(SCFState::load(state_file)?)
    } else {
        None
    };

    let (mut ctx, density) = driver.initialize(&vkscf, saved)?;

    log::info!(
        "   initial_charge = {:.8}",
        density.rhog.first().map_or(0.0, |x| x.re) * volume
    );

    // self-consistent field

    match driver.run(&mut vkscf, &mut ctx, density) {
        Ok(report) => {
            report.display();

            if control.get_save_state() {
                SCFState::new(nelec, &report.density.rhog, &ctx).save(state_file)?;
            }

            Ok(())
        }

        Err(SCFError::SCFNonConvergence(failure)) => {
            log::error!(
                "   scf did not converge in {} iterations: estimated scf accuracy {:.3E} Ry, residual {:.3E}, E_ks {:.10} Ry",
                failure.n_iter,
                failure.accuracy * HA_TO_RY,
                failure.residual,
                failure.energy.total() * HA_TO_RY
            );

            if control.get_save_state() {
                SCFState::new(nelec, &failure.density.rhog, &ctx).save(state_file)?;
            }

            Err(SCFError::SCFNonConvergence(failure)).context("self-consistent field")
        }

        Err(e) => Err(e).context("self-consistent field"),
    }
}
