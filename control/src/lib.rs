use dwconsts::*;

use std::{
    fs,
    path::{Path, PathBuf},
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("cannot read control file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: unknown parameter '{key}'")]
    UnknownParameter { line: usize, key: String },

    #[error("line {line}: '{value}' is not a valid value for {key}")]
    InvalidValue {
        line: usize,
        key: String,
        value: String,
    },

    #[error("{key} = {value}: {reason}")]
    OutOfRange {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Run parameters read from `in.ctrl`.
///
/// Energies in the file are given in Rydberg and stored in Hartree.
#[derive(Debug, Clone)]
pub struct Control {
    ecut_wfc: f64,
    ecut_rho: f64,
    nband: usize,
    nelec: Option<f64>,

    scf_max_iter: usize,
    scf_conv_thr: f64,
    scf_rho_mix_scheme: String,
    scf_rho_mix_beta: f64,
    scf_rho_mix_history_steps: usize,
    scf_rho_mix_pulay_metric_weight: f64,

    eigen_solver: String,
    diago_thr_init: f64,
    diago_max_iter: usize,
    diago_abort_on_failure: bool,

    smearing_scheme: String,
    temperature: f64,
    xc_scheme: String,
    kpts_scheme: String,
    symmetry: bool,

    random_seed: u64,
    charge_tolerance: f64,

    restart: bool,
    save_state: bool,
    state_file: String,
}

impl Default for Control {
    fn default() -> Self {
        Control {
            ecut_wfc: 0.0,
            ecut_rho: 0.0,
            nband: 0,
            nelec: None,

            scf_max_iter: 100,
            scf_conv_thr: EPS6 * RY_TO_HA,
            scf_rho_mix_scheme: "broyden".to_string(),
            scf_rho_mix_beta: 0.7,
            scf_rho_mix_history_steps: 8,
            scf_rho_mix_pulay_metric_weight: 20.0,

            eigen_solver: "davidson".to_string(),
            diago_thr_init: EPS2,
            diago_max_iter: 100,
            diago_abort_on_failure: false,

            smearing_scheme: "fixed".to_string(),
            temperature: 0.0,
            xc_scheme: "lda-pz".to_string(),
            kpts_scheme: "kmesh".to_string(),
            symmetry: false,

            random_seed: 0,
            charge_tolerance: EPS3,

            restart: false,
            save_state: false,
            state_file: "out.scf.state".to_string(),
        }
    }
}

const MIX_SCHEMES: [&str; 3] = ["linear", "broyden", "pulay"];
const EIGEN_SOLVERS: [&str; 2] = ["davidson", "pcg"];
const SMEARING_SCHEMES: [&str; 5] = ["fixed", "fd", "gs", "mp1", "mp2"];
const XC_SCHEMES: [&str; 2] = ["lda-pz", "lda-x"];
const KPTS_SCHEMES: [&str; 2] = ["kmesh", "klist"];

impl Control {
    pub fn new() -> Control {
        Control::default()
    }

    pub fn from_file(inpfile: &Path) -> Result<Control, ConfigurationError> {
        let content = fs::read_to_string(inpfile).map_err(|source| ConfigurationError::Io {
            path: inpfile.to_path_buf(),
            source,
        })?;

        Control::from_str(&content)
    }

    /// Parses `key = value` lines; `#` starts a comment. The result is validated.
    pub fn from_str(content: &str) -> Result<Control, ConfigurationError> {
        let mut control = Control::default();

        let mut b_ecut_rho_set = false;

        for (iline, raw) in content.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or("").trim();

            if line.is_empty() {
                continue;
            }

            let s: Vec<&str> = line.splitn(2, '=').map(|x| x.trim()).collect();

            let key = s[0];
            let value = s.get(1).copied().unwrap_or("");

            let p = Field {
                line: iline + 1,
                key,
                value,
            };

            match key {
                "ecut_wfc" => control.ecut_wfc = p.parse::<f64>()? * RY_TO_HA,

                "ecut_rho" => {
                    control.ecut_rho = p.parse::<f64>()? * RY_TO_HA;
                    b_ecut_rho_set = true;
                }

                "nband" => control.nband = p.parse()?,

                "nelec" => control.nelec = Some(p.parse()?),

                "scf_max_iter" => control.scf_max_iter = p.parse()?,

                "scf_conv_thr" => control.scf_conv_thr = p.parse::<f64>()? * RY_TO_HA,

                "scf_rho_mix_scheme" => control.scf_rho_mix_scheme = p.parse_choice(&MIX_SCHEMES)?,

                "scf_rho_mix_beta" => control.scf_rho_mix_beta = p.parse()?,

                "scf_rho_mix_history_steps" => control.scf_rho_mix_history_steps = p.parse()?,

                "scf_rho_mix_pulay_metric_weight" => control.scf_rho_mix_pulay_metric_weight = p.parse()?,

                "eigen_solver" => control.eigen_solver = p.parse_choice(&EIGEN_SOLVERS)?,

                "diago_thr_init" => control.diago_thr_init = p.parse()?,

                "diago_max_iter" => control.diago_max_iter = p.parse()?,

                "diago_abort_on_failure" => control.diago_abort_on_failure = p.parse()?,

                "smearing_scheme" => control.smearing_scheme = p.parse_choice(&SMEARING_SCHEMES)?,

                "temperature" => control.temperature = p.parse()?,

                "xc_scheme" => control.xc_scheme = p.parse_choice(&XC_SCHEMES)?,

                "kpts_scheme" => control.kpts_scheme = p.parse_choice(&KPTS_SCHEMES)?,

                "symmetry" => control.symmetry = p.parse()?,

                "random_seed" => control.random_seed = p.parse()?,

                "charge_tolerance" => control.charge_tolerance = p.parse()?,

                "restart" => control.restart = p.parse()?,

                "save_state" => control.save_state = p.parse()?,

                "state_file" => control.state_file = p.parse()?,

                _ => {
                    return Err(ConfigurationError::UnknownParameter {
                        line: p.line,
                        key: key.to_string(),
                    })
                }
            }
        }

        // 4 * ecut_wfc is enough for norm-conserving pseudopotentials

        if !b_ecut_rho_set {
            control.ecut_rho = 4.0 * control.ecut_wfc;
        }

        control.validate()?;

        Ok(control)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        fn out_of_range<T: ToString>(key: &'static str, value: T, reason: &'static str) -> ConfigurationError {
            ConfigurationError::OutOfRange {
                key,
                value: value.to_string(),
                reason,
            }
        }

        if !(self.ecut_wfc > 0.0) {
            return Err(out_of_range("ecut_wfc", self.ecut_wfc * HA_TO_RY, "cutoff must be positive"));
        }

        if self.ecut_rho < self.ecut_wfc {
            return Err(out_of_range("ecut_rho", self.ecut_rho * HA_TO_RY, "must not be smaller than ecut_wfc"));
        }

        if !(self.scf_rho_mix_beta > 0.0 && self.scf_rho_mix_beta <= 1.0) {
            return Err(out_of_range("scf_rho_mix_beta", self.scf_rho_mix_beta, "must lie in (0, 1]"));
        }

        if self.scf_rho_mix_history_steps == 0 && self.scf_rho_mix_scheme != "linear" {
            return Err(out_of_range(
                "scf_rho_mix_history_steps",
                self.scf_rho_mix_history_steps,
                "history mixing needs at least one step",
            ));
        }

        if self.scf_rho_mix_pulay_metric_weight < 0.0 {
            return Err(out_of_range(
                "scf_rho_mix_pulay_metric_weight",
                self.scf_rho_mix_pulay_metric_weight,
                "must not be negative",
            ));
        }

        if self.scf_max_iter == 0 {
            return Err(out_of_range("scf_max_iter", self.scf_max_iter, "must be at least 1"));
        }

        if !(self.scf_conv_thr > 0.0) {
            return Err(out_of_range("scf_conv_thr", self.scf_conv_thr * HA_TO_RY, "must be positive"));
        }

        if !(self.diago_thr_init > 0.0) {
            return Err(out_of_range("diago_thr_init", self.diago_thr_init, "must be positive"));
        }

        if self.diago_max_iter == 0 {
            return Err(out_of_range("diago_max_iter", self.diago_max_iter, "must be at least 1"));
        }

        if let Some(nelec) = self.nelec {
            if !(nelec > 0.0) {
                return Err(out_of_range("nelec", nelec, "electron count must be positive"));
            }
        }

        if self.temperature < 0.0 {
            return Err(out_of_range("temperature", self.temperature, "must not be negative"));
        }

        if self.smearing_scheme != "fixed" && !(self.temperature > 0.0) {
            return Err(out_of_range("temperature", self.temperature, "smeared occupations need a positive temperature"));
        }

        if !(self.charge_tolerance > 0.0) {
            return Err(out_of_range("charge_tolerance", self.charge_tolerance, "must be positive"));
        }

        Ok(())
    }

    /// Number of bands for `nelec` electrons; an explicit `nband` wins.
    ///
    /// Insulators get the occupied bands only, smeared runs 20% extra (at least 4).
    pub fn get_nband_for(&self, nelec: f64) -> usize {
        if self.nband > 0 {
            return self.nband;
        }

        let nocc = (nelec / 2.0).ceil() as usize;

        if self.is_fixed_occupation() {
            nocc.max(1)
        } else {
            ((1.2 * nocc as f64).ceil() as usize).max(nocc + 4)
        }
    }

    /// Hartree
    pub fn get_ecut(&self) -> f64 {
        self.ecut_wfc
    }

    /// Hartree
    pub fn get_ecutrho(&self) -> f64 {
        self.ecut_rho
    }

    pub fn get_nband(&self) -> usize {
        self.nband
    }

    pub fn get_nelec(&self) -> Option<f64> {
        self.nelec
    }

    pub fn get_scf_max_iter(&self) -> usize {
        self.scf_max_iter
    }

    /// Hartree
    pub fn get_scf_conv_thr(&self) -> f64 {
        self.scf_conv_thr
    }

    pub fn get_scf_rho_mix_scheme(&self) -> &str {
        &self.scf_rho_mix_scheme
    }

    pub fn get_scf_rho_mix_beta(&self) -> f64 {
        self.scf_rho_mix_beta
    }

    pub fn get_scf_rho_mix_history_steps(&self) -> usize {
        self.scf_rho_mix_history_steps
    }

    /// q0^2 of the Pulay metric (q0^2 + q^2) / q^2, in 1/bohr^2.
    pub fn get_scf_rho_mix_pulay_metric_weight(&self) -> f64 {
        self.scf_rho_mix_pulay_metric_weight
    }

    pub fn get_eigen_solver(&self) -> &str {
        &self.eigen_solver
    }

    pub fn get_diago_thr_init(&self) -> f64 {
        self.diago_thr_init
    }

    pub fn get_diago_max_iter(&self) -> usize {
        self.diago_max_iter
    }

    pub fn get_diago_abort_on_failure(&self) -> bool {
        self.diago_abort_on_failure
    }

    pub fn get_smearing_scheme(&self) -> &str {
        &self.smearing_scheme
    }

    pub fn is_fixed_occupation(&self) -> bool {
        self.smearing_scheme == "fixed"
    }

    /// Kelvin
    pub fn get_temperature(&self) -> f64 {
        self.temperature
    }

    pub fn get_xc_scheme(&self) -> &str {
        &self.xc_scheme
    }

    pub fn get_kpts_scheme(&self) -> &str {
        &self.kpts_scheme
    }

    pub fn get_symmetry(&self) -> bool {
        self.symmetry
    }

    pub fn get_random_seed(&self) -> u64 {
        self.random_seed
    }

    pub fn get_charge_tolerance(&self) -> f64 {
        self.charge_tolerance
    }

    pub fn get_restart(&self) -> bool {
        self.restart
    }

    pub fn get_save_state(&self) -> bool {
        self.save_state
    }

    pub fn get_state_file(&self) -> &str {
        &self.state_file
    }

    pub fn set_scf_max_iter(&mut self, n: usize) {
        self.scf_max_iter = n;
    }

    pub fn set_random_seed(&mut self, seed: u64) {
        self.random_seed = seed;
    }

    pub fn display(&self) {
        const OUT_WIDTH1: usize = 28;
        const OUT_WIDTH2: usize = 18;

        log::info!("   {:-^80}", " control parameters ");

        let rows: Vec<(&str, String, &str)> = vec![
            ("ecut_wfc", format!("{:.3}", self.ecut_wfc * HA_TO_RY), "Ry"),
            ("ecut_rho", format!("{:.3}", self.ecut_rho * HA_TO_RY), "Ry"),
            ("nband", self.nband.to_string(), ""),
            ("scf_max_iter", self.scf_max_iter.to_string(), ""),
            ("scf_conv_thr", format!("{:.3E}", self.scf_conv_thr * HA_TO_RY), "Ry"),
            ("scf_rho_mix_scheme", self.scf_rho_mix_scheme.clone(), ""),
            ("scf_rho_mix_beta", self.scf_rho_mix_beta.to_string(), ""),
            ("scf_rho_mix_history_steps", self.scf_rho_mix_history_steps.to_string(), ""),
            ("eigen_solver", self.eigen_solver.clone(), ""),
            ("diago_thr_init", format!("{:.3E}", self.diago_thr_init), ""),
            ("diago_max_iter", self.diago_max_iter.to_string(), ""),
            ("smearing_scheme", self.smearing_scheme.clone(), ""),
            ("temperature", self.temperature.to_string(), "K"),
            ("xc_scheme", self.xc_scheme.clone(), ""),
            ("kpts_scheme", self.kpts_scheme.clone(), ""),
            ("symmetry", self.symmetry.to_string(), ""),
            ("random_seed", self.random_seed.to_string(), ""),
            ("restart", self.restart.to_string(), ""),
        ];

        for (key, value, unit) in rows.iter() {
            log::info!(
                "   {:<width1$} = {:>width2$} {}",
                key,
                value,
                unit,
                width1 = OUT_WIDTH1,
                width2 = OUT_WIDTH2
            );
        }
    }
}

struct Field<'a> {
    line: usize,
    key: &'a str,
    value: &'a str,
}

impl<'a> Field<'a> {
    fn parse<T: std::str::FromStr>(&self) -> Result<T, ConfigurationError> {
        self.value.parse::<T>().map_err(|_| self.invalid())
    }

    fn parse_choice(&self, choices: &[&str]) -> Result<String, ConfigurationError> {
        let v = self.value.to_lowercase();

        if choices.contains(&v.as_str()) {
            Ok(v)
        } else {
            Err(self.invalid())
        }
    }

    fn invalid(&self) -> ConfigurationError {
        ConfigurationError::InvalidValue {
            line: self.line,
            key: self.key.to_string(),
            value: self.value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_convert_units() {
        let control = Control::from_str(
            "# silicon
             ecut_wfc = 40.0
             scf_conv_thr = 1e-6   # Ry
             scf_rho_mix_beta = 0.7
             scf_rho_mix_history_steps = 8
             eigen_solver = Davidson
             random_seed = 42",
        )
        .unwrap();

        assert!((control.get_ecut() - 20.0).abs() < 1E-12);
        assert!((control.get_ecutrho() - 80.0).abs() < 1E-12);
        assert!((control.get_scf_conv_thr() - 5E-7).abs() < 1E-18);
        assert_eq!(control.get_eigen_solver(), "davidson");
        assert_eq!(control.get_scf_rho_mix_scheme(), "broyden");
        assert_eq!(control.get_random_seed(), 42);
        assert_eq!(control.get_nband_for(8.0), 4);
    }

    #[test]
    fn test_reject_bad_beta() {
        for beta in ["0.0", "1.5", "-0.2"].iter() {
            let err = Control::from_str(&format!("ecut_wfc = 20\nscf_rho_mix_beta = {}", beta)).unwrap_err();

            assert!(matches!(
                err,
                ConfigurationError::OutOfRange {
                    key: "scf_rho_mix_beta",
                    ..
                }
            ));
        }

        assert!(Control::from_str("ecut_wfc = 20\nscf_rho_mix_beta = 1.0").is_ok());
    }

    #[test]
    fn test_reject_non_positive_cutoff() {
        assert!(matches!(
            Control::from_str("ecut_wfc = 0"),
            Err(ConfigurationError::OutOfRange { key: "ecut_wfc", .. })
        ));

        assert!(matches!(
            Control::from_str("scf_max_iter = 10"),
            Err(ConfigurationError::OutOfRange { key: "ecut_wfc", .. })
        ));
    }

    #[test]
    fn test_reject_unknown_and_malformed_lines() {
        assert!(matches!(
            Control::from_str("ecut_wfc = 20\nspin_scheme = spin"),
            Err(ConfigurationError::UnknownParameter { line: 2, .. })
        ));

        assert!(matches!(
            Control::from_str("ecut_wfc = twenty"),
            Err(ConfigurationError::InvalidValue { line: 1, .. })
        ));

        assert!(matches!(
            Control::from_str("ecut_wfc = 20\neigen_solver = arpack"),
            Err(ConfigurationError::InvalidValue { line: 2, .. })
        ));
    }

    #[test]
    fn test_smearing_needs_temperature() {
        assert!(Control::from_str("ecut_wfc = 20\nsmearing_scheme = fd").is_err());

        let control = Control::from_str("ecut_wfc = 20\nsmearing_scheme = fd\ntemperature = 1000").unwrap();

        assert!(!control.is_fixed_occupation());
        assert_eq!(control.get_nband_for(8.0), 8);
    }
}
