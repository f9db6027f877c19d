use crate::integrate::SolverConfig;
use crate::model::Kinetics;
use crate::sweep::{CompetitionSweep, Grid, KineticParam, SurplusParam, SurplusSweep};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Simulation configuration.
///
/// Loaded from a TOML file and validated before use.
/// Every section is optional and falls back to the reference values.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Serial-transfer protocol.
    pub protocol: Protocol,

    /// Kinetics of the dominant strain (held fixed).
    pub pro: Kinetics,
    /// Default kinetics of the competitor (one slot is swept at a time).
    pub syn: Kinetics,

    /// Integrator settings.
    pub solver: SolverConfig,

    /// Values held fixed by the surplus analysis.
    pub surplus: SurplusConfig,

    /// Competition sweeps to run.
    pub competition_sweeps: Vec<CompetitionSweep>,
    /// Surplus sweeps to run.
    pub surplus_sweeps: Vec<SurplusSweep>,
}

/// Initial condition and transfer schedule.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Protocol {
    /// Initial density of the dominant strain (cells/mL).
    pub pro_init: f64,
    /// Initial density of the competitor (cells/mL).
    pub syn_init: f64,
    /// Resource concentration of fresh medium (µM).
    pub res_init: f64,

    /// Duration of one batch cycle (days).
    pub transfer_time: f64,
    /// Dilution factor applied at each transfer.
    pub dilution: f64,
    /// Number of transfers.
    pub n_transfers: usize,
}

/// Surplus inputs not being swept.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SurplusConfig {
    /// Maximum growth rate (1/day).
    pub v_max: f64,
    /// Cycle duration (days).
    pub transfer_time: f64,
    /// Initial resource concentration (µM).
    pub res_init: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            protocol: Protocol::default(),
            pro: Kinetics {
                v_max: 0.74,
                k_m: 2.5,
                quota: 1.5e-6,
                death_rate: 0.29,
            },
            syn: Kinetics {
                v_max: 0.5,
                k_m: 5.0,
                quota: 2e-6,
                death_rate: 0.2,
            },
            solver: SolverConfig::default(),
            surplus: SurplusConfig::default(),
            competition_sweeps: vec![
                CompetitionSweep::new(KineticParam::VMax, Grid::linspace(0.4, 1.0, 50)),
                CompetitionSweep::new(KineticParam::Km, Grid::linspace(0.1, 10.0, 50)),
                CompetitionSweep::new(KineticParam::Quota, Grid::linspace(0.5e-6, 5e-6, 50)),
                CompetitionSweep::new(KineticParam::DeathRate, Grid::linspace(0.001, 0.3, 50)),
            ],
            surplus_sweeps: vec![
                SurplusSweep::new(SurplusParam::TransferTime, Grid::linspace(0.1, 20.0, 100)),
                SurplusSweep::new(SurplusParam::VMax, Grid::arange(0.68, 1.50, 0.01)),
                SurplusSweep::new(SurplusParam::ResInit, Grid::linspace(0.0, 200.0, 100)),
            ],
        }
    }
}

impl Default for Protocol {
    fn default() -> Self {
        Self {
            pro_init: 1e6,
            syn_init: 1.15e5,
            res_init: 100.0,
            transfer_time: 7.0,
            dilution: 20.0,
            n_transfers: 7,
        }
    }
}

impl Default for SurplusConfig {
    fn default() -> Self {
        Self {
            v_max: 0.68,
            transfer_time: 7.0,
            res_init: 100.0,
        }
    }
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded; missing sections take their defaults.
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        Self::from_toml(&contents)
    }

    /// Parse and validate a [`Config`] from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.protocol
            .validate()
            .context("invalid transfer protocol")?;

        check_kinetics(&self.pro).context("invalid PRO kinetics")?;
        check_kinetics(&self.syn).context("invalid SYN kinetics")?;

        check_pos(self.solver.abs_tol).context("invalid absolute tolerance")?;
        check_pos(self.solver.rel_tol).context("invalid relative tolerance")?;
        check_num(self.solver.n_samples, 100..=1_000_000).context("invalid number of samples")?;

        check_pos(self.surplus.v_max).context("invalid surplus growth rate")?;
        check_pos(self.surplus.transfer_time).context("invalid surplus transfer time")?;
        check_num(self.surplus.res_init, 0.0..f64::INFINITY)
            .context("invalid surplus initial resource")?;

        for (i_sweep, sweep) in self.competition_sweeps.iter().enumerate() {
            sweep
                .grid
                .validate()
                .with_context(|| format!("invalid grid of competition sweep {i_sweep}"))?;
        }
        for (i_sweep, sweep) in self.surplus_sweeps.iter().enumerate() {
            sweep
                .grid
                .validate()
                .with_context(|| format!("invalid grid of surplus sweep {i_sweep}"))?;
        }

        Ok(())
    }
}

impl Protocol {
    fn validate(&self) -> Result<()> {
        check_num(self.pro_init, 0.0..f64::INFINITY).context("invalid initial PRO density")?;
        check_num(self.syn_init, 0.0..f64::INFINITY).context("invalid initial SYN density")?;
        check_num(self.res_init, 0.0..f64::INFINITY).context("invalid initial resource")?;
        check_pos(self.transfer_time).context("invalid transfer time")?;
        check_num(self.dilution, 1.0..f64::INFINITY).context("invalid dilution factor")?;
        check_num(self.n_transfers, 1..100_000).context("invalid number of transfers")?;
        Ok(())
    }
}

fn check_kinetics(kinetics: &Kinetics) -> Result<()> {
    check_pos(kinetics.v_max).context("invalid maximum growth rate")?;
    check_pos(kinetics.k_m).context("invalid half-saturation constant")?;
    check_pos(kinetics.quota).context("invalid resource quota")?;
    check_pos(kinetics.death_rate).context("invalid death rate")?;
    Ok(())
}

fn check_pos(num: f64) -> Result<()> {
    if !(num > 0.0 && num.is_finite()) {
        bail!("number must be finite and positive, but is {num:?}");
    }
    Ok(())
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}
