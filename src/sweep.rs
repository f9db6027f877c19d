//! Parameter sweeps.
//!
//! A sweep substitutes each value of a [`Grid`] into one slot of an otherwise
//! fixed configuration and records one outcome per value, in input order.

use crate::config::Config;
use crate::engine::Engine;
use crate::error::SimError;
use crate::model::Kinetics;
use anyhow::{Result, bail};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Ordered values of the swept parameter.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum Grid {
    /// `n_points` evenly spaced values from `start` to `end` inclusive.
    Linspace {
        start: f64,
        end: f64,
        n_points: usize,
    },
    /// `start`, `start + step`, ... up to but excluding `stop`.
    Arange { start: f64, stop: f64, step: f64 },
}

impl Grid {
    pub fn linspace(start: f64, end: f64, n_points: usize) -> Self {
        Grid::Linspace {
            start,
            end,
            n_points,
        }
    }

    pub fn arange(start: f64, stop: f64, step: f64) -> Self {
        Grid::Arange { start, stop, step }
    }

    pub fn values(&self) -> Vec<f64> {
        match *self {
            Grid::Linspace {
                start,
                end,
                n_points,
            } => match n_points {
                0 => Vec::new(),
                1 => vec![start],
                _ => {
                    let step = (end - start) / (n_points - 1) as f64;
                    let mut values: Vec<_> =
                        (0..n_points).map(|i| start + i as f64 * step).collect();
                    values[n_points - 1] = end;
                    values
                }
            },
            Grid::Arange { start, stop, step } => {
                let n_points = ((stop - start) / step).ceil().max(0.0) as usize;
                (0..n_points).map(|i| start + i as f64 * step).collect()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            Grid::Linspace {
                start,
                end,
                n_points,
            } => {
                if !(start.is_finite() && end.is_finite()) {
                    bail!("grid bounds must be finite");
                }
                if start > end {
                    bail!("grid must be ascending, but {start} > {end}");
                }
                if n_points == 0 {
                    bail!("grid must have at least one point");
                }
            }
            Grid::Arange { start, stop, step } => {
                if !(start.is_finite() && stop.is_finite()) {
                    bail!("grid bounds must be finite");
                }
                if !(step > 0.0 && step.is_finite()) {
                    bail!("grid step must be finite and positive, but is {step}");
                }
                if start >= stop {
                    bail!("grid must have at least one point");
                }
            }
        }
        Ok(())
    }
}

/// SYN kinetic constant swept by a competition sweep.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KineticParam {
    VMax,
    #[serde(rename = "k_m")]
    Km,
    Quota,
    DeathRate,
}

impl KineticParam {
    pub const ALL: [KineticParam; 4] = [
        KineticParam::VMax,
        KineticParam::Km,
        KineticParam::Quota,
        KineticParam::DeathRate,
    ];

    pub fn name(self) -> &'static str {
        match self {
            KineticParam::VMax => "v_max",
            KineticParam::Km => "k_m",
            KineticParam::Quota => "quota",
            KineticParam::DeathRate => "death_rate",
        }
    }

    pub fn get(self, kinetics: &Kinetics) -> f64 {
        match self {
            KineticParam::VMax => kinetics.v_max,
            KineticParam::Km => kinetics.k_m,
            KineticParam::Quota => kinetics.quota,
            KineticParam::DeathRate => kinetics.death_rate,
        }
    }

    /// Copy of `kinetics` with this slot replaced by `value`.
    pub fn set(self, kinetics: Kinetics, value: f64) -> Kinetics {
        match self {
            KineticParam::VMax => Kinetics {
                v_max: value,
                ..kinetics
            },
            KineticParam::Km => Kinetics {
                k_m: value,
                ..kinetics
            },
            KineticParam::Quota => Kinetics {
                quota: value,
                ..kinetics
            },
            KineticParam::DeathRate => Kinetics {
                death_rate: value,
                ..kinetics
            },
        }
    }
}

/// Surplus input swept by a surplus sweep.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurplusParam {
    VMax,
    TransferTime,
    ResInit,
}

impl SurplusParam {
    pub fn name(self) -> &'static str {
        match self {
            SurplusParam::VMax => "v_max",
            SurplusParam::TransferTime => "transfer_time",
            SurplusParam::ResInit => "res_init",
        }
    }
}

/// Competition sweep over one SYN kinetic constant.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompetitionSweep {
    pub param: KineticParam,
    pub grid: Grid,
}

/// Surplus sweep over one surplus input.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SurplusSweep {
    pub param: SurplusParam,
    pub grid: Grid,
}

/// Outcomes of a sweep, aligned with the swept values.
#[derive(Debug)]
pub struct SweepResult {
    /// `"competition"` or `"surplus"`.
    pub analysis: &'static str,
    /// Name of the swept parameter.
    pub param: &'static str,
    /// Parameters held fixed, with their values.
    pub fixed: Vec<(String, f64)>,
    /// Swept values, in input order.
    pub values: Vec<f64>,
    /// One outcome per swept value.
    pub outcomes: Vec<Result<f64, SimError>>,
}

impl SweepResult {
    /// Outcomes with failed points as `NaN`.
    pub fn outcome_values(&self) -> Vec<f64> {
        self.outcomes
            .iter()
            .map(|outcome| *outcome.as_ref().unwrap_or(&f64::NAN))
            .collect()
    }

    pub fn n_failed(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.is_err()).count()
    }
}

/// Evaluate `eval` at every value independently.
///
/// Points run in parallel; outcomes come back in the order of `values`.
pub fn run_points<F>(values: &[f64], eval: F) -> Vec<Result<f64, SimError>>
where
    F: Fn(f64) -> Result<f64, SimError> + Sync,
{
    values.par_iter().map(|&value| eval(value)).collect()
}

impl CompetitionSweep {
    pub fn new(param: KineticParam, grid: Grid) -> Self {
        Self { param, grid }
    }

    /// Final SYN/PRO ratio for each value of the swept SYN constant.
    pub fn run(&self, cfg: &Config) -> SweepResult {
        let engine = Engine::new(cfg.protocol.clone(), cfg.solver.clone());
        let values = self.grid.values();

        let outcomes = run_points(&values, |value| {
            let syn = self.param.set(cfg.syn, value);
            engine
                .simulate_competition(&cfg.pro, &syn)
                .map(|competition| competition.ratio)
        });

        let mut fixed: Vec<_> = KineticParam::ALL
            .into_iter()
            .filter(|&param| param != self.param)
            .map(|param| (format!("syn.{}", param.name()), param.get(&cfg.syn)))
            .collect();
        fixed.push(("transfer_time".into(), cfg.protocol.transfer_time));
        fixed.push(("dilution".into(), cfg.protocol.dilution));
        fixed.push(("n_transfers".into(), cfg.protocol.n_transfers as f64));

        SweepResult {
            analysis: "competition",
            param: self.param.name(),
            fixed,
            values,
            outcomes,
        }
    }
}

impl SurplusSweep {
    pub fn new(param: SurplusParam, grid: Grid) -> Self {
        Self { param, grid }
    }

    /// PRO surplus for each value of the swept input.
    pub fn run(&self, cfg: &Config) -> SweepResult {
        let engine = Engine::new(cfg.protocol.clone(), cfg.solver.clone());
        let values = self.grid.values();
        let base = &cfg.surplus;

        let outcomes = run_points(&values, |value| {
            let (v_max, transfer_time, res_init) = match self.param {
                SurplusParam::VMax => (value, base.transfer_time, base.res_init),
                SurplusParam::TransferTime => (base.v_max, value, base.res_init),
                SurplusParam::ResInit => (base.v_max, base.transfer_time, value),
            };
            engine.surplus(&cfg.pro, v_max, transfer_time, res_init)
        });

        let mut fixed: Vec<_> = [
            (SurplusParam::VMax, base.v_max),
            (SurplusParam::TransferTime, base.transfer_time),
            (SurplusParam::ResInit, base.res_init),
        ]
        .into_iter()
        .filter(|&(param, _)| param != self.param)
        .map(|(param, value)| (param.name().to_string(), value))
        .collect();
        fixed.push(("pro.k_m".into(), cfg.pro.k_m));
        fixed.push(("pro.death_rate".into(), cfg.pro.death_rate));
        fixed.push(("dilution".into(), cfg.protocol.dilution));

        SweepResult {
            analysis: "surplus",
            param: self.param.name(),
            fixed,
            values,
            outcomes,
        }
    }
}
