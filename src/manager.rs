use crate::config::Config;
use crate::engine::{Engine, density_ratio, is_defined_ratio};
use crate::sweep::SweepResult;
use anyhow::{Context, Result};
use std::{io::Write, path::Path};

pub struct Manager {
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(config_file: P) -> Result<Self> {
        let cfg = Config::from_file(config_file).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { cfg })
    }

    pub fn simulate<W: Write>(&self, out: &mut W) -> Result<()> {
        let engine = Engine::new(self.cfg.protocol.clone(), self.cfg.solver.clone());
        let init_ratio = density_ratio(&engine.initial_state());

        let competition = engine
            .simulate_competition(&self.cfg.pro, &self.cfg.syn)
            .context("failed to simulate competition")?;
        if !is_defined_ratio(competition.ratio) {
            log::warn!("final ratio is undefined: {}", competition.ratio);
        }

        let end = competition.end_state;
        writeln!(out, "# n_transfers\t{}", engine.protocol().n_transfers)?;
        writeln!(out, "initial_ratio\t{init_ratio:e}")?;
        writeln!(out, "final_ratio\t{:e}", competition.ratio)?;
        writeln!(out, "final_pro\t{:e}", end.pro)?;
        writeln!(out, "final_syn\t{:e}", end.syn)?;
        writeln!(out, "final_res\t{:e}", end.res)?;

        Ok(())
    }

    pub fn compete<W: Write>(&self, out: &mut W) -> Result<()> {
        for sweep in &self.cfg.competition_sweeps {
            log::info!("sweeping SYN {} ({:?})", sweep.param.name(), sweep.grid);
            let result = sweep.run(&self.cfg);
            report(&result);
            write_sweep(out, &result).context("failed to write competition sweep")?;
        }

        Ok(())
    }

    pub fn surplus<W: Write>(&self, out: &mut W) -> Result<()> {
        for sweep in &self.cfg.surplus_sweeps {
            log::info!("sweeping surplus {} ({:?})", sweep.param.name(), sweep.grid);
            let result = sweep.run(&self.cfg);
            report(&result);
            write_sweep(out, &result).context("failed to write surplus sweep")?;
        }

        Ok(())
    }
}

fn report(result: &SweepResult) {
    for (value, outcome) in result.values.iter().zip(&result.outcomes) {
        if let Err(error) = outcome {
            log::warn!("{} = {value}: {error}", result.param);
        }
    }

    let n_points = result.values.len();
    let n_failed = result.n_failed();
    log::info!("completed {} of {n_points} points", n_points - n_failed);
}

/// Write a sweep as a metadata header followed by `value outcome` rows.
fn write_sweep<W: Write>(out: &mut W, result: &SweepResult) -> Result<()> {
    writeln!(out, "# analysis\t{}", result.analysis)?;
    writeln!(out, "# swept\t{}", result.param)?;
    for (name, value) in &result.fixed {
        writeln!(out, "# fixed\t{name}\t{value}")?;
    }
    writeln!(out, "{}\toutcome", result.param)?;
    for (value, outcome) in result.values.iter().zip(result.outcome_values()) {
        writeln!(out, "{value}\t{outcome:e}")?;
    }
    writeln!(out)?;

    Ok(())
}
