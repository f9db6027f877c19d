//! Numerical integration of a [`Culture`] and quadrature of sampled curves.

use crate::error::SimError;
use crate::model::{Culture, State, Vector};
use ode_solvers::Dopri5;
use serde::{Deserialize, Serialize};

/// Relative margin added past the end of the interval so that the last
/// dense-output sample lands on `t_end` despite accumulated rounding.
const END_MARGIN: f64 = 1e-9;

/// Error tolerances of the adaptive stepper and surplus sampling density.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverConfig {
    /// Absolute error tolerance.
    pub abs_tol: f64,
    /// Relative error tolerance.
    pub rel_tol: f64,
    /// Number of evenly spaced samples of a surplus trajectory.
    pub n_samples: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            abs_tol: 1e-10,
            rel_tol: 1e-8,
            n_samples: 500,
        }
    }
}

/// States sampled on an evenly spaced time grid.
#[derive(Debug)]
pub struct Trajectory {
    pub times: Vec<f64>,
    pub states: Vec<State>,
}

impl Trajectory {
    /// Sampled state at the end of the interval.
    pub fn final_state(&self) -> Option<State> {
        self.states.last().copied()
    }

    pub fn resource(&self) -> Vec<f64> {
        self.states.iter().map(|state| state.res).collect()
    }
}

/// Integrate `culture` from `init` over `[0, t_end]` with Dormand–Prince 5(4),
/// sampling `n_samples` evenly spaced points including both ends.
pub fn integrate(
    culture: Culture,
    init: State,
    t_end: f64,
    n_samples: usize,
    cfg: &SolverConfig,
) -> Result<Trajectory, SimError> {
    let dx = t_end / (n_samples.max(2) - 1) as f64;
    let x_end = t_end * (1.0 + END_MARGIN);

    let mut stepper = Dopri5::new(
        culture,
        0.0,
        x_end,
        dx,
        Vector::from(init),
        cfg.rel_tol,
        cfg.abs_tol,
    );
    let stats = stepper
        .integrate()
        .map_err(|cause| SimError::NonConvergence { t_end, cause })?;
    log::trace!("integrated [0, {t_end}] with {} evaluations", stats.num_eval);

    let times = stepper.x_out().clone();
    let mut states = Vec::with_capacity(times.len());
    for (&time, &y) in times.iter().zip(stepper.y_out()) {
        let state = State::from(y);
        if !state.is_finite() {
            return Err(SimError::NonFinite { time });
        }
        states.push(state);
    }

    Ok(Trajectory { times, states })
}

/// Trapezoidal rule over samples `ys` taken at `xs`.
pub fn trapezoid(xs: &[f64], ys: &[f64]) -> f64 {
    xs.windows(2)
        .zip(ys.windows(2))
        .map(|(x, y)| 0.5 * (x[1] - x[0]) * (y[0] + y[1]))
        .sum()
}
