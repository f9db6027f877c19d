//! Growth and resource-depletion model.

use crate::error::{SimError, check_positive};
use ode_solvers::{SVector, System};
use serde::{Deserialize, Serialize};

pub type Vector = SVector<f64, 3>;

/// Kinetic constants of one population.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Kinetics {
    /// Maximum growth rate (1/day).
    pub v_max: f64,
    /// Half-saturation constant (µM).
    pub k_m: f64,
    /// Resource consumed per unit of growth (µM/cell).
    pub quota: f64,
    /// Death rate (1/day).
    pub death_rate: f64,
}

impl Kinetics {
    /// Monod growth rate at resource concentration `res`.
    pub fn growth_rate(&self, res: f64) -> f64 {
        self.v_max * res / (res + self.k_m)
    }

    pub fn validate(&self) -> Result<(), SimError> {
        check_positive("v_max", self.v_max)?;
        check_positive("k_m", self.k_m)?;
        check_positive("quota", self.quota)?;
        check_positive("death_rate", self.death_rate)?;
        Ok(())
    }
}

/// Densities of both populations and resource concentration.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct State {
    pub pro: f64,
    pub syn: f64,
    pub res: f64,
}

impl State {
    pub fn is_finite(&self) -> bool {
        self.pro.is_finite() && self.syn.is_finite() && self.res.is_finite()
    }
}

impl From<State> for Vector {
    fn from(state: State) -> Self {
        Vector::from([state.pro, state.syn, state.res])
    }
}

impl From<Vector> for State {
    fn from(y: Vector) -> Self {
        Self {
            pro: y[0],
            syn: y[1],
            res: y[2],
        }
    }
}

/// Populations sharing the resource.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Culture {
    /// Both populations consume the resource.
    Competition { pro: Kinetics, syn: Kinetics },
    /// Only `pro` grows; the second density stays at zero.
    Monoculture { pro: Kinetics },
}

impl Culture {
    /// Instantaneous rates of change at `state`.
    ///
    /// The model is autonomous, so `_time` only mirrors the integrator interface.
    pub fn derivative(&self, _time: f64, state: &State) -> State {
        match self {
            Culture::Competition { pro, syn } => {
                let mu_pro = pro.growth_rate(state.res);
                let mu_syn = syn.growth_rate(state.res);
                State {
                    pro: (mu_pro - pro.death_rate) * state.pro,
                    syn: (mu_syn - syn.death_rate) * state.syn,
                    res: -mu_pro * state.pro * pro.quota - mu_syn * state.syn * syn.quota,
                }
            }
            Culture::Monoculture { pro } => {
                let mu_pro = pro.growth_rate(state.res);
                State {
                    pro: (mu_pro - pro.death_rate) * state.pro,
                    syn: 0.0,
                    res: -mu_pro * state.pro * pro.quota,
                }
            }
        }
    }
}

impl System<f64, Vector> for Culture {
    fn system(&self, x: f64, y: &Vector, dy: &mut Vector) {
        *dy = self.derivative(x, &State::from(*y)).into();
    }
}
