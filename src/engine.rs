use crate::config::Protocol;
use crate::error::{SimError, check_non_negative, check_positive};
use crate::integrate::{SolverConfig, integrate, trapezoid};
use crate::model::{Culture, Kinetics, State};

/// Dilution into fresh medium at the end of a cycle.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Transfer {
    /// Factor dividing both population densities.
    pub dilution: f64,
    /// Resource concentration of the fresh medium.
    pub res_reset: f64,
}

impl Transfer {
    /// Initial state of the next cycle, given the end state of the previous one.
    pub fn apply(&self, end: State) -> State {
        State {
            pro: end.pro / self.dilution,
            syn: end.syn / self.dilution,
            res: self.res_reset,
        }
    }
}

/// Outcome of a serial-transfer competition.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Competition {
    /// State at the end of the last cycle, before dilution.
    pub end_state: State,
    /// SYN/PRO density ratio of `end_state`.
    pub ratio: f64,
}

/// Ratio of SYN to PRO density.
///
/// Identical before and after a transfer, since both densities are divided
/// by the same factor. A vanished PRO population gives `+inf` (or `NaN` when
/// SYN has vanished as well).
pub fn density_ratio(state: &State) -> f64 {
    if state.pro == 0.0 {
        return if state.syn > 0.0 {
            f64::INFINITY
        } else {
            f64::NAN
        };
    }
    state.syn / state.pro
}

/// Whether `ratio` is a finite, meaningful outcome.
pub fn is_defined_ratio(ratio: f64) -> bool {
    ratio.is_finite()
}

/// Simulation engine.
///
/// Holds the transfer protocol and the integrator settings, and provides
/// the single-cycle, multi-cycle and surplus simulations.
#[derive(Debug, Clone)]
pub struct Engine {
    protocol: Protocol,
    solver: SolverConfig,
}

impl Engine {
    pub fn new(protocol: Protocol, solver: SolverConfig) -> Self {
        Self { protocol, solver }
    }

    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    /// State inoculated at the start of the first cycle.
    pub fn initial_state(&self) -> State {
        State {
            pro: self.protocol.pro_init,
            syn: self.protocol.syn_init,
            res: self.protocol.res_init,
        }
    }

    /// Boundary transform applied between consecutive cycles.
    pub fn transfer(&self) -> Transfer {
        Transfer {
            dilution: self.protocol.dilution,
            res_reset: self.protocol.res_init,
        }
    }

    /// Integrate one batch cycle of length `transfer_time` and return the end state.
    pub fn run_cycle(
        &self,
        culture: Culture,
        state: State,
        transfer_time: f64,
    ) -> Result<State, SimError> {
        let trajectory = integrate(culture, state, transfer_time, 2, &self.solver)?;
        let end = trajectory
            .final_state()
            .ok_or(SimError::NonFinite { time: transfer_time })?;
        log::debug!("cycle end: {end:?}");
        Ok(end)
    }

    /// Run the configured number of transfers of PRO against SYN.
    ///
    /// Every cycle starts from the diluted end state of the previous one.
    /// All cycles run, even if a population dies out.
    pub fn simulate_competition(
        &self,
        pro: &Kinetics,
        syn: &Kinetics,
    ) -> Result<Competition, SimError> {
        pro.validate()?;
        syn.validate()?;
        check_positive("transfer_time", self.protocol.transfer_time)?;
        check_positive("dilution", self.protocol.dilution)?;

        let culture = Culture::Competition {
            pro: *pro,
            syn: *syn,
        };
        let transfer = self.transfer();
        let transfer_time = self.protocol.transfer_time;

        let first = self.run_cycle(culture, self.initial_state(), transfer_time)?;
        let end_state = (1..self.protocol.n_transfers).try_fold(first, |end, _| {
            self.run_cycle(culture, transfer.apply(end), transfer_time)
        })?;

        Ok(Competition {
            end_state,
            ratio: density_ratio(&end_state),
        })
    }

    /// Net log-growth of PRO alone over one cycle, after death and dilution.
    ///
    /// `v_max * ∫ R/(R + Km) dt - death_rate * T - ln(D)` over `[0, T]`, with the
    /// integral taken by the trapezoidal rule over the sampled resource curve.
    /// Zero is the break-even point.
    pub fn surplus(
        &self,
        pro: &Kinetics,
        v_max: f64,
        transfer_time: f64,
        res_init: f64,
    ) -> Result<f64, SimError> {
        let pro = Kinetics { v_max, ..*pro };
        pro.validate()?;
        check_positive("transfer_time", transfer_time)?;
        check_non_negative("res_init", res_init)?;
        check_positive("dilution", self.protocol.dilution)?;

        let init = State {
            pro: self.protocol.pro_init,
            syn: 0.0,
            res: res_init,
        };
        let trajectory = integrate(
            Culture::Monoculture { pro },
            init,
            transfer_time,
            self.solver.n_samples,
            &self.solver,
        )?;

        let saturation: Vec<_> = trajectory
            .resource()
            .into_iter()
            .map(|res| res / (res + pro.k_m))
            .collect();
        let integral = trapezoid(&trajectory.times, &saturation);

        Ok(v_max * integral - pro.death_rate * transfer_time - self.protocol.dilution.ln())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn engine(protocol: Protocol) -> Engine {
        Engine::new(protocol, SolverConfig::default())
    }

    #[test]
    fn transfer_dilutes_and_resets() {
        let transfer = Transfer {
            dilution: 20.0,
            res_reset: 100.0,
        };
        let end = State {
            pro: 2e7,
            syn: 4e5,
            res: 3.2,
        };
        let next = transfer.apply(end);
        assert_relative_eq!(next.pro, 1e6);
        assert_relative_eq!(next.syn, 2e4);
        assert_eq!(next.res, 100.0);
        assert_relative_eq!(density_ratio(&next), density_ratio(&end));
    }

    #[test]
    fn ratio_with_vanished_pro() {
        let state = State {
            pro: 0.0,
            syn: 1e3,
            res: 0.0,
        };
        assert_eq!(density_ratio(&state), f64::INFINITY);
        assert!(!is_defined_ratio(density_ratio(&state)));

        let state = State { syn: 0.0, ..state };
        assert!(density_ratio(&state).is_nan());
        assert!(!is_defined_ratio(density_ratio(&state)));
    }

    #[test]
    fn reference_scenario_favours_pro() {
        let cfg = Config::default();
        let engine = engine(cfg.protocol.clone());
        let init_ratio = density_ratio(&engine.initial_state());

        let first = engine.simulate_competition(&cfg.pro, &cfg.syn).unwrap();
        let second = engine.simulate_competition(&cfg.pro, &cfg.syn).unwrap();

        assert_eq!(first.ratio.to_bits(), second.ratio.to_bits());
        assert!(is_defined_ratio(first.ratio));
        assert!(first.ratio < init_ratio);
        assert_relative_eq!(first.ratio, 5.3216e-5, max_relative = 1e-3);
    }

    #[test]
    fn identical_strains_keep_initial_ratio() {
        let cfg = Config::default();
        for n_transfers in [1, 3, 7] {
            let engine = engine(Protocol {
                n_transfers,
                ..cfg.protocol.clone()
            });
            let outcome = engine.simulate_competition(&cfg.pro, &cfg.pro).unwrap();
            assert_relative_eq!(outcome.ratio, 1.15e5 / 1e6, max_relative = 1e-6);
        }
    }

    #[test]
    fn identical_strains_ratio_ignores_dilution() {
        let cfg = Config::default();
        let ratios: Vec<_> = [5.0, 20.0, 50.0]
            .into_iter()
            .map(|dilution| {
                engine(Protocol {
                    dilution,
                    ..cfg.protocol.clone()
                })
                .simulate_competition(&cfg.pro, &cfg.pro)
                .unwrap()
                .ratio
            })
            .collect();
        assert_relative_eq!(ratios[0], ratios[1], max_relative = 1e-6);
        assert_relative_eq!(ratios[1], ratios[2], max_relative = 1e-6);
    }

    #[test]
    fn replete_resource_ratio_ignores_dilution() {
        // Fresh medium far in excess: growth rates never depend on density,
        // so dilution only rescales both populations.
        let cfg = Config::default();
        let pro = Kinetics {
            quota: 1e-12,
            ..cfg.pro
        };
        let syn = Kinetics {
            quota: 1e-12,
            ..cfg.syn
        };
        let ratios: Vec<_> = [5.0, 20.0, 50.0]
            .into_iter()
            .map(|dilution| {
                engine(Protocol {
                    dilution,
                    ..cfg.protocol.clone()
                })
                .simulate_competition(&pro, &syn)
                .unwrap()
                .ratio
            })
            .collect();
        assert_relative_eq!(ratios[0], ratios[1], max_relative = 1e-4);
        assert_relative_eq!(ratios[1], ratios[2], max_relative = 1e-4);
    }

    #[test]
    fn single_transfer_without_dilution_effect() {
        let cfg = Config::default();
        let engine = engine(Protocol {
            n_transfers: 1,
            ..cfg.protocol.clone()
        });
        let outcome = engine.simulate_competition(&cfg.pro, &cfg.syn).unwrap();
        let end = engine
            .run_cycle(
                Culture::Competition {
                    pro: cfg.pro,
                    syn: cfg.syn,
                },
                engine.initial_state(),
                7.0,
            )
            .unwrap();
        assert_eq!(outcome.end_state, end);
        assert!(end.res < 100.0);
    }

    #[test]
    fn invalid_kinetics_are_rejected() {
        let cfg = Config::default();
        let engine = engine(cfg.protocol.clone());
        let syn = Kinetics {
            k_m: -5.0,
            ..cfg.syn
        };
        assert!(matches!(
            engine.simulate_competition(&cfg.pro, &syn),
            Err(SimError::InvalidParameter { name: "k_m", .. })
        ));
        assert!(matches!(
            engine.surplus(&cfg.pro, 0.7, 0.0, 100.0),
            Err(SimError::InvalidParameter {
                name: "transfer_time",
                ..
            })
        ));
    }

    #[test]
    fn surplus_without_resource() {
        let cfg = Config::default();
        let engine = engine(cfg.protocol.clone());
        for v_max in [0.68, 1.0, 1.5] {
            let surplus = engine.surplus(&cfg.pro, v_max, 7.0, 0.0).unwrap();
            assert_eq!(surplus, -cfg.pro.death_rate * 7.0 - 20.0_f64.ln());
        }
    }

    #[test]
    fn surplus_reference_value() {
        let cfg = Config::default();
        let engine = engine(cfg.protocol.clone());
        let surplus = engine.surplus(&cfg.pro, 0.68, 7.0, 100.0).unwrap();
        assert_abs_diff_eq!(surplus, -0.39605, epsilon = 1e-3);
    }

    #[test]
    fn surplus_without_dilution_cost() {
        let cfg = Config::default();
        let diluted = engine(cfg.protocol.clone());
        let undiluted = engine(Protocol {
            dilution: 1.0,
            ..cfg.protocol.clone()
        });
        let a = diluted.surplus(&cfg.pro, 0.9, 5.0, 50.0).unwrap();
        let b = undiluted.surplus(&cfg.pro, 0.9, 5.0, 50.0).unwrap();
        assert_relative_eq!(b - a, 20.0_f64.ln(), max_relative = 1e-9);
    }

    #[test]
    fn surplus_grows_with_v_max_while_resource_lasts() {
        let cfg = Config::default();
        let engine = engine(cfg.protocol.clone());
        for (transfer_time, res_init) in [(3.0, 100.0), (7.0, 1e4)] {
            let surplus: Vec<_> = (0..83)
                .map(|i| 0.68 + 0.01 * i as f64)
                .map(|v_max| {
                    engine
                        .surplus(&cfg.pro, v_max, transfer_time, res_init)
                        .unwrap()
                })
                .collect();
            for pair in surplus.windows(2) {
                assert!(pair[1] >= pair[0], "surplus decreased: {pair:?}");
            }
        }
    }

    #[test]
    fn surplus_peaks_once_resource_runs_out() {
        // Faster growth exhausts the medium earlier and leaves more time for death.
        let cfg = Config::default();
        let engine = engine(cfg.protocol.clone());
        let peak = engine.surplus(&cfg.pro, 0.88, 7.0, 100.0).unwrap();
        let fast = engine.surplus(&cfg.pro, 1.48, 7.0, 100.0).unwrap();
        assert!(peak > 0.0);
        assert!(fast < peak);
    }
}
