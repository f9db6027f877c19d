use ode_solvers::dop_shared::IntegrationError;
use thiserror::Error;

/// Failure of a single simulation.
///
/// Local to one sweep point: the sweep records it at the point's index and
/// carries on with the remaining values.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid {name}: must be {requirement}, but is {value}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        requirement: &'static str,
    },

    #[error("integration over [0, {t_end}] did not converge: {cause:?}")]
    NonConvergence { t_end: f64, cause: IntegrationError },

    #[error("integration produced a non-finite state at t = {time}")]
    NonFinite { time: f64 },
}

/// Reject `value` unless it is finite and strictly positive.
pub fn check_positive(name: &'static str, value: f64) -> Result<(), SimError> {
    if !(value.is_finite() && value > 0.0) {
        return Err(SimError::InvalidParameter {
            name,
            value,
            requirement: "finite and positive",
        });
    }
    Ok(())
}

/// Reject `value` unless it is finite and non-negative.
pub fn check_non_negative(name: &'static str, value: f64) -> Result<(), SimError> {
    if !(value.is_finite() && value >= 0.0) {
        return Err(SimError::InvalidParameter {
            name,
            value,
            requirement: "finite and non-negative",
        });
    }
    Ok(())
}
