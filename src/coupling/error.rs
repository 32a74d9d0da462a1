//! Coupling errors.

use std::path::PathBuf;

use thiserror::Error;

use super::mode::Solver;
use super::session::SessionState;
use crate::boundary::SeriesError;
use crate::io::SeriesFileError;

/// Error type for a coupled run.
///
/// Every variant is fatal: the run stops and nothing is retried.
/// Conservation anomalies are diagnostics, not errors; see
/// [`ConservationAnomaly`](super::ConservationAnomaly).
#[derive(Debug, Error)]
pub enum CouplingError {
    /// Inconsistent settings or solver setup; the run never starts stepping
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Coupling mode token not recognized
    #[error("Unknown coupling mode '{0}' (expected gdA, Adg, gdAdg or AdgdA)")]
    UnknownMode(String),

    /// A solver call returned a nonzero status
    #[error("{solver} solver failed during {phase} with status {code}")]
    SolverFailure {
        solver: Solver,
        phase: &'static str,
        code: i32,
    },

    /// Closing or reopening the exchange file failed
    #[error("Exchange file {operation} failed for {} with status {code}", .path.display())]
    ExchangeIo {
        path: PathBuf,
        operation: &'static str,
        code: i32,
    },

    /// Writing the exchange file failed
    #[error("Exchange file error: {0}")]
    SeriesFile(#[from] SeriesFileError),

    /// Boundary series could not be built
    #[error("Boundary series error: {0}")]
    Series(#[from] SeriesError),

    /// Lifecycle call out of order
    #[error("Cannot go from {from} to {to}")]
    InvalidTransition { from: SessionState, to: SessionState },

    /// A solver clock moved backwards
    #[error("{solver} clock moved backwards from {from} to {to}")]
    ClockRegression { solver: Solver, from: f64, to: f64 },

    /// The configured iteration cap was reached before both solvers finished
    #[error("Coupling iteration limit ({0}) reached")]
    IterationLimit(usize),

    /// A full coupling iteration moved neither clock
    #[error("Coupling stalled at hydrodynamic t={hydrodynamic_time} s, hydrologic t={hydrologic_time} s")]
    Stalled {
        hydrodynamic_time: f64,
        hydrologic_time: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let e = CouplingError::SolverFailure {
            solver: Solver::Hydrologic,
            phase: "advance",
            code: 7,
        };
        assert_eq!(e.to_string(), "hydrologic solver failed during advance with status 7");

        let e = CouplingError::ExchangeIo {
            path: PathBuf::from("/tmp/flux"),
            operation: "reopen",
            code: 2,
        };
        assert!(e.to_string().contains("/tmp/flux"));

        let e = CouplingError::InvalidTransition {
            from: SessionState::Uninitialized,
            to: SessionState::Stepping,
        };
        assert_eq!(e.to_string(), "Cannot go from uninitialized to stepping");
    }
}
