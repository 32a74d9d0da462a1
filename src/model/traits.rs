//! Capability surface of the two coupled solvers.
//!
//! The coupler never touches solver internals. It drives each solver through
//! the small interface below, so any hydrodynamic or hydrologic code that can
//! expose these operations can be coupled.
//!
//! # Time conventions
//!
//! Both solvers share one time axis in seconds. The hydrologic solver counts
//! elapsed minutes from that axis' origin and stamps its boundary series in
//! Julian days, with `start_julian()` being the Julian day of time zero.

use std::fmt;
use std::path::Path;

use super::reduction::Reducer;
use crate::boundary::BoundarySeries;
use crate::io::FluxNode;

/// Status code returned by an external solver call. Zero means success.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SolverStatus(pub i32);

impl SolverStatus {
    /// Successful call.
    pub const OK: Self = Self(0);

    /// True for a zero status.
    #[inline]
    pub fn is_ok(self) -> bool {
        self.0 == 0
    }

    /// Raw status code.
    #[inline]
    pub fn code(self) -> i32 {
        self.0
    }
}

impl fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status {}", self.0)
    }
}

/// Hydrodynamic (surface-water) solver.
///
/// The solver may run as several cooperating workers; the [`Reducer`]
/// supertrait combines worker-local values. Interface queries return only
/// the part of the interface this worker owns.
pub trait HydrodynamicModel: Reducer {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Set up the solver (read input, allocate state).
    fn initialize(&mut self) -> SolverStatus;

    /// Advance by `n_native_steps` native time steps.
    fn advance(&mut self, n_native_steps: usize) -> SolverStatus;

    /// Release solver resources.
    fn finalize(&mut self) -> SolverStatus;

    /// Time at which the run starts (s).
    fn start_time(&self) -> f64;

    /// Latest time at which the solution is known (s).
    fn current_time(&self) -> f64;

    /// Native time step (s).
    fn time_step(&self) -> f64;

    /// Final time (s).
    fn final_time(&self) -> f64;

    /// Native steps left until the final time.
    fn remaining_steps(&self) -> usize;

    /// Directory holding the solver's input files.
    fn input_dir(&self) -> &Path;

    /// Positions `(x, y)` of the local part of the node chain forming
    /// `interface`, in chain order.
    ///
    /// Returns `None` if `interface` is not a flux boundary of this model.
    fn interface_positions(&self, interface: usize) -> Option<Vec<(f64, f64)>>;

    /// Water-surface elevation at the local interface nodes.
    fn surface_elevation(&self, interface: usize) -> Vec<f64>;

    /// Water-surface elevation at the local interface nodes one native step
    /// before the current time.
    fn previous_surface_elevation(&self, interface: usize) -> Vec<f64>;

    /// Flux boundary nodes in the order the solver reads its flux file.
    fn flux_nodes(&self, interface: usize) -> Vec<FluxNode>;

    /// Hand the solver the forcing series for `interface`.
    fn set_boundary_forcing(&mut self, interface: usize, series: &BoundarySeries);

    /// Close the solver's read handle on its flux file.
    fn close_boundary_input(&mut self) -> SolverStatus;

    /// Reopen the flux file at `path` for reading.
    fn reopen_boundary_input(&mut self, path: &Path) -> SolverStatus;
}

/// Hydrologic (watershed) solver.
///
/// Only rank 0 ever calls [`HydrologicModel::advance`]. Other ranks keep an
/// idle copy whose clock and outflow volume are overwritten with the
/// reduced values after every burst.
pub trait HydrologicModel {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Set up the solver from a project.
    fn initialize(&mut self, project: &str) -> SolverStatus;

    /// Run until the iteration limit or the event end, whichever comes first.
    fn advance(&mut self) -> SolverStatus;

    /// Release solver resources.
    fn finalize(&mut self) -> SolverStatus;

    /// Julian day of time zero.
    fn start_julian(&self) -> f64;

    /// Elapsed simulated minutes.
    fn elapsed_minutes(&self) -> f64;

    /// Overwrite the elapsed minutes (clock broadcast from rank 0).
    fn set_elapsed_minutes(&mut self, minutes: f64);

    /// Current simulated time as a Julian day.
    fn current_julian(&self) -> f64 {
        self.start_julian() + self.elapsed_minutes() / crate::types::MINUTES_PER_DAY
    }

    /// Native time step (s).
    fn time_step(&self) -> f64;

    /// Final time as a count of elapsed minutes.
    fn final_minutes(&self) -> f64;

    /// Set the iteration limit (elapsed minutes) for the next burst.
    fn set_iteration_limit(&mut self, minutes: f64);

    /// Set the Julian day at which the next burst ends.
    fn set_event_end(&mut self, julian_day: f64);

    /// Allow or suppress advancement.
    fn set_go(&mut self, go: bool);

    /// Cumulative outflow volume at the outlet (m³).
    fn outflow_volume(&self) -> f64;

    /// Overwrite the cumulative outflow volume (broadcast from rank 0).
    fn set_outflow_volume(&mut self, volume: f64);

    /// The solver's own boundary depth at the outlet (m).
    fn boundary_depth(&self) -> f64;

    /// True if the solver has a head boundary driven by a time series.
    fn has_boundary_series(&self) -> bool;

    /// Replace the boundary series the solver reads at its outlet.
    fn set_boundary_series(&mut self, series: BoundarySeries);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status() {
        assert!(SolverStatus::OK.is_ok());
        assert!(!SolverStatus(3).is_ok());
        assert_eq!(SolverStatus(-2).code(), -2);
        assert_eq!(format!("{}", SolverStatus(5)), "status 5");
    }
}
