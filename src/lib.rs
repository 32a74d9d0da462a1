//! # hydrocouple
//!
//! Dual time-stepping coupling of a hydrodynamic (estuary) solver with a
//! hydrologic (watershed) solver.
//!
//! Each solver keeps its own time step. The coupler advances them in
//! alternating bursts and exchanges boundary conditions across one edge
//! string of the hydrodynamic mesh:
//! - Watershed outflow volume becomes a flux per unit width along the edge
//!   string
//! - Average surface elevation along the edge string becomes the head
//!   boundary at the watershed outlet
//!
//! Module overview:
//! - [`types`]: units, constants and solver clocks
//! - [`boundary`]: rolling boundary time series
//! - [`io`]: exchange files and replay project files
//! - [`model`]: solver capability traits, worker reductions and replay solvers
//! - [`coupling`]: synchronization, flux mapping and the coupling session
//! - [`simulation`]: whole-run driver with timing

pub mod boundary;
pub mod coupling;
pub mod io;
pub mod model;
pub mod simulation;
pub mod types;

// Re-export main types for convenience
pub use boundary::{BoundarySeries, SeriesEntry, SeriesError};
pub use coupling::{
    CouplerConfig, CouplingDiagnostics, CouplingError, CouplingMode, CouplingSession,
    SessionState, Solver, SuperStep, Synchronizer, volume_to_flux,
};
pub use io::{FluxNode, SeriesFileError};
pub use model::{
    HydrodynamicModel, HydrologicModel, Reducer, ReplayHydrodynamics, ReplayHydrology,
    SingleWorker, SolverStatus, WorkerGroup, WorkerHandle,
};
pub use simulation::{Coupler, CouplingReport};
pub use types::{RunFlag, SolverClock, TIME_TOL};
