//! I/O for the coupling exchange medium and the replay solvers.
//!
//! This module provides:
//! - **Boundary series files**: the rolling `(time, value)` series handed to a
//!   consuming solver, written atomically
//! - **Nodal flux files**: the per-node flux blocks the hydrodynamic solver
//!   reads as normal-flux forcing
//! - **Project files**: watershed and estuary descriptions for the replay
//!   solvers
//!
//! Every writer fully replaces the target through a temporary file in the
//! same directory, so a reader that reopens the path after a write never sees
//! a partial file.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use hydrocouple::boundary::BoundarySeries;
//! use hydrocouple::io::{persist_boundary_series, read_boundary_series};
//!
//! let series = BoundarySeries::uniform(4, 120.0, 60.0, 0.001, 0.0, 0.001).unwrap();
//! persist_boundary_series(Path::new("bound.ts"), &series).unwrap();
//! let back = read_boundary_series(Path::new("bound.ts")).unwrap();
//! assert_eq!(back.len(), 4);
//! ```

mod nodal_flux;
mod project;
mod series_file;

pub use nodal_flux::{
    FluxNode, NodeFormat, active_node_count, persist_nodal_flux, read_nodal_flux,
};
pub use project::{
    HydrodynamicProject, HydrologicProject, ProjectFileError, ProjectNode, interpolate_entries,
    parse_hydrodynamic_project, parse_hydrologic_project, read_hydrodynamic_project,
    read_hydrologic_project,
};
pub use series_file::{
    SeriesFileError, parse_boundary_series, persist_boundary_series, read_boundary_series,
};
