//! Dual time-stepping coupling.
//!
//! A hydrologic (watershed) solver and a hydrodynamic (estuary) solver run
//! on their own time steps. The coupler advances them in alternating
//! bursts and exchanges boundary conditions across one edge string:
//!
//! | direction | quantity | carried as |
//! |-----------|----------|------------|
//! | hydrology to hydrodynamics | outflow volume | flux per unit width along the edge string |
//! | hydrodynamics to hydrology | surface elevation | average depth at the watershed outlet |
//!
//! Four [`CouplingMode`]s choose which directions are active and which
//! solver leads.
//!
//! # Example
//!
//! ```no_run
//! use hydrocouple::coupling::{CouplerConfig, CouplingMode, CouplingSession};
//! use hydrocouple::model::{ReplayHydrodynamics, ReplayHydrology};
//! use std::path::Path;
//!
//! let mode: CouplingMode = "gdAdg".parse().unwrap();
//! let estuary = ReplayHydrodynamics::from_file(Path::new("estuary.hd")).unwrap();
//! let config = CouplerConfig::default().with_coupling_step_factor(2);
//!
//! let mut session = CouplingSession::new(estuary, ReplayHydrology::default(), mode, 1, config);
//! session.initialize("watershed.hl").unwrap();
//! session.run().unwrap();
//! session.finalize().unwrap();
//! println!("{}", session.diagnostics().summary_line());
//! ```

mod config;
mod diagnostics;
mod error;
mod flux;
mod mode;
mod session;
mod sync;

pub use config::CouplerConfig;
pub use diagnostics::{AnomalyRecord, CouplingDiagnostics};
pub use error::CouplingError;
pub use flux::{
    ConservationAnomaly, DepthStats, FluxEstimate, SlopeArea, depth_average, depth_change,
    linear_interpolation_slope_and_area, volume_to_flux,
};
pub use mode::{CouplingMode, Solver};
pub use session::{CouplingSession, ExchangeState, Interface, SessionState};
pub use sync::{SuperStep, Synchronizer};
