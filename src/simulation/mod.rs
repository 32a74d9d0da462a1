//! Whole-run driver.
//!
//! Wraps a [`CouplingSession`](crate::coupling::CouplingSession) in the
//! initialize, run and finalize sequence of a coupled simulation and
//! reports wall-clock timings for each phase.
//!
//! # Example
//! ```no_run
//! use hydrocouple::coupling::CouplingMode;
//! use hydrocouple::model::{ReplayHydrodynamics, ReplayHydrology};
//! use hydrocouple::simulation::Coupler;
//! use std::path::Path;
//!
//! let estuary = ReplayHydrodynamics::from_file(Path::new("estuary.hd")).unwrap();
//! let report = Coupler::new(estuary, ReplayHydrology::default(), CouplingMode::HydrologyToHydrodynamics, 1)
//!     .run("watershed.hl");
//! for line in report.timing_lines() {
//!     println!("{}", line);
//! }
//! ```

mod runner;

pub use crate::coupling::CouplerConfig;
pub use runner::{Coupler, CouplingReport, format_duration};
