//! Replay solvers.
//!
//! Stand-ins for the external solvers that replay prescribed forcing
//! instead of solving flow equations. They honour the full capability
//! surface of [`HydrodynamicModel`](crate::model::HydrodynamicModel) and
//! [`HydrologicModel`](crate::model::HydrologicModel), so a coupled run can
//! be driven end-to-end from two project files.

mod hydrodynamics;
mod hydrology;

pub use hydrodynamics::ReplayHydrodynamics;
pub use hydrology::ReplayHydrology;
