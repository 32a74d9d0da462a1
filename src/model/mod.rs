//! Solver-facing side of the coupler.
//!
//! - **Traits**: the capability surface each coupled solver exposes
//! - **Reductions**: combining worker-local values across a partitioned
//!   hydrodynamic run
//! - **Replay solvers**: file-driven implementations of both traits
//!
//! # Example
//!
//! ```
//! use hydrocouple::model::{Reducer, SingleWorker};
//!
//! let worker = SingleWorker;
//! assert_eq!(worker.reduce_sum(2.5), 2.5);
//! ```

mod reduction;
pub mod replay;
mod traits;

pub use reduction::{ReduceOp, Reducer, SingleWorker, WorkerGroup, WorkerHandle};
pub use replay::{ReplayHydrodynamics, ReplayHydrology};
pub use traits::{HydrodynamicModel, HydrologicModel, SolverStatus};
