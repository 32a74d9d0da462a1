//! Shared value types for the coupler.
//!
//! - **Clocks**: `SolverClock` and `RunFlag` track each solver's simulated time
//! - **Units**: conversion between seconds, minutes and Julian days, plus the
//!   tolerance constants every synchronization rule is expressed against
//!
//! # Example
//!
//! ```
//! use hydrocouple::types::{RunFlag, SolverClock};
//!
//! let mut clock = SolverClock::new(0.0, 60.0, 3600.0);
//! assert_eq!(clock.run_flag, RunFlag::On);
//! assert!(clock.advance_to(120.0));
//! assert_eq!(clock.remaining(), 3480.0);
//! ```

mod clock;
mod units;

pub use clock::{RunFlag, SolverClock};
pub use units::{
    CUFT_TO_CUM, FLUX_EPSILON, MINUTES_PER_DAY, SECONDS_PER_DAY, SECONDS_PER_MINUTE,
    SERIES_LENGTH, TIME_TOL, UNIX_EPOCH_JULIAN, datetime_to_julian, days_to_seconds,
    julian_to_datetime, minutes_to_seconds, seconds_to_days, seconds_to_minutes,
};
