//! Boundary series store.
//!
//! Holds the rolling forcing series each solver reads at the coupling
//! interface. Persisting a series to the exchange medium lives in
//! [`crate::io`].

mod series;

pub use series::{BoundarySeries, SeriesEntry, SeriesError};
