//! Coupler configuration.

use std::path::PathBuf;

use super::CouplingError;
use crate::types::{SERIES_LENGTH, TIME_TOL};

/// Configuration for a coupled run.
#[derive(Clone, Debug, PartialEq)]
pub struct CouplerConfig {
    /// Tolerance (s) for every synchronization comparison.
    pub time_tolerance: f64,
    /// Entries in each exchanged boundary series.
    pub series_length: usize,
    /// Hydrodynamic native steps per coupling step.
    pub coupling_step_factor: usize,
    /// Factor converting hydrologic volumes to cubic metres.
    pub hydrograph_factor: f64,
    /// Flux exchange file. Defaults to a file in the hydrodynamic input
    /// directory named after the coupling mode.
    pub exchange_path: Option<PathBuf>,
    /// Where to mirror the hydrologic boundary series after each update.
    pub depth_series_path: Option<PathBuf>,
    /// Stop with an error after this many coupling iterations.
    pub max_iterations: Option<usize>,
    /// Log series contents at info level instead of trace.
    pub verbose: bool,
}

impl Default for CouplerConfig {
    fn default() -> Self {
        Self {
            time_tolerance: TIME_TOL,
            series_length: SERIES_LENGTH,
            coupling_step_factor: 1,
            hydrograph_factor: 1.0,
            exchange_path: None,
            depth_series_path: None,
            max_iterations: None,
            verbose: false,
        }
    }
}

impl CouplerConfig {
    /// Set the time tolerance.
    pub fn with_time_tolerance(mut self, tolerance: f64) -> Self {
        self.time_tolerance = tolerance;
        self
    }

    /// Set the boundary series length.
    pub fn with_series_length(mut self, length: usize) -> Self {
        self.series_length = length;
        self
    }

    /// Set the number of native hydrodynamic steps per coupling step.
    pub fn with_coupling_step_factor(mut self, factor: usize) -> Self {
        self.coupling_step_factor = factor;
        self
    }

    /// Set the hydrologic volume conversion factor.
    pub fn with_hydrograph_factor(mut self, factor: f64) -> Self {
        self.hydrograph_factor = factor;
        self
    }

    /// Set the flux exchange file path.
    pub fn with_exchange_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.exchange_path = Some(path.into());
        self
    }

    /// Mirror the hydrologic boundary series to a file.
    pub fn with_depth_series_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.depth_series_path = Some(path.into());
        self
    }

    /// Cap the number of coupling iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    /// Enable verbose series logging.
    pub fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }

    /// Check the settings before any solver is touched.
    pub fn validate(&self) -> Result<(), CouplingError> {
        if !self.time_tolerance.is_finite() || self.time_tolerance <= 0.0 {
            return Err(CouplingError::Configuration(format!(
                "time tolerance must be positive, got {}",
                self.time_tolerance
            )));
        }
        if self.series_length < SERIES_LENGTH {
            return Err(CouplingError::Configuration(format!(
                "series length must be at least {}, got {}",
                SERIES_LENGTH, self.series_length
            )));
        }
        if self.coupling_step_factor == 0 {
            return Err(CouplingError::Configuration(
                "coupling step factor must be at least 1".into(),
            ));
        }
        if !self.hydrograph_factor.is_finite() || self.hydrograph_factor <= 0.0 {
            return Err(CouplingError::Configuration(format!(
                "hydrograph factor must be positive, got {}",
                self.hydrograph_factor
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CUFT_TO_CUM;

    #[test]
    fn test_default_config() {
        let config = CouplerConfig::default();
        assert_eq!(config.time_tolerance, TIME_TOL);
        assert_eq!(config.series_length, 4);
        assert_eq!(config.coupling_step_factor, 1);
        assert!(config.exchange_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = CouplerConfig::default()
            .with_series_length(6)
            .with_coupling_step_factor(4)
            .with_hydrograph_factor(CUFT_TO_CUM)
            .with_exchange_path("/tmp/flux")
            .with_max_iterations(100)
            .verbose();
        assert_eq!(config.series_length, 6);
        assert_eq!(config.coupling_step_factor, 4);
        assert_eq!(config.max_iterations, Some(100));
        assert!(config.verbose);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_settings() {
        let short = CouplerConfig::default().with_series_length(3);
        assert!(matches!(short.validate(), Err(CouplingError::Configuration(_))));

        let zero_factor = CouplerConfig::default().with_coupling_step_factor(0);
        assert!(zero_factor.validate().is_err());

        let bad_tol = CouplerConfig::default().with_time_tolerance(0.0);
        assert!(bad_tol.validate().is_err());

        let bad_volume = CouplerConfig::default().with_hydrograph_factor(-1.0);
        assert!(bad_volume.validate().is_err());
    }
}
