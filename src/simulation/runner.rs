//! Coupled run driver.
//!
//! Runs a [`CouplingSession`] through its whole lifecycle and times each
//! phase.

use std::time::Instant;

use tracing::{error, info};

use crate::coupling::{CouplerConfig, CouplingDiagnostics, CouplingMode, CouplingSession};
use crate::model::{HydrodynamicModel, HydrologicModel};

// =============================================================================
// Run Report
// =============================================================================

/// Outcome of a coupled run.
#[derive(Clone, Debug)]
pub struct CouplingReport {
    /// Hydrodynamic time reached (s)
    pub hydrodynamic_time: f64,
    /// Hydrologic time reached (s)
    pub hydrologic_time: f64,
    /// Coupling iterations completed
    pub iterations: usize,
    /// Wall-clock seconds spent initializing
    pub init_time: f64,
    /// Wall-clock seconds spent stepping
    pub run_time: f64,
    /// Wall-clock seconds spent finalizing
    pub finalize_time: f64,
    /// Counters collected by the session
    pub diagnostics: CouplingDiagnostics,
    /// Whether the run went through all phases
    pub success: bool,
    /// Error message if the run failed
    pub error: Option<String>,
}

impl CouplingReport {
    /// Total wall-clock seconds.
    pub fn total_time(&self) -> f64 {
        self.init_time + self.run_time + self.finalize_time
    }

    /// Timing lines as printed at the end of a run.
    pub fn timing_lines(&self) -> Vec<String> {
        vec![
            format!("Initialize time: {}", format_duration(self.init_time)),
            format!("Run time:        {}", format_duration(self.run_time)),
            format!("Finalize time:   {}", format_duration(self.finalize_time)),
            format!("Total time:      {}", format_duration(self.total_time())),
        ]
    }
}

/// Human-readable duration.
pub fn format_duration(secs: f64) -> String {
    if secs < 60.0 {
        format!("{:.3}s", secs)
    } else if secs < 3600.0 {
        let mins = (secs / 60.0).floor();
        format!("{:.0}m{:.0}s", mins, secs - mins * 60.0)
    } else {
        let hours = (secs / 3600.0).floor();
        let mins = ((secs - hours * 3600.0) / 60.0).floor();
        format!("{:.0}h{:.0}m", hours, mins)
    }
}

// =============================================================================
// Coupler
// =============================================================================

/// High-level coupled run.
///
/// # Example
///
/// ```no_run
/// use hydrocouple::coupling::CouplingMode;
/// use hydrocouple::model::{ReplayHydrodynamics, ReplayHydrology};
/// use hydrocouple::simulation::Coupler;
/// use std::path::Path;
///
/// let estuary = ReplayHydrodynamics::from_file(Path::new("estuary.hd")).unwrap();
/// let report = Coupler::new(estuary, ReplayHydrology::default(), CouplingMode::TwoWayHydrologyLed, 1)
///     .with_coupling_step_factor(4)
///     .run("watershed.hl");
/// assert!(report.success, "{:?}", report.error);
/// ```
pub struct Coupler<H: HydrodynamicModel, L: HydrologicModel> {
    hydrodynamics: H,
    hydrology: L,
    mode: CouplingMode,
    interface_id: usize,
    config: CouplerConfig,
}

impl<H: HydrodynamicModel, L: HydrologicModel> Coupler<H, L> {
    /// Couple the two solvers across edge string `interface_id`.
    pub fn new(hydrodynamics: H, hydrology: L, mode: CouplingMode, interface_id: usize) -> Self {
        Self {
            hydrodynamics,
            hydrology,
            mode,
            interface_id,
            config: CouplerConfig::default(),
        }
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: CouplerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the number of native hydrodynamic steps per coupling step.
    pub fn with_coupling_step_factor(mut self, factor: usize) -> Self {
        self.config.coupling_step_factor = factor;
        self
    }

    /// Set the maximum number of coupling iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = Some(max_iterations);
        self
    }

    /// Log every boundary series update at info level.
    pub fn verbose(mut self) -> Self {
        self.config.verbose = true;
        self
    }

    pub fn config(&self) -> &CouplerConfig {
        &self.config
    }

    /// Run initialize, step and finalize with the hydrologic `project`.
    pub fn run(self, project: &str) -> CouplingReport {
        self.run_with_callback(project, |_| {})
    }

    /// Run the whole lifecycle, calling `callback` after every coupling
    /// iteration.
    pub fn run_with_callback<F>(self, project: &str, callback: F) -> CouplingReport
    where
        F: FnMut(&CouplingSession<H, L>),
    {
        self.run_session(project, callback).1
    }

    /// Like [`run_with_callback`](Self::run_with_callback) but also gives back
    /// the session for inspection.
    pub fn run_session<F>(
        self,
        project: &str,
        mut callback: F,
    ) -> (CouplingSession<H, L>, CouplingReport)
    where
        F: FnMut(&CouplingSession<H, L>),
    {
        let mut session = CouplingSession::new(
            self.hydrodynamics,
            self.hydrology,
            self.mode,
            self.interface_id,
            self.config,
        );
        let mut report = CouplingReport {
            hydrodynamic_time: 0.0,
            hydrologic_time: 0.0,
            iterations: 0,
            init_time: 0.0,
            run_time: 0.0,
            finalize_time: 0.0,
            diagnostics: CouplingDiagnostics::new(),
            success: false,
            error: None,
        };

        let start = Instant::now();
        let outcome = session.initialize(project);
        report.init_time = start.elapsed().as_secs_f64();

        let outcome = outcome.and_then(|()| {
            let start = Instant::now();
            let stepped = loop {
                match session.step() {
                    Ok(true) => break Ok(()),
                    Ok(false) => callback(&session),
                    Err(e) => break Err(e),
                }
            };
            report.run_time = start.elapsed().as_secs_f64();
            stepped
        });

        let outcome = outcome.and_then(|()| {
            let start = Instant::now();
            let finalized = session.finalize();
            report.finalize_time = start.elapsed().as_secs_f64();
            finalized
        });

        report.hydrodynamic_time = session.hydrodynamic_clock().current_time;
        report.hydrologic_time = session.hydrologic_clock().current_time;
        report.iterations = session.iterations();
        report.diagnostics = session.diagnostics().clone();
        match outcome {
            Ok(()) => {
                report.success = true;
                info!(
                    "Coupled run complete: {} iterations in {}",
                    report.iterations,
                    format_duration(report.total_time())
                );
            }
            Err(e) => {
                error!("Coupled run failed: {}", e);
                report.error = Some(e.to_string());
            }
        }
        (session, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::SeriesEntry;
    use crate::io::{HydrodynamicProject, HydrologicProject, ProjectNode};
    use crate::model::{ReplayHydrodynamics, ReplayHydrology};
    use tempfile::tempdir;

    fn estuary(dir: &std::path::Path) -> ReplayHydrodynamics {
        let node = |id, x| ProjectNode {
            id,
            x,
            y: 0.0,
            code: 2,
            edge: 1,
            flux: 0.0,
            error_velocity: 0.0,
        };
        ReplayHydrodynamics::new(
            HydrodynamicProject {
                start_time: 0.0,
                time_step: 30.0,
                final_time: 900.0,
                basin_area: 5.0e4,
                nodes: vec![node(1, 0.0), node(2, 40.0)],
                tide: vec![SeriesEntry::new(0.0, 0.0)],
            },
            dir,
        )
    }

    fn watershed() -> ReplayHydrology {
        ReplayHydrology::new(HydrologicProject {
            start_julian: 2_451_544.5,
            time_step: 60.0,
            final_minutes: 15.0,
            boundary_depth: Some(0.5),
            hydrograph: vec![SeriesEntry::new(0.0, 1.0), SeriesEntry::new(900.0, 3.0)],
        })
    }

    #[test]
    fn test_report_success() {
        let dir = tempdir().unwrap();
        let mut callbacks = 0;
        let report = Coupler::new(
            estuary(dir.path()),
            watershed(),
            CouplingMode::TwoWayHydrologyLed,
            1,
        )
        .with_coupling_step_factor(2)
        .run_with_callback("", |_| callbacks += 1);
        assert!(report.success, "{:?}", report.error);
        assert!((report.hydrodynamic_time - 900.0).abs() < 1e-9);
        assert!((report.hydrologic_time - 900.0).abs() < 1e-9);
        assert_eq!(callbacks + 1, report.iterations);
        assert!(report.diagnostics.flux_updates() > 0);
        assert_eq!(report.timing_lines().len(), 4);
    }

    #[test]
    fn test_report_failure() {
        let dir = tempdir().unwrap();
        let report = Coupler::new(
            estuary(dir.path()),
            watershed(),
            CouplingMode::HydrologyToHydrodynamics,
            7,
        )
        .run("");
        assert!(!report.success);
        assert!(report.error.unwrap().contains("edge string 7"));
        assert_eq!(report.iterations, 0);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(1.5), "1.500s");
        assert_eq!(format_duration(125.0), "2m5s");
        assert_eq!(format_duration(7260.0), "2h1m");
    }
}
