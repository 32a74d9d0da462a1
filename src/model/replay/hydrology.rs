//! Replay watershed driven by a prescribed outlet hydrograph.

use std::path::Path;

use tracing::debug;

use crate::boundary::BoundarySeries;
use crate::io::{HydrologicProject, read_hydrologic_project};
use crate::model::{HydrologicModel, SolverStatus};
use crate::types::{MINUTES_PER_DAY, SECONDS_PER_DAY, TIME_TOL, minutes_to_seconds, seconds_to_minutes};

/// Status returned when the project cannot be loaded.
const STATUS_NO_PROJECT: i32 = 1;

/// Watershed whose outlet outflow follows a hydrograph.
///
/// A burst steps the clock by whole native steps until the iteration limit,
/// the event end or the final time is reached, accumulating the outflow
/// volume with the trapezoidal rule over each step.
#[derive(Clone, Debug)]
pub struct ReplayHydrology {
    project: Option<HydrologicProject>,
    elapsed_minutes: f64,
    iteration_limit: f64,
    event_end: f64,
    go: bool,
    volume: f64,
    boundary: Option<BoundarySeries>,
    n_bursts: usize,
}

impl Default for ReplayHydrology {
    fn default() -> Self {
        Self {
            project: None,
            elapsed_minutes: 0.0,
            iteration_limit: 0.0,
            event_end: f64::INFINITY,
            go: true,
            volume: 0.0,
            boundary: None,
            n_bursts: 0,
        }
    }
}

impl ReplayHydrology {
    /// Watershed with an already loaded project. `initialize` ignores its
    /// argument.
    pub fn new(project: HydrologicProject) -> Self {
        Self {
            project: Some(project),
            ..Self::default()
        }
    }

    /// The loaded project, if any.
    pub fn project(&self) -> Option<&HydrologicProject> {
        self.project.as_ref()
    }

    /// The boundary series most recently received from the coupler.
    pub fn boundary_series(&self) -> Option<&BoundarySeries> {
        self.boundary.as_ref()
    }

    /// Number of bursts that advanced the clock.
    pub fn n_bursts(&self) -> usize {
        self.n_bursts
    }

    /// Whether the next burst may advance.
    pub fn go(&self) -> bool {
        self.go
    }
}

impl HydrologicModel for ReplayHydrology {
    fn name(&self) -> &str {
        "replay-hydrology"
    }

    fn initialize(&mut self, project: &str) -> SolverStatus {
        if self.project.is_none() {
            match read_hydrologic_project(Path::new(project)) {
                Ok(p) => self.project = Some(p),
                Err(e) => {
                    debug!(project, error = %e, "cannot load watershed project");
                    return SolverStatus(STATUS_NO_PROJECT);
                }
            }
        }
        let Some(p) = &self.project else {
            return SolverStatus(STATUS_NO_PROJECT);
        };

        self.elapsed_minutes = 0.0;
        self.volume = 0.0;
        self.iteration_limit = p.final_minutes;
        self.event_end = p.start_julian + p.final_minutes / MINUTES_PER_DAY;
        self.go = true;
        self.n_bursts = 0;
        self.boundary = p.boundary_depth.and_then(|depth| {
            BoundarySeries::uniform(
                crate::types::SERIES_LENGTH,
                p.start_julian,
                p.time_step / SECONDS_PER_DAY,
                p.time_step / SECONDS_PER_DAY,
                depth,
                TIME_TOL / SECONDS_PER_DAY,
            )
            .ok()
        });
        SolverStatus::OK
    }

    fn advance(&mut self) -> SolverStatus {
        let Some(p) = &self.project else {
            return SolverStatus(STATUS_NO_PROJECT);
        };
        if !self.go {
            return SolverStatus::OK;
        }

        let final_seconds = minutes_to_seconds(p.final_minutes);
        let limit_seconds = minutes_to_seconds(self.iteration_limit);
        let event_seconds = (self.event_end - p.start_julian) * SECONDS_PER_DAY;
        let end = limit_seconds.min(event_seconds).min(final_seconds);

        let dt = p.time_step;
        let mut t = minutes_to_seconds(self.elapsed_minutes);
        let mut volume = self.volume;
        let mut n_steps = 0usize;

        // Event end is carried in Julian days, so allow for its rounding
        while t < end - TIME_TOL {
            let t_next = (t + dt).min(final_seconds);
            volume += 0.5 * (p.outflow_at(t) + p.outflow_at(t_next)) * (t_next - t);
            t = t_next;
            n_steps += 1;
        }

        if n_steps > 0 {
            self.n_bursts += 1;
        }
        self.volume = volume;
        self.elapsed_minutes = seconds_to_minutes(t);
        debug!(n_steps, elapsed_minutes = self.elapsed_minutes, volume, "watershed burst");
        SolverStatus::OK
    }

    fn finalize(&mut self) -> SolverStatus {
        SolverStatus::OK
    }

    fn start_julian(&self) -> f64 {
        self.project.as_ref().map_or(0.0, |p| p.start_julian)
    }

    fn elapsed_minutes(&self) -> f64 {
        self.elapsed_minutes
    }

    fn set_elapsed_minutes(&mut self, minutes: f64) {
        self.elapsed_minutes = minutes;
    }

    fn time_step(&self) -> f64 {
        self.project.as_ref().map_or(0.0, |p| p.time_step)
    }

    fn final_minutes(&self) -> f64 {
        self.project.as_ref().map_or(0.0, |p| p.final_minutes)
    }

    fn set_iteration_limit(&mut self, minutes: f64) {
        self.iteration_limit = minutes;
    }

    fn set_event_end(&mut self, julian_day: f64) {
        self.event_end = julian_day;
    }

    fn set_go(&mut self, go: bool) {
        self.go = go;
    }

    fn outflow_volume(&self) -> f64 {
        self.volume
    }

    fn set_outflow_volume(&mut self, volume: f64) {
        self.volume = volume;
    }

    fn boundary_depth(&self) -> f64 {
        self.project
            .as_ref()
            .and_then(|p| p.boundary_depth)
            .unwrap_or(0.0)
    }

    fn has_boundary_series(&self) -> bool {
        self.boundary.is_some()
    }

    fn set_boundary_series(&mut self, series: BoundarySeries) {
        self.boundary = Some(series);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::SeriesEntry;

    const TOL: f64 = 1e-9;

    fn project() -> HydrologicProject {
        HydrologicProject {
            start_julian: 2_458_849.5,
            time_step: 30.0,
            final_minutes: 10.0,
            boundary_depth: Some(1.0),
            hydrograph: vec![SeriesEntry::new(0.0, 2.0), SeriesEntry::new(600.0, 2.0)],
        }
    }

    fn ready() -> ReplayHydrology {
        let mut h = ReplayHydrology::new(project());
        assert!(h.initialize("unused").is_ok());
        h
    }

    #[test]
    fn test_runs_to_final_by_default() {
        let mut h = ready();
        assert!(h.advance().is_ok());
        assert!((h.elapsed_minutes() - 10.0).abs() < TOL);
        assert!((h.outflow_volume() - 1200.0).abs() < TOL);
    }

    #[test]
    fn test_zero_limit_does_not_move() {
        let mut h = ready();
        h.set_iteration_limit(0.0);
        assert!(h.advance().is_ok());
        assert_eq!(h.elapsed_minutes(), 0.0);
        assert_eq!(h.outflow_volume(), 0.0);
        assert_eq!(h.n_bursts(), 0);
    }

    #[test]
    fn test_event_end_stops_burst() {
        let mut h = ready();
        h.set_iteration_limit(5.0);
        h.set_event_end(h.start_julian() + 90.0 / SECONDS_PER_DAY);
        assert!(h.advance().is_ok());
        assert!((minutes_to_seconds(h.elapsed_minutes()) - 90.0).abs() < 1e-6);
        assert!((h.outflow_volume() - 180.0).abs() < 1e-6);
    }

    #[test]
    fn test_go_flag_suppresses() {
        let mut h = ready();
        h.set_go(false);
        assert!(h.advance().is_ok());
        assert_eq!(h.elapsed_minutes(), 0.0);
        assert!(!h.go());
    }

    #[test]
    fn test_boundary_series_present() {
        let h = ready();
        assert!(h.has_boundary_series());
        let s = h.boundary_series().unwrap();
        assert_eq!(s.len(), 4);
        assert!((s.newest().value - 1.0).abs() < TOL);
        assert!((h.boundary_depth() - 1.0).abs() < TOL);
    }

    #[test]
    fn test_no_head_boundary() {
        let mut p = project();
        p.boundary_depth = None;
        let mut h = ReplayHydrology::new(p);
        assert!(h.initialize("unused").is_ok());
        assert!(!h.has_boundary_series());
    }

    #[test]
    fn test_missing_project_file() {
        let mut h = ReplayHydrology::default();
        let status = h.initialize("/nonexistent/watershed.prj");
        assert_eq!(status, SolverStatus(STATUS_NO_PROJECT));
        assert_eq!(h.advance(), SolverStatus(STATUS_NO_PROJECT));
    }
}
