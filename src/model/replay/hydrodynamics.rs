//! Replay estuary: prescribed tide plus a storage basin fed by the coupled
//! flux boundary.
//!
//! The water surface along every boundary node is
//!
//! ```text
//! eta(t) = tide(t) + V_in(t) / basin_area
//! ```
//!
//! where `V_in` is the volume that entered through the coupled edge string,
//! integrated from the forcing series with the trapezoidal rule over each
//! native step.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::boundary::BoundarySeries;
use crate::io::{
    FluxNode, HydrodynamicProject, NodeFormat, ProjectFileError, read_hydrodynamic_project,
    read_nodal_flux,
};
use crate::model::{HydrodynamicModel, ReduceOp, Reducer, SingleWorker, SolverStatus};

/// Status codes of the replay estuary.
const STATUS_BAD_PROJECT: i32 = 1;
const STATUS_UNREADABLE_FLUX: i32 = 2;
const STATUS_INPUT_STILL_OPEN: i32 = 3;
const STATUS_FLUX_MISMATCH: i32 = 4;

/// Storage-basin estuary replaying a prescribed tide.
///
/// With a [`Reducer`] other than [`SingleWorker`] the estuary behaves as
/// one worker of a partitioned run: it reports only its own slice of every
/// edge string, while the basin state itself is replicated.
#[derive(Clone, Debug)]
pub struct ReplayHydrodynamics<R: Reducer = SingleWorker> {
    project: HydrodynamicProject,
    input_dir: PathBuf,
    reducer: R,
    steps_taken: usize,
    inflow_volume: f64,
    previous_inflow_volume: f64,
    forcing: Option<(usize, BoundarySeries)>,
    input_open: bool,
    n_reopens: usize,
}

impl ReplayHydrodynamics<SingleWorker> {
    /// Single-worker estuary from a project.
    pub fn new(project: HydrodynamicProject, input_dir: impl Into<PathBuf>) -> Self {
        Self::with_reducer(project, input_dir, SingleWorker)
    }

    /// Single-worker estuary read from a project file. Exchange files go
    /// next to it.
    pub fn from_file(path: &Path) -> Result<Self, ProjectFileError> {
        let project = read_hydrodynamic_project(path)?;
        Ok(Self::new(project, project_dir(path)))
    }
}

impl<R: Reducer> ReplayHydrodynamics<R> {
    /// Estuary acting as one worker of a partitioned run.
    pub fn with_reducer(
        project: HydrodynamicProject,
        input_dir: impl Into<PathBuf>,
        reducer: R,
    ) -> Self {
        Self {
            project,
            input_dir: input_dir.into(),
            reducer,
            steps_taken: 0,
            inflow_volume: 0.0,
            previous_inflow_volume: 0.0,
            forcing: None,
            input_open: false,
            n_reopens: 0,
        }
    }

    /// The project being replayed.
    pub fn project(&self) -> &HydrodynamicProject {
        &self.project
    }

    /// Native steps taken so far.
    pub fn steps_taken(&self) -> usize {
        self.steps_taken
    }

    /// Volume that entered through the forced edge string (m³).
    pub fn inflow_volume(&self) -> f64 {
        self.inflow_volume
    }

    /// The forcing series most recently handed over by the coupler.
    pub fn forcing(&self) -> Option<&BoundarySeries> {
        self.forcing.as_ref().map(|(_, s)| s)
    }

    /// How many times the flux file has been reopened.
    pub fn n_reopens(&self) -> usize {
        self.n_reopens
    }

    /// Length of the whole edge string (m), independent of partitioning.
    pub fn edge_length(&self, edge: usize) -> f64 {
        let nodes: Vec<_> = self.project.edge_nodes(edge).collect();
        nodes
            .windows(2)
            .map(|w| (w[1].x - w[0].x).hypot(w[1].y - w[0].y))
            .sum()
    }

    fn time_at(&self, steps: usize) -> f64 {
        self.project.start_time + steps as f64 * self.project.time_step
    }

    fn forcing_flux(&self, t: f64) -> f64 {
        self.forcing.as_ref().map_or(0.0, |(_, s)| s.interpolate(t))
    }

    fn elevation(&self, t: f64, inflow_volume: f64) -> f64 {
        self.project.tide_at(t) + inflow_volume / self.project.basin_area
    }

    /// Index range of edge nodes owned by this worker.
    ///
    /// With `with_shared_end` the range includes the first node of the next
    /// worker, so each worker sees complete segments.
    fn owned_nodes(&self, n_nodes: usize, with_shared_end: bool) -> std::ops::Range<usize> {
        if n_nodes == 0 {
            return 0..0;
        }
        let n_workers = self.reducer.n_workers();
        let rank = self.reducer.rank();
        let n_segments = n_nodes - 1;
        let first = rank * n_segments / n_workers;
        let last = (rank + 1) * n_segments / n_workers;
        if with_shared_end || rank + 1 == n_workers {
            first..last + 1
        } else {
            first..last
        }
    }
}

impl<R: Reducer> Reducer for ReplayHydrodynamics<R> {
    fn rank(&self) -> usize {
        self.reducer.rank()
    }

    fn n_workers(&self) -> usize {
        self.reducer.n_workers()
    }

    fn reduce(&self, value: f64, op: ReduceOp) -> f64 {
        self.reducer.reduce(value, op)
    }
}

impl<R: Reducer> HydrodynamicModel for ReplayHydrodynamics<R> {
    fn name(&self) -> &str {
        "replay-hydrodynamics"
    }

    fn initialize(&mut self) -> SolverStatus {
        let p = &self.project;
        if !p.time_step.is_finite() || p.time_step <= 0.0 || p.final_time < p.start_time {
            return SolverStatus(STATUS_BAD_PROJECT);
        }
        self.steps_taken = 0;
        self.inflow_volume = 0.0;
        self.previous_inflow_volume = 0.0;
        self.input_open = true;
        self.n_reopens = 0;
        SolverStatus::OK
    }

    fn advance(&mut self, n_native_steps: usize) -> SolverStatus {
        let n = n_native_steps.min(self.remaining_steps());
        let dt = self.project.time_step;
        let length = match &self.forcing {
            Some((edge, _)) => self.edge_length(*edge),
            None => 0.0,
        };

        for _ in 0..n {
            let t0 = self.time_at(self.steps_taken);
            let t1 = t0 + dt;
            self.previous_inflow_volume = self.inflow_volume;
            self.inflow_volume +=
                0.5 * (self.forcing_flux(t0) + self.forcing_flux(t1)) * dt * length;
            self.steps_taken += 1;
        }

        debug!(
            rank = self.reducer.rank(),
            n_steps = n,
            time = self.current_time(),
            inflow_volume = self.inflow_volume,
            "estuary burst"
        );
        SolverStatus::OK
    }

    fn finalize(&mut self) -> SolverStatus {
        self.input_open = false;
        SolverStatus::OK
    }

    fn start_time(&self) -> f64 {
        self.project.start_time
    }

    fn current_time(&self) -> f64 {
        self.time_at(self.steps_taken)
    }

    fn time_step(&self) -> f64 {
        self.project.time_step
    }

    fn final_time(&self) -> f64 {
        self.project.final_time
    }

    fn remaining_steps(&self) -> usize {
        self.project.total_steps().saturating_sub(self.steps_taken)
    }

    fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    fn interface_positions(&self, interface: usize) -> Option<Vec<(f64, f64)>> {
        let nodes: Vec<_> = self.project.edge_nodes(interface).collect();
        if nodes.is_empty() || nodes.iter().any(|n| NodeFormat::from_code(n.code).is_none()) {
            return None;
        }
        let range = self.owned_nodes(nodes.len(), true);
        Some(nodes[range].iter().map(|n| (n.x, n.y)).collect())
    }

    fn surface_elevation(&self, interface: usize) -> Vec<f64> {
        let n = self.project.edge_nodes(interface).count();
        let eta = self.elevation(self.current_time(), self.inflow_volume);
        vec![eta; self.owned_nodes(n, false).len()]
    }

    fn previous_surface_elevation(&self, interface: usize) -> Vec<f64> {
        let n = self.project.edge_nodes(interface).count();
        let (t, volume) = if self.steps_taken > 0 {
            (self.time_at(self.steps_taken - 1), self.previous_inflow_volume)
        } else {
            (self.current_time(), self.inflow_volume)
        };
        let eta = self.elevation(t, volume);
        vec![eta; self.owned_nodes(n, false).len()]
    }

    fn flux_nodes(&self, interface: usize) -> Vec<FluxNode> {
        self.project
            .nodes
            .iter()
            .map(|n| {
                if n.edge == interface {
                    FluxNode::coupled(n.code)
                } else {
                    FluxNode::fixed(n.code, n.flux, n.error_velocity)
                }
            })
            .collect()
    }

    fn set_boundary_forcing(&mut self, interface: usize, series: &BoundarySeries) {
        self.forcing = Some((interface, series.clone()));
    }

    fn close_boundary_input(&mut self) -> SolverStatus {
        self.input_open = false;
        SolverStatus::OK
    }

    fn reopen_boundary_input(&mut self, path: &Path) -> SolverStatus {
        if self.input_open {
            return SolverStatus(STATUS_INPUT_STILL_OPEN);
        }
        let Some((interface, series)) = &self.forcing else {
            return SolverStatus(STATUS_FLUX_MISMATCH);
        };
        let nodes = self.flux_nodes(*interface);
        let blocks = match read_nodal_flux(path, &nodes) {
            Ok(b) => b,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "cannot read flux file");
                return SolverStatus(STATUS_UNREADABLE_FLUX);
            }
        };
        if blocks.len() != series.len() {
            return SolverStatus(STATUS_FLUX_MISMATCH);
        }
        self.input_open = true;
        self.n_reopens += 1;
        SolverStatus::OK
    }
}

fn project_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::SeriesEntry;
    use crate::io::{ProjectNode, persist_nodal_flux};
    use crate::model::{WorkerGroup, WorkerHandle};
    use std::sync::Arc;
    use tempfile::tempdir;

    const TOL: f64 = 1e-9;

    fn node(id: usize, x: f64, code: i32, edge: usize) -> ProjectNode {
        ProjectNode {
            id,
            x,
            y: 0.0,
            code,
            edge,
            flux: 0.0,
            error_velocity: 0.0,
        }
    }

    fn project() -> HydrodynamicProject {
        HydrodynamicProject {
            start_time: 0.0,
            time_step: 60.0,
            final_time: 600.0,
            basin_area: 1.0e4,
            nodes: vec![
                node(1, 0.0, 22, 1),
                node(2, 25.0, 22, 1),
                node(3, 50.0, 22, 1),
                node(4, 75.0, 22, 1),
                node(5, 100.0, 22, 1),
                node(6, 500.0, 0, 2),
            ],
            tide: vec![SeriesEntry::new(0.0, 0.0), SeriesEntry::new(600.0, 0.6)],
        }
    }

    fn constant_forcing(flux: f64) -> BoundarySeries {
        BoundarySeries::uniform(4, 600.0, 200.0, 1.0, flux, 1.0).unwrap()
    }

    #[test]
    fn test_clock() {
        let mut hd = ReplayHydrodynamics::new(project(), ".");
        assert!(hd.initialize().is_ok());
        assert_eq!(hd.remaining_steps(), 10);
        assert!(hd.advance(3).is_ok());
        assert!((hd.current_time() - 180.0).abs() < TOL);
        assert!(hd.advance(100).is_ok());
        assert!((hd.current_time() - 600.0).abs() < TOL);
        assert_eq!(hd.remaining_steps(), 0);
    }

    #[test]
    fn test_interface_geometry() {
        let hd = ReplayHydrodynamics::new(project(), ".");
        let pos = hd.interface_positions(1).unwrap();
        assert_eq!(pos.len(), 5);
        assert!(hd.interface_positions(2).is_none());
        assert!(hd.interface_positions(9).is_none());
        assert!((hd.edge_length(1) - 100.0).abs() < TOL);
    }

    #[test]
    fn test_storage_rise() {
        let mut hd = ReplayHydrodynamics::new(project(), ".");
        hd.initialize();
        hd.set_boundary_forcing(1, &constant_forcing(0.5));
        hd.advance(2);
        // 0.5 m²/s * 100 m * 120 s
        assert!((hd.inflow_volume() - 6000.0).abs() < TOL);
        let eta = hd.surface_elevation(1);
        assert_eq!(eta.len(), 5);
        assert!((eta[0] - (0.12 + 0.6)).abs() < TOL);
        let prev = hd.previous_surface_elevation(1);
        assert!((prev[0] - (0.06 + 0.3)).abs() < TOL);
    }

    #[test]
    fn test_reopen_requires_close() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flux.exchange");
        let mut hd = ReplayHydrodynamics::new(project(), dir.path());
        hd.initialize();
        let series = constant_forcing(0.1);
        persist_nodal_flux(&path, &hd.flux_nodes(1), &series).unwrap();
        hd.set_boundary_forcing(1, &series);

        assert_eq!(hd.reopen_boundary_input(&path), SolverStatus(STATUS_INPUT_STILL_OPEN));
        assert!(hd.close_boundary_input().is_ok());
        assert!(hd.reopen_boundary_input(&path).is_ok());
        assert_eq!(hd.n_reopens(), 1);
    }

    #[test]
    fn test_reopen_detects_stale_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flux.exchange");
        let mut hd = ReplayHydrodynamics::new(project(), dir.path());
        hd.initialize();
        let long = BoundarySeries::uniform(6, 600.0, 100.0, 1.0, 0.1, 1.0).unwrap();
        persist_nodal_flux(&path, &hd.flux_nodes(1), &long).unwrap();
        hd.set_boundary_forcing(1, &constant_forcing(0.1));
        hd.close_boundary_input();
        assert_eq!(hd.reopen_boundary_input(&path), SolverStatus(STATUS_FLUX_MISMATCH));

        hd.close_boundary_input();
        let missing = dir.path().join("missing");
        assert_eq!(hd.reopen_boundary_input(&missing), SolverStatus(STATUS_UNREADABLE_FLUX));
    }

    #[test]
    fn test_partitioned_edge() {
        let group = Arc::new(WorkerGroup::new(3));
        let handles = WorkerHandle::for_group(&group);
        let workers: Vec<_> = handles
            .into_iter()
            .map(|h| ReplayHydrodynamics::with_reducer(project(), ".", h))
            .collect();

        let mut n_positions = 0;
        let mut n_samples = 0;
        let mut length = 0.0;
        for w in &workers {
            let pos = w.interface_positions(1).unwrap();
            n_positions += pos.len();
            n_samples += w.surface_elevation(1).len();
            length += pos
                .windows(2)
                .map(|s| (s[1].0 - s[0].0).hypot(s[1].1 - s[0].1))
                .sum::<f64>();
        }
        assert_eq!(n_samples, 5);
        assert_eq!(n_positions, 5 + 2);
        assert!((length - 100.0).abs() < TOL);
    }
}
