//! Coupling session: the state machine that drives both solvers.
//!
//! ```text
//!  Uninitialized --initialize--> Initialized --step--> Stepping --finalize--> Finalized
//!                                     |                 ^    |
//!                                     |                 +----+ step
//!                                     +------------finalize----------------->
//! ```
//!
//! One iteration of `step` runs the leading solver for one burst, forwards
//! its boundary output, then runs the trailing solver up to the point just
//! fixed:
//!
//! | leader | iteration |
//! |--------|-----------|
//! | hydrologic | hydrology burst, flux update, hydrodynamic burst, depth update (two-way) |
//! | hydrodynamic | hydrodynamic burst, depth update, hydrology burst, flux update (two-way) |
//!
//! A solver that reaches its final time is switched off for good; the other
//! one then runs to its own final time in a single burst.
//!
//! # Workers
//!
//! Every worker of a partitioned hydrodynamic run owns its own session.
//! All sessions make the same reductions in the same order. Only rank 0
//! advances the hydrologic solver; the other ranks receive its clock and
//! outflow volume through max-reductions.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info, trace, warn};

use super::config::CouplerConfig;
use super::diagnostics::CouplingDiagnostics;
use super::error::CouplingError;
use super::flux::{depth_average, depth_change, linear_interpolation_slope_and_area, volume_to_flux};
use super::mode::{CouplingMode, Solver};
use super::sync::{SuperStep, Synchronizer};
use crate::boundary::{BoundarySeries, SeriesEntry};
use crate::io::{FluxNode, persist_boundary_series, persist_nodal_flux};
use crate::model::{HydrodynamicModel, HydrologicModel, Reducer, SolverStatus};
use crate::types::{
    SolverClock, julian_to_datetime, minutes_to_seconds, seconds_to_days, seconds_to_minutes,
};

/// Contribution of a rank that does not run the hydrologic solver to a
/// max-reduction broadcasting rank 0's value.
const IDLE_RANK_VALUE: f64 = -1.0e200;

/// Lifecycle state of a [`CouplingSession`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionState {
    Uninitialized,
    Initialized,
    Stepping,
    Finalized,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Uninitialized => write!(f, "uninitialized"),
            SessionState::Initialized => write!(f, "initialized"),
            SessionState::Stepping => write!(f, "stepping"),
            SessionState::Finalized => write!(f, "finalized"),
        }
    }
}

/// The coupled edge string. Fixed once the session is initialized.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Interface {
    /// Edge string id in the hydrodynamic model
    pub id: usize,
    /// Length over all workers (m)
    pub length: f64,
    /// Elevation samples over all workers
    pub n_nodes: usize,
}

/// Values carried from one boundary update to the next.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ExchangeState {
    /// Hydrologic outflow volume at the last flux update (solver units)
    pub previous_volume: f64,
    /// Hydrologic time of `previous_volume` (s)
    pub previous_volume_time: f64,
    /// Average interface elevation at the last depth update (m)
    pub previous_depth: f64,
    /// Slope of the newest flux series segment
    pub slope: f64,
    /// Volume per unit width carried by the newest flux series segment
    pub area: f64,
}

fn check(status: SolverStatus, solver: Solver, phase: &'static str) -> Result<(), CouplingError> {
    if status.is_ok() {
        Ok(())
    } else {
        Err(CouplingError::SolverFailure {
            solver,
            phase,
            code: status.code(),
        })
    }
}

/// Per-rank exchange file: `path.NNNN` when more than one worker writes.
fn rank_path(path: PathBuf, rank: usize, n_workers: usize) -> PathBuf {
    if n_workers <= 1 {
        return path;
    }
    let mut name = path.into_os_string();
    name.push(format!(".{:04}", rank));
    PathBuf::from(name)
}

/// Dual time-stepping coupling between a hydrodynamic and a hydrologic
/// solver.
///
/// # Example
///
/// ```no_run
/// use hydrocouple::coupling::{CouplerConfig, CouplingMode, CouplingSession};
/// use hydrocouple::model::{ReplayHydrodynamics, ReplayHydrology};
/// use std::path::Path;
///
/// let estuary = ReplayHydrodynamics::from_file(Path::new("estuary.hd")).unwrap();
/// let mut session = CouplingSession::new(
///     estuary,
///     ReplayHydrology::default(),
///     CouplingMode::TwoWayHydrologyLed,
///     1,
///     CouplerConfig::default(),
/// );
/// session.initialize("watershed.hl").unwrap();
/// session.run().unwrap();
/// session.finalize().unwrap();
/// ```
pub struct CouplingSession<H: HydrodynamicModel, L: HydrologicModel> {
    mode: CouplingMode,
    config: CouplerConfig,
    sync: Synchronizer,
    state: SessionState,
    hydrodynamics: H,
    hydrology: L,
    /// Step size is the coupling step (native step times the factor)
    hd_clock: SolverClock,
    hl_clock: SolverClock,
    /// End of the latest hydrodynamic burst as planned in coupling steps
    hd_next: f64,
    /// Hydrologic iteration limit (elapsed minutes)
    iteration_limit: f64,
    start_julian: f64,
    interface: Interface,
    exchange: ExchangeState,
    flux_series: Option<BoundarySeries>,
    depth_series: Option<BoundarySeries>,
    flux_nodes: Vec<FluxNode>,
    exchange_path: PathBuf,
    diagnostics: CouplingDiagnostics,
    iterations: usize,
}

impl<H: HydrodynamicModel, L: HydrologicModel> CouplingSession<H, L> {
    /// Session coupling `hydrodynamics` and `hydrology` across edge string
    /// `interface_id`. Nothing is touched until [`initialize`](Self::initialize).
    pub fn new(
        hydrodynamics: H,
        hydrology: L,
        mode: CouplingMode,
        interface_id: usize,
        config: CouplerConfig,
    ) -> Self {
        let sync = Synchronizer::new(config.time_tolerance);
        Self {
            mode,
            config,
            sync,
            state: SessionState::Uninitialized,
            hydrodynamics,
            hydrology,
            hd_clock: SolverClock::new(0.0, 0.0, 0.0),
            hl_clock: SolverClock::new(0.0, 0.0, 0.0),
            hd_next: 0.0,
            iteration_limit: 0.0,
            start_julian: 0.0,
            interface: Interface {
                id: interface_id,
                length: 0.0,
                n_nodes: 0,
            },
            exchange: ExchangeState::default(),
            flux_series: None,
            depth_series: None,
            flux_nodes: Vec::new(),
            exchange_path: PathBuf::new(),
            diagnostics: CouplingDiagnostics::new(),
            iterations: 0,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn mode(&self) -> CouplingMode {
        self.mode
    }

    pub fn config(&self) -> &CouplerConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The coupled edge string (length is zero before initialization).
    pub fn interface(&self) -> &Interface {
        &self.interface
    }

    pub fn exchange(&self) -> &ExchangeState {
        &self.exchange
    }

    /// Hydrodynamic clock; its step size is the coupling step.
    pub fn hydrodynamic_clock(&self) -> &SolverClock {
        &self.hd_clock
    }

    pub fn hydrologic_clock(&self) -> &SolverClock {
        &self.hl_clock
    }

    /// Clock of the leading solver.
    pub fn drive_clock(&self) -> &SolverClock {
        match self.mode.leader() {
            Solver::Hydrologic => &self.hl_clock,
            Solver::Hydrodynamic => &self.hd_clock,
        }
    }

    /// Clock of the trailing solver.
    pub fn driven_clock(&self) -> &SolverClock {
        match self.mode.leader() {
            Solver::Hydrologic => &self.hd_clock,
            Solver::Hydrodynamic => &self.hl_clock,
        }
    }

    /// Flux series forcing the hydrodynamic interface, if this mode has one.
    pub fn flux_series(&self) -> Option<&BoundarySeries> {
        self.flux_series.as_ref()
    }

    /// Depth series forcing the hydrologic outlet, if this mode has one.
    pub fn depth_series(&self) -> Option<&BoundarySeries> {
        self.depth_series.as_ref()
    }

    /// Flux exchange file of this worker.
    pub fn exchange_path(&self) -> &Path {
        &self.exchange_path
    }

    pub fn diagnostics(&self) -> &CouplingDiagnostics {
        &self.diagnostics
    }

    /// Completed coupling iterations.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn hydrodynamics(&self) -> &H {
        &self.hydrodynamics
    }

    pub fn hydrology(&self) -> &L {
        &self.hydrology
    }

    /// Give back both solvers.
    pub fn into_solvers(self) -> (H, L) {
        (self.hydrodynamics, self.hydrology)
    }

    /// True once both solvers have reached their final times.
    pub fn is_complete(&self) -> bool {
        self.hydrodynamics_done() && self.hydrology_done()
    }

    fn hydrodynamics_done(&self) -> bool {
        self.hd_clock.is_finished(self.config.time_tolerance)
            || self.hydrodynamics.remaining_steps() == 0
    }

    fn hydrology_done(&self) -> bool {
        self.hl_clock.is_finished(self.config.time_tolerance)
    }

    fn is_rank_zero(&self) -> bool {
        self.hydrodynamics.rank() == 0
    }

    fn require_state(
        &self,
        allowed: &[SessionState],
        to: SessionState,
    ) -> Result<(), CouplingError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(CouplingError::InvalidTransition {
                from: self.state,
                to,
            })
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Initialize both solvers, measure the interface, write the initial
    /// boundary series and prime the hydrologic solver.
    pub fn initialize(&mut self, project: &str) -> Result<(), CouplingError> {
        self.require_state(&[SessionState::Uninitialized], SessionState::Initialized)?;
        self.config.validate()?;

        if self.is_rank_zero() {
            info!("Coupling mode {}: {}", self.mode, self.mode.description());
        }

        check(self.hydrodynamics.initialize(), Solver::Hydrodynamic, "initialize")?;
        check(self.hydrology.initialize(project), Solver::Hydrologic, "initialize")?;

        let hd_step = self.hydrodynamics.time_step() * self.config.coupling_step_factor as f64;
        if !hd_step.is_finite() || hd_step <= 0.0 {
            return Err(CouplingError::Configuration(format!(
                "{} time step must be positive, got {}",
                self.hydrodynamics.name(),
                self.hydrodynamics.time_step()
            )));
        }
        let hl_step = self.hydrology.time_step();
        if !hl_step.is_finite() || hl_step <= 0.0 {
            return Err(CouplingError::Configuration(format!(
                "{} time step must be positive, got {}",
                self.hydrology.name(),
                hl_step
            )));
        }

        self.hd_clock = SolverClock::new(
            self.hydrodynamics.current_time(),
            hd_step,
            self.hydrodynamics.final_time(),
        );
        self.hd_next = self.hd_clock.current_time;
        self.hl_clock = SolverClock::new(
            minutes_to_seconds(self.hydrology.elapsed_minutes()),
            hl_step,
            minutes_to_seconds(self.hydrology.final_minutes()),
        );
        self.start_julian = self.hydrology.start_julian();

        self.measure_interface()?;

        self.flux_nodes = self.hydrodynamics.flux_nodes(self.interface.id);
        let base = self.config.exchange_path.clone().unwrap_or_else(|| {
            self.hydrodynamics
                .input_dir()
                .join(format!("flux_exchange.{}", self.mode.token()))
        });
        self.exchange_path = rank_path(
            base,
            self.hydrodynamics.rank(),
            self.hydrodynamics.n_workers(),
        );

        if self.mode.feeds_hydrology() && !self.hydrology.has_boundary_series() {
            return Err(CouplingError::Configuration(format!(
                "{} has no head boundary series for mode {}",
                self.hydrology.name(),
                self.mode
            )));
        }

        match self.mode.leader() {
            Solver::Hydrologic => {
                self.init_flux_series()?;
                if self.mode.feeds_hydrology() {
                    self.init_depth_series()?;
                }
            }
            Solver::Hydrodynamic => {
                self.init_depth_series()?;
                if self.mode.feeds_hydrodynamics() {
                    self.init_flux_series()?;
                }
            }
        }

        // Zero-length priming run
        self.iteration_limit = 0.0;
        self.hydrology.set_iteration_limit(self.iteration_limit);
        self.advance_hydrology("priming")?;

        let volume = self.broadcast_volume();
        self.exchange.previous_volume = volume;
        self.exchange.previous_volume_time = self.hl_clock.current_time;

        if self.is_rank_zero() {
            let start = julian_to_datetime(self.start_julian)
                .map(|d| d.to_rfc3339())
                .unwrap_or_else(|| format!("JD {}", self.start_julian));
            info!("{}: {}", self.hydrodynamics.name(), self.hd_clock);
            info!("{}: {} (start {})", self.hydrology.name(), self.hl_clock, start);
            info!(
                "Edge string {}: length {:.3} m, {} nodes, exchange file {}",
                self.interface.id,
                self.interface.length,
                self.interface.n_nodes,
                self.exchange_path.display()
            );
        }

        self.state = SessionState::Initialized;
        Ok(())
    }

    /// Run one coupling iteration.
    ///
    /// Returns `true` once both solvers have finished.
    pub fn step(&mut self) -> Result<bool, CouplingError> {
        self.require_state(
            &[SessionState::Initialized, SessionState::Stepping],
            SessionState::Stepping,
        )?;
        self.state = SessionState::Stepping;
        if self.is_complete() {
            return Ok(true);
        }
        if let Some(max) = self.config.max_iterations
            && self.iterations >= max
        {
            return Err(CouplingError::IterationLimit(max));
        }

        let before = self.progress_marker();
        match self.mode.leader() {
            Solver::Hydrologic => {
                self.hydrology_phase()?;
                self.update_flux_series()?;
                self.hydrodynamic_phase()?;
                if self.mode.feeds_hydrology() {
                    self.update_depth_series()?;
                }
            }
            Solver::Hydrodynamic => {
                self.hydrodynamic_phase()?;
                self.update_depth_series()?;
                self.hydrology_phase()?;
                if self.mode.feeds_hydrodynamics() {
                    self.update_flux_series()?;
                }
            }
        }
        self.iterations += 1;

        debug!(
            iteration = self.iterations,
            hd_time = self.hd_clock.current_time,
            hl_time = self.hl_clock.current_time,
            "coupling iteration"
        );

        let complete = self.is_complete();
        if !complete && self.progress_marker() == before {
            return Err(CouplingError::Stalled {
                hydrodynamic_time: self.hd_clock.current_time,
                hydrologic_time: self.hl_clock.current_time,
            });
        }
        Ok(complete)
    }

    /// Step until both solvers have finished.
    pub fn run(&mut self) -> Result<(), CouplingError> {
        while !self.step()? {}
        if self.is_rank_zero() {
            info!(
                "Finished {} after {} iterations",
                self.mode.description(),
                self.iterations
            );
        }
        Ok(())
    }

    /// Finalize both solvers.
    pub fn finalize(&mut self) -> Result<(), CouplingError> {
        self.require_state(
            &[SessionState::Initialized, SessionState::Stepping],
            SessionState::Finalized,
        )?;
        check(self.hydrology.finalize(), Solver::Hydrologic, "finalize")?;
        check(self.hydrodynamics.finalize(), Solver::Hydrodynamic, "finalize")?;
        self.state = SessionState::Finalized;
        if self.is_rank_zero() {
            self.diagnostics.log_summary();
        }
        Ok(())
    }

    fn progress_marker(&self) -> (f64, f64, bool, bool) {
        (
            self.hd_clock.current_time,
            self.hl_clock.current_time,
            self.hd_clock.is_off(),
            self.hl_clock.is_off(),
        )
    }

    // ========================================================================
    // Initialization helpers
    // ========================================================================

    fn measure_interface(&mut self) -> Result<(), CouplingError> {
        let id = self.interface.id;
        let positions = self.hydrodynamics.interface_positions(id).ok_or_else(|| {
            CouplingError::Configuration(format!(
                "edge string {} is not a flux boundary of {}",
                id,
                self.hydrodynamics.name()
            ))
        })?;
        let local_length: f64 = positions
            .windows(2)
            .map(|w| (w[1].0 - w[0].0).hypot(w[1].1 - w[0].1))
            .sum();
        let length = self.hydrodynamics.reduce_sum(local_length);

        let stats = depth_average(&self.hydrodynamics.surface_elevation(id))
            .reduce(&self.hydrodynamics);

        if !length.is_finite() || length <= 0.0 {
            return Err(CouplingError::Configuration(format!(
                "edge string {} has zero length",
                id
            )));
        }
        let average = stats.mean().ok_or_else(|| {
            CouplingError::Configuration(format!("edge string {} has no nodes", id))
        })?;

        self.interface = Interface {
            id,
            length,
            n_nodes: stats.count as usize,
        };
        self.exchange.previous_depth = average;
        debug!(
            rank = self.hydrodynamics.rank(),
            local_length,
            length,
            average_elevation = average,
            "interface measured"
        );
        Ok(())
    }

    /// Zero flux series ending at the hydrodynamic start (one window later
    /// when hydrodynamics leads).
    fn init_flux_series(&mut self) -> Result<(), CouplingError> {
        let tol = self.config.time_tolerance;
        let n = self.config.series_length;
        let start = self.hydrodynamics.start_time();
        let window =
            self.sync
                .initial_flux_window(start, self.hd_clock.step_size, self.hl_clock.step_size);
        let ahead = self.mode == CouplingMode::TwoWayHydrodynamicsLed;
        let anchor = if ahead { start + window } else { start };
        // A late start widens the first window back to time zero
        let offset = if start > 0.0 && !ahead { start } else { 0.0 };

        let newest = n - 2;
        let mut entries: Vec<SeriesEntry> = (0..newest)
            .map(|i| SeriesEntry::new(anchor - (newest - i) as f64 * window - offset, 0.0))
            .collect();
        entries.push(SeriesEntry::new(anchor, 0.0));
        entries.push(SeriesEntry::new(anchor + tol, 0.0));

        let series = BoundarySeries::new(entries, tol)?;
        self.publish_flux_series(series)
    }

    /// Depth series at the watershed's own boundary depth, ending at the
    /// hydrologic start (one window later when hydrology leads).
    fn init_depth_series(&mut self) -> Result<(), CouplingError> {
        let window = seconds_to_days(self.sync.initial_depth_window(
            self.hydrodynamics.start_time(),
            self.hd_clock.step_size,
            self.hl_clock.step_size,
        ));
        let now = self.hydrology.current_julian();
        let anchor = if self.mode == CouplingMode::TwoWayHydrologyLed {
            now + window
        } else {
            now
        };
        let series = BoundarySeries::uniform(
            self.config.series_length,
            anchor,
            window,
            seconds_to_days(self.hl_clock.step_size),
            self.hydrology.boundary_depth(),
            seconds_to_days(self.config.time_tolerance),
        )?;
        self.publish_depth_series(series)
    }

    // ========================================================================
    // Bursts
    // ========================================================================

    fn hydrology_phase(&mut self) -> Result<(), CouplingError> {
        let tol = self.config.time_tolerance;
        if self.hydrology_done() {
            if !self.hl_clock.is_off() && self.is_rank_zero() {
                info!(
                    "{} finished at t={:.3} s",
                    self.hydrology.name(),
                    self.hl_clock.current_time
                );
            }
            self.hl_clock.switch_off();
            self.hydrology.set_go(false);
            return Ok(());
        }

        let burst = if self.hd_clock.is_off() {
            self.iteration_limit = self.hydrology.final_minutes();
            SuperStep::run_to_end(&self.hl_clock, tol)
        } else {
            let burst = match self.mode.leader() {
                Solver::Hydrologic => self.sync.hydrology_leading(&self.hl_clock, &self.hd_clock),
                Solver::Hydrodynamic => {
                    self.sync.hydrology_trailing(&self.hl_clock, &self.hd_clock)
                }
            };
            self.iteration_limit += self.sync.minute_budget(burst.span);
            // Whole-minute budgets lag behind steps that are not whole minutes
            self.iteration_limit = self
                .iteration_limit
                .max(seconds_to_minutes(burst.end_time).ceil());
            burst
        };

        self.hydrology.set_iteration_limit(self.iteration_limit);
        self.hydrology
            .set_event_end(self.start_julian + seconds_to_days(burst.end_time));
        debug!(
            n_steps = burst.n_steps,
            span = burst.span,
            end_time = burst.end_time,
            iteration_limit = self.iteration_limit,
            "hydrology burst"
        );

        self.advance_hydrology("advance")?;
        self.diagnostics.record_burst(Solver::Hydrologic, burst.n_steps);
        Ok(())
    }

    /// Advance the hydrologic solver on rank 0 and share its clock.
    fn advance_hydrology(&mut self, phase: &'static str) -> Result<(), CouplingError> {
        if self.is_rank_zero() {
            check(self.hydrology.advance(), Solver::Hydrologic, phase)?;
            self.hydrology.set_go(true);
        } else {
            self.hydrology.set_go(false);
        }
        let minutes = self
            .hydrodynamics
            .reduce_max(self.hydrology.elapsed_minutes());
        self.hydrology.set_elapsed_minutes(minutes);

        let time = minutes_to_seconds(minutes);
        let from = self.hl_clock.current_time;
        if !self.hl_clock.advance_to(time) {
            return Err(CouplingError::ClockRegression {
                solver: Solver::Hydrologic,
                from,
                to: time,
            });
        }
        Ok(())
    }

    fn hydrodynamic_phase(&mut self) -> Result<(), CouplingError> {
        if self.hydrodynamics_done() {
            if !self.hd_clock.is_off() && self.is_rank_zero() {
                info!(
                    "{} finished at t={:.3} s",
                    self.hydrodynamics.name(),
                    self.hd_clock.current_time
                );
            }
            self.hd_clock.switch_off();
            return Ok(());
        }

        let n_native = if self.hl_clock.is_off() {
            self.hd_next = self.hd_clock.final_time;
            self.hydrodynamics.remaining_steps()
        } else {
            let step = self.hd_clock.step_size;
            let burst = match self.mode.leader() {
                Solver::Hydrologic => {
                    self.sync
                        .hydrodynamics_trailing(self.hd_next, step, &self.hl_clock)
                }
                Solver::Hydrodynamic => {
                    self.sync
                        .hydrodynamics_leading(self.hd_next, step, &self.hl_clock)
                }
            };
            self.hd_next = burst.end_time;
            burst.n_steps * self.config.coupling_step_factor
        };

        debug!(
            rank = self.hydrodynamics.rank(),
            n_native,
            t_prev = self.hd_clock.current_time,
            t_next = self.hd_next,
            "hydrodynamic burst"
        );
        if n_native > 0 {
            check(
                self.hydrodynamics.advance(n_native),
                Solver::Hydrodynamic,
                "advance",
            )?;
            self.diagnostics.record_burst(Solver::Hydrodynamic, n_native);
        }

        let time = self.hydrodynamics.current_time();
        let from = self.hd_clock.current_time;
        if !self.hd_clock.advance_to(time) {
            return Err(CouplingError::ClockRegression {
                solver: Solver::Hydrodynamic,
                from,
                to: time,
            });
        }
        Ok(())
    }

    // ========================================================================
    // Boundary updates
    // ========================================================================

    /// Rank 0's outflow volume, seen identically on every rank.
    fn broadcast_volume(&mut self) -> f64 {
        let local = if self.is_rank_zero() {
            self.hydrology.outflow_volume()
        } else {
            IDLE_RANK_VALUE
        };
        let volume = self.hydrodynamics.reduce_max(local);
        self.hydrology.set_outflow_volume(volume);
        volume
    }

    /// Turn the outflow volume released since the last update into the
    /// newest flux series entry.
    fn update_flux_series(&mut self) -> Result<(), CouplingError> {
        let volume = self.broadcast_volume();
        let mut series = self.flux_series.clone().ok_or_else(|| {
            CouplingError::Configuration("flux series used before initialization".into())
        })?;

        if self.hl_clock.is_off() {
            series.shift_and_hold();
            series.zero_fill();
            self.exchange.slope = 0.0;
            self.exchange.area = 0.0;
            debug!("hydrologic solver off, interface flux set to zero");
            return self.publish_flux_series(series);
        }

        let tol = self.config.time_tolerance;
        let t_hl = self.hl_clock.current_time;
        let delta_volume =
            (volume - self.exchange.previous_volume) * self.config.hydrograph_factor;
        let (delta_time, time) = if self.mode == CouplingMode::TwoWayHydrodynamicsLed {
            let t_hd = self.hydrodynamics.current_time();
            let span = SuperStep::search(
                t_hd,
                self.hd_clock.step_size,
                t_hl + self.hl_clock.step_size - tol,
                0,
            )
            .span;
            (span, t_hd + span)
        } else {
            (t_hl - self.exchange.previous_volume_time, t_hl)
        };

        let estimate = volume_to_flux(delta_volume, delta_time, self.interface.length, tol);
        if self.is_rank_zero() {
            for anomaly in &estimate.anomalies {
                warn!(time, "{}", anomaly);
            }
        }
        self.diagnostics.record_anomalies(time, &estimate.anomalies);

        let old = series.newest();
        series.shift_and_append(time, estimate.flux);
        let segment = linear_interpolation_slope_and_area(old.value, estimate.flux, old.time, time);
        self.exchange.slope = segment.slope;
        self.exchange.area = segment.area;
        self.exchange.previous_volume = volume;
        self.exchange.previous_volume_time = t_hl;

        self.diagnostics.record_flux_update();
        self.diagnostics.record_volume_received(delta_volume);
        self.diagnostics
            .record_volume_delivered(segment.area * self.interface.length);

        debug!(
            delta_volume,
            delta_time,
            flux = estimate.flux,
            time,
            area = segment.area,
            volume = segment.area * self.interface.length,
            "flux update"
        );
        self.publish_flux_series(series)
    }

    /// Shift the average interface elevation change into the hydrologic
    /// head boundary.
    fn update_depth_series(&mut self) -> Result<(), CouplingError> {
        let mut series = self.depth_series.clone().ok_or_else(|| {
            CouplingError::Configuration("depth series used before initialization".into())
        })?;

        if self.hd_clock.is_off() {
            series.shift_and_hold();
            debug!("hydrodynamic solver off, holding interface depth");
            return self.publish_depth_series(series);
        }

        let id = self.interface.id;
        let elevation = self.hydrodynamics.surface_elevation(id);
        let previous = self.hydrodynamics.previous_surface_elevation(id);
        let stats = depth_average(&elevation).reduce(&self.hydrodynamics);
        let change = depth_change(&elevation, &previous).reduce(&self.hydrodynamics);
        let average = stats.mean().ok_or_else(|| {
            CouplingError::Configuration(format!("edge string {} has no nodes", id))
        })?;
        let delta = average - self.exchange.previous_depth;
        self.exchange.previous_depth = average;

        let time = if self.mode == CouplingMode::TwoWayHydrologyLed {
            let span = SuperStep::search(
                self.hl_clock.current_time,
                self.hl_clock.step_size,
                self.hd_clock.current_time + self.hd_clock.step_size
                    - self.config.time_tolerance,
                0,
            )
            .span;
            self.start_julian + seconds_to_days(self.hl_clock.current_time + span)
        } else {
            self.start_julian + seconds_to_days(self.hd_clock.current_time)
        };

        let value = series.newest().value + delta;
        series.shift_and_append(time, value);
        self.diagnostics.record_depth_update(change.min, change.max);

        debug!(
            average,
            delta,
            max_change = change.max,
            min_change = change.min,
            julian = time,
            depth = value,
            "depth update"
        );
        self.publish_depth_series(series)
    }

    /// Hand the flux series to the hydrodynamic solver through its
    /// exchange file.
    fn publish_flux_series(&mut self, series: BoundarySeries) -> Result<(), CouplingError> {
        let status = self.hydrodynamics.close_boundary_input();
        if !status.is_ok() {
            return Err(CouplingError::ExchangeIo {
                path: self.exchange_path.clone(),
                operation: "close",
                code: status.code(),
            });
        }

        persist_nodal_flux(&self.exchange_path, &self.flux_nodes, &series)?;
        self.hydrodynamics
            .set_boundary_forcing(self.interface.id, &series);

        let status = self.hydrodynamics.reopen_boundary_input(&self.exchange_path);
        if !status.is_ok() {
            return Err(CouplingError::ExchangeIo {
                path: self.exchange_path.clone(),
                operation: "reopen",
                code: status.code(),
            });
        }

        self.log_series("flux", &series);
        self.flux_series = Some(series);
        Ok(())
    }

    fn publish_depth_series(&mut self, series: BoundarySeries) -> Result<(), CouplingError> {
        self.hydrology.set_boundary_series(series.clone());
        if let Some(path) = &self.config.depth_series_path
            && self.is_rank_zero()
        {
            persist_boundary_series(path, &series)?;
        }
        self.log_series("depth", &series);
        self.depth_series = Some(series);
        Ok(())
    }

    fn log_series(&self, label: &str, series: &BoundarySeries) {
        if !self.is_rank_zero() {
            return;
        }
        for (i, entry) in series.entries().iter().enumerate() {
            if self.config.verbose {
                info!("{} series (t,v)[{}] = ({}, {})", label, i, entry.time, entry.value);
            } else {
                trace!("{} series (t,v)[{}] = ({}, {})", label, i, entry.time, entry.value);
            }
        }
    }
}
