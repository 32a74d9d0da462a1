//! Time synchronization between the two solvers.
//!
//! Every rule is the same forward search: starting from `min_steps` native
//! steps, add one native step at a time until `current + span` reaches the
//! target. Native steps need not divide the interval evenly, so the search
//! overshoots by less than one step rather than undershooting.
//!
//! ```text
//!  driving:  |-------- dt_drive --------|
//!  driven:   |--dt--|--dt--|--dt--|--dt--|--dt--|
//!            t                      ^ target = t_drive + dt_drive - tol
//!                                   smallest span with t + span >= target
//! ```
//!
//! The targets of the four per-mode rules:
//!
//! | rule | start | target | min steps |
//! |------|-------|--------|-----------|
//! | hydrology leading | `t_hl` | `t_hd + dt_hd - tol` | 1 |
//! | hydrology trailing | `t_hl` | `t_hd - dt_hl + tol` | 1 |
//! | hydrodynamics leading | `t_hd_next` | `t_hl + dt_hl - tol` | 0 |
//! | hydrodynamics trailing | `t_hd_next` | `t_hl - dt_hd + tol` | 0 |

use crate::types::{SECONDS_PER_MINUTE, SolverClock};

/// Result of a super-step search.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SuperStep {
    /// Native steps to take
    pub n_steps: usize,
    /// Simulated time covered by those steps
    pub span: f64,
    /// Absolute time at which the burst ends
    pub end_time: f64,
}

impl SuperStep {
    /// Smallest whole number of `step`s, at least `min_steps`, that takes
    /// `current` to `target` or beyond.
    ///
    /// A non-positive or non-finite step, or a non-finite target, yields
    /// exactly `min_steps`.
    pub fn search(current: f64, step: f64, target: f64, min_steps: usize) -> Self {
        let mut n_steps = min_steps;
        let mut span = min_steps as f64 * step;
        if step.is_finite() && step > 0.0 && target.is_finite() {
            // Accumulate like the solvers do: one step at a time
            while current + span < target {
                span += step;
                n_steps += 1;
            }
        }
        Self {
            n_steps,
            span,
            end_time: current + span,
        }
    }

    /// Burst that takes `clock` straight to its final time.
    pub fn run_to_end(clock: &SolverClock, tolerance: f64) -> Self {
        let span = clock.remaining();
        let n_steps = if clock.step_size > 0.0 {
            ((span - tolerance) / clock.step_size).ceil().max(0.0) as usize
        } else {
            0
        };
        Self {
            n_steps,
            span,
            end_time: clock.final_time.max(clock.current_time),
        }
    }
}

/// Per-mode synchronization rules at a fixed tolerance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Synchronizer {
    tolerance: f64,
}

impl Synchronizer {
    /// Rules comparing times within `tolerance` seconds.
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// Comparison tolerance (s).
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Smallest super-step that brings `driven` to the end of `drive`'s next
    /// step. The driven solver always advances at least one native step.
    ///
    /// A finished driving solver releases the driven one to its final time.
    pub fn catch_up(&self, driven: &SolverClock, drive: &SolverClock) -> SuperStep {
        if drive.is_off() {
            return SuperStep::run_to_end(driven, self.tolerance);
        }
        SuperStep::search(
            driven.current_time,
            driven.step_size,
            drive.current_time + drive.step_size - self.tolerance,
            1,
        )
    }

    /// Hydrologic burst when hydrology leads: cover the next hydrodynamic
    /// coupling step.
    pub fn hydrology_leading(&self, hydrology: &SolverClock, hydrodynamics: &SolverClock) -> SuperStep {
        SuperStep::search(
            hydrology.current_time,
            hydrology.step_size,
            hydrodynamics.current_time + hydrodynamics.step_size - self.tolerance,
            1,
        )
    }

    /// Hydrologic burst when hydrodynamics leads: catch up to one hydrologic
    /// step short of the hydrodynamic time.
    pub fn hydrology_trailing(&self, hydrology: &SolverClock, hydrodynamics: &SolverClock) -> SuperStep {
        SuperStep::search(
            hydrology.current_time,
            hydrology.step_size,
            hydrodynamics.current_time - hydrology.step_size + self.tolerance,
            1,
        )
    }

    /// Hydrodynamic burst when hydrodynamics leads: from the previous burst
    /// end, cover the next hydrologic step.
    pub fn hydrodynamics_leading(
        &self,
        next_time: f64,
        step: f64,
        hydrology: &SolverClock,
    ) -> SuperStep {
        SuperStep::search(
            next_time,
            step,
            hydrology.current_time + hydrology.step_size - self.tolerance,
            0,
        )
    }

    /// Hydrodynamic burst when hydrology leads: from the previous burst end,
    /// catch up to one coupling step short of the hydrologic time.
    pub fn hydrodynamics_trailing(
        &self,
        next_time: f64,
        step: f64,
        hydrology: &SolverClock,
    ) -> SuperStep {
        SuperStep::search(next_time, step, hydrology.current_time - step + self.tolerance, 0)
    }

    /// Spacing of the initial flux series.
    ///
    /// A late hydrodynamic start anchors the first window to one coupling
    /// step; otherwise the window is the smallest multiple of the coupling
    /// step covering one hydrologic step.
    pub fn initial_flux_window(&self, start_time: f64, step: f64, hydrology_step: f64) -> f64 {
        if start_time > 0.0 {
            step
        } else {
            SuperStep::search(0.0, step, hydrology_step - self.tolerance, 1).span
        }
    }

    /// Spacing (s) of the initial depth series: the smallest multiple of the
    /// hydrologic step covering the first hydrodynamic coupling step.
    pub fn initial_depth_window(&self, start_time: f64, step: f64, hydrology_step: f64) -> f64 {
        SuperStep::search(0.0, hydrology_step, start_time + step, 1).span
    }

    /// Minutes to add to the hydrologic iteration limit for a burst of
    /// `span` seconds (at least one).
    pub fn minute_budget(&self, span: f64) -> f64 {
        ((span + self.tolerance) / SECONDS_PER_MINUTE).floor().max(1.0)
    }
}
