//! Solver clocks.

use std::fmt;

/// Whether a solver still takes part in the coupled run.
///
/// Once a solver is switched off it stays off for the rest of the session;
/// the remaining solver finishes alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RunFlag {
    /// Solver still has time left to simulate.
    On,
    /// Solver has reached its final time.
    Off,
}

impl fmt::Display for RunFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunFlag::On => write!(f, "ON"),
            RunFlag::Off => write!(f, "OFF"),
        }
    }
}

/// Simulated-time bookkeeping for one solver, in seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolverClock {
    /// Latest time at which the solver's solution is known.
    pub current_time: f64,
    /// Native (or coupling) step size.
    pub step_size: f64,
    /// Time at which the solver stops.
    pub final_time: f64,
    /// On until the solver has finished.
    pub run_flag: RunFlag,
}

impl SolverClock {
    /// Create a running clock.
    pub fn new(current_time: f64, step_size: f64, final_time: f64) -> Self {
        Self {
            current_time,
            step_size,
            final_time,
            run_flag: RunFlag::On,
        }
    }

    /// True while the solver has not reached its final time.
    #[inline]
    pub fn has_time_left(&self) -> bool {
        self.current_time < self.final_time
    }

    /// True once the current time is within `tolerance` of the final time.
    #[inline]
    pub fn is_finished(&self, tolerance: f64) -> bool {
        self.current_time >= self.final_time - tolerance
    }

    /// True once the run flag has been switched off.
    #[inline]
    pub fn is_off(&self) -> bool {
        self.run_flag == RunFlag::Off
    }

    /// Simulated time left until the final time (never negative).
    #[inline]
    pub fn remaining(&self) -> f64 {
        (self.final_time - self.current_time).max(0.0)
    }

    /// Move the clock forward to `time`.
    ///
    /// Returns `false` and leaves the clock untouched if `time` lies before
    /// the current time.
    pub fn advance_to(&mut self, time: f64) -> bool {
        if time < self.current_time {
            return false;
        }
        self.current_time = time;
        true
    }

    /// Switch the solver off. There is no way back.
    pub fn switch_off(&mut self) {
        self.run_flag = RunFlag::Off;
    }
}

impl fmt::Display for SolverClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "t={:.3}s dt={:.3}s t_final={:.3}s [{}]",
            self.current_time, self.step_size, self.final_time, self.run_flag
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_clock_is_on() {
        let clock = SolverClock::new(0.0, 30.0, 600.0);
        assert_eq!(clock.run_flag, RunFlag::On);
        assert!(clock.has_time_left());
        assert!(!clock.is_off());
    }

    #[test]
    fn test_advance_is_monotonic() {
        let mut clock = SolverClock::new(100.0, 30.0, 600.0);
        assert!(clock.advance_to(130.0));
        assert!(!clock.advance_to(90.0));
        assert_eq!(clock.current_time, 130.0);
        // Same time is allowed (zero-length burst)
        assert!(clock.advance_to(130.0));
    }

    #[test]
    fn test_remaining_clamped() {
        let mut clock = SolverClock::new(0.0, 30.0, 600.0);
        clock.advance_to(700.0);
        assert_eq!(clock.remaining(), 0.0);
        assert!(!clock.has_time_left());
    }

    #[test]
    fn test_finished_within_tolerance() {
        let mut clock = SolverClock::new(0.0, 30.0, 600.0);
        assert!(!clock.is_finished(1e-3));
        clock.advance_to(600.0 - 1e-9);
        assert!(clock.has_time_left());
        assert!(clock.is_finished(1e-3));
    }

    #[test]
    fn test_switch_off_sticks() {
        let mut clock = SolverClock::new(0.0, 30.0, 600.0);
        clock.switch_off();
        assert!(clock.is_off());
        assert_eq!(format!("{}", clock.run_flag), "OFF");
    }
}
