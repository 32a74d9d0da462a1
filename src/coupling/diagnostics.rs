//! Bookkeeping for a coupled run.
//!
//! Tracks how often each solver ran, how much volume crossed the interface
//! and every conservation anomaly met on the way.
//!
//! # Example
//!
//! ```
//! use hydrocouple::coupling::{CouplingDiagnostics, Solver};
//!
//! let mut diag = CouplingDiagnostics::new();
//! diag.record_burst(Solver::Hydrologic, 8);
//! diag.record_volume_received(500.0);
//! diag.record_volume_delivered(480.0);
//! assert!((diag.volume_imbalance() - 0.04).abs() < 1e-12);
//! ```

use tracing::info;

use super::flux::ConservationAnomaly;
use super::mode::Solver;

/// An anomaly and the coupling time at which it was met.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnomalyRecord {
    /// Coupling time (s)
    pub time: f64,
    pub anomaly: ConservationAnomaly,
}

/// Running totals for a coupled run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CouplingDiagnostics {
    anomalies: Vec<AnomalyRecord>,
    hydrodynamic_bursts: usize,
    hydrologic_bursts: usize,
    /// Native hydrodynamic steps requested across all bursts
    hydrodynamic_steps: usize,
    flux_updates: usize,
    depth_updates: usize,
    /// Volume handed over by the hydrologic solver (m³)
    volume_received: f64,
    /// Volume the flux series carries across the interface (m³)
    volume_delivered: f64,
    /// Extremes of the interface depth change over all updates
    max_depth_change: f64,
    min_depth_change: f64,
}

impl CouplingDiagnostics {
    /// Empty tracker.
    pub fn new() -> Self {
        Self {
            max_depth_change: f64::NEG_INFINITY,
            min_depth_change: f64::INFINITY,
            ..Self::default()
        }
    }

    /// Record a burst of `n_steps` native steps.
    pub fn record_burst(&mut self, solver: Solver, n_steps: usize) {
        match solver {
            Solver::Hydrodynamic => {
                self.hydrodynamic_bursts += 1;
                self.hydrodynamic_steps += n_steps;
            }
            Solver::Hydrologic => self.hydrologic_bursts += 1,
        }
    }

    /// Record anomalies met at coupling time `time`.
    pub fn record_anomalies(&mut self, time: f64, anomalies: &[ConservationAnomaly]) {
        self.anomalies
            .extend(anomalies.iter().map(|&anomaly| AnomalyRecord { time, anomaly }));
    }

    /// Count a flux series update.
    pub fn record_flux_update(&mut self) {
        self.flux_updates += 1;
    }

    /// Count a depth series update with the extremes of the per-node change.
    pub fn record_depth_update(&mut self, min_change: f64, max_change: f64) {
        self.depth_updates += 1;
        self.min_depth_change = self.min_depth_change.min(min_change);
        self.max_depth_change = self.max_depth_change.max(max_change);
    }

    /// Add volume released by the hydrologic solver.
    pub fn record_volume_received(&mut self, volume: f64) {
        self.volume_received += volume;
    }

    /// Add volume carried by the flux series.
    pub fn record_volume_delivered(&mut self, volume: f64) {
        self.volume_delivered += volume;
    }

    /// Every anomaly so far, oldest first.
    pub fn anomalies(&self) -> &[AnomalyRecord] {
        &self.anomalies
    }

    /// Number of negative-outflow anomalies.
    pub fn negative_outflow_count(&self) -> usize {
        self.anomalies
            .iter()
            .filter(|r| matches!(r.anomaly, ConservationAnomaly::NegativeOutflow { .. }))
            .count()
    }

    /// Bursts taken by `solver`.
    pub fn bursts(&self, solver: Solver) -> usize {
        match solver {
            Solver::Hydrodynamic => self.hydrodynamic_bursts,
            Solver::Hydrologic => self.hydrologic_bursts,
        }
    }

    /// Native hydrodynamic steps requested.
    pub fn hydrodynamic_steps(&self) -> usize {
        self.hydrodynamic_steps
    }

    pub fn flux_updates(&self) -> usize {
        self.flux_updates
    }

    pub fn depth_updates(&self) -> usize {
        self.depth_updates
    }

    pub fn volume_received(&self) -> f64 {
        self.volume_received
    }

    pub fn volume_delivered(&self) -> f64 {
        self.volume_delivered
    }

    /// Relative gap between received and delivered volume.
    ///
    /// Zero when nothing was received.
    pub fn volume_imbalance(&self) -> f64 {
        if self.volume_received.abs() > 1e-14 {
            (self.volume_delivered - self.volume_received).abs() / self.volume_received.abs()
        } else {
            0.0
        }
    }

    /// Extremes `(min, max)` of the interface depth change, if any update
    /// happened.
    pub fn depth_change_range(&self) -> Option<(f64, f64)> {
        (self.depth_updates > 0).then_some((self.min_depth_change, self.max_depth_change))
    }

    /// One-line summary for logs.
    pub fn summary_line(&self) -> String {
        format!(
            "bursts hd={} ({} steps) hl={} updates flux={} depth={} V_in={:.4e} V_out={:.4e} anomalies={}",
            self.hydrodynamic_bursts,
            self.hydrodynamic_steps,
            self.hydrologic_bursts,
            self.flux_updates,
            self.depth_updates,
            self.volume_received,
            self.volume_delivered,
            self.anomalies.len()
        )
    }

    /// Log the summary at info level.
    pub fn log_summary(&self) {
        info!("coupling summary: {}", self.summary_line());
        if self.volume_received.abs() > 0.0 {
            info!(
                "volume imbalance {:.2e} ({:.4}%)",
                self.volume_imbalance(),
                self.volume_imbalance() * 100.0
            );
        }
        if let Some((min, max)) = self.depth_change_range() {
            info!("interface depth change range [{:.4}, {:.4}] m", min, max);
        }
        let n_negative = self.negative_outflow_count();
        if n_negative > 0 {
            info!("{} negative outflow windows", n_negative);
        }
    }
}
