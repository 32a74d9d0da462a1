//! Conservation-preserving conversion between the two solvers' boundary
//! quantities.
//!
//! Hydrologic outflow volume over a window becomes a flux per unit width
//! along the hydrodynamic interface; hydrodynamic surface elevation along
//! the interface becomes an average depth for the hydrologic head boundary.
//!
//! Nothing here fails on numerical edge cases. Suspicious values are
//! returned together with a [`ConservationAnomaly`] and the caller decides
//! what to do with it.

use std::fmt;

use crate::model::Reducer;
use crate::types::FLUX_EPSILON;

/// A coupling quantity that violates a conservation assumption.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConservationAnomaly {
    /// Hydrologic volume decreased, so the estuary is forced to drain into
    /// the watershed
    NegativeOutflow { delta_volume: f64 },
    /// Window at or below the time tolerance; the flux divisor was floored
    DegenerateWindow { delta_time: f64 },
}

impl fmt::Display for ConservationAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConservationAnomaly::NegativeOutflow { delta_volume } => write!(
                f,
                "outflow from the hydrodynamic model forced by hydrology (dV = {:.6e} m3)",
                delta_volume
            ),
            ConservationAnomaly::DegenerateWindow { delta_time } => {
                write!(f, "degenerate flux window (dt = {:.6e} s)", delta_time)
            }
        }
    }
}

/// Flux per unit width with any anomalies met computing it.
#[derive(Clone, Debug, PartialEq)]
pub struct FluxEstimate {
    /// Flux per unit width (m²/s)
    pub flux: f64,
    /// Anomalies, empty for a clean estimate
    pub anomalies: Vec<ConservationAnomaly>,
}

/// Flux per unit width that carries `delta_volume` across an interface of
/// `interface_length` in `delta_time`:
///
/// ```text
/// q = dV / dt / L
/// ```
///
/// A window at or below `tolerance` gets [`FLUX_EPSILON`] added to its
/// divisor. A negative volume change is reported but the flux is not
/// clamped.
pub fn volume_to_flux(
    delta_volume: f64,
    delta_time: f64,
    interface_length: f64,
    tolerance: f64,
) -> FluxEstimate {
    let mut anomalies = Vec::new();
    let mut divisor = delta_time;
    if delta_time <= tolerance {
        anomalies.push(ConservationAnomaly::DegenerateWindow { delta_time });
        divisor += FLUX_EPSILON;
    }
    if delta_volume < 0.0 {
        anomalies.push(ConservationAnomaly::NegativeOutflow { delta_volume });
    }
    FluxEstimate {
        flux: delta_volume / divisor / interface_length,
        anomalies,
    }
}

/// Sum, extremes and count of per-node samples along the interface.
///
/// The count is a float so it can take part in the same reductions as the
/// samples.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DepthStats {
    pub sum: f64,
    pub max: f64,
    pub min: f64,
    pub count: f64,
}

impl DepthStats {
    /// Stats of no samples.
    pub fn empty() -> Self {
        Self {
            sum: 0.0,
            max: f64::NEG_INFINITY,
            min: f64::INFINITY,
            count: 0.0,
        }
    }

    /// Arithmetic mean, or `None` without samples.
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0.0).then(|| self.sum / self.count)
    }

    /// Combine worker-local stats across all workers.
    pub fn reduce<R: Reducer + ?Sized>(&self, reducer: &R) -> Self {
        Self {
            sum: reducer.reduce_sum(self.sum),
            max: reducer.reduce_max(self.max),
            min: reducer.reduce_min(self.min),
            count: reducer.reduce_sum(self.count),
        }
    }
}

/// Stats of per-node depth (or elevation) samples.
pub fn depth_average(values: &[f64]) -> DepthStats {
    values.iter().fold(DepthStats::empty(), |acc, &v| DepthStats {
        sum: acc.sum + v,
        max: acc.max.max(v),
        min: acc.min.min(v),
        count: acc.count + 1.0,
    })
}

/// Stats of the per-node change `new - old`.
///
/// Extra samples in the longer slice are ignored.
pub fn depth_change(new: &[f64], old: &[f64]) -> DepthStats {
    let deltas: Vec<f64> = new.iter().zip(old).map(|(n, o)| n - o).collect();
    depth_average(&deltas)
}

/// Slope and trapezoidal area of one linear series segment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SlopeArea {
    /// `(v_new - v_old) / (t_new - t_old)`
    pub slope: f64,
    /// `0.5 * (v_new + v_old) * (t_new - t_old)`, volume per unit width
    pub area: f64,
}

/// Slope and conserved area of the segment `(t_old, v_old) -> (t_new, v_new)`.
///
/// A zero-length segment has zero slope and area.
pub fn linear_interpolation_slope_and_area(
    v_old: f64,
    v_new: f64,
    t_old: f64,
    t_new: f64,
) -> SlopeArea {
    let dt = t_new - t_old;
    if dt == 0.0 {
        return SlopeArea {
            slope: 0.0,
            area: 0.0,
        };
    }
    SlopeArea {
        slope: (v_new - v_old) / dt,
        area: 0.5 * (v_new + v_old) * dt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SingleWorker, WorkerGroup, WorkerHandle};
    use std::sync::Arc;
    use std::thread;

    const TOL: f64 = 1e-12;

    #[test]
    fn test_reference_flux() {
        let est = volume_to_flux(500.0, 60.0, 100.0, 1e-3);
        assert!((est.flux - 500.0 / 60.0 / 100.0).abs() < TOL);
        assert!((est.flux - 0.0833).abs() < 1e-4);
        assert!(est.anomalies.is_empty());
    }

    #[test]
    fn test_flux_scaling() {
        let base = volume_to_flux(120.0, 30.0, 40.0, 1e-3).flux;
        assert!((volume_to_flux(240.0, 30.0, 40.0, 1e-3).flux - 2.0 * base).abs() < TOL);
        assert!((volume_to_flux(120.0, 60.0, 40.0, 1e-3).flux - 0.5 * base).abs() < TOL);
        assert!((volume_to_flux(120.0, 30.0, 80.0, 1e-3).flux - 0.5 * base).abs() < TOL);
    }

    #[test]
    fn test_negative_outflow_not_clamped() {
        let est = volume_to_flux(-300.0, 60.0, 100.0, 1e-3);
        assert!(est.flux < 0.0);
        assert!((est.flux + 0.05).abs() < TOL);
        assert_eq!(
            est.anomalies,
            vec![ConservationAnomaly::NegativeOutflow {
                delta_volume: -300.0
            }]
        );
    }

    #[test]
    fn test_degenerate_window_is_finite() {
        let est = volume_to_flux(1.0, 0.0, 10.0, 1e-3);
        assert!(est.flux.is_finite());
        assert!(matches!(
            est.anomalies[0],
            ConservationAnomaly::DegenerateWindow { .. }
        ));

        let est = volume_to_flux(0.0, 0.0, 10.0, 1e-3);
        assert_eq!(est.flux, 0.0);
    }

    #[test]
    fn test_depth_average() {
        let stats = depth_average(&[1.0, 2.0, 4.5]);
        assert_eq!(stats.count, 3.0);
        assert_eq!(stats.max, 4.5);
        assert_eq!(stats.min, 1.0);
        assert!((stats.mean().unwrap() - 2.5).abs() < TOL);
        assert!(depth_average(&[]).mean().is_none());
    }

    #[test]
    fn test_depth_change() {
        let stats = depth_change(&[1.2, 0.9], &[1.0, 1.0]);
        assert!((stats.max - 0.2).abs() < TOL);
        assert!((stats.min + 0.1).abs() < TOL);
    }

    #[test]
    fn test_depth_stats_reduce() {
        let local = depth_average(&[1.0, 3.0]);
        assert_eq!(local.reduce(&SingleWorker), local);

        let group = Arc::new(WorkerGroup::new(2));
        let samples = [vec![1.0, 3.0], vec![5.0]];
        let joined: Vec<DepthStats> = WorkerHandle::for_group(&group)
            .into_iter()
            .zip(samples)
            .map(|(h, s)| thread::spawn(move || depth_average(&s).reduce(&h)))
            .collect::<Vec<_>>()
            .into_iter()
            .map(|t| t.join().unwrap())
            .collect();
        for stats in joined {
            assert_eq!(stats.count, 3.0);
            assert_eq!(stats.max, 5.0);
            assert_eq!(stats.min, 1.0);
            assert!((stats.mean().unwrap() - 3.0).abs() < TOL);
        }
    }

    #[test]
    fn test_slope_and_area() {
        let sa = linear_interpolation_slope_and_area(0.0, 0.2, 60.0, 120.0);
        assert!((sa.slope - 0.2 / 60.0).abs() < TOL);
        assert!((sa.area - 6.0).abs() < TOL);

        let flat = linear_interpolation_slope_and_area(1.0, 2.0, 5.0, 5.0);
        assert_eq!(flat.slope, 0.0);
        assert_eq!(flat.area, 0.0);
    }
}
