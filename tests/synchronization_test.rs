//! Worked synchronization and flux-mapping cases through the public API.

use approx::assert_relative_eq;
use hydrocouple::boundary::BoundarySeries;
use hydrocouple::coupling::{
    ConservationAnomaly, SuperStep, Synchronizer, linear_interpolation_slope_and_area,
    volume_to_flux,
};
use hydrocouple::types::{SolverClock, TIME_TOL};

#[test]
fn test_volume_over_window_to_flux() {
    // 500 m³ over 60 s across 100 m
    let estimate = volume_to_flux(500.0, 60.0, 100.0, TIME_TOL);
    assert_relative_eq!(estimate.flux, 0.083333333, epsilon = 1e-8);
    assert!(estimate.anomalies.is_empty());
}

#[test]
fn test_catch_up_matches_drive_burst() {
    let sync = Synchronizer::new(TIME_TOL);
    let driven = SolverClock::new(0.0, 60.0, 86_400.0);
    let drive = SolverClock::new(0.0, 480.0, 86_400.0);
    let step = sync.catch_up(&driven, &drive);
    assert_eq!(step.n_steps, 8);
    assert_relative_eq!(step.span, 480.0);
}

#[test]
fn test_finished_drive_releases_driven() {
    let sync = Synchronizer::new(TIME_TOL);
    let driven = SolverClock::new(1_200.0, 60.0, 3_600.0);
    let mut drive = SolverClock::new(3_600.0, 480.0, 3_600.0);
    assert!(drive.is_finished(TIME_TOL));
    drive.switch_off();

    let step = sync.catch_up(&driven, &drive);
    assert_relative_eq!(step.span, driven.remaining());
    assert_relative_eq!(step.end_time, 3_600.0);
    assert_eq!(step, SuperStep::run_to_end(&driven, TIME_TOL));
}

#[test]
fn test_negative_outflow_still_produces_flux() {
    let estimate = volume_to_flux(-120.0, 60.0, 40.0, TIME_TOL);
    assert_relative_eq!(estimate.flux, -0.05);
    assert_eq!(
        estimate.anomalies,
        vec![ConservationAnomaly::NegativeOutflow {
            delta_volume: -120.0
        }]
    );
}

#[test]
fn test_degenerate_window_is_guarded() {
    let estimate = volume_to_flux(1.0, 0.5 * TIME_TOL, 10.0, TIME_TOL);
    assert!(estimate.flux.is_finite());
    assert!(matches!(
        estimate.anomalies.as_slice(),
        [ConservationAnomaly::DegenerateWindow { .. }]
    ));
}

#[test]
fn test_rolling_series_keeps_its_length() {
    let mut series = BoundarySeries::uniform(5, 0.0, 60.0, 30.0, 0.0, TIME_TOL).unwrap();
    for k in 1..=20 {
        let t = 60.0 * k as f64;
        let before = series.newest();
        series.shift_and_append(t, 0.01 * k as f64);
        assert_eq!(series.len(), 5);
        assert!(series.is_time_ordered());

        let segment = linear_interpolation_slope_and_area(before.value, 0.01 * k as f64, before.time, t);
        assert_relative_eq!(segment.area, 0.5 * (before.value + 0.01 * k as f64) * 60.0, epsilon = 1e-12);
    }
    assert_relative_eq!(series.newest().time, 1_200.0);
    assert_relative_eq!(series.last().time, 1_200.0 + TIME_TOL);
}

#[test]
fn test_incommensurate_steps_never_undershoot() {
    let sync = Synchronizer::new(TIME_TOL);
    let mut driven = SolverClock::new(0.0, 45.0, 10_000.0);
    let mut drive = SolverClock::new(0.0, 60.0, 10_000.0);
    for _ in 0..50 {
        let step = sync.catch_up(&driven, &drive);
        let target = drive.current_time + drive.step_size;
        assert!(step.end_time >= target - TIME_TOL);
        assert!(step.end_time - driven.step_size < target - TIME_TOL);
        assert!(driven.advance_to(step.end_time));
        assert!(drive.advance_to(target));
    }
}
