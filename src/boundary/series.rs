//! Rolling boundary series exchanged at the coupling interface.
//!
//! A `BoundarySeries` is a fixed-length, time-ordered sequence of
//! `(time, value)` pairs. Consuming solvers read it as piecewise-linear
//! forcing. The last entry is always a guard: it repeats the value of the
//! second-to-last entry a small time later, so a solver that runs past the
//! newest known value sees a flat extrapolation instead of a slope.
//!
//! ```text
//!  index:   0        1        2 (newest)   3 (guard)
//!  time:    t0       t1       t2           t2 + eps
//!  value:   v0       v1       v2           v2
//! ```
//!
//! Updates shift the series one slot earlier; the length never changes.

use thiserror::Error;

use crate::types::SERIES_LENGTH;

/// Error type for constructing a boundary series.
#[derive(Debug, Error, PartialEq)]
pub enum SeriesError {
    /// Fewer entries than the coupling requires
    #[error("Boundary series needs at least {min} entries, got {len}")]
    TooShort { len: usize, min: usize },

    /// Entry earlier than its predecessor
    #[error("Boundary series time decreases at entry {index}")]
    NonMonotonic { index: usize },
}

/// A single `(time, value)` pair.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SeriesEntry {
    /// Time in the consuming solver's unit (seconds or Julian days)
    pub time: f64,
    /// Flux per unit width or depth
    pub value: f64,
}

impl SeriesEntry {
    /// Create a new entry.
    pub fn new(time: f64, value: f64) -> Self {
        Self { time, value }
    }
}

/// Fixed-length rolling boundary series.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundarySeries {
    entries: Vec<SeriesEntry>,
    /// Time offset of the guard entry after the newest entry
    guard: f64,
}

impl BoundarySeries {
    /// Create a series from time-ordered entries.
    ///
    /// # Errors
    /// - `TooShort` if fewer than [`SERIES_LENGTH`] entries are given
    /// - `NonMonotonic` if a time is smaller than its predecessor
    pub fn new(entries: Vec<SeriesEntry>, guard: f64) -> Result<Self, SeriesError> {
        if entries.len() < SERIES_LENGTH {
            return Err(SeriesError::TooShort {
                len: entries.len(),
                min: SERIES_LENGTH,
            });
        }
        for i in 1..entries.len() {
            if entries[i].time < entries[i - 1].time {
                return Err(SeriesError::NonMonotonic { index: i });
            }
        }
        Ok(Self { entries, guard })
    }

    /// Build a series whose newest entry sits at `anchor`, earlier entries
    /// are spaced `spacing` apart, and the guard follows `guard_gap` later.
    ///
    /// All values are set to `value`.
    pub fn uniform(
        length: usize,
        anchor: f64,
        spacing: f64,
        guard_gap: f64,
        value: f64,
        guard: f64,
    ) -> Result<Self, SeriesError> {
        if length < SERIES_LENGTH {
            return Err(SeriesError::TooShort {
                len: length,
                min: SERIES_LENGTH,
            });
        }
        let newest = length - 2;
        let mut entries: Vec<SeriesEntry> = (0..length - 1)
            .map(|i| SeriesEntry::new(anchor - (newest - i) as f64 * spacing, value))
            .collect();
        entries.push(SeriesEntry::new(anchor + guard_gap, value));
        Self::new(entries, guard)
    }

    /// Number of entries (constant over the series' lifetime).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false for a constructed series.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Guard time offset.
    pub fn guard(&self) -> f64 {
        self.guard
    }

    /// Access the entries.
    pub fn entries(&self) -> &[SeriesEntry] {
        &self.entries
    }

    /// Entry at `index`.
    pub fn get(&self, index: usize) -> Option<&SeriesEntry> {
        self.entries.get(index)
    }

    /// The newest real entry (second-to-last).
    pub fn newest(&self) -> SeriesEntry {
        self.entries[self.entries.len() - 2]
    }

    /// The guard entry (last).
    pub fn last(&self) -> SeriesEntry {
        self.entries[self.entries.len() - 1]
    }

    /// Time range `(first, last)` covered by the series.
    pub fn time_range(&self) -> (f64, f64) {
        (self.entries[0].time, self.last().time)
    }

    /// True if times never decrease.
    pub fn is_time_ordered(&self) -> bool {
        self.entries.windows(2).all(|w| w[0].time <= w[1].time)
    }

    /// Move every entry one slot earlier; the last slot keeps its entry.
    fn shift(&mut self) {
        self.entries.copy_within(1.., 0);
    }

    /// Drop the oldest entry and make `(time, value)` the newest one.
    ///
    /// The guard entry becomes `(time + guard, value)`. A `time` earlier
    /// than the current newest entry is raised to it, so the series never
    /// runs backwards.
    pub fn shift_and_append(&mut self, time: f64, value: f64) {
        let n = self.entries.len();
        let time = time.max(self.entries[n - 2].time);
        self.shift();
        self.entries[n - 2] = SeriesEntry::new(time, value);
        self.entries[n - 1] = SeriesEntry::new(time + self.guard, value);
    }

    /// Drop the oldest entry without adding data.
    ///
    /// The former guard becomes the newest entry and the guard is pushed
    /// forward by the spacing of the two entries before it. Used when the
    /// producing solver has finished.
    pub fn shift_and_hold(&mut self) {
        self.shift();
        let n = self.entries.len();
        let spacing = self.entries[n - 3].time - self.entries[n - 4].time;
        self.entries[n - 1].time += spacing.max(0.0);
    }

    /// Reset every value to zero, keeping the times.
    pub fn zero_fill(&mut self) {
        for entry in &mut self.entries {
            entry.value = 0.0;
        }
    }

    /// Interpolate the value at time `t`.
    ///
    /// Clamps to the first/last value outside the covered range.
    pub fn interpolate(&self, t: f64) -> f64 {
        let first = self.entries[0];
        if t <= first.time {
            return first.value;
        }
        let last = self.last();
        if t >= last.time {
            return last.value;
        }

        let idx = self
            .entries
            .partition_point(|e| e.time <= t)
            .saturating_sub(1);
        let e0 = self.entries[idx];
        let e1 = self.entries[(idx + 1).min(self.entries.len() - 1)];

        let dt = e1.time - e0.time;
        let alpha = if dt > 1e-14 { (t - e0.time) / dt } else { 0.0 };
        e0.value + alpha * (e1.value - e0.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-10;

    fn series() -> BoundarySeries {
        BoundarySeries::new(
            vec![
                SeriesEntry::new(0.0, 1.0),
                SeriesEntry::new(60.0, 2.0),
                SeriesEntry::new(120.0, 3.0),
                SeriesEntry::new(120.001, 3.0),
            ],
            0.001,
        )
        .unwrap()
    }

    #[test]
    fn test_too_short_rejected() {
        let result = BoundarySeries::new(vec![SeriesEntry::new(0.0, 0.0); 3], 0.001);
        assert_eq!(result, Err(SeriesError::TooShort { len: 3, min: 4 }));
    }

    #[test]
    fn test_non_monotonic_rejected() {
        let entries = vec![
            SeriesEntry::new(0.0, 0.0),
            SeriesEntry::new(10.0, 0.0),
            SeriesEntry::new(5.0, 0.0),
            SeriesEntry::new(20.0, 0.0),
        ];
        let result = BoundarySeries::new(entries, 0.001);
        assert_eq!(result, Err(SeriesError::NonMonotonic { index: 2 }));
    }

    #[test]
    fn test_uniform_layout() {
        let s = BoundarySeries::uniform(4, 100.0, 30.0, 5.0, 1.5, 0.001).unwrap();
        let times: Vec<f64> = s.entries().iter().map(|e| e.time).collect();
        assert_eq!(times, vec![40.0, 70.0, 100.0, 105.0]);
        assert!(s.entries().iter().all(|e| e.value == 1.5));
    }

    #[test]
    fn test_shift_and_append() {
        let mut s = series();
        s.shift_and_append(180.0, 4.0);

        assert_eq!(s.len(), 4);
        assert_eq!(s.get(0).unwrap().time, 60.0);
        assert_eq!(s.get(1).unwrap().time, 120.0);
        assert_eq!(s.newest(), SeriesEntry::new(180.0, 4.0));
        assert!((s.last().time - 180.001).abs() < TOL);
        assert_eq!(s.last().value, 4.0);
        assert!(s.is_time_ordered());
    }

    #[test]
    fn test_shift_and_append_keeps_length() {
        let mut s = series();
        for i in 0..20 {
            s.shift_and_append(200.0 + i as f64 * 10.0, i as f64);
            assert_eq!(s.len(), 4);
            assert!(s.is_time_ordered());
        }
    }

    #[test]
    fn test_shift_and_append_never_runs_backwards() {
        let mut s = series();
        let newest = s.newest().time;
        // One ulp behind the newest entry
        let behind = newest - newest * f64::EPSILON;
        s.shift_and_append(behind, 5.0);

        assert!(s.is_time_ordered());
        assert_eq!(s.newest(), SeriesEntry::new(newest, 5.0));
        assert!((s.last().time - (newest + 0.001)).abs() < TOL);
    }

    #[test]
    fn test_shift_and_hold() {
        let mut s = BoundarySeries::new(
            vec![
                SeriesEntry::new(0.0, 1.0),
                SeriesEntry::new(60.0, 2.0),
                SeriesEntry::new(120.0, 3.0),
                SeriesEntry::new(180.0, 3.0),
            ],
            0.001,
        )
        .unwrap();
        s.shift_and_hold();
        let times: Vec<f64> = s.entries().iter().map(|e| e.time).collect();
        assert_eq!(times, vec![60.0, 120.0, 180.0, 240.0]);
        assert_eq!(s.newest().value, 3.0);
        assert!(s.is_time_ordered());
    }

    #[test]
    fn test_zero_fill_keeps_times() {
        let mut s = series();
        s.zero_fill();
        assert!(s.entries().iter().all(|e| e.value == 0.0));
        assert_eq!(s.get(1).unwrap().time, 60.0);
        assert_eq!(s.len(), 4);
    }

    #[test]
    fn test_interpolate() {
        let s = series();
        assert!((s.interpolate(30.0) - 1.5).abs() < TOL);
        assert!((s.interpolate(-10.0) - 1.0).abs() < TOL);
        assert!((s.interpolate(500.0) - 3.0).abs() < TOL);
        assert!((s.interpolate(60.0) - 2.0).abs() < TOL);
    }

    #[test]
    fn test_time_range() {
        let s = series();
        let (t0, t1) = s.time_range();
        assert_eq!(t0, 0.0);
        assert!((t1 - 120.001).abs() < TOL);
    }
}
