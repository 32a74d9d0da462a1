//! Boundary series exchange files.
//!
//! Persists a [`BoundarySeries`] for a consuming solver and reads it back.
//!
//! # File Format
//!
//! ```text
//! # Boundary series written by hydrocouple
//! # guard: 0.001
//! # columns: time value
//! 0 0
//! 60 0.083
//! 120 0.091
//! 120.001 0.091
//! ```
//!
//! Time values must be non-decreasing (the guard entry may coincide with the
//! newest entry when the guard offset underflows).

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use thiserror::Error;

use crate::boundary::{BoundarySeries, SeriesEntry, SeriesError};

/// Error type for series file I/O.
#[derive(Debug, Error)]
pub enum SeriesFileError {
    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Renaming the finished temporary file failed
    #[error("Could not replace exchange file: {0}")]
    Persist(#[from] tempfile::PersistError),

    /// Parse error with line number
    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    /// Empty file (no data records)
    #[error("Series file contains no data")]
    EmptyFile,

    /// Decreasing time values
    #[error("Non-monotonic time at line {line}")]
    NonMonotonic { line: usize },

    /// Parsed records do not form a valid series
    #[error("Invalid series: {0}")]
    Series(#[from] SeriesError),
}

/// Write `content` to `path` so that a reader never sees a partial file.
///
/// The data goes to a temporary file in the same directory which then
/// replaces `path` in one rename.
pub(crate) fn replace_file<F>(path: &Path, write: F) -> Result<(), SeriesFileError>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> std::io::Result<()>,
{
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        write(&mut writer)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}

/// Persist a boundary series, fully replacing any previous content.
pub fn persist_boundary_series(path: &Path, series: &BoundarySeries) -> Result<(), SeriesFileError> {
    replace_file(path, |w| {
        writeln!(w, "# Boundary series written by hydrocouple")?;
        writeln!(w, "# guard: {}", series.guard())?;
        writeln!(w, "# columns: time value")?;
        for entry in series.entries() {
            // `{}` prints the shortest representation that round-trips
            writeln!(w, "{} {}", entry.time, entry.value)?;
        }
        Ok(())
    })
}

/// Read a boundary series file.
pub fn read_boundary_series(path: &Path) -> Result<BoundarySeries, SeriesFileError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut lines = Vec::new();
    for line in reader.lines() {
        lines.push(line?);
    }
    parse_lines(lines.iter().map(String::as_str))
}

/// Parse a boundary series from a string.
///
/// Same format as the file, useful for testing.
pub fn parse_boundary_series(content: &str) -> Result<BoundarySeries, SeriesFileError> {
    parse_lines(content.lines())
}

fn parse_lines<'a, I>(lines: I) -> Result<BoundarySeries, SeriesFileError>
where
    I: Iterator<Item = &'a str>,
{
    let mut guard = 0.0;
    let mut entries = Vec::new();
    let mut last_time: Option<f64> = None;

    for (line_num, line) in lines.enumerate() {
        let line = line.trim();

        if line.is_empty() {
            continue;
        }

        if line.starts_with('#') {
            let comment = line.trim_start_matches('#').trim();
            if let Some(value) = comment.strip_prefix("guard:") {
                guard = value
                    .trim()
                    .parse()
                    .map_err(|_| SeriesFileError::ParseError {
                        line: line_num + 1,
                        message: "Invalid guard value".into(),
                    })?;
            }
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 2 {
            return Err(SeriesFileError::ParseError {
                line: line_num + 1,
                message: "Expected: time value".into(),
            });
        }

        let time: f64 = parts[0]
            .parse()
            .map_err(|_| SeriesFileError::ParseError {
                line: line_num + 1,
                message: "Invalid time".into(),
            })?;
        let value: f64 = parts[1]
            .parse()
            .map_err(|_| SeriesFileError::ParseError {
                line: line_num + 1,
                message: "Invalid value".into(),
            })?;

        if let Some(prev) = last_time
            && time < prev
        {
            return Err(SeriesFileError::NonMonotonic { line: line_num + 1 });
        }
        last_time = Some(time);

        entries.push(SeriesEntry::new(time, value));
    }

    if entries.is_empty() {
        return Err(SeriesFileError::EmptyFile);
    }

    Ok(BoundarySeries::new(entries, guard)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const TOL: f64 = 1e-12;

    fn sample() -> BoundarySeries {
        BoundarySeries::new(
            vec![
                SeriesEntry::new(2_458_849.5, 1.25),
                SeriesEntry::new(2_458_849.5 + 1.0 / 1440.0, 1.3),
                SeriesEntry::new(2_458_849.5 + 2.0 / 1440.0, 1.1 / 3.0),
                SeriesEntry::new(2_458_849.5 + 2.0 / 1440.0 + 1e-8, 1.1 / 3.0),
            ],
            1e-8,
        )
        .unwrap()
    }

    #[test]
    fn test_persist_and_read_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bound.ts");
        let series = sample();

        persist_boundary_series(&path, &series).unwrap();
        let back = read_boundary_series(&path).unwrap();

        assert_eq!(back.len(), series.len());
        for (a, b) in back.entries().iter().zip(series.entries()) {
            assert!((a.time - b.time).abs() < TOL);
            assert!((a.value - b.value).abs() < TOL);
        }
        assert!((back.guard() - 1e-8).abs() < 1e-20);
    }

    #[test]
    fn test_persist_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bound.ts");
        std::fs::write(&path, "stale content that is much longer than the new one\n".repeat(50))
            .unwrap();

        let mut series = sample();
        series.zero_fill();
        persist_boundary_series(&path, &series).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("stale"));
        let back = read_boundary_series(&path).unwrap();
        assert!(back.entries().iter().all(|e| e.value == 0.0));
    }

    #[test]
    fn test_no_temp_files_left() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bound.ts");
        persist_boundary_series(&path, &sample()).unwrap();
        persist_boundary_series(&path, &sample()).unwrap();
        let n_files = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(n_files, 1);
    }

    #[test]
    fn test_parse_with_comments() {
        let content = r#"
# guard: 0.001
# columns: time value
0.0 0.0
60.0 0.5
120.0 1.0
120.001 1.0
"#;
        let s = parse_boundary_series(content).unwrap();
        assert_eq!(s.len(), 4);
        assert!((s.guard() - 0.001).abs() < TOL);
        assert!((s.newest().value - 1.0).abs() < TOL);
    }

    #[test]
    fn test_parse_equal_times_allowed() {
        let content = "0 0\n1 1\n2 2\n2 2";
        assert!(parse_boundary_series(content).is_ok());
    }

    #[test]
    fn test_parse_decreasing_error() {
        let content = "0 0\n10 1\n5 2\n20 2";
        let result = parse_boundary_series(content);
        assert!(matches!(result, Err(SeriesFileError::NonMonotonic { line: 3 })));
    }

    #[test]
    fn test_parse_too_short() {
        let content = "0 0\n10 1";
        let result = parse_boundary_series(content);
        assert!(matches!(result, Err(SeriesFileError::Series(SeriesError::TooShort { .. }))));
    }

    #[test]
    fn test_parse_empty_error() {
        let result = parse_boundary_series("# nothing here");
        assert!(matches!(result, Err(SeriesFileError::EmptyFile)));
    }

    #[test]
    fn test_parse_missing_value() {
        let result = parse_boundary_series("0.0\n");
        assert!(matches!(result, Err(SeriesFileError::ParseError { line: 1, .. })));
    }
}
