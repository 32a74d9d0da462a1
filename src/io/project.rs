//! Project files for the replay solvers.
//!
//! # File Formats
//!
//! ## Hydrologic Project
//!
//! Prescribed outlet hydrograph. Times are seconds from the start of the
//! run, outflow in volume units per second.
//!
//! ```text
//! # Watershed replay
//! # start_date: 2020-01-01T00:00:00Z
//! # time_step: 30
//! # final_minutes: 120
//! # boundary_depth: 1.2
//! # columns: time(s) outflow(m3/s)
//! 0 0.0
//! 3600 12.5
//! 7200 3.0
//! ```
//!
//! `start_julian` may be given instead of `start_date`. Without
//! `boundary_depth` the watershed has no head boundary and cannot receive
//! depth feedback.
//!
//! ## Hydrodynamic Project
//!
//! ```text
//! # Estuary replay
//! # start_time: 0
//! # time_step: 60
//! # final_time: 7200
//! # basin_area: 1.0e6
//! # columns: record fields...
//! node 1 0.0 0.0 22 1
//! node 2 50.0 0.0 22 1
//! node 3 0.0 900.0 32 2 0.5 0.1
//! tide 0 0.0
//! tide 7200 0.4
//! ```
//!
//! `node id x y code edge [flux error_velocity]` lists boundary nodes in the
//! order the solver reads its flux file; `tide time elevation` is the
//! prescribed open-water elevation.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::boundary::SeriesEntry;
use crate::types::datetime_to_julian;

/// Error type for project files.
#[derive(Debug, Error)]
pub enum ProjectFileError {
    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Parse error with line number
    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    /// Required header key absent
    #[error("Missing project key: {0}")]
    MissingKey(&'static str),

    /// Values parse but make no sense together
    #[error("Invalid project: {0}")]
    Invalid(String),
}

/// Piecewise-linear value of time-ordered `entries` at `t`, clamped at both
/// ends. Zero for an empty slice.
pub fn interpolate_entries(entries: &[SeriesEntry], t: f64) -> f64 {
    let (Some(first), Some(last)) = (entries.first(), entries.last()) else {
        return 0.0;
    };
    if t <= first.time {
        return first.value;
    }
    if t >= last.time {
        return last.value;
    }

    let idx = entries.partition_point(|e| e.time <= t);
    let e0 = entries[idx - 1];
    let e1 = entries[idx];
    let dt = e1.time - e0.time;
    if dt <= 0.0 {
        return e1.value;
    }
    e0.value + (t - e0.time) / dt * (e1.value - e0.value)
}

// =============================================================================
// Hydrologic project
// =============================================================================

/// Replay watershed: clock settings and the outlet hydrograph.
#[derive(Clone, Debug, PartialEq)]
pub struct HydrologicProject {
    /// Julian day of time zero
    pub start_julian: f64,
    /// Native time step (s)
    pub time_step: f64,
    /// Final time in elapsed minutes
    pub final_minutes: f64,
    /// Depth at the outlet head boundary, if there is one
    pub boundary_depth: Option<f64>,
    /// Outflow rate over time (s, volume/s)
    pub hydrograph: Vec<SeriesEntry>,
}

impl HydrologicProject {
    /// Outflow rate at time `t` (s).
    pub fn outflow_at(&self, t: f64) -> f64 {
        interpolate_entries(&self.hydrograph, t)
    }
}

/// Read a hydrologic project file.
pub fn read_hydrologic_project(path: &Path) -> Result<HydrologicProject, ProjectFileError> {
    let file = File::open(path)?;
    let mut lines = Vec::new();
    for line in BufReader::new(file).lines() {
        lines.push(line?);
    }
    parse_hydrologic_project(&lines.join("\n"))
}

/// Parse a hydrologic project from a string.
pub fn parse_hydrologic_project(content: &str) -> Result<HydrologicProject, ProjectFileError> {
    let mut metadata: HashMap<String, (usize, String)> = HashMap::new();
    let mut hydrograph = Vec::new();

    for (line_num, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with('#') {
            collect_metadata(line, line_num, &mut metadata);
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 2 {
            return Err(ProjectFileError::ParseError {
                line: line_num + 1,
                message: "Expected: time outflow".into(),
            });
        }
        let time: f64 = parse_field(parts[0], line_num, "time")?;
        let outflow: f64 = parse_field(parts[1], line_num, "outflow")?;

        if let Some(prev) = hydrograph.last().map(|e: &SeriesEntry| e.time)
            && time < prev
        {
            return Err(ProjectFileError::ParseError {
                line: line_num + 1,
                message: "Hydrograph time decreases".into(),
            });
        }
        hydrograph.push(SeriesEntry::new(time, outflow));
    }

    let start_julian: f64 = match (metadata.get("start_julian"), metadata.get("start_date")) {
        (Some(_), _) => metadata_value(&metadata, "start_julian")?,
        (None, Some((line, text))) => {
            let date = DateTime::parse_from_rfc3339(text).map_err(|e| ProjectFileError::ParseError {
                line: line + 1,
                message: format!("Invalid start_date: {}", e),
            })?;
            datetime_to_julian(&date.with_timezone(&Utc))
        }
        (None, None) => return Err(ProjectFileError::MissingKey("start_julian")),
    };
    let time_step: f64 = metadata_value(&metadata, "time_step")?;
    let final_minutes: f64 = metadata_value(&metadata, "final_minutes")?;
    let boundary_depth: Option<f64> = if metadata.contains_key("boundary_depth") {
        Some(metadata_value(&metadata, "boundary_depth")?)
    } else {
        None
    };

    if !time_step.is_finite() || time_step <= 0.0 {
        return Err(ProjectFileError::Invalid(format!(
            "time_step must be positive, got {}",
            time_step
        )));
    }
    if final_minutes < 0.0 {
        return Err(ProjectFileError::Invalid(format!(
            "final_minutes must not be negative, got {}",
            final_minutes
        )));
    }
    if hydrograph.is_empty() {
        return Err(ProjectFileError::Invalid("hydrograph has no records".into()));
    }

    Ok(HydrologicProject {
        start_julian,
        time_step,
        final_minutes,
        boundary_depth,
        hydrograph,
    })
}

// =============================================================================
// Hydrodynamic project
// =============================================================================

/// A boundary node of the replay estuary.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectNode {
    /// Node number as given in the file
    pub id: usize,
    /// Easting
    pub x: f64,
    /// Northing
    pub y: f64,
    /// Boundary type code
    pub code: i32,
    /// Edge string the node belongs to
    pub edge: usize,
    /// Fixed flux for nodes outside the coupled edge string
    pub flux: f64,
    /// Fixed error velocity (code 32 only)
    pub error_velocity: f64,
}

/// Replay estuary: clock settings, boundary nodes and the tide.
#[derive(Clone, Debug, PartialEq)]
pub struct HydrodynamicProject {
    /// Start time (s)
    pub start_time: f64,
    /// Native time step (s)
    pub time_step: f64,
    /// Final time (s)
    pub final_time: f64,
    /// Plan area of the receiving basin (m²)
    pub basin_area: f64,
    /// Boundary nodes in flux-file order
    pub nodes: Vec<ProjectNode>,
    /// Prescribed open-water elevation over time
    pub tide: Vec<SeriesEntry>,
}

impl HydrodynamicProject {
    /// Nodes of edge string `edge`, in chain order.
    pub fn edge_nodes(&self, edge: usize) -> impl Iterator<Item = &ProjectNode> + '_ {
        self.nodes.iter().filter(move |n| n.edge == edge)
    }

    /// Tidal elevation at `t` (zero without tide records).
    pub fn tide_at(&self, t: f64) -> f64 {
        interpolate_entries(&self.tide, t)
    }

    /// Number of native steps from start to final time.
    pub fn total_steps(&self) -> usize {
        ((self.final_time - self.start_time) / self.time_step).round().max(0.0) as usize
    }
}

/// Read a hydrodynamic project file.
pub fn read_hydrodynamic_project(path: &Path) -> Result<HydrodynamicProject, ProjectFileError> {
    let file = File::open(path)?;
    let mut lines = Vec::new();
    for line in BufReader::new(file).lines() {
        lines.push(line?);
    }
    parse_hydrodynamic_project(&lines.join("\n"))
}

/// Parse a hydrodynamic project from a string.
pub fn parse_hydrodynamic_project(content: &str) -> Result<HydrodynamicProject, ProjectFileError> {
    let mut metadata: HashMap<String, (usize, String)> = HashMap::new();
    let mut nodes = Vec::new();
    let mut tide: Vec<SeriesEntry> = Vec::new();

    for (line_num, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with('#') {
            collect_metadata(line, line_num, &mut metadata);
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts[0] {
            "node" => {
                if parts.len() != 6 && parts.len() != 8 {
                    return Err(ProjectFileError::ParseError {
                        line: line_num + 1,
                        message: "Expected: node id x y code edge [flux error_velocity]".into(),
                    });
                }
                let (flux, error_velocity) = if parts.len() == 8 {
                    (
                        parse_field(parts[6], line_num, "flux")?,
                        parse_field(parts[7], line_num, "error velocity")?,
                    )
                } else {
                    (0.0, 0.0)
                };
                nodes.push(ProjectNode {
                    id: parse_field(parts[1], line_num, "node id")?,
                    x: parse_field(parts[2], line_num, "x")?,
                    y: parse_field(parts[3], line_num, "y")?,
                    code: parse_field(parts[4], line_num, "boundary code")?,
                    edge: parse_field(parts[5], line_num, "edge string")?,
                    flux,
                    error_velocity,
                });
            }
            "tide" => {
                if parts.len() != 3 {
                    return Err(ProjectFileError::ParseError {
                        line: line_num + 1,
                        message: "Expected: tide time elevation".into(),
                    });
                }
                let time: f64 = parse_field(parts[1], line_num, "time")?;
                let elevation: f64 = parse_field(parts[2], line_num, "elevation")?;
                if let Some(prev) = tide.last()
                    && time < prev.time
                {
                    return Err(ProjectFileError::ParseError {
                        line: line_num + 1,
                        message: "Tide time decreases".into(),
                    });
                }
                tide.push(SeriesEntry::new(time, elevation));
            }
            other => {
                return Err(ProjectFileError::ParseError {
                    line: line_num + 1,
                    message: format!("Unknown record '{}'", other),
                });
            }
        }
    }

    let project = HydrodynamicProject {
        start_time: metadata_value(&metadata, "start_time")?,
        time_step: metadata_value(&metadata, "time_step")?,
        final_time: metadata_value(&metadata, "final_time")?,
        basin_area: metadata_value(&metadata, "basin_area")?,
        nodes,
        tide,
    };

    if !project.time_step.is_finite() || project.time_step <= 0.0 {
        return Err(ProjectFileError::Invalid(format!(
            "time_step must be positive, got {}",
            project.time_step
        )));
    }
    if project.final_time < project.start_time {
        return Err(ProjectFileError::Invalid(format!(
            "final_time {} precedes start_time {}",
            project.final_time, project.start_time
        )));
    }
    if !project.basin_area.is_finite() || project.basin_area <= 0.0 {
        return Err(ProjectFileError::Invalid(format!(
            "basin_area must be positive, got {}",
            project.basin_area
        )));
    }

    Ok(project)
}

fn collect_metadata(line: &str, line_num: usize, metadata: &mut HashMap<String, (usize, String)>) {
    let content = line.trim_start_matches('#').trim();
    if let Some((key, value)) = content.split_once(':') {
        metadata.insert(
            key.trim().to_lowercase(),
            (line_num, value.trim().to_string()),
        );
    }
}

fn metadata_value<T: std::str::FromStr>(
    metadata: &HashMap<String, (usize, String)>,
    key: &'static str,
) -> Result<T, ProjectFileError> {
    let (line, text) = metadata.get(key).ok_or(ProjectFileError::MissingKey(key))?;
    text.parse().map_err(|_| ProjectFileError::ParseError {
        line: line + 1,
        message: format!("Invalid value for {}", key),
    })
}

fn parse_field<T: std::str::FromStr>(
    text: &str,
    line_num: usize,
    what: &str,
) -> Result<T, ProjectFileError> {
    text.parse().map_err(|_| ProjectFileError::ParseError {
        line: line_num + 1,
        message: format!("Invalid {}", what),
    })
}
