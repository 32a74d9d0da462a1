//! Nodal flux exchange file for the hydrodynamic side.
//!
//! The hydrodynamic solver reads its normal-flux forcing as blocks of
//! per-node lines, one block per series entry. Which columns a node carries
//! depends on its boundary type code:
//!
//! | code | line |
//! |------|------|
//! | 2, 12, 22 | `<flux>` |
//! | 32 | `<flux>  <error-velocity>` |
//!
//! Nodes with any other code are not part of the file.
//!
//! ```text
//!   0.000000
//!   0.083333
//!   0.083333    0.000000
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use super::series_file::{SeriesFileError, replace_file};
use crate::boundary::BoundarySeries;

/// Line layout of one flux boundary node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeFormat {
    /// `<flux>`
    Flux,
    /// `<flux>  <error-velocity>`
    FluxWithErrorVelocity,
}

impl NodeFormat {
    /// Line layout for a boundary type code, or `None` if the node is not
    /// written to the flux file.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            2 | 12 | 22 => Some(Self::Flux),
            32 => Some(Self::FluxWithErrorVelocity),
            _ => None,
        }
    }

    fn n_columns(self) -> usize {
        match self {
            Self::Flux => 1,
            Self::FluxWithErrorVelocity => 2,
        }
    }
}

/// A flux boundary node as seen by the exchange file.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FluxNode {
    /// Boundary type code
    pub code: i32,
    /// True if the node lies on the coupled interface
    pub coupled: bool,
    /// Flux for nodes outside the interface
    pub flux: f64,
    /// Error velocity, written for code 32 only
    pub error_velocity: f64,
}

impl FluxNode {
    /// A node on the coupled interface.
    pub fn coupled(code: i32) -> Self {
        Self {
            code,
            coupled: true,
            flux: 0.0,
            error_velocity: 0.0,
        }
    }

    /// A node on another flux boundary with its own fixed forcing.
    pub fn fixed(code: i32, flux: f64, error_velocity: f64) -> Self {
        Self {
            code,
            coupled: false,
            flux,
            error_velocity,
        }
    }
}

/// Number of nodes that appear in each block of the flux file.
pub fn active_node_count(nodes: &[FluxNode]) -> usize {
    nodes
        .iter()
        .filter(|n| NodeFormat::from_code(n.code).is_some())
        .count()
}

/// Write the flux file: one block per series entry, one line per active
/// node. Coupled nodes carry the series value, all others their own flux.
///
/// Fully replaces previous content.
pub fn persist_nodal_flux(
    path: &Path,
    nodes: &[FluxNode],
    series: &BoundarySeries,
) -> Result<(), SeriesFileError> {
    replace_file(path, |w| {
        for entry in series.entries() {
            for node in nodes {
                let flux = if node.coupled { entry.value } else { node.flux };
                match NodeFormat::from_code(node.code) {
                    Some(NodeFormat::Flux) => writeln!(w, "{:10.6}", flux)?,
                    Some(NodeFormat::FluxWithErrorVelocity) => {
                        writeln!(w, "{:10.6}  {:10.6}", flux, node.error_velocity)?
                    }
                    None => {}
                }
            }
        }
        Ok(())
    })
}

/// Read a flux file back as blocks of per-node flux values.
///
/// `nodes` must be the layout the file was written with. Error velocities
/// are validated but not returned.
pub fn read_nodal_flux(path: &Path, nodes: &[FluxNode]) -> Result<Vec<Vec<f64>>, SeriesFileError> {
    let formats: Vec<NodeFormat> = nodes
        .iter()
        .filter_map(|n| NodeFormat::from_code(n.code))
        .collect();
    if formats.is_empty() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut blocks = Vec::new();
    let mut block = Vec::with_capacity(formats.len());

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let format = formats[block.len()];
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() != format.n_columns() {
            return Err(SeriesFileError::ParseError {
                line: line_num + 1,
                message: format!("Expected {} column(s)", format.n_columns()),
            });
        }
        let mut values = [0.0; 2];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part.parse().map_err(|_| SeriesFileError::ParseError {
                line: line_num + 1,
                message: "Invalid flux value".into(),
            })?;
        }
        block.push(values[0]);

        if block.len() == formats.len() {
            blocks.push(std::mem::replace(
                &mut block,
                Vec::with_capacity(formats.len()),
            ));
        }
    }

    if !block.is_empty() {
        return Err(SeriesFileError::ParseError {
            line: 0,
            message: "Truncated node block".into(),
        });
    }
    if blocks.is_empty() {
        return Err(SeriesFileError::EmptyFile);
    }

    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::SeriesEntry;
    use tempfile::tempdir;

    fn layout() -> Vec<FluxNode> {
        vec![
            FluxNode::coupled(22),
            FluxNode::coupled(22),
            FluxNode::fixed(32, 0.5, 0.25),
            FluxNode::fixed(0, 9.0, 0.0), // not a flux node
        ]
    }

    fn series() -> BoundarySeries {
        BoundarySeries::new(
            vec![
                SeriesEntry::new(0.0, 0.0),
                SeriesEntry::new(60.0, 0.1),
                SeriesEntry::new(120.0, 0.2),
                SeriesEntry::new(120.001, 0.2),
            ],
            0.001,
        )
        .unwrap()
    }

    #[test]
    fn test_codes() {
        assert_eq!(NodeFormat::from_code(2), Some(NodeFormat::Flux));
        assert_eq!(NodeFormat::from_code(12), Some(NodeFormat::Flux));
        assert_eq!(NodeFormat::from_code(22), Some(NodeFormat::Flux));
        assert_eq!(
            NodeFormat::from_code(32),
            Some(NodeFormat::FluxWithErrorVelocity)
        );
        assert_eq!(NodeFormat::from_code(0), None);
        assert_eq!(active_node_count(&layout()), 3);
    }

    #[test]
    fn test_line_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flux.exchange");
        persist_nodal_flux(&path, &layout(), &series()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4 * 3);
        assert_eq!(lines[3], "  0.100000");
        assert_eq!(lines[5], "  0.500000    0.250000");
    }

    #[test]
    fn test_read_back_blocks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flux.exchange");
        let nodes = layout();
        persist_nodal_flux(&path, &nodes, &series()).unwrap();

        let blocks = read_nodal_flux(&path, &nodes).unwrap();
        assert_eq!(blocks.len(), 4);
        assert!((blocks[2][0] - 0.2).abs() < 1e-6);
        assert!((blocks[2][1] - 0.2).abs() < 1e-6);
        assert!((blocks[2][2] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_zero_filled_series() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flux.exchange");
        let nodes = layout();
        let mut s = series();
        s.zero_fill();
        persist_nodal_flux(&path, &nodes, &s).unwrap();

        let blocks = read_nodal_flux(&path, &nodes).unwrap();
        assert!(blocks.iter().all(|b| b[0] == 0.0 && b[1] == 0.0));
        // Fixed boundary keeps its own forcing
        assert!(blocks.iter().all(|b| (b[2] - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_truncated_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flux.exchange");
        std::fs::write(&path, "0.1\n0.1\n").unwrap();
        let result = read_nodal_flux(&path, &layout());
        assert!(matches!(result, Err(SeriesFileError::ParseError { .. })));
    }

    #[test]
    fn test_wrong_columns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flux.exchange");
        std::fs::write(&path, "0.1 0.3\n").unwrap();
        let result = read_nodal_flux(&path, &layout());
        assert!(matches!(result, Err(SeriesFileError::ParseError { line: 1, .. })));
    }
}
