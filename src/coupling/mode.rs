//! Coupling directions.

use std::fmt;
use std::str::FromStr;

use super::CouplingError;

/// One of the two coupled solvers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Solver {
    /// Surface-water (tidal) solver
    Hydrodynamic,
    /// Watershed (runoff) solver
    Hydrologic,
}

impl Solver {
    /// The other solver.
    pub fn other(self) -> Self {
        match self {
            Solver::Hydrodynamic => Solver::Hydrologic,
            Solver::Hydrologic => Solver::Hydrodynamic,
        }
    }
}

impl fmt::Display for Solver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Solver::Hydrodynamic => write!(f, "hydrodynamic"),
            Solver::Hydrologic => write!(f, "hydrologic"),
        }
    }
}

/// Coupling direction.
///
/// | token | leader | feedback |
/// |-------|--------|----------|
/// | `gdA` | hydrologic | none |
/// | `Adg` | hydrodynamic | none |
/// | `gdAdg` | hydrologic | depth back to the watershed |
/// | `AdgdA` | hydrodynamic | outflow back to the estuary |
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CouplingMode {
    /// One-way, hydrology drives hydrodynamics
    HydrologyToHydrodynamics,
    /// One-way, hydrodynamics drives hydrology
    HydrodynamicsToHydrology,
    /// Two-way, hydrology leads
    TwoWayHydrologyLed,
    /// Two-way, hydrodynamics leads
    TwoWayHydrodynamicsLed,
}

impl CouplingMode {
    /// All modes, in table order.
    pub const ALL: [CouplingMode; 4] = [
        CouplingMode::HydrologyToHydrodynamics,
        CouplingMode::HydrodynamicsToHydrology,
        CouplingMode::TwoWayHydrologyLed,
        CouplingMode::TwoWayHydrodynamicsLed,
    ];

    /// Short token used on the command line and in file names.
    pub fn token(self) -> &'static str {
        match self {
            CouplingMode::HydrologyToHydrodynamics => "gdA",
            CouplingMode::HydrodynamicsToHydrology => "Adg",
            CouplingMode::TwoWayHydrologyLed => "gdAdg",
            CouplingMode::TwoWayHydrodynamicsLed => "AdgdA",
        }
    }

    /// The driving solver.
    pub fn leader(self) -> Solver {
        match self {
            CouplingMode::HydrologyToHydrodynamics | CouplingMode::TwoWayHydrologyLed => {
                Solver::Hydrologic
            }
            CouplingMode::HydrodynamicsToHydrology | CouplingMode::TwoWayHydrodynamicsLed => {
                Solver::Hydrodynamic
            }
        }
    }

    /// True for the two feedback modes.
    pub fn is_two_way(self) -> bool {
        matches!(
            self,
            CouplingMode::TwoWayHydrologyLed | CouplingMode::TwoWayHydrodynamicsLed
        )
    }

    /// True if hydrologic outflow forces the hydrodynamic flux boundary.
    pub fn feeds_hydrodynamics(self) -> bool {
        self.leader() == Solver::Hydrologic || self.is_two_way()
    }

    /// True if hydrodynamic depth forces the hydrologic head boundary.
    pub fn feeds_hydrology(self) -> bool {
        self.leader() == Solver::Hydrodynamic || self.is_two_way()
    }

    /// Banner text for logs.
    pub fn description(self) -> &'static str {
        match self {
            CouplingMode::HydrologyToHydrodynamics => {
                "hydrology driving hydrodynamics, one-way coupling"
            }
            CouplingMode::HydrodynamicsToHydrology => {
                "hydrodynamics driving hydrology, one-way coupling"
            }
            CouplingMode::TwoWayHydrologyLed => {
                "hydrology driving hydrodynamics driving hydrology, two-way coupling"
            }
            CouplingMode::TwoWayHydrodynamicsLed => {
                "hydrodynamics driving hydrology driving hydrodynamics, two-way coupling"
            }
        }
    }
}

impl fmt::Display for CouplingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for CouplingMode {
    type Err = CouplingError;

    /// Accepts the tokens and the long aliases `hl-hd`, `hd-hl`, `hl-hd-hl`,
    /// `hd-hl-hd`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gdA" | "hl-hd" => Ok(CouplingMode::HydrologyToHydrodynamics),
            "Adg" | "hd-hl" => Ok(CouplingMode::HydrodynamicsToHydrology),
            "gdAdg" | "hl-hd-hl" => Ok(CouplingMode::TwoWayHydrologyLed),
            "AdgdA" | "hd-hl-hd" => Ok(CouplingMode::TwoWayHydrodynamicsLed),
            other => Err(CouplingError::UnknownMode(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_roundtrip() {
        for mode in CouplingMode::ALL {
            assert_eq!(mode.token().parse::<CouplingMode>().unwrap(), mode);
            assert_eq!(mode.to_string(), mode.token());
        }
    }

    #[test]
    fn test_aliases() {
        assert_eq!(
            "hd-hl-hd".parse::<CouplingMode>().unwrap(),
            CouplingMode::TwoWayHydrodynamicsLed
        );
        assert_eq!(
            "hl-hd".parse::<CouplingMode>().unwrap(),
            CouplingMode::HydrologyToHydrodynamics
        );
    }

    #[test]
    fn test_unknown_mode() {
        let err = "gda".parse::<CouplingMode>().unwrap_err();
        assert!(matches!(err, CouplingError::UnknownMode(ref s) if s == "gda"));
    }

    #[test]
    fn test_direction_table() {
        use CouplingMode::*;
        assert_eq!(HydrologyToHydrodynamics.leader(), Solver::Hydrologic);
        assert_eq!(TwoWayHydrologyLed.leader(), Solver::Hydrologic);
        assert_eq!(HydrodynamicsToHydrology.leader(), Solver::Hydrodynamic);
        assert_eq!(TwoWayHydrodynamicsLed.leader(), Solver::Hydrodynamic);

        assert!(HydrologyToHydrodynamics.feeds_hydrodynamics());
        assert!(!HydrologyToHydrodynamics.feeds_hydrology());
        assert!(!HydrodynamicsToHydrology.feeds_hydrodynamics());
        assert!(HydrodynamicsToHydrology.feeds_hydrology());
        for mode in [TwoWayHydrologyLed, TwoWayHydrodynamicsLed] {
            assert!(mode.is_two_way());
            assert!(mode.feeds_hydrodynamics() && mode.feeds_hydrology());
        }
    }

    #[test]
    fn test_solver_other() {
        assert_eq!(Solver::Hydrologic.other(), Solver::Hydrodynamic);
        assert_eq!(Solver::Hydrodynamic.to_string(), "hydrodynamic");
    }
}
