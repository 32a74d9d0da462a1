//! Command-line driver for a coupled hydrologic/hydrodynamic run.
//!
//! ```text
//! hydrocouple <edge-string-id> <coupling-mode> <hydrologic-project> <hydrodynamic-project>
//! ```
//!
//! Both projects are read by the replay solvers. The coupling mode is one
//! of `gdA`, `Adg`, `gdAdg` or `AdgdA`.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::Parser;
use clap::error::ErrorKind;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

use hydrocouple::coupling::{CouplerConfig, CouplingMode};
use hydrocouple::model::{ReplayHydrodynamics, ReplayHydrology};
use hydrocouple::simulation::Coupler;
use hydrocouple::types::{CUFT_TO_CUM, SERIES_LENGTH, TIME_TOL};

/// Exit status for malformed arguments (-1 as a process status).
const EXIT_BAD_ARGUMENTS: u8 = 255;

/// Dual time-stepping coupler for hydrologic and hydrodynamic solvers
#[derive(Parser, Debug)]
#[command(name = "hydrocouple")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Couple a watershed model to an estuary model across one edge string", long_about = None)]
struct Cli {
    /// Edge string id of the coupled flux boundary
    edge_string: usize,

    /// Coupling mode: gdA, Adg, gdAdg or AdgdA
    coupling_mode: String,

    /// Hydrologic project file
    hydrologic_project: PathBuf,

    /// Hydrodynamic project file
    hydrodynamic_project: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Time comparison tolerance in seconds
    #[arg(long, default_value_t = TIME_TOL)]
    time_tolerance: f64,

    /// Boundary series length
    #[arg(long, default_value_t = SERIES_LENGTH)]
    series_length: usize,

    /// Native hydrodynamic steps per coupling step
    #[arg(long, default_value_t = 1)]
    coupling_step_factor: usize,

    /// Hydrologic volumes are in cubic feet
    #[arg(long)]
    cubic_feet: bool,

    /// Flux exchange file (default: next to the hydrodynamic project)
    #[arg(long)]
    exchange_path: Option<PathBuf>,

    /// Also write the hydrologic head boundary series to this file
    #[arg(long)]
    depth_series_path: Option<PathBuf>,

    /// Stop after this many coupling iterations
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Log every boundary series update
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn config(&self) -> CouplerConfig {
        let mut config = CouplerConfig::default()
            .with_time_tolerance(self.time_tolerance)
            .with_series_length(self.series_length)
            .with_coupling_step_factor(self.coupling_step_factor);
        if self.cubic_feet {
            config = config.with_hydrograph_factor(CUFT_TO_CUM);
        }
        if let Some(path) = &self.exchange_path {
            config = config.with_exchange_path(path);
        }
        if let Some(path) = &self.depth_series_path {
            config = config.with_depth_series_path(path);
        }
        if let Some(max) = self.max_iterations {
            config = config.with_max_iterations(max);
        }
        if self.verbose {
            config = config.verbose();
        }
        config
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(EXIT_BAD_ARGUMENTS);
        }
    };

    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("cannot install logger: {}", e);
    }

    let mode: CouplingMode = match cli.coupling_mode.parse() {
        Ok(mode) => mode,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(EXIT_BAD_ARGUMENTS);
        }
    };

    match run(&cli, mode) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, mode: CouplingMode) -> anyhow::Result<()> {
    let estuary = ReplayHydrodynamics::from_file(&cli.hydrodynamic_project).with_context(|| {
        format!(
            "reading hydrodynamic project {}",
            cli.hydrodynamic_project.display()
        )
    })?;
    let project = cli
        .hydrologic_project
        .to_str()
        .context("hydrologic project path is not valid UTF-8")?;

    let report = Coupler::new(estuary, ReplayHydrology::default(), mode, cli.edge_string)
        .with_config(cli.config())
        .run(project);

    for line in report.timing_lines() {
        info!("{}", line);
    }
    if let Some(message) = report.error {
        bail!(message);
    }
    info!(
        "Reached hydrodynamic t={} s, hydrologic t={} s after {} iterations",
        report.hydrodynamic_time, report.hydrologic_time, report.iterations
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_arguments() {
        let cli = Cli::try_parse_from(["hydrocouple", "3", "gdAdg", "w.hl", "e.hd"]).unwrap();
        assert_eq!(cli.edge_string, 3);
        assert_eq!(cli.coupling_mode, "gdAdg");
        let config = cli.config();
        assert_eq!(config.series_length, SERIES_LENGTH);
        assert_eq!(config.hydrograph_factor, 1.0);
    }

    #[test]
    fn test_flags_map_to_config() {
        let cli = Cli::try_parse_from([
            "hydrocouple",
            "1",
            "gdA",
            "w.hl",
            "e.hd",
            "--cubic-feet",
            "--coupling-step-factor",
            "4",
            "--max-iterations",
            "10",
        ])
        .unwrap();
        let config = cli.config();
        assert_eq!(config.hydrograph_factor, CUFT_TO_CUM);
        assert_eq!(config.coupling_step_factor, 4);
        assert_eq!(config.max_iterations, Some(10));
    }

    #[test]
    fn test_missing_arguments() {
        assert!(Cli::try_parse_from(["hydrocouple", "1", "gdA"]).is_err());
        assert!(Cli::try_parse_from(["hydrocouple", "x", "gdA", "a", "b"]).is_err());
    }
}
