//! Command-line parsing for the titration fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::{HostColumn, ModelKind, ModelSpec, PlotMode, Strategy};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "tfit", version, about = "Host-guest titration binding-model fitter")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit binding models to a titration table and print constants and rankings.
    Fit(FitArgs),
    /// Write a synthetic titration table from known parameters.
    Generate(GenerateArgs),
}

/// Options for fitting.
#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Titration table: conc1, conc2, signal_1 … signal_n.
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Which model(s) to fit.
    #[arg(long, value_enum, default_value_t = ModelSpec::All)]
    pub model: ModelSpec,

    /// Optimizer driving the fit.
    #[arg(long, value_enum, default_value_t = Strategy::Levmar)]
    pub optimizer: Strategy,

    /// Column holding the host concentration.
    #[arg(long, value_enum, default_value_t = HostColumn::Conc1)]
    pub host: HostColumn,

    /// X axis for exported predictions.
    #[arg(long, value_enum, default_value_t = PlotMode::Host)]
    pub plot_mode: PlotMode,

    /// Signal channels (1-based) to leave out of the fit, e.g. `--inactive 2,3`.
    #[arg(long, value_delimiter = ',')]
    pub inactive: Vec<usize>,

    /// Levenberg-Marquardt iteration budget.
    #[arg(long, default_value_t = 1000)]
    pub max_iter: usize,

    /// Coordinate-descent outer iteration budget.
    #[arg(long, default_value_t = 300)]
    pub cd_max_iter: usize,

    /// Constants/signals rounds for `--optimizer descent`.
    #[arg(long, default_value_t = 20)]
    pub fit_cycles: usize,

    /// Print a JSON report instead of text.
    #[arg(long)]
    pub json: bool,

    /// Export the preferred model's per-point predictions to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,
}

/// Options for synthetic data.
#[derive(Debug, Parser, Clone)]
pub struct GenerateArgs {
    /// Binding model producing the signals.
    #[arg(long, value_enum, default_value_t = ModelKind::OneOne)]
    pub model: ModelKind,

    /// log10 of each constant, in model order (`2:1/1:1`: K21,K11; `1:1/1:2`: K11,K12).
    #[arg(long = "log-k", value_delimiter = ',', allow_hyphen_values = true, default_value = "4")]
    pub log_k: Vec<f64>,

    /// Pure host response, one value per channel.
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, default_value = "0")]
    pub pure: Vec<f64>,

    /// Complex responses, comma-separated per channel; repeat once per complex.
    #[arg(long, allow_hyphen_values = true)]
    pub complex: Vec<String>,

    /// Initial host concentration (M).
    #[arg(long, default_value_t = 1e-3)]
    pub host_conc: f64,

    /// Guest concentration at the last point (M).
    #[arg(long, default_value_t = 5e-3)]
    pub guest_max: f64,

    /// Number of titration points.
    #[arg(long, default_value_t = 11)]
    pub points: usize,

    /// Standard deviation of additive Gaussian noise.
    #[arg(long, default_value_t = 0.0)]
    pub noise: f64,

    /// Random seed for the noise.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Output file (stdout when omitted).
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fit_flags() {
        let cli = Cli::parse_from([
            "tfit", "fit", "data.csv", "--model", "1:1", "--optimizer", "descent", "--inactive", "2,3",
            "--host", "conc2",
        ]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.model, ModelSpec::OneOne);
        assert_eq!(args.optimizer, Strategy::Descent);
        assert_eq!(args.inactive, vec![2, 3]);
        assert_eq!(args.host, HostColumn::Conc2);
    }

    #[test]
    fn parses_generate_lists() {
        let cli = Cli::parse_from([
            "tfit", "generate", "--model", "2:1/1:1", "--log-k", "2,4", "--pure", "0,-1",
            "--complex", "1,2", "--complex", "0.5,-0.5",
        ]);
        let Command::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.model, ModelKind::TwoOneOneOne);
        assert_eq!(args.log_k, vec![2.0, 4.0]);
        assert_eq!(args.pure, vec![0.0, -1.0]);
        assert_eq!(args.complex, vec!["1,2", "0.5,-0.5"]);
    }
}
