//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - loads or generates titration data
//! - runs model fitting + ranking
//! - prints reports and writes optional exports

use clap::Parser;

use crate::cli::{Command, FitArgs, GenerateArgs};
use crate::domain::{FitConfig, GenerateConfig, OptimizerConfig};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `tfit` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Generate(args) => handle_generate(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args)?;
    let run = pipeline::run_fit(&config)?;

    if config.json {
        let report = crate::report::FitReport::from_run(&run, &config);
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| AppError::new(4, format!("Failed to serialise report: {e}")))?;
        println!("{json}");
    } else {
        println!("{}", crate::report::format_fit_summary(&run, &config));
        println!("{}", crate::report::format_rankings(&run.rankings, run.preferred.as_ref()));
    }

    if let Some(path) = &config.export {
        let preferred = run
            .preferred
            .as_ref()
            .and_then(|p| run.session.model(p.kind))
            .ok_or_else(|| AppError::new(4, "No fitted model to export."))?;
        crate::io::export::write_fit_csv(path, preferred, config.plot_mode)?;
    }

    Ok(())
}

fn handle_generate(args: GenerateArgs) -> Result<(), AppError> {
    let config = generate_config_from_args(&args)?;
    let dataset = crate::data::generate_dataset(&config)?;

    match &args.out {
        Some(path) => crate::io::export::write_dataset_csv(path, &dataset),
        None => crate::io::export::write_dataset(std::io::stdout().lock(), &dataset),
    }
}

pub fn fit_config_from_args(args: &FitArgs) -> Result<FitConfig, AppError> {
    let inactive = args
        .inactive
        .iter()
        .map(|&c| {
            c.checked_sub(1)
                .ok_or_else(|| AppError::new(2, "Signal channels are numbered from 1."))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(FitConfig {
        input: args.input.clone(),
        model_spec: args.model,
        host: args.host,
        plot_mode: args.plot_mode,
        inactive,
        optimizer: OptimizerConfig {
            strategy: args.optimizer,
            max_iter: args.max_iter,
            cd_max_iter: args.cd_max_iter,
            fit_cycles: args.fit_cycles,
            ..OptimizerConfig::default()
        },
        json: args.json,
        export: args.export.clone(),
    })
}

pub fn generate_config_from_args(args: &GenerateArgs) -> Result<GenerateConfig, AppError> {
    let complex = if args.complex.is_empty() {
        // One saturating response of 1 per channel for every complex.
        vec![vec![1.0; args.pure.len()]; args.model.constant_size()]
    } else {
        args.complex
            .iter()
            .map(|list| parse_list(list))
            .collect::<Result<Vec<_>, _>>()?
    };

    Ok(GenerateConfig {
        model: args.model,
        log_constants: args.log_k.clone(),
        pure: args.pure.clone(),
        complex,
        host_conc: args.host_conc,
        guest_max: args.guest_max,
        points: args.points,
        noise: args.noise,
        seed: args.seed,
    })
}

fn parse_list(list: &str) -> Result<Vec<f64>, AppError> {
    list.split(',')
        .map(|v| {
            v.trim()
                .parse::<f64>()
                .map_err(|_| AppError::new(2, format!("Not a number in `--complex {list}`: `{v}`")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use crate::domain::ModelKind;

    fn generate_args(argv: &[&str]) -> GenerateArgs {
        let mut full = vec!["tfit", "generate"];
        full.extend_from_slice(argv);
        match Cli::parse_from(full).command {
            Command::Generate(args) => args,
            Command::Fit(_) => panic!("expected generate"),
        }
    }

    #[test]
    fn inactive_channels_become_zero_based() {
        let cli = Cli::parse_from(["tfit", "fit", "x.csv", "--inactive", "1,3"]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        let config = fit_config_from_args(&args).unwrap();
        assert_eq!(config.inactive, vec![0, 2]);
        assert_eq!(config.optimizer.lm_tau, OptimizerConfig::default().lm_tau);

        let cli = Cli::parse_from(["tfit", "fit", "x.csv", "--inactive", "0"]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(fit_config_from_args(&args).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn complex_defaults_to_one_per_channel() {
        let args = generate_args(&["--model", "1:1/1:2", "--log-k", "4,2", "--pure", "0,0"]);
        let config = generate_config_from_args(&args).unwrap();
        assert_eq!(config.model, ModelKind::OneOneOneTwo);
        assert_eq!(config.complex, vec![vec![1.0, 1.0], vec![1.0, 1.0]]);
    }

    #[test]
    fn complex_lists_are_parsed() {
        let args = generate_args(&["--complex", "0.5, 2"]);
        assert_eq!(generate_config_from_args(&args).unwrap().complex, vec![vec![0.5, 2.0]]);

        let args = generate_args(&["--complex", "a"]);
        assert_eq!(generate_config_from_args(&args).unwrap_err().exit_code(), 2);
    }
}
