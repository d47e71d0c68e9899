#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))]

//! Binary entry point for the runbench tool.
//!
//! This module is excluded from mutation testing because testing process entry/exit behavior
//! is impractical - it is covered by the integration tests that spawn the binary instead.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use argh::FromArgs;
use runbench::{PolicyConfig, PolicyVariant, RunInput, run};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Runs every benchmark of a Google Benchmark executable until its samples converge, writing
/// the results into a directory. Arguments after the executable are passed to it unchanged.
#[derive(FromArgs)]
struct Args {
    /// stopping rule to use (fixed, adaptive); overrides the configuration file
    #[argh(option)]
    policy: Option<PolicyVariant>,

    /// TOML file with a [policy] table tuning the stopping rule
    #[argh(option)]
    config: Option<PathBuf>,

    /// give up on a benchmark after this many attempts; overrides the configuration file
    #[argh(option)]
    max_attempts: Option<u32>,

    /// do not keep the console and structured output of each attempt
    #[argh(switch)]
    discard_attempts: bool,

    /// directory to write results into
    #[argh(positional)]
    results_dir: PathBuf,

    /// the benchmark executable
    #[argh(positional)]
    executable: PathBuf,
}

/// Options of runbench itself that consume the following argument as their value.
const VALUE_OPTIONS: &[&str] = &["--policy", "--config", "--max-attempts"];

/// Returns the index at which the arguments meant for the benchmark executable begin.
///
/// argh would try to interpret any `--benchmark_*` flag after the executable as one of our own
/// options, so everything after the second positional argument is split off before parsing.
fn executable_args_start(args: &[String]) -> usize {
    let mut positionals = 0;
    let mut skip_value = false;
    let mut only_positionals = false;

    for (index, arg) in args.iter().enumerate() {
        if skip_value {
            skip_value = false;
            continue;
        }

        if !only_positionals {
            if arg == "--" {
                only_positionals = true;
                continue;
            }

            if arg.starts_with('-') {
                skip_value = VALUE_OPTIONS.contains(&arg.as_str());
                continue;
            }
        }

        positionals += 1;

        if positionals == 2 {
            return index + 1;
        }
    }

    args.len()
}

// Binary entry point - mutations would require subprocess testing which is impractical.
#[cfg_attr(test, mutants::skip)]
fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let env_args: Vec<String> = std::env::args().collect();

    let Some((program_name, rest)) = env_args.split_first() else {
        return ExitCode::FAILURE;
    };

    let (own_args, executable_args) = rest.split_at(executable_args_start(rest));
    let own_args: Vec<&str> = own_args.iter().map(String::as_str).collect();

    let args = match Args::from_args(&[program_name.as_str()], &own_args) {
        Ok(args) => args,
        Err(early_exit) => {
            println!("{}", early_exit.output);
            return if early_exit.status.is_ok() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            };
        }
    };

    let mut config = match &args.config {
        Some(path) => match PolicyConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                error!("{e}");
                return ExitCode::FAILURE;
            }
        },
        None => PolicyConfig::default(),
    };

    if let Some(variant) = args.policy {
        config = config.with_variant(variant);
    }

    if let Some(max_attempts) = args.max_attempts {
        config = config.with_max_attempts(max_attempts);
    }

    let policy = match config.into_policy() {
        Ok(policy) => policy,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = fs::create_dir_all(&args.results_dir) {
        error!(
            "failed to create results directory '{}': {e}",
            args.results_dir.display()
        );
        return ExitCode::FAILURE;
    }

    let input = RunInput {
        results_dir: args.results_dir,
        executable: args.executable,
        executable_args: executable_args.to_vec(),
        policy,
        keep_attempts: !args.discard_attempts,
    };

    let summary = match run(&input) {
        Ok(summary) => summary,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    for outcome in summary.outcomes() {
        if let Some(statistics) = outcome.statistics() {
            info!(
                benchmark = outcome.benchmark(),
                attempts = outcome.attempts(),
                samples = outcome.sample_count(),
                converged = outcome.converged(),
                mean = format_args!("{:.4}", statistics.mean()),
                conf = format_args!("{:.2}%", statistics.ci_relative_width() * 100.0),
                "benchmark complete"
            );
        } else {
            info!(
                benchmark = outcome.benchmark(),
                attempts = outcome.attempts(),
                samples = outcome.sample_count(),
                converged = outcome.converged(),
                "benchmark complete"
            );
        }
    }

    for failure in summary.failures() {
        error!(benchmark = failure.benchmark(), "{failure}");
    }

    if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
