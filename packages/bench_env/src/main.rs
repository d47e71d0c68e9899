#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))]

//! Binary entry point for the bench_env tool.
//!
//! Prints a shell script that prepares the machine for benchmarking. Review it before piping
//! it into a shell.

use std::path::PathBuf;
use std::process::ExitCode;

use argh::FromArgs;
use bench_env::{DEFAULT_SYSFS_CPU, check_environment_at};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Checks for processor settings that make benchmark timings noisy and prints the commands
/// that change them.
#[derive(FromArgs)]
struct Args {
    /// directory exposing processor configuration (default: /sys/devices/system/cpu)
    #[argh(option, default = "PathBuf::from(DEFAULT_SYSFS_CPU)")]
    sysfs_cpu: PathBuf,
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

    let args: Args = argh::from_env();

    match check_environment_at(&args.sysfs_cpu) {
        Ok(report) => {
            if report.is_clean() {
                info!("processor settings are ready for benchmarking");
            } else {
                // The script goes to stdout so it can be piped into a shell.
                print!("{report}");
            }

            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
