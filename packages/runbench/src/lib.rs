#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Runs the benchmarks of a [Google Benchmark](https://github.com/google/benchmark) executable
//! again and again until their timing samples converge on a stable result.
//!
//! A single run of a micro-benchmark on a shared machine is noisy. Instead of trusting it, the
//! tool invokes the executable once per benchmark and attempt, accumulates every iteration sample
//! the benchmark reports and, after each attempt, asks a [`ConvergencePolicy`] whether the
//! samples are stable enough. Once they are, the accumulated samples are handed to a
//! [`ResultSink`].
//!
//! ```no_run
//! use std::path::PathBuf;
//!
//! use runbench::{ConvergencePolicy, RunInput, run};
//!
//! let input = RunInput {
//!     results_dir: PathBuf::from("results"),
//!     executable: PathBuf::from("./my_benchmarks"),
//!     executable_args: vec!["--benchmark_min_time=0.1s".to_string()],
//!     policy: ConvergencePolicy::default(),
//!     keep_attempts: true,
//! };
//!
//! let summary = run(&input)?;
//!
//! for outcome in summary.outcomes() {
//!     println!("{}: {} samples", outcome.benchmark(), outcome.sample_count());
//! }
//! # Ok::<(), runbench::DiscoveryError>(())
//! ```
//!
//! # Statistics
//!
//! The mean, median, sample standard deviation, coefficient of variation and a
//! [`CONFIDENCE_LEVEL`] confidence interval of the mean (Student's t) are computed over the
//! `real_time` of every iteration sample collected so far. Aggregate entries the benchmark
//! framework computes itself are ignored.
//!
//! # Stopping rules
//!
//! * [`StoppingRule::FixedRepetitions`] (default) requests 10 repetitions per attempt and stops
//!   once at least 100 samples exist and the confidence interval is at most 0.5% of the mean.
//! * [`StoppingRule::AdaptiveRepetitions`] starts at 20 repetitions, grows the count by 20% per
//!   attempt up to 100 and stops once either the coefficient of variation or the relative
//!   confidence interval width is at most 1%.
//!
//! Neither rule bounds the number of attempts unless
//! [`ConvergencePolicy::with_max_attempts()`] is used.

mod aggregate;
mod catalog;
mod config;
mod driver;
mod error;
mod output;
mod pal;
mod policy;
mod sink;
mod stats;

use std::path::PathBuf;

pub use catalog::*;
pub use config::*;
pub use driver::*;
pub use error::*;
pub use output::{
    ResultParseError, Sample, SampleKind, StructuredOutput, parse as parse_structured_output,
};
use pal::ProcessLauncherFacade;
pub use policy::*;
pub use sink::*;
pub use stats::{CONFIDENCE_LEVEL, Statistics, StatisticsError, compute as compute_statistics};
use tracing::info;

/// Everything a run needs to know, independent of how it was obtained.
#[derive(Clone, Debug)]
pub struct RunInput {
    /// Directory the results are written to. Created if it does not exist.
    pub results_dir: PathBuf,

    /// The benchmark executable.
    pub executable: PathBuf,

    /// Arguments passed to the executable on every invocation, listing included.
    pub executable_args: Vec<String>,

    /// Decides when each benchmark has been sampled enough.
    pub policy: ConvergencePolicy,

    /// Whether the console output and structured output of each attempt are kept.
    pub keep_attempts: bool,
}

/// What happened to every benchmark of a run.
#[derive(Debug, Default)]
pub struct RunSummary {
    outcomes: Vec<BenchmarkOutcome>,
    failures: Vec<BenchmarkError>,
}

impl RunSummary {
    /// Benchmarks whose results were persisted, in the order they were run.
    #[must_use]
    pub fn outcomes(&self) -> &[BenchmarkOutcome] {
        &self.outcomes
    }

    /// Benchmarks that failed, in the order they were run.
    #[must_use]
    pub fn failures(&self) -> &[BenchmarkError] {
        &self.failures
    }

    /// Whether every benchmark was sampled and persisted.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Lists the benchmarks of the executable and samples each of them in turn, writing results into
/// the results directory.
///
/// Failure to list the benchmarks aborts the run. A failing benchmark does not: it is recorded in
/// the summary and the next benchmark is run.
pub fn run(input: &RunInput) -> Result<RunSummary, DiscoveryError> {
    run_with_launcher(input, &ProcessLauncherFacade::target())
}

fn run_with_launcher(
    input: &RunInput,
    launcher: &ProcessLauncherFacade,
) -> Result<RunSummary, DiscoveryError> {
    let specs =
        catalog::list_benchmarks_with(launcher, &input.executable, &input.executable_args)?;

    info!(
        executable = %input.executable.display(),
        results_dir = %input.results_dir.display(),
        benchmarks = specs.len(),
        policy = %input.policy.rule(),
        "starting run"
    );

    let sink = DirectorySink::new(&input.results_dir);
    let sink = if input.keep_attempts {
        sink
    } else {
        sink.discard_attempts()
    };

    let mut driver = SamplingDriver::with_launcher(launcher.clone(), input.policy, sink);
    let mut summary = RunSummary::default();

    for spec in &specs {
        match driver.run(spec) {
            Ok(outcome) => summary.outcomes.push(outcome),
            Err(error) => summary.failures.push(error),
        }
    }

    Ok(summary)
}
