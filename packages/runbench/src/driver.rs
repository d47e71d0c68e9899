// The sampling loop: run a benchmark, collect its iteration samples, consult the convergence
// policy and repeat until it is satisfied.

use std::ffi::OsString;
use std::fs;
use std::num::NonZero;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::aggregate::RunningAggregate;
use crate::error::{CONSOLE_TAIL_LINES, console_tail};
use crate::output::{self, ResultParseError};
use crate::pal::{ProcessLauncher, ProcessLauncherFacade};
use crate::{
    BenchmarkError, BenchmarkSpec, ConvergencePolicy, Decision, ResultSink, Statistics, stats,
};

/// Name of the structured output file inside the private per-attempt directory.
const OUTPUT_FILE_NAME: &str = "benchmark_out.json";

/// The raw artifacts of one successful invocation of the benchmark executable.
#[derive(Debug)]
struct AttemptResult {
    attempt_index: u32,
    repetitions: NonZero<u32>,
    console: String,
    structured_output: String,
}

/// Final state of a benchmark whose sampling loop finished without error.
#[derive(Clone, Debug, PartialEq)]
pub struct BenchmarkOutcome {
    benchmark: String,
    attempts: u32,
    sample_count: usize,
    statistics: Option<Statistics>,
    converged: bool,
}

impl BenchmarkOutcome {
    /// Name of the benchmark.
    #[must_use]
    pub fn benchmark(&self) -> &str {
        &self.benchmark
    }

    /// How many times the benchmark executable was invoked.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// How many iteration samples were collected.
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Statistics over all samples, if defined.
    #[must_use]
    pub fn statistics(&self) -> Option<&Statistics> {
        self.statistics.as_ref()
    }

    /// Whether the convergence policy was satisfied. `false` means the attempt limit ended
    /// sampling first.
    #[must_use]
    pub fn converged(&self) -> bool {
        self.converged
    }
}

/// Runs benchmarks until their samples converge and hands the results to a [`ResultSink`].
///
/// Benchmarks are sampled one at a time and every attempt waits for the benchmark executable
/// to exit before the next one starts.
#[derive(Debug)]
pub struct SamplingDriver<S> {
    launcher: ProcessLauncherFacade,
    policy: ConvergencePolicy,
    sink: S,
}

impl<S: ResultSink> SamplingDriver<S> {
    /// Creates a driver that launches real processes.
    #[must_use]
    pub fn new(policy: ConvergencePolicy, sink: S) -> Self {
        Self::with_launcher(ProcessLauncherFacade::target(), policy, sink)
    }

    pub(crate) fn with_launcher(
        launcher: ProcessLauncherFacade,
        policy: ConvergencePolicy,
        sink: S,
    ) -> Self {
        Self {
            launcher,
            policy,
            sink,
        }
    }

    /// The sink results are written to.
    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Samples one benchmark until the policy decides it is done, then persists the result.
    ///
    /// Any failure ends sampling of this benchmark without persisting a final result. Failed
    /// invocations are not retried.
    pub fn run(&mut self, spec: &BenchmarkSpec) -> Result<BenchmarkOutcome, BenchmarkError> {
        match self.sink.location() {
            Some(results_dir) => info!(
                benchmark = spec.name(),
                results_dir = %results_dir.display(),
                "running benchmark"
            ),
            None => info!(benchmark = spec.name(), "running benchmark"),
        }

        let mut aggregate = RunningAggregate::default();
        let mut context: Option<Value> = None;
        let mut console_history = String::new();
        let mut repetitions = self.policy.initial_repetitions();
        let mut attempt_index: u32 = 0;

        loop {
            let attempt = self.attempt(spec, attempt_index, repetitions)?;

            self.sink
                .persist_attempt(
                    spec.name(),
                    attempt.attempt_index,
                    &attempt.console,
                    &attempt.structured_output,
                )
                .map_err(|source| BenchmarkError::Persist {
                    benchmark: spec.name().to_string(),
                    source,
                })?;

            console_history.push_str(&attempt.console);

            let (attempt_context, samples) = output::parse(&attempt.structured_output, spec.name())
                .map_err(|source| BenchmarkError::ResultParse {
                    benchmark: spec.name().to_string(),
                    attempt: attempt.attempt_index,
                    source,
                })?
                .into_parts();

            // Only the first attempt's context is kept.
            context.get_or_insert(attempt_context);

            aggregate.extend_iterations(samples);

            let statistics = match stats::compute(&aggregate.elapsed()) {
                Ok(statistics) => {
                    info!(
                        benchmark = spec.name(),
                        attempt = attempt.attempt_index,
                        repetitions = attempt.repetitions.get(),
                        median = format_args!("{:.4}", statistics.median()),
                        mean = format_args!("{:.4}", statistics.mean()),
                        stdev = format_args!("{:.4}", statistics.stdev()),
                        cv = format_args!("{:.3}%", statistics.cv() * 100.0),
                        conf = format_args!("{:.2}%", statistics.ci_relative_width() * 100.0),
                        samples = statistics.sample_count(),
                        "attempt complete"
                    );

                    Some(statistics)
                }
                Err(error) => {
                    debug!(
                        benchmark = spec.name(),
                        attempt = attempt.attempt_index,
                        samples = aggregate.len(),
                        %error,
                        "statistics undefined, continuing"
                    );

                    None
                }
            };

            let verdict = self.policy.decide(
                statistics.as_ref(),
                aggregate.len(),
                attempt.attempt_index,
                attempt.repetitions,
            );

            match verdict.decision() {
                Decision::Continue => {
                    repetitions = verdict.next_repetitions();
                    attempt_index = attempt_index.saturating_add(1);
                }
                Decision::Converged | Decision::AttemptLimitReached => {
                    let converged = verdict.decision() == Decision::Converged;

                    if !converged {
                        warn!(
                            benchmark = spec.name(),
                            attempts = attempt_index.saturating_add(1),
                            samples = aggregate.len(),
                            "attempt limit reached before convergence"
                        );
                    }

                    self.sink
                        .persist(
                            spec.name(),
                            context.as_ref().unwrap_or(&Value::Null),
                            aggregate.samples(),
                            &console_history,
                        )
                        .map_err(|source| BenchmarkError::Persist {
                            benchmark: spec.name().to_string(),
                            source,
                        })?;

                    return Ok(BenchmarkOutcome {
                        benchmark: spec.name().to_string(),
                        attempts: attempt_index.saturating_add(1),
                        sample_count: aggregate.len(),
                        statistics,
                        converged,
                    });
                }
            }
        }
    }

    fn attempt(
        &self,
        spec: &BenchmarkSpec,
        attempt_index: u32,
        repetitions: NonZero<u32>,
    ) -> Result<AttemptResult, BenchmarkError> {
        // Each attempt gets its own private directory for the structured output. It is removed
        // when dropped, on success and on every error path alike.
        let output_dir = tempfile::Builder::new()
            .prefix("runbench-")
            .tempdir()
            .map_err(|source| BenchmarkError::OutputFile {
                benchmark: spec.name().to_string(),
                attempt: attempt_index,
                source,
            })?;
        let output_path = output_dir.path().join(OUTPUT_FILE_NAME);

        let mut args: Vec<OsString> = spec.invocation_args().iter().map(OsString::from).collect();

        let mut out_arg = OsString::from("--benchmark_out=");
        out_arg.push(&output_path);
        args.push(out_arg);
        args.push("--benchmark_out_format=json".into());
        args.push(format!("--benchmark_repetitions={repetitions}").into());

        debug!(
            benchmark = spec.name(),
            attempt = attempt_index,
            repetitions = repetitions.get(),
            "invoking benchmark executable"
        );

        let output = self
            .launcher
            .capture_combined(spec.executable(), &args)
            .map_err(|source| BenchmarkError::Launch {
                benchmark: spec.name().to_string(),
                attempt: attempt_index,
                source,
            })?;

        if !output.success() {
            return Err(BenchmarkError::Execution {
                benchmark: spec.name().to_string(),
                attempt: attempt_index,
                status: output.status(),
                console_tail: console_tail(&output.console, CONSOLE_TAIL_LINES),
            });
        }

        let structured_output =
            fs::read_to_string(&output_path).map_err(|source| BenchmarkError::ResultParse {
                benchmark: spec.name().to_string(),
                attempt: attempt_index,
                source: ResultParseError::Read {
                    path: output_path.clone(),
                    source,
                },
            })?;

        Ok(AttemptResult {
            attempt_index,
            repetitions,
            console: output.console,
            structured_output,
        })
    }
}
