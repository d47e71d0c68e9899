use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::{ResultParseError, SinkError};

/// How many trailing console lines a failed attempt carries in its error.
pub(crate) const CONSOLE_TAIL_LINES: usize = 20;

/// The benchmark executable could not be queried for its benchmarks. Aborts the whole run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DiscoveryError {
    /// The executable could not be started.
    #[error("failed to launch '{}' to list benchmarks: {source}", .executable.display())]
    Launch {
        /// The benchmark executable.
        executable: PathBuf,

        /// Underlying I/O error.
        source: io::Error,
    },

    /// The executable ran but reported failure.
    #[error("listing benchmarks of '{}' failed with {status}", .executable.display())]
    ExitStatus {
        /// The benchmark executable.
        executable: PathBuf,

        /// How the process ended.
        status: String,
    },

    /// The executable did not list a single benchmark.
    #[error("'{}' did not list any benchmarks", .executable.display())]
    NoBenchmarks {
        /// The benchmark executable.
        executable: PathBuf,
    },
}

/// Sampling of a single benchmark failed. Other benchmarks of the same run are unaffected.
///
/// No partial results are persisted for a failed benchmark, apart from the per-attempt
/// artifacts written before the failure.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BenchmarkError {
    /// The private output location for the attempt could not be created.
    #[error("benchmark '{benchmark}' attempt {attempt}: failed to create output location: {source}")]
    OutputFile {
        /// Name of the benchmark.
        benchmark: String,

        /// Zero-based attempt index.
        attempt: u32,

        /// Underlying I/O error.
        source: io::Error,
    },

    /// The benchmark executable could not be started.
    #[error("benchmark '{benchmark}' attempt {attempt}: failed to launch benchmark executable: {source}")]
    Launch {
        /// Name of the benchmark.
        benchmark: String,

        /// Zero-based attempt index.
        attempt: u32,

        /// Underlying I/O error.
        source: io::Error,
    },

    /// The benchmark executable reported failure.
    #[error("benchmark '{benchmark}' attempt {attempt}: benchmark executable failed with {status}\n{console_tail}")]
    Execution {
        /// Name of the benchmark.
        benchmark: String,

        /// Zero-based attempt index.
        attempt: u32,

        /// How the process ended.
        status: String,

        /// The last lines of console output of the failed attempt.
        console_tail: String,
    },

    /// The structured output of the attempt could not be used.
    #[error("benchmark '{benchmark}' attempt {attempt}: {source}")]
    ResultParse {
        /// Name of the benchmark.
        benchmark: String,

        /// Zero-based attempt index.
        attempt: u32,

        /// What was wrong with the output.
        source: ResultParseError,
    },

    /// Results could not be written.
    #[error("benchmark '{benchmark}': failed to persist results: {source}")]
    Persist {
        /// Name of the benchmark.
        benchmark: String,

        /// What went wrong.
        source: SinkError,
    },
}

impl BenchmarkError {
    /// Name of the benchmark that failed.
    #[must_use]
    pub fn benchmark(&self) -> &str {
        match self {
            Self::OutputFile { benchmark, .. }
            | Self::Launch { benchmark, .. }
            | Self::Execution { benchmark, .. }
            | Self::ResultParse { benchmark, .. }
            | Self::Persist { benchmark, .. } => benchmark,
        }
    }
}

/// Returns the last `max_lines` lines of `console`.
pub(crate) fn console_tail(console: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = console.lines().collect();

    lines
        .get(lines.len().saturating_sub(max_lines)..)
        .unwrap_or_default()
        .join("\n")
}
