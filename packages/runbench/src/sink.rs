// Durable storage of benchmark results.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use serde_json::ser::PrettyFormatter;
use thiserror::Error;

use crate::Sample;
use crate::output::{self, Document};

/// Receives the results of sampling.
///
/// Implementations must store samples in the order given.
pub trait ResultSink {
    /// Stores the raw artifacts of one attempt. Called for every attempt before the
    /// convergence decision is made, so progress is inspectable even if a later attempt fails.
    fn persist_attempt(
        &mut self,
        benchmark: &str,
        attempt: u32,
        console: &str,
        structured_output: &str,
    ) -> Result<(), SinkError>;

    /// Stores the final result of a benchmark: the context of its first attempt, every
    /// iteration sample of every attempt and the console output of every attempt.
    fn persist(
        &mut self,
        benchmark: &str,
        context: &Value,
        samples: &[Sample],
        console: &str,
    ) -> Result<(), SinkError>;

    /// The directory results are written into, if they are written to the filesystem.
    fn location(&self) -> Option<&Path> {
        None
    }
}

/// Results could not be written or read back.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SinkError {
    /// A file or directory could not be written.
    #[error("failed to write '{}': {source}", .path.display())]
    Write {
        /// Path that was being written.
        path: PathBuf,

        /// Underlying I/O error.
        source: io::Error,
    },

    /// A results file could not be read.
    #[error("failed to read '{}': {source}", .path.display())]
    Read {
        /// Path that was being read.
        path: PathBuf,

        /// Underlying I/O error.
        source: io::Error,
    },

    /// A results file could not be encoded.
    #[error("failed to encode '{}': {source}", .path.display())]
    Encode {
        /// Path that was being written.
        path: PathBuf,

        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// A results file does not contain a valid aggregate document.
    #[error("'{}' is not a valid results document: {source}", .path.display())]
    Decode {
        /// Path that was being read.
        path: PathBuf,

        /// What was wrong with the document.
        source: output::ResultParseError,
    },
}

/// Writes results as files in one directory, named after the benchmark.
///
/// For a benchmark `a/b` the files are:
///
/// * `a.b.json` - context and every iteration sample.
/// * `a.b.console` - console output of every attempt, oldest first.
/// * `a.b.attempt<k>.console` and `a.b.attempt<k>.json` - raw artifacts of attempt `k`,
///   unless disabled with [`discard_attempts()`][Self::discard_attempts].
#[derive(Clone, Debug)]
pub struct DirectorySink {
    directory: PathBuf,
    keep_attempts: bool,
}

impl DirectorySink {
    /// Creates a sink writing into `directory`, which is created on first write if needed.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            keep_attempts: true,
        }
    }

    /// Skips writing per-attempt artifacts.
    #[must_use]
    pub fn discard_attempts(mut self) -> Self {
        self.keep_attempts = false;
        self
    }

    /// Path of the file holding the final aggregate of `benchmark`.
    #[must_use]
    pub fn aggregate_path(&self, benchmark: &str) -> PathBuf {
        self.path_for(benchmark, "json")
    }

    fn path_for(&self, benchmark: &str, suffix: &str) -> PathBuf {
        self.directory
            .join(format!("{}.{suffix}", file_stem(benchmark)))
    }

    fn write(&self, path: &Path, contents: &str) -> Result<(), SinkError> {
        fs::create_dir_all(&self.directory).map_err(|source| SinkError::Write {
            path: self.directory.clone(),
            source,
        })?;

        fs::write(path, contents).map_err(|source| SinkError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl ResultSink for DirectorySink {
    fn location(&self) -> Option<&Path> {
        Some(&self.directory)
    }

    fn persist_attempt(
        &mut self,
        benchmark: &str,
        attempt: u32,
        console: &str,
        structured_output: &str,
    ) -> Result<(), SinkError> {
        if !self.keep_attempts {
            return Ok(());
        }

        self.write(
            &self.path_for(benchmark, &format!("attempt{attempt}.console")),
            console,
        )?;
        self.write(
            &self.path_for(benchmark, &format!("attempt{attempt}.json")),
            structured_output,
        )
    }

    fn persist(
        &mut self,
        benchmark: &str,
        context: &Value,
        samples: &[Sample],
        console: &str,
    ) -> Result<(), SinkError> {
        let path = self.aggregate_path(benchmark);

        let document = Document {
            context: context.clone(),
            benchmarks: samples.iter().map(|sample| sample.entry().clone()).collect(),
        };

        let json = to_pretty_json(&document).map_err(|source| SinkError::Encode {
            path: path.clone(),
            source,
        })?;

        self.write(&path, &json)?;
        self.write(&self.path_for(benchmark, "console"), console)
    }
}

/// Turns a benchmark name into a file name stem by replacing path separators with `.`.
#[must_use]
pub fn file_stem(benchmark: &str) -> String {
    benchmark.replace(['/', '\\'], ".")
}

fn to_pretty_json(value: &impl Serialize) -> Result<String, serde_json::Error> {
    let mut buffer = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(b"    "));

    value.serialize(&mut serializer)?;

    // The serializer only ever emits valid UTF-8.
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Reads back a final aggregate written by [`DirectorySink`], returning its context and samples
/// in the order they were persisted.
pub fn read_aggregate(path: &Path) -> Result<(Value, Vec<Sample>), SinkError> {
    let json = fs::read_to_string(path).map_err(|source| SinkError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let fallback_name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    let output = output::parse(&json, &fallback_name).map_err(|source| SinkError::Decode {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(output.into_parts())
}
