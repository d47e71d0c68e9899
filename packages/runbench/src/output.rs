// Parsing of the JSON document a Google Benchmark executable writes via `--benchmark_out`.
//
// Only `run_type` and `real_time` are interpreted. Every other field of an entry is kept as-is
// so the persisted aggregate carries exactly what the benchmark reported.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

const RUN_TYPE_FIELD: &str = "run_type";
const REAL_TIME_FIELD: &str = "real_time";
const NAME_FIELD: &str = "name";

/// The kind of entry a benchmark executable reported.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum SampleKind {
    /// One timed repetition of the measured body. Only these feed the statistics.
    Iteration,

    /// A summary (mean, median, ...) the benchmark framework computed over repetitions.
    Aggregate,

    /// Anything else.
    Other,
}

impl SampleKind {
    fn from_run_type(run_type: Option<&str>) -> Self {
        match run_type {
            Some("iteration") => Self::Iteration,
            Some("aggregate") => Self::Aggregate,
            _ => Self::Other,
        }
    }
}

/// One timing entry reported by a benchmark executable.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    benchmark_name: String,
    elapsed: f64,
    kind: SampleKind,
    entry: Map<String, Value>,
}

impl Sample {
    /// Name of the benchmark the entry belongs to.
    #[must_use]
    pub fn benchmark_name(&self) -> &str {
        &self.benchmark_name
    }

    /// The `real_time` of the entry, in the time unit the benchmark reported it in.
    ///
    /// Always finite and positive.
    #[must_use]
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// What kind of entry this is.
    #[must_use]
    pub fn kind(&self) -> SampleKind {
        self.kind
    }

    /// The entry exactly as the benchmark reported it.
    #[must_use]
    pub fn entry(&self) -> &Map<String, Value> {
        &self.entry
    }
}

/// The structured output of one benchmark run.
#[derive(Clone, Debug, PartialEq)]
pub struct StructuredOutput {
    context: Value,
    samples: Vec<Sample>,
}

impl StructuredOutput {
    /// Opaque metadata about the machine and build the benchmark ran on.
    #[must_use]
    pub fn context(&self) -> &Value {
        &self.context
    }

    /// Every entry that carried a usable `real_time`, in the order reported.
    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Only the [`SampleKind::Iteration`] entries, in the order reported.
    pub fn iterations(&self) -> impl Iterator<Item = &Sample> {
        self.samples
            .iter()
            .filter(|sample| sample.kind == SampleKind::Iteration)
    }

    pub(crate) fn into_parts(self) -> (Value, Vec<Sample>) {
        (self.context, self.samples)
    }
}

/// On-disk shape of both the benchmark's output and the persisted aggregate.
#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct Document {
    pub(crate) context: Value,
    pub(crate) benchmarks: Vec<Map<String, Value>>,
}

/// The structured output of a benchmark could not be used.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ResultParseError {
    /// The output file could not be read (the benchmark may not have written it).
    #[error("failed to read structured output '{}': {source}", .path.display())]
    Read {
        /// File that was expected to contain the output.
        path: PathBuf,

        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The output is not JSON or lacks the `context` and `benchmarks` fields.
    #[error("structured output is not a valid benchmark document: {source}")]
    InvalidDocument {
        /// Underlying JSON error.
        #[from]
        source: serde_json::Error,
    },

    /// An iteration entry has no usable `real_time`.
    #[error("iteration entry {index} does not have a finite positive numeric 'real_time'")]
    InvalidRealTime {
        /// Position of the entry in the `benchmarks` list.
        index: usize,
    },
}

/// Parses the JSON document written by a benchmark executable.
///
/// Iteration entries must carry a finite positive numeric `real_time`. Other entries without
/// one are dropped, since nothing downstream can use them. `benchmark_name` is used for entries
/// that do not name themselves.
pub fn parse(json: &str, benchmark_name: &str) -> Result<StructuredOutput, ResultParseError> {
    let document: Document = serde_json::from_str(json)?;

    from_document(document, benchmark_name)
}

fn from_document(
    document: Document,
    benchmark_name: &str,
) -> Result<StructuredOutput, ResultParseError> {
    let mut samples = Vec::with_capacity(document.benchmarks.len());

    for (index, entry) in document.benchmarks.into_iter().enumerate() {
        let kind = SampleKind::from_run_type(entry.get(RUN_TYPE_FIELD).and_then(Value::as_str));

        let elapsed = entry
            .get(REAL_TIME_FIELD)
            .and_then(Value::as_f64)
            .filter(|elapsed| elapsed.is_finite() && *elapsed > 0.0);

        let Some(elapsed) = elapsed else {
            if kind == SampleKind::Iteration {
                return Err(ResultParseError::InvalidRealTime { index });
            }

            continue;
        };

        let name = entry
            .get(NAME_FIELD)
            .and_then(Value::as_str)
            .unwrap_or(benchmark_name)
            .to_string();

        samples.push(Sample {
            benchmark_name: name,
            elapsed,
            kind,
            entry,
        });
    }

    Ok(StructuredOutput {
        context: document.context,
        samples,
    })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use serde_json::json;
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(ResultParseError: Send, Sync, std::fmt::Debug);

    fn google_benchmark_output() -> String {
        json!({
            "context": {
                "date": "2024-03-01T10:00:00+00:00",
                "host_name": "bench-host",
                "num_cpus": 8,
                "library_build_type": "release"
            },
            "benchmarks": [
                {
                    "name": "BM_LowerBound/64",
                    "run_name": "BM_LowerBound/64",
                    "run_type": "iteration",
                    "repetitions": 2,
                    "repetition_index": 0,
                    "iterations": 1000,
                    "real_time": 12.5,
                    "cpu_time": 12.4,
                    "time_unit": "ns"
                },
                {
                    "name": "BM_LowerBound/64",
                    "run_type": "iteration",
                    "repetition_index": 1,
                    "real_time": 13.0,
                    "time_unit": "ns"
                },
                {
                    "name": "BM_LowerBound/64_mean",
                    "run_type": "aggregate",
                    "aggregate_name": "mean",
                    "real_time": 12.75,
                    "time_unit": "ns"
                },
                {
                    "name": "BM_LowerBound/64_cv",
                    "run_type": "aggregate",
                    "aggregate_name": "cv",
                    "real_time": 0.0,
                    "time_unit": "ns"
                }
            ]
        })
        .to_string()
    }

    #[test]
    fn parses_google_benchmark_document() {
        let output = parse(&google_benchmark_output(), "BM_LowerBound/64").unwrap();

        assert_eq!(output.context()["host_name"], "bench-host");

        // The cv aggregate has a zero real_time and is dropped.
        assert_eq!(output.samples().len(), 3);

        let iterations: Vec<f64> = output.iterations().map(Sample::elapsed).collect();
        assert_eq!(iterations, vec![12.5, 13.0]);

        let aggregate = output.samples().last().unwrap();
        assert_eq!(aggregate.kind(), SampleKind::Aggregate);
        assert_eq!(aggregate.benchmark_name(), "BM_LowerBound/64_mean");
    }

    #[test]
    fn keeps_entries_verbatim() {
        let output = parse(&google_benchmark_output(), "BM_LowerBound/64").unwrap();

        let first = output.iterations().next().unwrap();
        assert_eq!(first.entry()["cpu_time"], 12.4);
        assert_eq!(first.entry()["iterations"], 1000);
    }

    #[test]
    fn unnamed_entries_take_benchmark_name() {
        let json = json!({
            "context": null,
            "benchmarks": [{ "run_type": "iteration", "real_time": 1.0 }]
        })
        .to_string();

        let output = parse(&json, "Foo/1").unwrap();

        assert_eq!(output.samples()[0].benchmark_name(), "Foo/1");
    }

    #[test]
    fn integer_real_time_is_accepted() {
        let json = json!({
            "context": {},
            "benchmarks": [{ "run_type": "iteration", "real_time": 7 }]
        })
        .to_string();

        let output = parse(&json, "Foo").unwrap();

        assert_eq!(output.samples()[0].elapsed(), 7.0);
    }

    #[test]
    fn entries_without_run_type_are_other() {
        let json = json!({
            "context": {},
            "benchmarks": [{ "real_time": 3.0 }]
        })
        .to_string();

        let output = parse(&json, "Foo").unwrap();

        assert_eq!(output.samples()[0].kind(), SampleKind::Other);
        assert_eq!(output.iterations().count(), 0);
    }

    #[test]
    fn iteration_without_real_time_is_error() {
        let json = json!({
            "context": {},
            "benchmarks": [
                { "run_type": "iteration", "real_time": 1.0 },
                { "run_type": "iteration" }
            ]
        })
        .to_string();

        assert!(matches!(
            parse(&json, "Foo"),
            Err(ResultParseError::InvalidRealTime { index: 1 })
        ));
    }

    #[test]
    fn iteration_with_string_real_time_is_error() {
        let json = json!({
            "context": {},
            "benchmarks": [{ "run_type": "iteration", "real_time": "12.5" }]
        })
        .to_string();

        assert!(matches!(
            parse(&json, "Foo"),
            Err(ResultParseError::InvalidRealTime { index: 0 })
        ));
    }

    #[test]
    fn iteration_with_negative_real_time_is_error() {
        let json = json!({
            "context": {},
            "benchmarks": [{ "run_type": "iteration", "real_time": -1.0 }]
        })
        .to_string();

        assert!(matches!(
            parse(&json, "Foo"),
            Err(ResultParseError::InvalidRealTime { index: 0 })
        ));
    }

    #[test]
    fn malformed_json_is_error() {
        assert!(matches!(
            parse("{ this is not json", "Foo"),
            Err(ResultParseError::InvalidDocument { .. })
        ));
    }

    #[test]
    fn missing_sections_are_error() {
        assert!(matches!(
            parse(r#"{ "context": {} }"#, "Foo"),
            Err(ResultParseError::InvalidDocument { .. })
        ));
        assert!(matches!(
            parse(r#"{ "benchmarks": [] }"#, "Foo"),
            Err(ResultParseError::InvalidDocument { .. })
        ));
    }
}
