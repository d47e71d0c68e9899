#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))]

//! Imitates a Google Benchmark executable for the runbench integration tests.
//!
//! Understands the `--benchmark_*` flags runbench passes and reports normally distributed
//! timings. Behavior is controlled by environment variables:
//!
//! * `RUNBENCH_FAKE_TESTS` - comma-separated benchmark names (default `Foo/1`).
//! * `RUNBENCH_FAKE_MEAN`, `RUNBENCH_FAKE_STDEV` - timing distribution (default 100 and 1).
//! * `RUNBENCH_FAKE_SEED` - random seed (default 1), mixed with the output path so that every
//!   attempt draws fresh samples.
//! * `RUNBENCH_FAKE_FAIL` - name of a benchmark that exits with failure.
//! * `RUNBENCH_FAKE_MALFORMED` - name of a benchmark that writes unparseable output.
//! * `RUNBENCH_FAKE_LIST` - `fail` to fail listing, `empty` to list nothing.

use std::env;
use std::fs;
use std::hash::BuildHasher;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use foldhash::fast::FixedState;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use regex::Regex;
use serde_json::{Value, json};

#[derive(Debug, Default)]
struct Flags {
    list_tests: bool,
    filter: Option<String>,
    out: Option<PathBuf>,
    repetitions: Option<u32>,
    unrecognized: Vec<String>,
}

impl Flags {
    fn parse(args: impl Iterator<Item = String>) -> Self {
        let mut flags = Self::default();

        for arg in args {
            if arg == "--benchmark_list_tests" || arg == "--benchmark_list_tests=true" {
                flags.list_tests = true;
            } else if let Some(value) = arg.strip_prefix("--benchmark_filter=") {
                flags.filter = Some(value.to_string());
            } else if let Some(value) = arg.strip_prefix("--benchmark_out=") {
                flags.out = Some(PathBuf::from(value));
            } else if let Some(value) = arg.strip_prefix("--benchmark_repetitions=") {
                flags.repetitions = value.parse().ok();
            } else if arg != "--benchmark_out_format=json" {
                flags.unrecognized.push(arg);
            }
        }

        flags
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn env_names(name: &str) -> Vec<String> {
    env::var(name)
        .map(|value| value.split(',').map(str::to_string).collect())
        .unwrap_or_default()
}

#[cfg_attr(test, mutants::skip)]
fn main() -> ExitCode {
    let flags = Flags::parse(env::args().skip(1));

    let tests: Vec<String> = env::var("RUNBENCH_FAKE_TESTS")
        .unwrap_or_else(|_| "Foo/1".to_string())
        .split(',')
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();

    if flags.list_tests {
        // Real executables print warnings like this one to stderr while listing.
        eprintln!("***WARNING*** CPU scaling is enabled, the benchmark real time measurements may be noisy");

        match env::var("RUNBENCH_FAKE_LIST").as_deref() {
            Ok("fail") => return ExitCode::from(2),
            Ok("empty") => return ExitCode::SUCCESS,
            _ => {}
        }

        for test in &tests {
            println!("{test}");
        }

        return ExitCode::SUCCESS;
    }

    let filter = match flags.filter.as_deref().map(Regex::new).transpose() {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("invalid filter: {e}");
            return ExitCode::FAILURE;
        }
    };

    let selected: Vec<&String> = tests
        .iter()
        .filter(|name| filter.as_ref().is_none_or(|filter| filter.is_match(name)))
        .collect();

    let failing = env_names("RUNBENCH_FAKE_FAIL");
    let malformed = env_names("RUNBENCH_FAKE_MALFORMED");

    if selected.iter().any(|name| failing.contains(name)) {
        println!("Running benchmark");
        eprintln!("benchmark aborted: simulated failure");
        return ExitCode::FAILURE;
    }

    let mean: f64 = env_or("RUNBENCH_FAKE_MEAN", 100.0);
    let stdev: f64 = env_or("RUNBENCH_FAKE_STDEV", 1.0);
    let seed: u64 = env_or("RUNBENCH_FAKE_SEED", 1);
    let repetitions = flags.repetitions.unwrap_or(1).max(1);

    let distribution = match Normal::new(mean, stdev) {
        Ok(distribution) => distribution,
        Err(e) => {
            eprintln!("invalid distribution: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut rng =
        StdRng::seed_from_u64(FixedState::with_seed(seed).hash_one((repetitions, &flags.out)));

    println!("Run on (4 X 2400 MHz CPU s)");

    for arg in &flags.unrecognized {
        println!("Passed through: {arg}");
    }
    println!("{:<40} {:>12} {:>12}", "Benchmark", "Time", "Iterations");

    let mut entries: Vec<Value> = Vec::new();

    for name in &selected {
        let mut times = Vec::new();

        for repetition_index in 0..repetitions {
            // Timings are never zero or negative.
            let real_time = distribution.sample(&mut rng).abs().max(f64::MIN_POSITIVE);
            times.push(real_time);

            println!("{:<40} {:>9.2} ns {:>12}", name, real_time, 1000);

            entries.push(json!({
                "name": name,
                "family_index": 0,
                "run_name": name,
                "run_type": "iteration",
                "repetitions": repetitions,
                "repetition_index": repetition_index,
                "threads": 1,
                "iterations": 1000,
                "real_time": real_time,
                "cpu_time": real_time,
                "time_unit": "ns"
            }));
        }

        #[expect(clippy::cast_precision_loss, reason = "repetition counts are small")]
        let average = times.iter().sum::<f64>() / times.len() as f64;

        entries.push(json!({
            "name": format!("{name}_mean"),
            "run_name": name,
            "run_type": "aggregate",
            "aggregate_name": "mean",
            "real_time": average,
            "cpu_time": average,
            "time_unit": "ns"
        }));
    }

    eprintln!("finished {} benchmark(s)", selected.len());

    let Some(out) = flags.out else {
        return ExitCode::SUCCESS;
    };

    let contents = if selected.iter().any(|name| malformed.contains(name)) {
        "{ \"context\": { \"truncated".to_string()
    } else {
        json!({
            "context": {
                "host_name": "fake-host",
                "executable": env::args().next().unwrap_or_default(),
                "num_cpus": 4,
                "library_build_type": "release"
            },
            "benchmarks": entries
        })
        .to_string()
    };

    if let Err(e) = fs::write(&out, contents) {
        eprintln!("failed to write '{}': {e}", out.display());
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
