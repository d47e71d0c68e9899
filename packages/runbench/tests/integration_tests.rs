//! Integration tests for the runbench tool.
//!
//! These drive the real `runbench` binary against `runbench_fake_benchmark`, a stand-in for a
//! Google Benchmark executable whose behavior is controlled through environment variables.

#![cfg(not(miri))]

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use runbench::{SampleKind, read_aggregate};

const RUNBENCH: &str = env!("CARGO_BIN_EXE_runbench");
const FAKE_BENCHMARK: &str = env!("CARGO_BIN_EXE_runbench_fake_benchmark");

/// Runs runbench against the fake benchmark with the given runbench options (placed before the
/// positional arguments) and fake benchmark environment.
fn run_tool(results_dir: &Path, options: &[&str], env: &[(&str, &str)]) -> Output {
    let mut command = Command::new(RUNBENCH);

    command
        .args(options)
        .arg(results_dir)
        .arg(FAKE_BENCHMARK)
        .env("RUST_LOG", "debug")
        .env_remove("RUNBENCH_FAKE_TESTS")
        .env_remove("RUNBENCH_FAKE_FAIL")
        .env_remove("RUNBENCH_FAKE_MALFORMED")
        .env_remove("RUNBENCH_FAKE_LIST");

    for (key, value) in env {
        command.env(key, value);
    }

    command.output().unwrap()
}

fn attempt_files(results_dir: &Path, stem: &str) -> usize {
    fs::read_dir(results_dir)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            name.starts_with(&format!("{stem}.attempt")) && name.ends_with(".json")
        })
        .count()
}

#[test]
fn adaptive_run_converges_and_persists() {
    let dir = tempfile::tempdir().unwrap();

    let output = run_tool(
        dir.path(),
        &["--policy", "adaptive"],
        &[
            ("RUNBENCH_FAKE_TESTS", "Foo/1"),
            ("RUNBENCH_FAKE_MEAN", "10.0"),
            ("RUNBENCH_FAKE_STDEV", "0.01"),
        ],
    );

    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );

    let attempts = attempt_files(dir.path(), "Foo.1");
    assert!((1..=4).contains(&attempts), "{attempts} attempts");

    let aggregates = fs::read_dir(dir.path())
        .unwrap()
        .filter(|entry| {
            let name = entry.as_ref().unwrap().file_name();
            name.to_string_lossy().ends_with(".json")
                && !name.to_string_lossy().contains(".attempt")
        })
        .count();
    assert_eq!(aggregates, 1);

    let (context, samples) = read_aggregate(&dir.path().join("Foo.1.json")).unwrap();

    assert_eq!(context["host_name"], "fake-host");
    assert!(samples.len() >= 20);
    assert!(samples.iter().all(|sample| sample.kind() == SampleKind::Iteration));
    assert!(samples.iter().all(|sample| sample.benchmark_name() == "Foo/1"));

    let console = fs::read_to_string(dir.path().join("Foo.1.console")).unwrap();
    assert!(console.contains("Foo/1"));
}

#[test]
fn fixed_run_collects_minimum_samples() {
    let dir = tempfile::tempdir().unwrap();

    let output = run_tool(
        dir.path(),
        &[],
        &[("RUNBENCH_FAKE_MEAN", "100"), ("RUNBENCH_FAKE_STDEV", "0.5")],
    );

    assert!(output.status.success());

    let (_, samples) = read_aggregate(&dir.path().join("Foo.1.json")).unwrap();
    assert_eq!(samples.len(), 100);
    assert_eq!(attempt_files(dir.path(), "Foo.1"), 10);
}

#[test]
fn attempt_limit_persists_unconverged_result() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("policy.toml");
    fs::write(
        &config,
        "[policy]\nvariant = \"adaptive\"\nmax_attempts = 2\n",
    )
    .unwrap();

    let results = dir.path().join("results");

    let output = run_tool(
        &results,
        &["--config", config.to_str().unwrap()],
        &[("RUNBENCH_FAKE_MEAN", "100"), ("RUNBENCH_FAKE_STDEV", "30")],
    );

    assert!(output.status.success());

    let (_, samples) = read_aggregate(&results.join("Foo.1.json")).unwrap();
    assert_eq!(samples.len(), 20 + 24);
    assert_eq!(attempt_files(&results, "Foo.1"), 2);
}

#[test]
fn failing_benchmark_fails_run_but_others_persist() {
    let dir = tempfile::tempdir().unwrap();

    let output = run_tool(
        dir.path(),
        &["--policy", "adaptive"],
        &[
            ("RUNBENCH_FAKE_TESTS", "Foo/1,Bar/2,Baz/3"),
            ("RUNBENCH_FAKE_STDEV", "0.01"),
            ("RUNBENCH_FAKE_FAIL", "Bar/2"),
        ],
    );

    assert!(!output.status.success());

    assert!(dir.path().join("Foo.1.json").exists());
    assert!(dir.path().join("Baz.3.json").exists());
    assert!(!dir.path().join("Bar.2.json").exists());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Bar/2"));
}

#[test]
fn malformed_output_fails_run() {
    let dir = tempfile::tempdir().unwrap();

    let output = run_tool(
        dir.path(),
        &[],
        &[("RUNBENCH_FAKE_MALFORMED", "Foo/1")],
    );

    assert!(!output.status.success());
    assert!(!dir.path().join("Foo.1.json").exists());
    assert!(dir.path().join("Foo.1.attempt0.json").exists());
}

#[test]
fn listing_failure_fails_run() {
    let dir = tempfile::tempdir().unwrap();

    let output = run_tool(dir.path(), &[], &[("RUNBENCH_FAKE_LIST", "fail")]);

    assert!(!output.status.success());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn empty_listing_fails_run() {
    let dir = tempfile::tempdir().unwrap();

    let output = run_tool(dir.path(), &[], &[("RUNBENCH_FAKE_LIST", "empty")]);

    assert!(!output.status.success());
}

#[test]
fn discarded_attempts_leave_only_final_results() {
    let dir = tempfile::tempdir().unwrap();

    let output = run_tool(
        dir.path(),
        &["--policy", "adaptive", "--discard-attempts"],
        &[("RUNBENCH_FAKE_STDEV", "0.01")],
    );

    assert!(output.status.success());

    let mut names: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();

    assert_eq!(names, vec!["Foo.1.console", "Foo.1.json"]);
}

#[test]
fn benchmark_arguments_pass_through() {
    let dir = tempfile::tempdir().unwrap();

    let output = Command::new(RUNBENCH)
        .args(["--policy", "adaptive"])
        .arg(dir.path())
        .arg(FAKE_BENCHMARK)
        .args(["--benchmark_min_time=0.01s", "--benchmark_enable_random_interleaving"])
        .env("RUNBENCH_FAKE_STDEV", "0.01")
        .env_remove("RUNBENCH_FAKE_TESTS")
        .env_remove("RUNBENCH_FAKE_FAIL")
        .env_remove("RUNBENCH_FAKE_MALFORMED")
        .env_remove("RUNBENCH_FAKE_LIST")
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(dir.path().join("Foo.1.json").exists());

    let console = fs::read_to_string(dir.path().join("Foo.1.console")).unwrap();
    assert!(console.contains("Passed through: --benchmark_min_time=0.01s"));
    assert!(console.contains("Passed through: --benchmark_enable_random_interleaving"));
}

fn fake_real_times(out: &Path) -> Vec<f64> {
    let status = Command::new(FAKE_BENCHMARK)
        .arg("--benchmark_repetitions=10")
        .arg(format!("--benchmark_out={}", out.display()))
        .env_remove("RUNBENCH_FAKE_TESTS")
        .env_remove("RUNBENCH_FAKE_FAIL")
        .env_remove("RUNBENCH_FAKE_MALFORMED")
        .status()
        .unwrap();
    assert!(status.success());

    let document: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out).unwrap()).unwrap();

    document["benchmarks"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|entry| entry["run_type"] == "iteration")
        .map(|entry| entry["real_time"].as_f64().unwrap())
        .collect()
}

#[test]
fn fake_benchmark_draws_fresh_samples_per_output_file() {
    let dir = tempfile::tempdir().unwrap();

    let first = fake_real_times(&dir.path().join("first.json"));
    let second = fake_real_times(&dir.path().join("second.json"));
    let first_again = fake_real_times(&dir.path().join("first.json"));

    assert_eq!(first.len(), 10);
    assert_ne!(first, second);
    assert_eq!(first, first_again);
}

#[test]
fn missing_executable_fails_run() {
    let dir = tempfile::tempdir().unwrap();

    let output = Command::new(RUNBENCH)
        .arg(dir.path())
        .arg(dir.path().join("no-such-benchmark"))
        .output()
        .unwrap();

    assert!(!output.status.success());
}

#[test]
fn invalid_configuration_fails_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("policy.toml");
    fs::write(&config, "[policy]\nvariant = \"fixed\"\nmax_cv = 0.1\n").unwrap();

    let output = run_tool(
        &dir.path().join("results"),
        &["--config", config.to_str().unwrap()],
        &[],
    );

    assert!(!output.status.success());
    assert!(!dir.path().join("results").exists());
}
