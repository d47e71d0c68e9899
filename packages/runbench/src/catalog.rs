// Discovery of the individual benchmarks inside a benchmark executable.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::DiscoveryError;
use crate::pal::{ProcessLauncher, ProcessLauncherFacade};

/// Makes a Google Benchmark executable print the name of every benchmark, one per line.
pub(crate) const LIST_TESTS_FLAG: &str = "--benchmark_list_tests";

/// One individually runnable benchmark inside a benchmark executable.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BenchmarkSpec {
    name: String,
    executable: PathBuf,
    invocation_args: Vec<String>,
}

impl BenchmarkSpec {
    /// Creates a spec that runs only the benchmark called `name`.
    ///
    /// The invocation arguments are `static_args` followed by a filter that matches `name`
    /// exactly, so benchmarks whose names are prefixes of one another are not run together.
    #[must_use]
    pub fn new(name: impl Into<String>, executable: impl Into<PathBuf>, static_args: &[String]) -> Self {
        let name = name.into();

        let mut invocation_args = static_args.to_vec();
        invocation_args.push(filter_arg(&name));

        Self {
            name,
            executable: executable.into(),
            invocation_args,
        }
    }

    /// Unique name of the benchmark, as listed by the executable.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The benchmark executable.
    #[must_use]
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Arguments that make the executable run only this benchmark.
    #[must_use]
    pub fn invocation_args(&self) -> &[String] {
        &self.invocation_args
    }
}

fn filter_arg(name: &str) -> String {
    format!("--benchmark_filter=^{}$", regex::escape(name))
}

/// Asks `executable` for its benchmarks and returns one spec per benchmark, in listed order.
///
/// `static_args` are passed both to the listing call and to every benchmark invocation.
pub fn list_benchmarks(
    executable: &Path,
    static_args: &[String],
) -> Result<Vec<BenchmarkSpec>, DiscoveryError> {
    list_benchmarks_with(&ProcessLauncherFacade::target(), executable, static_args)
}

pub(crate) fn list_benchmarks_with(
    launcher: &impl ProcessLauncher,
    executable: &Path,
    static_args: &[String],
) -> Result<Vec<BenchmarkSpec>, DiscoveryError> {
    let mut args: Vec<OsString> = static_args.iter().map(OsString::from).collect();
    args.push(LIST_TESTS_FLAG.into());

    let output = launcher
        .capture_stdout(executable, &args)
        .map_err(|source| DiscoveryError::Launch {
            executable: executable.to_path_buf(),
            source,
        })?;

    if !output.success() {
        return Err(DiscoveryError::ExitStatus {
            executable: executable.to_path_buf(),
            status: output.status(),
        });
    }

    let specs: Vec<BenchmarkSpec> = output
        .console
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .map(|name| BenchmarkSpec::new(name, executable, static_args))
        .collect();

    if specs.is_empty() {
        return Err(DiscoveryError::NoBenchmarks {
            executable: executable.to_path_buf(),
        });
    }

    debug!(
        executable = %executable.display(),
        count = specs.len(),
        "listed benchmarks"
    );

    Ok(specs)
}
