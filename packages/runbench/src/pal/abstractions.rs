// Process launching trait abstraction for mocking in tests.

use std::ffi::OsString;
use std::fmt::Debug;
use std::io;
use std::path::Path;

/// What a finished child process left behind.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct ProcessOutput {
    /// Exit code, or `None` if the process was terminated by a signal.
    pub(crate) exit_code: Option<i32>,

    /// Captured console text.
    pub(crate) console: String,
}

impl ProcessOutput {
    pub(crate) fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Human-readable description of how the process ended.
    pub(crate) fn status(&self) -> String {
        match self.exit_code {
            Some(code) => format!("exit code {code}"),
            None => "termination by signal".to_string(),
        }
    }
}

/// Abstraction over running the benchmark executable to completion.
///
/// This trait is automatically mocked by mockall in test builds, generating
/// `MockProcessLauncher`.
#[cfg_attr(test, mockall::automock)]
pub(crate) trait ProcessLauncher: Debug + Send + Sync + 'static {
    /// Runs `program` and captures only its stdout. Stderr is passed through to ours.
    fn capture_stdout(&self, program: &Path, args: &[OsString]) -> io::Result<ProcessOutput>;

    /// Runs `program` and captures stdout and stderr merged into one stream, preserving the
    /// order in which the process wrote them.
    fn capture_combined(&self, program: &Path, args: &[OsString]) -> io::Result<ProcessOutput>;
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn only_exit_code_zero_is_success() {
        let output = |exit_code| ProcessOutput {
            exit_code,
            console: String::new(),
        };

        assert!(output(Some(0)).success());
        assert!(!output(Some(1)).success());
        assert!(!output(None).success());

        assert_eq!(output(Some(3)).status(), "exit code 3");
        assert_eq!(output(None).status(), "termination by signal");
    }
}
