// Real process launcher that delegates to std::process.

use std::ffi::OsString;
use std::io::{self, Read};
use std::path::Path;
use std::process::{Command, Stdio};

use crate::pal::{ProcessLauncher, ProcessOutput};

/// Launches real processes on the operating system the build is targeting.
#[derive(Debug, Default)]
pub(crate) struct BuildTargetProcessLauncher;

// Thin forwarder to system APIs, exercised by the integration tests.
#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg_attr(test, mutants::skip)]
impl ProcessLauncher for BuildTargetProcessLauncher {
    fn capture_stdout(&self, program: &Path, args: &[OsString]) -> io::Result<ProcessOutput> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()?;

        Ok(ProcessOutput {
            exit_code: output.status.code(),
            console: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }

    fn capture_combined(&self, program: &Path, args: &[OsString]) -> io::Result<ProcessOutput> {
        let (mut reader, writer) = io::pipe()?;

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(writer.try_clone()?)
            .stderr(writer);

        let mut child = command.spawn()?;

        // The command still owns both write ends. They must be closed before reading or the
        // read never sees end-of-stream.
        drop(command);

        let mut console = Vec::new();
        let read_result = reader.read_to_end(&mut console);

        // Reap the child even if reading failed.
        let status = child.wait()?;
        read_result?;

        Ok(ProcessOutput {
            exit_code: status.code(),
            console: String::from_utf8_lossy(&console).into_owned(),
        })
    }
}
