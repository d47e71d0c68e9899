// Facade that dispatches to either the real process launcher or a mock in tests.

use std::ffi::OsString;
use std::io;
use std::path::Path;
#[cfg(test)]
use std::sync::Arc;

#[cfg(test)]
use crate::pal::MockProcessLauncher;
use crate::pal::{BuildTargetProcessLauncher, ProcessLauncher, ProcessOutput};

/// Facade over process launching, dispatching to the real or the mock implementation.
#[derive(Clone)]
pub(crate) enum ProcessLauncherFacade {
    /// Real process launching.
    Target(&'static BuildTargetProcessLauncher),

    /// Mock process launching for testing.
    #[cfg(test)]
    Mock(Arc<MockProcessLauncher>),
}

// Debug implementations have no API contract to test.
#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg_attr(test, mutants::skip)]
impl std::fmt::Debug for ProcessLauncherFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Target(_) => f.debug_struct("ProcessLauncherFacade::Target").finish(),
            #[cfg(test)]
            Self::Mock(_) => f.debug_struct("ProcessLauncherFacade::Mock").finish(),
        }
    }
}

static BUILD_TARGET_PROCESS_LAUNCHER: BuildTargetProcessLauncher = BuildTargetProcessLauncher;

// Facade types are trivial pass-through layers - not worth testing.
#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg_attr(test, mutants::skip)]
impl ProcessLauncherFacade {
    pub(crate) const fn target() -> Self {
        Self::Target(&BUILD_TARGET_PROCESS_LAUNCHER)
    }

    #[cfg(test)]
    pub(crate) fn from_mock(mock: MockProcessLauncher) -> Self {
        Self::Mock(Arc::new(mock))
    }
}

// Facade types are trivial pass-through layers - not worth testing.
#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg_attr(test, mutants::skip)]
impl ProcessLauncher for ProcessLauncherFacade {
    fn capture_stdout(&self, program: &Path, args: &[OsString]) -> io::Result<ProcessOutput> {
        match self {
            Self::Target(launcher) => launcher.capture_stdout(program, args),
            #[cfg(test)]
            Self::Mock(mock) => mock.capture_stdout(program, args),
        }
    }

    fn capture_combined(&self, program: &Path, args: &[OsString]) -> io::Result<ProcessOutput> {
        match self {
            Self::Target(launcher) => launcher.capture_combined(program, args),
            #[cfg(test)]
            Self::Mock(mock) => mock.capture_combined(program, args),
        }
    }
}

// Facade types are trivial pass-through layers - not worth testing.
#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg_attr(test, mutants::skip)]
impl Default for ProcessLauncherFacade {
    fn default() -> Self {
        Self::target()
    }
}
