#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Checks a Linux machine for processor settings that make benchmark timings noisy and
//! reports the commands that change them.
//!
//! Checked settings:
//!
//! * Thread siblings (Hyperthreading/SMT) should be offline, so nothing else runs on the core a
//!   benchmark runs on.
//! * Intel Turbo Boost and AMD boost should be disabled, so the clock rate does not vary from
//!   run to run or from core to core.
//! * Every online processor should use the `performance` scaling governor.
//!
//! Not every benchmark benefits from this. Long-running suites or suites that do a lot of I/O
//! may want to measure the machine as it is normally configured instead.
//!
//! ```no_run
//! let report = bench_env::check_environment()?;
//!
//! // A shell script that applies every change.
//! print!("{report}");
//! # Ok::<(), bench_env::CheckError>(())
//! ```

mod check;
mod pal;

use std::path::Path;

pub use check::*;
use pal::FilesystemFacade;

/// Checks the processor configuration of the current machine.
pub fn check_environment() -> Result<Report, CheckError> {
    check_environment_at(Path::new(DEFAULT_SYSFS_CPU))
}

/// Checks the processor configuration exposed below `sysfs_cpu` instead of the default
/// location, such as a copy of it taken from another machine.
pub fn check_environment_at(sysfs_cpu: &Path) -> Result<Report, CheckError> {
    check::check_with(&FilesystemFacade::target(), sysfs_cpu)
}
