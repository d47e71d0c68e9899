use std::collections::BTreeSet;
use std::fmt::{self, Display};
use std::io;
use std::path::{Path, PathBuf};

use foldhash::{HashSet, HashSetExt};
use thiserror::Error;
use tracing::debug;

use crate::pal::Filesystem;

/// Where Linux exposes processor configuration.
pub const DEFAULT_SYSFS_CPU: &str = "/sys/devices/system/cpu";

/// Why a setting should change.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum Reason {
    /// Thread siblings share a core, so whatever runs on one slows down the other.
    ThreadSiblings,

    /// Intel Turbo Boost varies the clock rate with load and temperature.
    IntelTurbo,

    /// AMD boost varies the clock rate per core.
    AmdBoost,

    /// Other scaling governors vary the clock rate with load.
    Governor,
}

impl Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ThreadSiblings => write!(f, "Disable thread siblings (aka Hyperthreading)"),
            Self::IntelTurbo => write!(f, "Disable Intel Turbo Boost"),
            Self::AmdBoost => write!(f, "Disable AMD Boost"),
            Self::Governor => write!(f, "Use the performance governor"),
        }
    }
}

/// A setting whose current value differs from the one wanted for benchmarking.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Remediation {
    reason: Reason,
    path: PathBuf,
    desired: &'static str,
    actual: String,
}

impl Remediation {
    /// Why the setting should change.
    #[must_use]
    pub fn reason(&self) -> Reason {
        self.reason
    }

    /// The file holding the setting.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The value the file should hold.
    #[must_use]
    pub fn desired(&self) -> &str {
        self.desired
    }

    /// The value the file holds now.
    #[must_use]
    pub fn actual(&self) -> &str {
        &self.actual
    }
}

/// Every setting that should change before benchmarking, in the order they were checked.
///
/// Displays as a shell script: each change is an `echo <value> | sudo tee <path>` line, preceded
/// by a `# <reason>` comment the first time its reason comes up.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Report {
    remediations: Vec<Remediation>,
}

impl Report {
    /// The settings that should change.
    #[must_use]
    pub fn remediations(&self) -> &[Remediation] {
        &self.remediations
    }

    /// Whether nothing needs to change.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.remediations.is_empty()
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut announced = HashSet::new();

        for remediation in &self.remediations {
            if announced.insert(remediation.reason) {
                writeln!(f, "# {}", remediation.reason)?;
            }

            writeln!(
                f,
                "echo {} | sudo tee {}",
                remediation.desired,
                remediation.path.display()
            )?;
        }

        Ok(())
    }
}

/// The processor configuration could not be determined.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CheckError {
    /// A file could not be read.
    #[error("failed to read '{}': {source}", .path.display())]
    Read {
        /// The file.
        path: PathBuf,

        /// Underlying I/O error.
        source: io::Error,
    },

    /// A file that every Linux system has does not exist.
    #[error("'{}' does not exist - is this a Linux system?", .path.display())]
    Missing {
        /// The file.
        path: PathBuf,
    },

    /// A file holding a processor list could not be parsed.
    #[error("'{}' is not a valid processor list: {source}", .path.display())]
    InvalidCpuList {
        /// The file.
        path: PathBuf,

        /// What was wrong with it.
        source: cpulist::Error,
    },

    /// A file holding a flag did not hold a number.
    #[error("'{}' holds '{value}' instead of a number", .path.display())]
    InvalidFlag {
        /// The file.
        path: PathBuf,

        /// What it held.
        value: String,
    },
}

fn cpu_dir(sysfs_cpu: &Path, cpu: u32) -> PathBuf {
    sysfs_cpu.join(format!("cpu{cpu}"))
}

fn read(filesystem: &impl Filesystem, path: &Path) -> Result<Option<String>, CheckError> {
    filesystem
        .read_first_line(path)
        .map_err(|source| CheckError::Read {
            path: path.to_path_buf(),
            source,
        })
}

fn read_cpulist(filesystem: &impl Filesystem, path: &Path) -> Result<Option<Vec<u32>>, CheckError> {
    read(filesystem, path)?
        .map(|line| {
            cpulist::parse(&line).map_err(|source| CheckError::InvalidCpuList {
                path: path.to_path_buf(),
                source,
            })
        })
        .transpose()
}

fn is_online(filesystem: &impl Filesystem, sysfs_cpu: &Path, cpu: u32) -> Result<bool, CheckError> {
    // The boot processor usually cannot be taken offline and has no `online` file.
    if cpu == 0 {
        return Ok(true);
    }

    let path = cpu_dir(sysfs_cpu, cpu).join("online");

    let Some(line) = read(filesystem, &path)? else {
        debug!(cpu, "no online flag, assuming online");
        return Ok(true);
    };

    line.parse::<u64>()
        .map(|flag| flag != 0)
        .map_err(|_| CheckError::InvalidFlag { path, value: line })
}

/// Checks the processor configuration below `sysfs_cpu` (normally [`DEFAULT_SYSFS_CPU`]).
pub(crate) fn check_with(
    filesystem: &impl Filesystem,
    sysfs_cpu: &Path,
) -> Result<Report, CheckError> {
    let mut remediations = Vec::new();

    let mut should_be = |desired: &'static str,
                         path: PathBuf,
                         reason: Reason|
     -> Result<(), CheckError> {
        match read(filesystem, &path)? {
            Some(actual) if actual != desired => remediations.push(Remediation {
                reason,
                path,
                desired,
                actual,
            }),
            Some(_) => {}
            None => debug!(path = %path.display(), "setting not present, skipping"),
        }

        Ok(())
    };

    let present_path = sysfs_cpu.join("present");
    let cpus = read_cpulist(filesystem, &present_path)?.ok_or(CheckError::Missing {
        path: present_path,
    })?;

    let mut online = Vec::with_capacity(cpus.len());
    for cpu in cpus {
        if is_online(filesystem, sysfs_cpu, cpu)? {
            online.push(cpu);
        }
    }

    debug!(online = online.len(), "found online processors");

    // Every sibling but the first of each core should go offline.
    let mut siblings = BTreeSet::new();
    for &cpu in &online {
        let path = cpu_dir(sysfs_cpu, cpu).join("topology/thread_siblings_list");

        if let Some(list) = read_cpulist(filesystem, &path)? {
            siblings.extend(list.into_iter().skip(1));
        }
    }

    for &sibling in &siblings {
        should_be(
            "0",
            cpu_dir(sysfs_cpu, sibling).join("online"),
            Reason::ThreadSiblings,
        )?;
    }

    should_be("1", sysfs_cpu.join("intel_pstate/no_turbo"), Reason::IntelTurbo)?;
    should_be("0", sysfs_cpu.join("cpufreq/boost"), Reason::AmdBoost)?;

    for cpu in online.into_iter().filter(|cpu| !siblings.contains(cpu)) {
        should_be(
            "performance",
            cpu_dir(sysfs_cpu, cpu).join("cpufreq/scaling_governor"),
            Reason::Governor,
        )?;
    }

    Ok(Report { remediations })
}
