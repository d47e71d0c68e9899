use std::fmt::Debug;
use std::io;
use std::path::Path;

/// Linux exposes processor configuration as a virtual filesystem under `/sys`. This trait
/// abstracts reading it so it can be mocked.
///
/// Every file of interest holds a single line of text. All I/O is synchronous and blocking
/// because these reads never touch a real storage device.
#[cfg_attr(test, mockall::automock)]
pub(crate) trait Filesystem: Debug + Send + Sync + 'static {
    /// Gets the first line of the file at `path` with surrounding whitespace removed, or `None`
    /// if the file does not exist.
    ///
    /// Many of the files are optional: they only exist on some processor vendors, kernel
    /// configurations or CPUs (e.g. `cpu0` usually has no `online` file).
    fn read_first_line(&self, path: &Path) -> io::Result<Option<String>>;
}
