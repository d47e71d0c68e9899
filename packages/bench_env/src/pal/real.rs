use std::fs;
use std::io;
use std::path::Path;

use crate::pal::Filesystem;

/// The virtual filesystem of the real operating system that the build is targeting.
#[derive(Debug, Default)]
pub(crate) struct BuildTargetFilesystem;

impl Filesystem for BuildTargetFilesystem {
    fn read_first_line(&self, path: &Path) -> io::Result<Option<String>> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(Some(
                contents.lines().next().unwrap_or_default().trim().to_string(),
            )),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}
