//! Small helpers shared by the encoder and the file-level operations.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;

use super::types::error::{ArchiveError, Result};

/// Converts a length into a 32-bit index entry.
pub(crate) fn to_entry(length: u64, context: &'static str) -> Result<u32> {
    u32::try_from(length).map_err(|_| ArchiveError::IndexOverflow { context, length })
}

/// A file written under a temporary sibling name and renamed onto its
/// target only when [`PendingFile::commit`] is called.
///
/// Dropping an uncommitted `PendingFile` removes the temporary file, so a
/// failed write never leaves a partial artifact at the target path.
#[derive(Debug)]
pub(crate) struct PendingFile {
    tmp: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl PendingFile {
    /// Creates the temporary file next to `target` and returns it opened for writing.
    pub(crate) fn create(target: &Path) -> io::Result<(Self, File)> {
        // PID + counter keeps concurrent packers in one directory apart.
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let seq = COUNTER.fetch_add(1, Ordering::Relaxed);

        let name = target
            .file_name()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, format!("not a file path: {}", target.display())))?;
        let tmp = target.with_file_name(format!(
            ".{}.{}_{}.tmp",
            name.to_string_lossy(),
            std::process::id(),
            seq
        ));

        let file = File::create(&tmp)?;
        Ok((
            Self {
                tmp,
                target: target.to_path_buf(),
                committed: false,
            },
            file,
        ))
    }

    /// Moves the temporary file onto its target path.
    pub(crate) fn commit(mut self) -> io::Result<()> {
        fs::rename(&self.tmp, &self.target)?;
        self.committed = true;
        debug!("Committed {}", self.target.display());
        Ok(())
    }
}

impl Drop for PendingFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.tmp);
        }
    }
}
