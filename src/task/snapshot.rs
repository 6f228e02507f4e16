//! Memory snapshot files.
//!
//! A snapshot is a raw dump of a contiguous range of some task's address
//! space. The file is memory-mapped read-only and exposed as a
//! [`SliceTask`] rooted at the address the range was captured from.

use super::SliceTask;
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Snapshot {0} is empty")]
    Empty(PathBuf),

    #[error("An underlying I/O error occurred.")]
    StdIo(#[from] std::io::Error),
}

/// A memory-mapped snapshot of a target address range.
pub struct SnapshotTask {
    path: PathBuf,
    base: u64,
    mmap: Mmap,
}

impl SnapshotTask {
    /// Map the snapshot at `path`, whose first byte was captured at `base`.
    pub fn open<P: AsRef<Path>>(path: P, base: u64) -> Result<Self, SnapshotError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let size = file.metadata()?.len();

        debug!(
            path = %path.display(),
            size,
            base = %format_args!("{:#x}", base),
            "Opening memory snapshot"
        );

        // memmap cannot map empty files.
        if size == 0 {
            return Err(SnapshotError::Empty(path.to_path_buf()));
        }

        // Safety: read-only map of a regular file.
        let mmap = unsafe { Mmap::map(&file)? };

        Ok(Self {
            path: path.to_path_buf(),
            base,
            mmap,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn size(&self) -> u64 {
        self.mmap.len() as u64
    }

    /// Task view over the snapshot.
    pub fn task(&self) -> SliceTask<'_> {
        SliceTask::new(self.base, &self.mmap)
    }
}
