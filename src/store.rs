//! The memory-mapped capture file.
//!
//! The output file is created exclusively, pre-sized to the full capture
//! limit and mapped writable, so the acquisition loop can hand the driver a
//! destination pointer straight into the page cache. Capacity is checked
//! once at creation; the only remaining failure mode during capture is the
//! final flush. On finalize the file is truncated to the bytes actually
//! written, so the artifact is always a whole number of valid samples.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use memmap2::MmapMut;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("output file {0} already exists")]
    AlreadyExists(PathBuf),
    #[error("failed to create {path}: {source}")]
    Create { path: PathBuf, source: io::Error },
    #[error("failed to reserve {bytes} bytes: {source}")]
    Allocate { bytes: u64, source: io::Error },
    #[error("failed to map output file: {0}")]
    Map(io::Error),
    #[error("failed to flush captured data: {0}")]
    Flush(io::Error),
    #[error("failed to truncate output file: {0}")]
    Truncate(io::Error),
}

#[derive(Debug)]
pub struct CaptureFile {
    file: File,
    map: MmapMut,
    written: usize,
    finalized: bool,
}

impl CaptureFile {
    /// Create `path` exclusively, reserve `max_size` bytes and map it writable.
    pub fn create(path: &Path, max_size: u64) -> Result<Self, StoreError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => StoreError::AlreadyExists(path.to_owned()),
                _ => StoreError::Create {
                    path: path.to_owned(),
                    source: e,
                },
            })?;
        file.set_len(max_size).map_err(|e| StoreError::Allocate {
            bytes: max_size,
            source: e,
        })?;
        // Safety: we hold the only handle to a file we just created
        let map = unsafe { MmapMut::map_mut(&file).map_err(StoreError::Map)? };
        Ok(Self {
            file,
            map,
            written: 0,
            finalized: false,
        })
    }

    pub fn capacity(&self) -> usize {
        self.map.len()
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn remaining(&self) -> usize {
        self.map.len() - self.written
    }

    /// The next `len` free bytes, for the source to write into
    pub fn tail_mut(&mut self, len: usize) -> &mut [u8] {
        &mut self.map[self.written..self.written + len]
    }

    /// Commit `len` bytes written into the region returned by `tail_mut`
    pub fn advance(&mut self, len: usize) {
        debug_assert!(len <= self.remaining());
        self.written += len;
    }

    /// Flush the written prefix and shrink the file to exactly that length.
    ///
    /// Idempotent: the second and later calls are no-ops.
    pub fn finalize(&mut self) -> Result<(), StoreError> {
        if self.finalized {
            return Ok(());
        }
        self.finalized = true;
        if self.written > 0 {
            self.map
                .flush_range(0, self.written)
                .map_err(StoreError::Flush)?;
        }
        self.file
            .set_len(self.written as u64)
            .map_err(StoreError::Truncate)?;
        Ok(())
    }
}

impl Drop for CaptureFile {
    fn drop(&mut self) {
        // Last-resort truncation for unwinds that skipped finalize
        if let Err(e) = self.finalize() {
            warn!("finalizing capture file on drop failed: {e}");
        }
    }
}
