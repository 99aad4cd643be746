//! Output file allocation for recordings
//!
//! Round-robins across the configured recording directories, skipping any
//! directory below the free-space floor.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use sysinfo::Disks;
use tracing::{debug, warn};

/// Directories with less free space than this are skipped (~15.3 GiB)
pub const MIN_FREE_SPACE_BYTES: u64 = 16_442_450_944;

/// Error type for file allocation
#[derive(Debug, thiserror::Error)]
pub enum AllocationError {
    /// Every configured directory is below the free-space floor.
    #[error("no recording directory with at least {min_free} bytes free")]
    NoQualifyingDirectory { min_free: u64 },
}

/// Allocates output files across the configured recording directories
pub struct StorageAllocator {
    directories: Vec<PathBuf>,
    /// Round-robin cursor; lives as long as the process
    cursor: AtomicUsize,
    min_free: u64,
}

impl StorageAllocator {
    /// Create an allocator with the default free-space floor
    pub fn new(directories: Vec<PathBuf>) -> Self {
        Self::with_free_space_floor(directories, MIN_FREE_SPACE_BYTES)
    }

    /// Create an allocator with a custom free-space floor
    ///
    /// A floor of 0 disables the disk probe entirely.
    pub fn with_free_space_floor(directories: Vec<PathBuf>, min_free: u64) -> Self {
        Self {
            directories,
            cursor: AtomicUsize::new(0),
            min_free,
        }
    }

    /// Allocate an output path for a recording
    ///
    /// Scans directories round-robin from the cursor and returns a path in
    /// the first one with enough free space.
    pub fn allocate(
        &self,
        title: &str,
        show_id: &str,
        start_ms: i64,
        extension: &str,
    ) -> Result<PathBuf, AllocationError> {
        if self.directories.is_empty() {
            return Err(AllocationError::NoQualifyingDirectory {
                min_free: self.min_free,
            });
        }

        let filename = build_filename(title, show_id, start_ms, extension);
        let start = self.cursor.load(Ordering::Relaxed);

        for offset in 0..self.directories.len() {
            let index = (start + offset) % self.directories.len();
            let dir = &self.directories[index];

            if !self.directory_qualifies(dir) {
                debug!("skipping recording directory {:?}: below free-space floor", dir);
                continue;
            }

            self.cursor.store(index + 1, Ordering::Relaxed);
            return Ok(dir.join(&filename));
        }

        Err(AllocationError::NoQualifyingDirectory {
            min_free: self.min_free,
        })
    }

    fn directory_qualifies(&self, dir: &Path) -> bool {
        if self.min_free == 0 {
            return true;
        }

        match free_space(dir) {
            Some(free) => free >= self.min_free,
            None => {
                warn!("could not determine free space for {:?}", dir);
                false
            }
        }
    }
}

/// Free space on the disk holding `path`, from the longest matching mount point
fn free_space(path: &Path) -> Option<u64> {
    let disks = Disks::new_with_refreshed_list();

    disks
        .iter()
        .filter(|disk| path.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map(|disk| disk.available_space())
}

/// Default recording directory under the user's home
pub fn default_recording_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Failed to get home directory")?;
    Ok(home.join("Videos").join("Recordings"))
}

/// Build an output filename from show metadata
///
/// The title is reduced to alphanumerics and spaces, with spaces turned
/// into underscores.
fn build_filename(title: &str, show_id: &str, start_ms: i64, extension: &str) -> String {
    let timestamp = chrono::DateTime::from_timestamp_millis(start_ms)
        .map(|dt| dt.format("%Y_%m_%d_%H_%M").to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let sanitized_title: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ')
        .map(|c| if c == ' ' { '_' } else { c })
        .collect();

    format!("{}_{}_{}.{}", sanitized_title, show_id, timestamp, extension)
}
