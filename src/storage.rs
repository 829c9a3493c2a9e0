//! Recording file naming and the current-recording pointer

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// strftime pattern for recording filenames
const FILE_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const FILE_EXTENSION: &str = "wav";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create recording directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write recording pointer {path:?}: {source}")]
    WritePointer {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Path for a recording started now, `<dir>/<YYYYMMDD_HHMMSS>.wav` in local time
pub fn next_recording_path(output_dir: &Path) -> PathBuf {
    let stamp = chrono::Local::now().format(FILE_STAMP_FORMAT);
    output_dir.join(format!("{}.{}", stamp, FILE_EXTENSION))
}

/// Make sure the recording directory exists
pub fn ensure_output_dir(output_dir: &Path) -> Result<(), StorageError> {
    std::fs::create_dir_all(output_dir).map_err(|source| StorageError::CreateDir {
        path: output_dir.to_path_buf(),
        source,
    })
}

/// Single-line file naming the most recent recording, kept across restarts
#[derive(Debug, Clone)]
pub struct RecordingPointer {
    path: PathBuf,
}

impl RecordingPointer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Most recent recording, if the pointer file exists and is not empty
    pub fn load(&self) -> Option<PathBuf> {
        let contents = std::fs::read_to_string(&self.path).ok()?;
        let line = contents.lines().next()?.trim();
        if line.is_empty() {
            None
        } else {
            Some(PathBuf::from(line))
        }
    }

    /// Overwrite the pointer with a new recording path
    pub fn store(&self, recording: &Path) -> Result<(), StorageError> {
        std::fs::write(&self.path, recording.to_string_lossy().as_bytes()).map_err(|source| {
            StorageError::WritePointer {
                path: self.path.clone(),
                source,
            }
        })?;
        debug!("Current recording set to {:?}", recording);
        Ok(())
    }
}
