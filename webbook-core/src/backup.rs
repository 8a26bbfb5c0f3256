//! Timestamped backup directory holding the previous version of every file
//! a run rewrites.

use chrono::{DateTime, Local, SecondsFormat};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("backup location {0:?} exists and is not a directory")]
    NotADirectory(PathBuf),

    #[error("backup of {path:?} failed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> BackupError + '_ {
    move |source| BackupError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone)]
pub struct BackupDir {
    path: PathBuf,
}

impl BackupDir {
    /// Directory name for a run started at `now`, usable on every platform
    pub fn timestamp(now: &DateTime<Local>) -> String {
        now.to_rfc3339_opts(SecondsFormat::Secs, true)
            .replace(':', "-")
    }

    /// Create `<root>/<timestamp>`, adding a numeric suffix if a run in the
    /// same second already used that name.
    pub fn create(root: &Path, now: &DateTime<Local>) -> Result<Self, BackupError> {
        if root.exists() && !root.is_dir() {
            return Err(BackupError::NotADirectory(root.to_path_buf()));
        }
        fs::create_dir_all(root).map_err(io_error(root))?;

        let stamp = Self::timestamp(now);
        let mut path = root.join(&stamp);
        let mut suffix = 1;
        while path.exists() {
            path = root.join(format!("{stamp}-{suffix}"));
            suffix += 1;
        }
        fs::create_dir(&path).map_err(io_error(&path))?;
        info!("Backup directory: {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Move `file` into the backup directory, returning its new location,
    /// or `None` when there is no such file.
    pub fn relocate(&self, file: &Path) -> Result<Option<PathBuf>, BackupError> {
        if !file.exists() {
            return Ok(None);
        }
        let name = file
            .file_name()
            .ok_or_else(|| BackupError::NotADirectory(file.to_path_buf()))?;
        let target = self.path.join(name);

        if fs::rename(file, &target).is_err() {
            // Different file system: copy, then remove the original
            fs::copy(file, &target).map_err(io_error(file))?;
            fs::remove_file(file).map_err(io_error(file))?;
        }
        debug!("moved {} to {}", file.display(), target.display());
        Ok(Some(target))
    }
}
