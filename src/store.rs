//! File store under a single save root.
//!
//! Every operation is synchronous and none of them propagate I/O errors: a
//! failure is logged and surfaces as `false` / `None`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, warn};
use walkdir::WalkDir;

/// Metadata for one file found by [`FileStore::list`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredFile {
    /// Path relative to the store root, `/`-separated.
    pub relative: String,
    pub modified: SystemTime,
    pub size_bytes: u64,
}

#[derive(Clone, Debug)]
pub struct FileStore {
    root: PathBuf,
    keep_backups: bool,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            keep_backups: true,
        }
    }

    pub fn with_backups(mut self, keep_backups: bool) -> Self {
        self.keep_backups = keep_backups;
        self
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.resolve(relative).is_file()
    }

    /// Writes `contents`, creating parent directories first. The write goes
    /// through a temp file and a rename; the previous contents are kept as
    /// `<file>.bak` when backups are enabled.
    pub fn save_to_file(&self, relative: &str, contents: &str) -> bool {
        let path = self.resolve(relative);
        match self.atomic_write(&path, contents) {
            Ok(()) => {
                debug!(path = %path.display(), bytes = contents.len(), "file written");
                true
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "file write failed");
                false
            }
        }
    }

    pub fn load_from_file(&self, relative: &str) -> Option<String> {
        read_text(&self.resolve(relative))
    }

    /// Contents of the backup written by the previous save, if any.
    pub fn load_backup(&self, relative: &str) -> Option<String> {
        let backup = backup_path(&self.resolve(relative));
        if !backup.is_file() {
            return None;
        }
        read_text(&backup)
    }

    /// Removes a file and its backup. `false` when there was nothing to remove
    /// or the removal failed.
    pub fn delete(&self, relative: &str) -> bool {
        let path = self.resolve(relative);
        if !path.is_file() {
            return false;
        }
        if let Err(err) = fs::remove_file(&path) {
            warn!(path = %path.display(), error = %err, "file delete failed");
            return false;
        }
        let backup = backup_path(&path);
        if backup.is_file() {
            if let Err(err) = fs::remove_file(&backup) {
                warn!(path = %backup.display(), error = %err, "backup delete failed");
            }
        }
        true
    }

    /// Files directly inside `dir` (relative to the root, `""` for the root
    /// itself) whose names end with `suffix` and start with `prefix`.
    pub fn list(&self, dir: &str, prefix: &str, suffix: &str) -> Vec<StoredFile> {
        let base = self.resolve(dir);
        if !base.is_dir() {
            return Vec::new();
        }
        let mut files = Vec::new();
        for entry in WalkDir::new(&base).min_depth(1).max_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(dir = %base.display(), error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if !name.starts_with(prefix) || !name.ends_with(suffix) {
                continue;
            }
            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(err) => {
                    warn!(file = %name, error = %err, "skipping file without metadata");
                    continue;
                }
            };
            let relative = if dir.is_empty() {
                name.to_string()
            } else {
                format!("{}/{}", dir.trim_end_matches('/'), name)
            };
            files.push(StoredFile {
                relative,
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                size_bytes: metadata.len(),
            });
        }
        files
    }

    /// Modification time and size of a stored file.
    pub fn stat(&self, relative: &str) -> Option<(SystemTime, u64)> {
        let metadata = fs::metadata(self.resolve(relative)).ok()?;
        Some((
            metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            metadata.len(),
        ))
    }

    fn atomic_write(&self, path: &Path, contents: &str) -> io::Result<()> {
        let parent = path.parent().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "target path has no parent")
        })?;
        fs::create_dir_all(parent)?;
        if self.keep_backups && path.exists() {
            fs::copy(path, backup_path(path))?;
        }
        let tmp_path = tmp_path(path);
        fs::write(&tmp_path, contents)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

fn read_text(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "file read failed");
            None
        }
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut output = path.as_os_str().to_os_string();
    output.push(".bak");
    PathBuf::from(output)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut output = path.as_os_str().to_os_string();
    output.push(".tmp");
    PathBuf::from(output)
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
