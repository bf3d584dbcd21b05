//! Filesystem paths used by the daemon: the working directory that holds
//! the control socket, pid file, record store, and archive output.

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use std::sync::Arc;

static PATHS: OnceCell<Arc<Paths>> = OnceCell::new();

/// Manages all filesystem paths for the daemon's own state, as distinct
/// from the download/library roots named in the configuration.
#[derive(Debug, Clone)]
pub struct Paths {
    working_dir: PathBuf,
}

impl Paths {
    /// Initialize the paths singleton.
    pub fn init(working_dir: Option<PathBuf>) -> Result<Arc<Paths>> {
        let paths = PATHS.get_or_try_init(|| {
            let paths = Self::new(working_dir)?;
            Ok::<_, anyhow::Error>(Arc::new(paths))
        })?;
        Ok(Arc::clone(paths))
    }

    /// Get the global paths instance.
    pub fn get() -> Result<Arc<Paths>> {
        PATHS.get().map(Arc::clone).context("Paths not initialized")
    }

    fn new(working_dir: Option<PathBuf>) -> Result<Self> {
        let working_dir = working_dir.unwrap_or_else(|| PathBuf::from("."));
        let paths = Paths { working_dir };
        paths.create_directories()?;
        Ok(paths)
    }

    fn create_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.working_dir)?;
        std::fs::create_dir_all(self.archives_dir())?;
        Ok(())
    }

    /// The daemon's working directory.
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// The record store's SQLite file.
    pub fn db_path(&self) -> PathBuf {
        self.working_dir.join("varroa.db")
    }

    /// The local control socket.
    pub fn control_socket_path(&self) -> PathBuf {
        self.working_dir.join("varroa.sock")
    }

    /// The pid file written while running detached.
    pub fn pid_file_path(&self) -> PathBuf {
        self.working_dir.join("varroa.pid")
    }

    /// The directory that receives dated archive zips.
    pub fn archives_dir(&self) -> PathBuf {
        self.working_dir.join("archives")
    }

    /// The per-release-folder metadata directory name.
    pub fn metadata_dir_name(&self) -> &'static str {
        "MetadataDir"
    }

    /// The metadata directory for a specific release folder.
    pub fn metadata_dir_for(&self, release_folder: &Path) -> PathBuf {
        release_folder.join(self.metadata_dir_name())
    }

    /// The cleanup holding area for empty/metadata-only download folders.
    pub fn clean_dir(&self, download_root: &Path) -> PathBuf {
        download_root.join("VarroaClean")
    }

    /// The detached-process log file.
    pub fn log_file_path(&self) -> PathBuf {
        self.working_dir.join("varroa.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths_creation() {
        let temp_dir = TempDir::new().unwrap();
        let paths = Paths::new(Some(temp_dir.path().to_path_buf())).unwrap();

        assert!(paths.working_dir().exists());
        assert!(paths.archives_dir().exists());
        assert_eq!(
            paths.control_socket_path().file_name().unwrap(),
            "varroa.sock"
        );
    }

    #[test]
    fn metadata_dir_is_nested_under_release_folder() {
        let temp_dir = TempDir::new().unwrap();
        let paths = Paths::new(Some(temp_dir.path().to_path_buf())).unwrap();
        let release = Path::new("/downloads/Some Release");
        assert_eq!(
            paths.metadata_dir_for(release),
            Path::new("/downloads/Some Release/MetadataDir")
        );
    }
}
