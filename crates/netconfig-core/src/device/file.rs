//! A device backed by a directory on disk.
//!
//! ```text
//! <dir>/running.conf     running configuration
//! <dir>/candidate.conf   candidate buffer (absent when empty)
//! ```
//!
//! A missing directory is reported as an unreachable device.

use std::path::{Path, PathBuf};

use crate::diff::{line_diff, merge_lines};
use crate::error::{NetconfigError, Result};
use crate::io::{atomic_write, ensure_dir, remove_if_exists};

use super::Device;

pub const RUNNING_FILE: &str = "running.conf";
pub const CANDIDATE_FILE: &str = "candidate.conf";

#[derive(Debug, Clone)]
pub struct FileDevice {
    name: String,
    dir: PathBuf,
}

impl FileDevice {
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
        }
    }

    /// Create the device directory with an initial running configuration.
    pub fn create(name: impl Into<String>, dir: impl Into<PathBuf>, running: &str) -> Result<Self> {
        let device = Self::new(name, dir);
        ensure_dir(&device.dir)?;
        atomic_write(&device.running_path(), running.as_bytes())?;
        Ok(device)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn running_path(&self) -> PathBuf {
        self.dir.join(RUNNING_FILE)
    }

    fn candidate_path(&self) -> PathBuf {
        self.dir.join(CANDIDATE_FILE)
    }

    fn ensure_reachable(&self) -> Result<()> {
        if !self.dir.is_dir() {
            return Err(NetconfigError::device(
                &self.name,
                format!("device unreachable: {} does not exist", self.dir.display()),
            ));
        }
        Ok(())
    }

    fn read_running(&self) -> Result<String> {
        let path = self.running_path();
        if !path.exists() {
            return Ok(String::new());
        }
        std::fs::read_to_string(&path)
            .map_err(|e| NetconfigError::device(&self.name, format!("read running config: {e}")))
    }

    fn read_candidate(&self) -> Result<Option<String>> {
        let path = self.candidate_path();
        if !path.exists() {
            return Ok(None);
        }
        std::fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| NetconfigError::device(&self.name, format!("read candidate: {e}")))
    }

    fn write(&self, path: &Path, data: &str) -> Result<()> {
        atomic_write(path, data.as_bytes())
            .map_err(|e| NetconfigError::device(&self.name, format!("write {}: {e}", path.display())))
    }
}

impl Device for FileDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn running_config(&self) -> Result<String> {
        self.ensure_reachable()?;
        self.read_running()
    }

    fn load_candidate(&self, config: &str, replace: bool) -> Result<()> {
        self.ensure_reachable()?;
        let candidate = if replace {
            config.to_string()
        } else {
            merge_lines(&self.read_running()?, config)
        };
        self.write(&self.candidate_path(), &candidate)
    }

    fn compare(&self) -> Result<String> {
        self.ensure_reachable()?;
        Ok(match self.read_candidate()? {
            Some(candidate) => line_diff(&self.read_running()?, &candidate),
            None => String::new(),
        })
    }

    fn discard(&self) -> Result<()> {
        self.ensure_reachable()?;
        remove_if_exists(&self.candidate_path())
            .map(|_| ())
            .map_err(|e| NetconfigError::device(&self.name, format!("discard candidate: {e}")))
    }

    fn commit(&self) -> Result<()> {
        self.ensure_reachable()?;
        let candidate = self
            .read_candidate()?
            .ok_or_else(|| NetconfigError::device(&self.name, "no candidate configuration loaded"))?;
        self.write(&self.running_path(), &candidate)?;
        self.discard()
    }
}
