//! Artifact persistence
//!
//! Writes compiled listings to disk and removes stale ones. Writes go to a
//! temporary file first and are renamed into place.

use crate::contract::program::CompiledProgram;
use crate::samples::DEFAULT_VERSION;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Write `content` to `path`, creating parent directories as needed
pub fn write_text(path: &Path, content: &str) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file_name = path
        .file_name()
        .ok_or_else(|| StorageError::InvalidData(format!("Not a file path: {:?}", path)))?;
    let mut temp_name = file_name.to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    fs::write(&temp_path, content)?;

    // Atomic rename
    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }
    Ok(())
}

/// Remove `path`. Returns whether a file was removed; a missing file is not
/// an error.
pub fn remove_if_exists(path: &Path) -> Result<bool, StorageError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Where and how artifacts are built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    pub out_dir: PathBuf,
    pub approval_file: String,
    pub clear_file: String,
    pub version: u8,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("."),
            approval_file: "approval.teal".to_string(),
            clear_file: "clear.teal".to_string(),
            version: DEFAULT_VERSION,
        }
    }
}

impl ArtifactConfig {
    /// Load a configuration from a JSON file; missing fields take defaults
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn approval_path(&self) -> PathBuf {
        self.out_dir.join(&self.approval_file)
    }

    pub fn clear_path(&self) -> PathBuf {
        self.out_dir.join(&self.clear_file)
    }
}

/// Reads and writes the artifact pair described by an [`ArtifactConfig`]
pub struct ArtifactStore {
    config: ArtifactConfig,
}

impl ArtifactStore {
    pub fn new(config: ArtifactConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ArtifactConfig {
        &self.config
    }

    /// Remove previously built artifacts; returns how many were removed
    pub fn clean(&self) -> Result<usize, StorageError> {
        let mut removed = 0;
        for path in [self.config.approval_path(), self.config.clear_path()] {
            if remove_if_exists(&path)? {
                log::debug!("Removed stale artifact {:?}", path);
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Write both listings; returns their paths
    pub fn write(&self, compiled: &CompiledProgram) -> Result<(PathBuf, PathBuf), StorageError> {
        let approval = self.config.approval_path();
        let clear = self.config.clear_path();

        write_text(&approval, &compiled.approval)?;
        write_text(&clear, &compiled.clear_state)?;
        log::info!("Wrote {:?} and {:?}", approval, clear);

        Ok((approval, clear))
    }

    /// Read both listings back
    pub fn read(&self) -> Result<CompiledProgram, StorageError> {
        let approval = fs::read_to_string(self.config.approval_path())?;
        let clear_state = fs::read_to_string(self.config.clear_path())?;
        let version = pragma_version(&approval)
            .ok_or_else(|| StorageError::InvalidData("Missing version pragma".to_string()))?;

        Ok(CompiledProgram {
            version,
            approval,
            clear_state,
        })
    }

    pub fn exists(&self) -> bool {
        self.config.approval_path().exists() && self.config.clear_path().exists()
    }
}

fn pragma_version(listing: &str) -> Option<u8> {
    listing
        .lines()
        .next()?
        .strip_prefix("#pragma version")?
        .trim()
        .parse()
        .ok()
}
