//! Pluggable persistence behind the adventure store.
//!
//! The store owns ordering and id uniqueness; a repository only has to load
//! what it holds and durably append new records.
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};

use log::{debug, error, info, trace};
use tempfile::NamedTempFile;

use crate::{Adventure, AdventureError, Result};

/// Storage backend consulted by [`crate::AdventureStore`].
pub trait AdventureRepository: Send + Sync {
    /// Loads every stored adventure in insertion order
    fn load_all(&self) -> Result<Vec<Adventure>>;

    /// Durably appends one adventure
    fn append(&self, adventure: &Adventure) -> Result<()>;
}

/// Session-only storage: nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryRepository;

impl AdventureRepository for MemoryRepository {
    fn load_all(&self) -> Result<Vec<Adventure>> {
        Ok(Vec::new())
    }

    fn append(&self, adventure: &Adventure) -> Result<()> {
        trace!("Memory repository ignoring append of {}", adventure.id);
        Ok(())
    }
}

/// Stores all adventures as a single JSON array, rewritten atomically.
pub struct JsonFileRepository {
    path: PathBuf,
    /// Serializes read-modify-write cycles on the file
    write_lock: Mutex<()>,
}

impl JsonFileRepository {
    /// File name used inside a data directory
    pub const FILE_NAME: &'static str = "adventures.json";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Repository at `<data_dir>/adventures.json`
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(Self::FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(&self) -> Result<Vec<Adventure>> {
        if !self.path.exists() {
            debug!("No adventures file at {}", self.path.display());
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            error!("Failed to open adventures file {}: {}", self.path.display(), e);
            AdventureError::Io(e)
        })?;

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let adventures: Vec<Adventure> = serde_json::from_str(&content)?;
        Ok(adventures)
    }

    fn write_file(&self, adventures: &[Adventure]) -> Result<()> {
        // Ensure the parent directory exists
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        if !dir.as_os_str().is_empty() && !dir.exists() {
            debug!("Creating data directory: {}", dir.display());
            fs::create_dir_all(dir)?;
        }

        // Create a temporary file in the same directory (for atomic operation)
        let mut temp_file = NamedTempFile::new_in(dir).map_err(|e| {
            error!("Failed to create temporary file: {}", e);
            AdventureError::Io(e)
        })?;

        let json = serde_json::to_string_pretty(adventures).map_err(|e| {
            error!("Failed to serialize adventures: {}", e);
            AdventureError::Serialization(e)
        })?;

        temp_file.write_all(json.as_bytes())?;
        temp_file.flush()?;

        temp_file.persist(&self.path).map_err(|e| {
            error!("Failed to persist file {}: {}", self.path.display(), e.error);
            AdventureError::Io(e.error)
        })?;

        Ok(())
    }
}

impl AdventureRepository for JsonFileRepository {
    fn load_all(&self) -> Result<Vec<Adventure>> {
        let adventures = self.read_file()?;
        info!(
            "Loaded {} adventures from {}",
            adventures.len(),
            self.path.display()
        );
        Ok(adventures)
    }

    fn append(&self, adventure: &Adventure) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| AdventureError::LockAcquisitionFailed {
                message: "Failed to acquire lock on adventures file".to_string(),
            })?;

        let mut adventures = self.read_file()?;
        adventures.push(adventure.clone());
        self.write_file(&adventures)?;

        debug!("Appended adventure {} to {}", adventure.id, self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    #[test]
    fn missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let repo = JsonFileRepository::in_dir(dir.path());

        assert!(repo.load_all().unwrap().is_empty());
    }

    #[test]
    fn appends_preserve_order() {
        let dir = TempDir::new().unwrap();
        let repo = JsonFileRepository::in_dir(&dir.path().join("nested"));

        repo.append(&Adventure::new("1", "Canoagem")).unwrap();
        repo.append(&Adventure::new("2", "Escalada")).unwrap();

        let reopened = JsonFileRepository::in_dir(&dir.path().join("nested"));
        let names: Vec<_> = reopened
            .load_all()
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, ["Canoagem", "Escalada"]);
    }

    #[test]
    fn corrupt_file_is_a_serialization_error() {
        let dir = TempDir::new().unwrap();
        let repo = JsonFileRepository::in_dir(dir.path());
        fs::write(repo.path(), "{ not json").unwrap();

        let err = repo.load_all().unwrap_err();
        assert!(matches!(err, AdventureError::Serialization(_)));
    }

    #[test]
    fn memory_repository_keeps_nothing() {
        let repo = MemoryRepository;
        repo.append(&Adventure::new("1", "Surf")).unwrap();
        assert!(repo.load_all().unwrap().is_empty());
    }
}
