use std::{
    fs,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    AdventureError, AdventureRepository, JsonFileRepository, MapRegion, MemoryRepository, Result,
};

/// Where committed adventures are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persistence {
    /// Lost when the process exits
    Memory,
    /// `adventures.json` under the data directory
    JsonFile,
}

/// Application configuration settings.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    /// Directory where adventures are stored
    pub data_dir: PathBuf,

    /// Storage backend for the adventure store
    pub persistence: Persistence,

    /// Characters per card line
    pub card_width: usize,

    /// Whether the form refuses to submit without a name
    pub require_name: bool,

    /// Initial map focus when the draft has no location
    pub default_region: MapRegion,

    /// Default maximum number of search results
    pub search_limit: usize,
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "adventures")
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = project_dirs()
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".adventures"));

        Self {
            data_dir,
            persistence: Persistence::JsonFile,
            card_width: 40,
            require_name: false,
            default_region: MapRegion::default(),
            search_limit: 10,
        }
    }
}

impl Config {
    /// Default location of the configuration file
    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Loads the configuration from `path` (or the default location).
    ///
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => {
                    debug!("No configuration directory on this platform, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        if !path.exists() {
            debug!("No configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|e| AdventureError::ConfigError {
            message: format!("Failed to read {}: {}", path.display(), e),
        })?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| AdventureError::ConfigError {
                message: format!("Failed to parse {}: {}", path.display(), e),
            })?;

        config.validate()?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Writes the configuration as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.card_width == 0 {
            return Err(AdventureError::ConfigError {
                message: "card_width must be at least 1".to_string(),
            });
        }
        if self.default_region.center().is_none() {
            return Err(AdventureError::ConfigError {
                message: "default_region is not a valid coordinate".to_string(),
            });
        }
        Ok(())
    }

    /// Builds the repository selected by `persistence`
    pub fn repository(&self) -> Box<dyn AdventureRepository> {
        match self.persistence {
            Persistence::Memory => Box::new(MemoryRepository),
            Persistence::JsonFile => Box::new(JsonFileRepository::in_dir(&self.data_dir)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(Some(&dir.path().join("config.json"))).unwrap();

        assert_eq!(config.card_width, 40);
        assert_eq!(config.persistence, Persistence::JsonFile);
        assert_eq!(config.default_region, MapRegion::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "persistence": "memory", "require_name": true }"#).unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.persistence, Persistence::Memory);
        assert!(config.require_name);
        assert_eq!(config.search_limit, 10);
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            card_width: 60,
            data_dir: dir.path().join("data"),
            ..Config::default()
        };

        config.save(&path).unwrap();
        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.card_width, 60);
        assert_eq!(loaded.data_dir, dir.path().join("data"));
    }

    #[test]
    fn invalid_values_are_config_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        fs::write(&path, r#"{ "card_width": 0 }"#).unwrap();
        assert!(matches!(
            Config::load(Some(&path)),
            Err(AdventureError::ConfigError { .. })
        ));

        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            Config::load(Some(&path)),
            Err(AdventureError::ConfigError { .. })
        ));
    }
}
