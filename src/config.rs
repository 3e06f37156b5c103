//! Backup configuration, persisted as `config.json` on the target device.
//!
//! Missing keys fall back to defaults so a hand-edited or older config file
//! keeps working. The core treats a loaded config as an immutable snapshot
//! for the duration of a run.

use crate::compare::CompareMethod;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Name of the configuration file at the device root.
pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Absolute paths of the folders to back up.
    pub sources: Vec<PathBuf>,
    /// Subfolder on the device that holds all backups.
    pub target_subfolder: String,
    /// Glob patterns excluding files or whole directories.
    pub excludes: Vec<String>,
    pub compare_method: CompareMethod,
    /// Mirror mode: delete target files whose source disappeared.
    pub delete_removed: bool,
    /// Run a preview scan as soon as the front-end starts.
    pub auto_preview_on_start: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            target_subfolder: "Backups".to_string(),
            excludes: vec![
                "*.tmp".to_string(),
                "*.temp".to_string(),
                "*.log".to_string(),
                "Thumbs.db".to_string(),
                ".DS_Store".to_string(),
                "desktop.ini".to_string(),
                "node_modules".to_string(),
                "__pycache__".to_string(),
                ".git".to_string(),
            ],
            compare_method: CompareMethod::default(),
            delete_removed: false,
            auto_preview_on_start: true,
        }
    }
}

impl Config {
    /// Load config from the device root, falling back to defaults when the
    /// file is missing or unreadable.
    pub fn load(root: &Path) -> Self {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Self::default();
        }
        match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => {
                    debug!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read {}: {}, using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save config to the device root.
    pub fn save(&self, root: &Path) -> Result<()> {
        let path = root.join(CONFIG_FILE);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&path, content)?;
        debug!("Config saved to {}", path.display());
        Ok(())
    }

    /// Validate settings that must hold before any scan starts.
    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(Error::Configuration {
                reason: "no source folders configured".to_string(),
            });
        }
        for source in &self.sources {
            if !source.is_absolute() {
                warn!("Source folder is not an absolute path: {}", source.display());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.sources.is_empty());
        assert_eq!(config.target_subfolder, "Backups");
        assert!(config.excludes.contains(&"node_modules".to_string()));
        assert_eq!(config.compare_method, CompareMethod::TimestampSize);
        assert!(!config.delete_removed);
    }

    #[test]
    fn test_load_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(dir.path());
        assert_eq!(config.target_subfolder, "Backups");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.sources.push(PathBuf::from("/home/user/docs"));
        config.delete_removed = true;
        config.compare_method = CompareMethod::Hash;
        config.save(dir.path()).unwrap();

        let loaded = Config::load(dir.path());
        assert_eq!(loaded.sources, vec![PathBuf::from("/home/user/docs")]);
        assert!(loaded.delete_removed);
        assert_eq!(loaded.compare_method, CompareMethod::Hash);
    }

    #[test]
    fn test_partial_file_filled_with_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{"sources": ["/data"], "delete_removed": true}"#,
        )
        .unwrap();

        let config = Config::load(dir.path());
        assert_eq!(config.sources, vec![PathBuf::from("/data")]);
        assert!(config.delete_removed);
        // Missing keys fall back to defaults
        assert_eq!(config.target_subfolder, "Backups");
        assert!(!config.excludes.is_empty());
    }

    #[test]
    fn test_validate_requires_sources() {
        let config = Config::default();
        assert!(config.validate().is_err());
    }
}
