use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::error::ConfigError;

/// Player configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlayerConfig {
    /// Mailbox size of the command queue; commands beyond it are dropped
    pub queue_capacity: usize,
    pub progress_interval_ms: u64,
    pub long_press_threshold_ms: u64,
    pub debounce_window_ms: u64,
    /// Queue tasks slower than this are reported in the log
    pub slow_task_threshold_ms: u64,
    pub resume_file: PathBuf,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 10,
            progress_interval_ms: 1000,
            long_press_threshold_ms: 800,
            debounce_window_ms: 500,
            slow_task_threshold_ms: 250,
            resume_file: default_config_dir().join("resume.toml"),
        }
    }
}

impl PlayerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "queue_capacity".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.progress_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "progress_interval_ms".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("bgplayer")
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    config: PlayerConfig,
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path()?;
        Self::with_path(config_path)
    }

    /// Load from an explicit file; a missing file yields the defaults
    pub fn with_path(config_path: PathBuf) -> Result<Self, ConfigError> {
        let config = Self::load_config(&config_path)?;
        config.validate()?;

        Ok(Self {
            config,
            config_path,
        })
    }

    pub fn get_config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn update_config<F>(&mut self, updater: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut PlayerConfig),
    {
        let mut updated = self.config.clone();
        updater(&mut updated);
        updated.validate()?;
        self.config = updated;
        self.save_config()
    }

    pub fn reset_to_defaults(&mut self) -> Result<(), ConfigError> {
        self.config = PlayerConfig::default();
        self.save_config()
    }

    fn get_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::home_dir()
            .ok_or(ConfigError::ConfigDirNotFound)?
            .join(".config")
            .join("bgplayer");

        std::fs::create_dir_all(&config_dir)?;

        Ok(config_dir.join("config.toml"))
    }

    fn load_config(path: &Path) -> Result<PlayerConfig, ConfigError> {
        if !path.exists() {
            return Ok(PlayerConfig::default());
        }

        let config_content = std::fs::read_to_string(path)?;
        let config: PlayerConfig = toml::from_str(&config_content)?;

        Ok(config)
    }

    fn save_config(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let config_content = toml::to_string_pretty(&self.config)?;
        std::fs::write(&self.config_path, config_content)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let config_manager = ConfigManager {
            config: PlayerConfig::default(),
            config_path,
        };

        (config_manager, temp_dir)
    }

    #[test]
    fn test_player_config_default() {
        let config = PlayerConfig::default();

        assert_eq!(config.queue_capacity, 10);
        assert_eq!(config.progress_interval_ms, 1000);
        assert_eq!(config.long_press_threshold_ms, 800);
        assert_eq!(config.debounce_window_ms, 500);
        assert!(config.resume_file.to_string_lossy().contains("bgplayer"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load_config() {
        let (mut config_manager, _temp_dir) = create_test_config_manager();

        config_manager.config.queue_capacity = 4;
        config_manager.config.long_press_threshold_ms = 1200;
        config_manager.save_config().unwrap();

        let loaded_config = ConfigManager::load_config(&config_manager.config_path).unwrap();
        assert_eq!(loaded_config.queue_capacity, 4);
        assert_eq!(loaded_config.long_press_threshold_ms, 1200);
    }

    #[test]
    fn test_load_nonexistent_config() {
        let temp_dir = TempDir::new().unwrap();
        let nonexistent_path = temp_dir.path().join("nonexistent.toml");

        let config = ConfigManager::load_config(&nonexistent_path).unwrap();
        assert_eq!(config, PlayerConfig::default());
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing_keys() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "debounce_window_ms = 300\n").unwrap();

        let manager = ConfigManager::with_path(config_path).unwrap();
        assert_eq!(manager.get_config().debounce_window_ms, 300);
        assert_eq!(manager.get_config().long_press_threshold_ms, 800);
    }

    #[test]
    fn test_load_invalid_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("invalid.toml");
        fs::write(&config_path, "invalid toml content [[[").unwrap();

        match ConfigManager::load_config(&config_path).unwrap_err() {
            ConfigError::DeserializationError(_) => {}
            _ => panic!("Expected DeserializationError"),
        }
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "queue_capacity = 0\n").unwrap();

        match ConfigManager::with_path(config_path) {
            Err(ConfigError::InvalidValue { field, .. }) => assert_eq!(field, "queue_capacity"),
            _ => panic!("Expected InvalidValue"),
        }
    }

    #[test]
    fn test_update_config() {
        let (mut config_manager, _temp_dir) = create_test_config_manager();

        config_manager
            .update_config(|config| {
                config.progress_interval_ms = 250;
            })
            .unwrap();
        assert_eq!(config_manager.config.progress_interval_ms, 250);

        let loaded_config = ConfigManager::load_config(&config_manager.config_path).unwrap();
        assert_eq!(loaded_config.progress_interval_ms, 250);

        // Invalid updates leave the current settings untouched
        let result = config_manager.update_config(|config| config.progress_interval_ms = 0);
        assert!(result.is_err());
        assert_eq!(config_manager.config.progress_interval_ms, 250);
    }

    #[test]
    fn test_reset_to_defaults() {
        let (mut config_manager, _temp_dir) = create_test_config_manager();

        config_manager.config.queue_capacity = 2;
        config_manager.reset_to_defaults().unwrap();

        assert_eq!(config_manager.config, PlayerConfig::default());
    }

    #[test]
    fn test_config_path_creation() {
        let temp_dir = TempDir::new().unwrap();
        let nested_path = temp_dir.path().join("nested").join("config").join("config.toml");

        let config_manager = ConfigManager {
            config: PlayerConfig::default(),
            config_path: nested_path.clone(),
        };
        config_manager.save_config().unwrap();

        assert!(nested_path.exists());
    }

    #[test]
    fn test_toml_format() {
        let toml_string = toml::to_string_pretty(&PlayerConfig::default()).unwrap();

        assert!(toml_string.contains("queue_capacity = 10"));
        assert!(toml_string.contains("long_press_threshold_ms = 800"));
        assert!(toml_string.contains("debounce_window_ms = 500"));
        assert!(toml_string.contains("resume_file"));
    }
}
