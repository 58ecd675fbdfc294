use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::geometry::{CropSurfacePolicy, Dimensions};

/// User-tunable settings persisted as `settings.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub crop_surface: CropSurfacePolicy,
    /// Screen used when the caller does not pass one.
    pub screen_size: Option<Dimensions>,
    pub history_limit: usize,
    /// Right-to-left layout; affects start alignment.
    pub rtl: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            crop_surface: CropSurfacePolicy::default(),
            screen_size: None,
            history_limit: 50,
            rtl: false,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        settings.crop_surface.validate()?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub config_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub settings_file: PathBuf,
    pub history_file: PathBuf,
}

impl Config {
    pub fn new() -> Result<Self> {
        let proj_dirs = ProjectDirs::from("com", "wallpick", "wallpick")
            .ok_or_else(|| Error::Config("failed to get project directories".to_string()))?;

        Self::with_dirs(
            proj_dirs.config_dir().to_path_buf(),
            proj_dirs.cache_dir().to_path_buf(),
        )
    }

    /// Keeps everything under `root`; used by tests and portable setups.
    pub fn at(root: &Path) -> Result<Self> {
        Self::with_dirs(root.join("config"), root.join("cache"))
    }

    fn with_dirs(config_dir: PathBuf, cache_dir: PathBuf) -> Result<Self> {
        let settings_file = config_dir.join("settings.json");
        let history_file = config_dir.join("history.jsonl");

        // Create directories if they don't exist
        fs::create_dir_all(&config_dir)?;
        fs::create_dir_all(&cache_dir)?;

        if !settings_file.exists() {
            Settings::default().save(&settings_file)?;
        }

        log::debug!("config_dir: {:?}, cache_dir: {:?}", config_dir, cache_dir);

        Ok(Config {
            config_dir,
            cache_dir,
            settings_file,
            history_file,
        })
    }

    pub fn load_settings(&self) -> Result<Settings> {
        Settings::load(&self.settings_file)
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        settings.crop_surface.validate()?;
        settings.save(&self.settings_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_config_writes_default_settings() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::at(dir.path()).unwrap();

        assert!(config.cache_dir.is_dir());
        assert!(config.settings_file.is_file());
        assert_eq!(config.load_settings().unwrap(), Settings::default());
    }

    #[test]
    fn settings_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::at(dir.path()).unwrap();

        let settings = Settings {
            crop_surface: CropSurfacePolicy { scale: 1.2, inset: 16 },
            screen_size: Some(Dimensions::new(1080, 2340)),
            history_limit: 5,
            rtl: true,
        };
        config.save_settings(&settings).unwrap();

        let reopened = Config::at(dir.path()).unwrap();
        assert_eq!(reopened.load_settings().unwrap(), settings);
    }

    #[test]
    fn partial_settings_fill_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::at(dir.path()).unwrap();
        fs::write(&config.settings_file, r#"{"rtl": true}"#).unwrap();

        let settings = config.load_settings().unwrap();
        assert!(settings.rtl);
        assert_eq!(settings.history_limit, 50);
        assert_eq!(settings.crop_surface, CropSurfacePolicy::default());
    }

    #[test]
    fn invalid_policy_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::at(dir.path()).unwrap();
        fs::write(&config.settings_file, r#"{"crop_surface": {"scale": 0.5, "inset": 0}}"#).unwrap();

        assert!(matches!(
            config.load_settings(),
            Err(Error::InvalidSurfacePolicy { .. })
        ));
    }
}
