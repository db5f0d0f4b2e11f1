use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use fitledger_core::config::TrackerConfig;

const DEFAULT_USER: &str = "default";

/// Optional `config.json` in the data directory. Tracker tunables sit at the
/// top level next to `default_user`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    default_user: Option<String>,
    #[serde(flatten)]
    tracker: TrackerConfig,
}

pub struct Config {
    pub db_path: PathBuf,
    pub default_user: String,
    pub tracker: TrackerConfig,
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "fitledger").context("Could not determine home directory")?;
        Self::load_from(proj_dirs.data_dir())
    }

    pub fn load_from(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let config_path = data_dir.join("config.json");
        let file = if config_path.exists() {
            let raw = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            serde_json::from_str::<ConfigFile>(&raw)
                .with_context(|| format!("Invalid config file: {}", config_path.display()))?
        } else {
            ConfigFile::default()
        };
        file.tracker
            .validate()
            .with_context(|| format!("Invalid config file: {}", config_path.display()))?;

        Ok(Config {
            db_path: data_dir.join("fitledger.db"),
            default_user: file
                .default_user
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_USER.to_string()),
            tracker: file.tracker,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(dir.path()).unwrap();
        assert_eq!(config.default_user, "default");
        assert_eq!(config.db_path, dir.path().join("fitledger.db"));
        assert_eq!(config.tracker, TrackerConfig::default());
    }

    #[test]
    fn test_creates_missing_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        Config::load_from(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn test_partial_config_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.json"),
            r#"{ "default_user": "sam", "water_unit_ml": 250, "energy": { "deficit_kcal": 300 } }"#,
        )
        .unwrap();
        let config = Config::load_from(dir.path()).unwrap();
        assert_eq!(config.default_user, "sam");
        assert!((config.tracker.water_unit_ml - 250.0).abs() < f64::EPSILON);
        assert!((config.tracker.water_ml_per_kg - 35.0).abs() < f64::EPSILON);
        assert!((config.tracker.energy.deficit_kcal - 300.0).abs() < f64::EPSILON);
        assert!((config.tracker.energy.fat_share - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_invalid_config_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), r#"{ "water_unit_ml": 0 }"#).unwrap();
        let err = Config::load_from(dir.path()).err().unwrap();
        assert!(format!("{err:#}").contains("water_unit_ml"));
    }

    #[test]
    fn test_malformed_config_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), "{ nope").unwrap();
        assert!(Config::load_from(dir.path()).is_err());
    }
}
