use anyhow::Result;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub analysis: AnalysisConfig,
    pub store: StoreConfig,
}

/// Tunable thresholds for the learning store and the impact analyzer. The
/// defaults here are the documented contract; the TOML file only overrides.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Occurrences required before an error counts as recurring.
    pub significance_threshold: usize,
    /// Recorded patterns older than this many days are pruned.
    pub retention_days: i64,
    /// Minimum confidence before a fix method is recommended.
    pub confidence_threshold: f64,
    /// Attempts required before fix statistics are fully trusted.
    pub pattern_maturity: usize,
    /// Cap on related files reported per error.
    pub max_related_files: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            significance_threshold: 3,
            retention_days: 30,
            confidence_threshold: 0.7,
            pattern_maturity: 5,
            max_related_files: 5,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StoreConfig {
    /// Path of the persisted pattern store. Defaults next to the config file.
    pub path: Option<PathBuf>,
}

impl Config {
    pub fn create_default(path: &Path) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn ensure_config_exists() -> Result<Self> {
        let config_path = get_config_path()?;

        if !config_path.exists() {
            Self::create_default(&config_path)?;
        }

        Self::load(&config_path)
    }

    pub fn store_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.store.path {
            return Ok(path.clone());
        }
        let proj_dirs = ProjectDirs::from("com", "triage", "triage")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Ok(proj_dirs.data_dir().join("patterns.json"))
    }
}

pub fn get_config_path() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("com", "triage", "triage")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    Ok(proj_dirs.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_thresholds_match_documentation() {
        let config = AnalysisConfig::default();
        assert_eq!(config.significance_threshold, 3);
        assert_eq!(config.retention_days, 30);
        assert_eq!(config.confidence_threshold, 0.7);
        assert_eq!(config.pattern_maturity, 5);
        assert_eq!(config.max_related_files, 5);
    }

    #[test]
    fn config_round_trips_through_toml() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.toml");
        Config::create_default(&path)?;

        let loaded = Config::load(&path)?;
        assert_eq!(loaded.analysis.retention_days, 30);
        Ok(())
    }
}
