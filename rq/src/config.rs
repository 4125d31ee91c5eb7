//! Configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::scheduler::SchedulerConfig;

/// Project-local config file name
pub const LOCAL_CONFIG_FILE: &str = ".reqqueue.yml";

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scheduler settings
    pub scheduler: SchedulerConfig,

    /// Logging settings
    pub log: LogConfig,
}

impl Config {
    /// Load configuration with fallback chain
    ///
    /// An explicit path must load. Otherwise the first implicit location that
    /// exists and parses wins: `.reqqueue.yml` in the working directory, then
    /// `<config_dir>/reqqueue/reqqueue.yml`, then defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        Ok(Self::load_first(&Self::search_paths(Path::new("."))))
    }

    /// Implicit config locations, most specific first
    fn search_paths(project_dir: &Path) -> Vec<PathBuf> {
        let mut paths = vec![project_dir.join(LOCAL_CONFIG_FILE)];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("reqqueue").join("reqqueue.yml"));
        }
        paths
    }

    /// First candidate that exists and parses, defaults if none does
    fn load_first(candidates: &[PathBuf]) -> Self {
        for path in candidates.iter().filter(|path| path.exists()) {
            match Self::load_from_file(path) {
                Ok(config) => return config,
                Err(e) => tracing::warn!("Skipping config {}: {:#}", path.display(), e),
            }
        }

        tracing::info!("No usable config file found, using defaults");
        Self::default()
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse config")
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config = Self::from_yaml(&content)?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive when RUST_LOG is unset
    pub level: String,

    /// Colorize output
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            ansi: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.scheduler, SchedulerConfig::default());
        assert_eq!(config.log.level, "info");
        assert!(config.log.ansi);
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
scheduler:
  name: products
  auto-run: true
log:
  level: debug
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.scheduler.name, "products");
        assert!(config.scheduler.auto_run);
        assert_eq!(config.log.level, "debug");
        assert!(config.log.ansi);
    }

    #[test]
    fn test_from_yaml_rejects_garbage() {
        assert!(Config::from_yaml("scheduler: [1, 2").is_err());
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.yml");
        fs::write(&path, "scheduler:\n  auto-run: true\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert!(config.scheduler.auto_run);
        assert_eq!(config.scheduler.name, "default");
    }

    #[test]
    fn test_search_paths_start_with_project_file() {
        let dir = TempDir::new().unwrap();
        let paths = Config::search_paths(dir.path());
        assert_eq!(paths[0], dir.path().join(LOCAL_CONFIG_FILE));
        assert!(paths.len() <= 2);
    }

    #[test]
    fn test_load_first_prefers_project_file() {
        let project = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        let local = project.path().join(LOCAL_CONFIG_FILE);
        let global = user.path().join("reqqueue.yml");
        fs::write(&local, "scheduler:\n  name: local\n").unwrap();
        fs::write(&global, "scheduler:\n  name: global\n").unwrap();

        let config = Config::load_first(&[local, global]);
        assert_eq!(config.scheduler.name, "local");
    }

    #[test]
    fn test_load_first_skips_missing_and_broken_files() {
        let project = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        let missing = project.path().join("absent.yml");
        let broken = project.path().join(LOCAL_CONFIG_FILE);
        let global = user.path().join("reqqueue.yml");
        fs::write(&broken, "scheduler: [1, 2").unwrap();
        fs::write(&global, "scheduler:\n  name: global\n  auto-run: true\n").unwrap();

        let config = Config::load_first(&[missing, broken, global]);
        assert_eq!(config.scheduler.name, "global");
        assert!(config.scheduler.auto_run);
    }

    #[test]
    fn test_load_first_defaults_when_nothing_usable() {
        let project = TempDir::new().unwrap();
        let broken = project.path().join(LOCAL_CONFIG_FILE);
        fs::write(&broken, "log: {level: [").unwrap();

        let config = Config::load_first(&[broken, project.path().join("absent.yml")]);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.yml");

        let err = Config::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("missing.yml"));
    }
}
