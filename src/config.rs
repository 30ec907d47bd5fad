//! Configuration module for plugin-base
//!
//! Handles loading and merging configuration from multiple sources:
//! - Default values
//! - System configuration (/etc/plugin-base/config.toml)
//! - User configuration (~/.config/plugin-base/config.toml)
//! - Project configuration (./plugin-base.toml)
//! - Environment variables

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default roots searched for installed collections
pub const DEFAULT_COLLECTIONS_PATHS: &[&str] =
    &["~/.ansible/collections", "/usr/share/ansible/collections"];

/// Default local temporary directories, most preferred first
pub const DEFAULT_SYSTEM_TMPDIRS: &[&str] = &["/var/tmp", "/tmp"];

/// Default base of the per-connection remote temporary directory
pub const DEFAULT_REMOTE_TMP: &str = "~/.ansible/tmp";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Roots that hold `<namespace>/<name>` collection trees
    pub collections_paths: Vec<String>,

    /// Local temporary directories; the first one is used
    pub system_tmpdirs: Vec<String>,

    /// Base directory for remote temporary directories
    pub remote_tmp: String,

    /// Colors and output settings
    pub colors: ColorsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            collections_paths: DEFAULT_COLLECTIONS_PATHS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            system_tmpdirs: DEFAULT_SYSTEM_TMPDIRS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            remote_tmp: DEFAULT_REMOTE_TMP.to_string(),
            colors: ColorsConfig::default(),
        }
    }
}

/// Colors configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorsConfig {
    /// Enable colored output
    pub enabled: bool,
}

impl Default for ColorsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Config {
    /// Load configuration from all sources
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Config::default();

        for path in Self::get_config_paths(config_path) {
            if path.exists() {
                config = config.merge_from_file(&path)?;
            }
        }

        config.apply_env_overrides();

        Ok(config)
    }

    /// Get configuration file paths in order of increasing priority
    fn get_config_paths(explicit_path: Option<&PathBuf>) -> Vec<PathBuf> {
        if let Some(path) = explicit_path {
            return vec![path.clone()];
        }

        let mut paths = vec![PathBuf::from("/etc/plugin-base/config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("plugin-base/config.toml"));
        }

        paths.push(PathBuf::from("plugin-base.toml"));

        if let Ok(env_config) = std::env::var("PLUGIN_BASE_CONFIG") {
            paths.push(PathBuf::from(env_config));
        }

        paths
    }

    /// Merge configuration from a file
    fn merge_from_file(&self, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let file_config: Config = match extension {
            "yml" | "yaml" => serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
            "json" => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
            _ => toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
        };

        Ok(self.merge(file_config))
    }

    /// Merge another config into this one; non-default values of `other` win
    fn merge(&self, other: Config) -> Config {
        let defaults = Config::default();
        Config {
            collections_paths: if other.collections_paths != defaults.collections_paths {
                other.collections_paths
            } else {
                self.collections_paths.clone()
            },
            system_tmpdirs: if other.system_tmpdirs != defaults.system_tmpdirs {
                other.system_tmpdirs
            } else {
                self.system_tmpdirs.clone()
            },
            remote_tmp: if other.remote_tmp != defaults.remote_tmp {
                other.remote_tmp
            } else {
                self.remote_tmp.clone()
            },
            colors: ColorsConfig {
                enabled: other.colors.enabled && self.colors.enabled,
            },
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // PLUGIN_BASE_COLLECTIONS_PATHS
        if let Ok(paths) = std::env::var("PLUGIN_BASE_COLLECTIONS_PATHS") {
            self.collections_paths = split_path_list(&paths);
        }

        // PLUGIN_BASE_SYSTEM_TMPDIRS
        if let Ok(dirs) = std::env::var("PLUGIN_BASE_SYSTEM_TMPDIRS") {
            self.system_tmpdirs = split_path_list(&dirs);
        }

        // PLUGIN_BASE_REMOTE_TMP
        if let Ok(remote_tmp) = std::env::var("PLUGIN_BASE_REMOTE_TMP") {
            self.remote_tmp = remote_tmp;
        }

        // NO_COLOR
        if std::env::var("NO_COLOR").is_ok() {
            self.colors.enabled = false;
        }
    }

    /// Collection roots with `~` and environment variables expanded
    pub fn collections_paths(&self) -> Vec<PathBuf> {
        self.collections_paths.iter().map(|p| expand_path(p)).collect()
    }

    /// Local temporary directories with `~` expanded
    pub fn system_tmpdirs(&self) -> Vec<PathBuf> {
        self.system_tmpdirs.iter().map(|p| expand_path(p)).collect()
    }

    /// Load from a specific file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Config::default().merge_from_file(path.as_ref())
    }
}

fn split_path_list(value: &str) -> Vec<String> {
    value
        .split(':')
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Expand `~` and environment variables; unknown variables are left as is
pub fn expand_path(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| shellexpand::tilde(path).into_owned());
    PathBuf::from(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.system_tmpdirs, vec!["/var/tmp", "/tmp"]);
        assert_eq!(config.remote_tmp, "~/.ansible/tmp");
        assert_eq!(config.collections_paths.len(), 2);
        assert!(config.colors.enabled);
    }

    #[test]
    fn test_config_merge() {
        let base = Config::default();
        let other = Config {
            system_tmpdirs: vec!["/scratch".to_string()],
            ..Config::default()
        };

        let merged = base.merge(other);
        assert_eq!(merged.system_tmpdirs, vec!["/scratch"]);
        assert_eq!(merged.remote_tmp, DEFAULT_REMOTE_TMP);
    }

    #[test]
    fn test_from_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let toml_path = dir.path().join("config.toml");
        std::fs::write(&toml_path, "remote_tmp = \"/srv/tmp\"\n").unwrap();
        assert_eq!(Config::from_file(&toml_path).unwrap().remote_tmp, "/srv/tmp");

        let yaml_path = dir.path().join("config.yml");
        std::fs::write(&yaml_path, "collections_paths:\n  - /opt/collections\n").unwrap();
        assert_eq!(
            Config::from_file(&yaml_path).unwrap().collections_paths,
            vec!["/opt/collections"]
        );

        let bad_path = dir.path().join("bad.json");
        std::fs::write(&bad_path, "{not json").unwrap();
        assert!(Config::from_file(&bad_path).is_err());
    }

    #[test]
    #[serial]
    fn test_env_override() {
        std::env::set_var("PLUGIN_BASE_SYSTEM_TMPDIRS", "/a:/b");
        std::env::set_var("PLUGIN_BASE_REMOTE_TMP", "/remote");
        let mut config = Config::default();
        config.apply_env_overrides();
        std::env::remove_var("PLUGIN_BASE_SYSTEM_TMPDIRS");
        std::env::remove_var("PLUGIN_BASE_REMOTE_TMP");

        assert_eq!(config.system_tmpdirs, vec!["/a", "/b"]);
        assert_eq!(config.remote_tmp, "/remote");
    }

    #[test]
    fn test_expand_path() {
        assert_eq!(expand_path("/plain/path"), PathBuf::from("/plain/path"));
        assert_eq!(
            expand_path("/x/$PLUGIN_BASE_SURELY_UNSET_VAR"),
            PathBuf::from("/x/$PLUGIN_BASE_SURELY_UNSET_VAR")
        );
    }
}
