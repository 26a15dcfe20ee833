/// Configuration for the taskboard client.
/// Reads client.json from ~/.config/taskboard/client.json (or platform equivalent).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use taskboard_core::ScoringConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Project shown when no `--project` is given.
    #[serde(default)]
    pub project_id: Option<i64>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Last known CSRF token. Refreshed automatically on HTTP 419.
    #[serde(default)]
    pub xsrf_token: Option<String>,
    #[serde(default)]
    pub scoring: ScoringConfig,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            project_id: None,
            timeout_secs: default_timeout_secs(),
            xsrf_token: None,
            scoring: ScoringConfig::default(),
        }
    }
}

/// Default config path: ~/.config/taskboard/client.json
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskboard")
        .join("client.json")
}

/// Load config from path. Returns default if the file is missing or broken.
pub fn load_config(path: &Path) -> ClientConfig {
    match read_config(path) {
        Ok(config) => config,
        Err(ConfigError::Read { .. }) => {
            log::info!("[taskboard.config] No config at {}, using defaults", path.display());
            ClientConfig::default()
        }
        Err(e) => {
            log::warn!("[taskboard.config] {}", e);
            ClientConfig::default()
        }
    }
}

/// Strict variant of [`load_config`], for a path the user asked for.
pub fn read_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn save_config(path: &Path, config: &ClientConfig) -> Result<(), ConfigError> {
    let write_err = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    let json = serde_json::to_string_pretty(config).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(write_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("nope.json"));
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");
        fs::write(
            &path,
            r#"{"base_url":"https://board.example","project_id":4,"scoring":{"step":50}}"#,
        )
        .unwrap();
        let config = load_config(&path);
        assert_eq!(config.base_url, "https://board.example");
        assert_eq!(config.project_id, Some(4));
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.scoring.step, 50.0);
        assert_eq!(config.scoring.base, 100.0);
    }

    #[test]
    fn test_broken_file_is_lenient_but_strict_read_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_config(&path), ClientConfig::default());
        assert!(matches!(read_config(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("client.json");
        let config = ClientConfig {
            project_id: Some(9),
            xsrf_token: Some("abc".into()),
            ..ClientConfig::default()
        };
        save_config(&path, &config).unwrap();
        assert_eq!(read_config(&path).unwrap(), config);
    }
}
