//! Configuration loading and data folder resolution

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Name of the SQLite database file inside the data folder
pub const DATABASE_FILE_NAME: &str = "readion.db";

/// Bootstrap configuration loaded from TOML file
///
/// Runtime settings (voice, progress interval) live in the database;
/// this file only says where things are and how to start.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Folder holding the database (optional)
    #[serde(default)]
    pub data_folder: Option<PathBuf>,

    /// Speech backend name ("espeak" or "null")
    #[serde(default)]
    pub backend: Option<String>,

    /// Path or name of the espeak-ng executable
    #[serde(default)]
    pub espeak_binary: Option<String>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter used when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Parse a TOML document
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config file: {}", e)))
    }

    /// Load the config file at `path`
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Load the platform config file, or defaults when there is none
    pub fn load_default() -> Self {
        match config_file_path() {
            Some(path) if path.exists() => match Self::load(&path) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Ignoring config file {}: {}", path.display(), e);
                    Self::default()
                }
            },
            _ => Self::default(),
        }
    }
}

/// Data folder resolution in priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent default (fallback)
pub fn resolve_data_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_config: &TomlConfig,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &toml_config.data_folder {
        return path.clone();
    }

    // Priority 4: OS-dependent default
    default_data_folder()
}

/// Platform config file path (`<config dir>/readion/config.toml`)
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("readion").join("config.toml"))
}

/// Get OS-dependent default data folder path
fn default_data_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("readion"))
        .unwrap_or_else(|| PathBuf::from("./readion_data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_argument_wins() {
        let toml = TomlConfig {
            data_folder: Some(PathBuf::from("/from/toml")),
            ..Default::default()
        };
        let resolved = resolve_data_folder(
            Some(Path::new("/from/cli")),
            "READION_TEST_UNSET_VAR_1",
            &toml,
        );
        assert_eq!(resolved, PathBuf::from("/from/cli"));
    }

    #[test]
    fn test_toml_used_when_no_cli_or_env() {
        let toml = TomlConfig {
            data_folder: Some(PathBuf::from("/from/toml")),
            ..Default::default()
        };
        let resolved = resolve_data_folder(None, "READION_TEST_UNSET_VAR_2", &toml);
        assert_eq!(resolved, PathBuf::from("/from/toml"));
    }

    #[test]
    fn test_falls_back_to_os_default() {
        let resolved =
            resolve_data_folder(None, "READION_TEST_UNSET_VAR_3", &TomlConfig::default());
        assert!(resolved.ends_with("readion") || resolved.ends_with("readion_data"));
    }

    #[test]
    fn test_parse_toml() {
        let config = TomlConfig::parse(
            r#"
            data_folder = "/srv/readion"
            backend = "null"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.data_folder, Some(PathBuf::from("/srv/readion")));
        assert_eq!(config.backend.as_deref(), Some("null"));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_parse_empty_toml_uses_defaults() {
        let config = TomlConfig::parse("").unwrap();
        assert!(config.data_folder.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_invalid_toml() {
        let result = TomlConfig::parse("data_folder = [");
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
