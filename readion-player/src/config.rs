//! readion-player configuration
//!
//! Two tiers, as in the rest of Readion:
//! 1. **Bootstrap** (CLI → environment → TOML → OS default): where the
//!    database lives, which speech backend to use, log level
//! 2. **Database runtime**: voice settings and the progress interval,
//!    read from the `settings` table
//!
//! Bootstrap values cannot change while running.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use readion_common::config::{resolve_data_folder, TomlConfig, DATABASE_FILE_NAME};

use crate::error::{Error, Result};
use crate::speech::espeak::DEFAULT_ESPEAK_BINARY;
use crate::speech::{EspeakSynthesizer, NullSynthesizer, SpeechSynthesizer};

/// Environment variable naming the data folder
pub const DATA_FOLDER_ENV: &str = "READION_DATA_FOLDER";

/// Speech backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    #[default]
    Espeak,
    /// No speech output; positions and progress still work
    Null,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Espeak => write!(f, "espeak"),
            Backend::Null => write!(f, "null"),
        }
    }
}

impl FromStr for Backend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "espeak" | "espeak-ng" => Ok(Backend::Espeak),
            "null" | "none" => Ok(Backend::Null),
            other => Err(Error::Config(format!("Unknown speech backend: {}", other))),
        }
    }
}

/// Resolved bootstrap configuration
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    pub db_path: PathBuf,
    pub backend: Backend,
    pub espeak_binary: String,
    pub log_level: String,
}

impl PlayerConfig {
    /// Merge command line values over the TOML file
    ///
    /// An explicit database path wins over the data folder.
    pub fn resolve(
        db_path: Option<&Path>,
        data_folder: Option<&Path>,
        backend: Option<&str>,
        toml: &TomlConfig,
    ) -> Result<Self> {
        let db_path = match db_path {
            Some(path) => path.to_path_buf(),
            None => resolve_data_folder(data_folder, DATA_FOLDER_ENV, toml).join(DATABASE_FILE_NAME),
        };

        let backend = match backend.or(toml.backend.as_deref()) {
            Some(name) => name.parse()?,
            None => Backend::default(),
        };

        Ok(Self {
            db_path,
            backend,
            espeak_binary: toml
                .espeak_binary
                .clone()
                .unwrap_or_else(|| DEFAULT_ESPEAK_BINARY.to_string()),
            log_level: toml.logging.level.clone(),
        })
    }

    /// Build the configured synthesizer
    pub fn create_synthesizer(&self) -> Arc<dyn SpeechSynthesizer> {
        match self.backend {
            Backend::Espeak => Arc::new(EspeakSynthesizer::new(self.espeak_binary.clone())),
            Backend::Null => Arc::new(NullSynthesizer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parse() {
        assert_eq!("espeak".parse::<Backend>().unwrap(), Backend::Espeak);
        assert_eq!("Espeak-NG".parse::<Backend>().unwrap(), Backend::Espeak);
        assert_eq!("null".parse::<Backend>().unwrap(), Backend::Null);
        assert!(matches!("sapi".parse::<Backend>(), Err(Error::Config(_))));
    }

    #[test]
    fn test_explicit_db_path_wins() {
        let toml = TomlConfig {
            data_folder: Some(PathBuf::from("/from/toml")),
            ..TomlConfig::default()
        };

        let config = PlayerConfig::resolve(
            Some(Path::new("/tmp/custom.db")),
            Some(Path::new("/from/cli")),
            None,
            &toml,
        )
        .unwrap();

        assert_eq!(config.db_path, PathBuf::from("/tmp/custom.db"));
    }

    #[test]
    fn test_data_folder_gets_database_file_name() {
        let config =
            PlayerConfig::resolve(None, Some(Path::new("/data")), None, &TomlConfig::default())
                .unwrap();

        assert_eq!(config.db_path, Path::new("/data").join(DATABASE_FILE_NAME));
    }

    #[test]
    fn test_cli_backend_overrides_toml() {
        let toml = TomlConfig {
            backend: Some("espeak".to_string()),
            espeak_binary: Some("/opt/espeak-ng".to_string()),
            ..TomlConfig::default()
        };

        let config =
            PlayerConfig::resolve(Some(Path::new("x.db")), None, Some("null"), &toml).unwrap();

        assert_eq!(config.backend, Backend::Null);
        assert_eq!(config.espeak_binary, "/opt/espeak-ng");
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_bad_toml_backend_is_config_error() {
        let toml = TomlConfig {
            backend: Some("loud".to_string()),
            ..TomlConfig::default()
        };

        assert!(PlayerConfig::resolve(Some(Path::new("x.db")), None, None, &toml).is_err());
    }
}
