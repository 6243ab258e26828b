//! Host configuration file.
//!
//! # Invariants
//! - Unknown keys are rejected so typos do not silently fall back to defaults.
//! - `validate` succeeds only for a parseable host version and a supported
//!   log level.

use crate::logging::{default_log_level, normalize_level, LoggingError};
use crate::plugin::version::{HostVersion, VersionParseError};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

/// Host version reported when the configuration does not set one.
pub const DEFAULT_HOST_VERSION: &str = "3.1.0.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    pub host_version: String,
    pub log_level: String,
    /// Absolute directory for rolling log files; no file logging when unset.
    pub log_dir: Option<PathBuf>,
    /// SQLite database file; an in-memory database when unset.
    pub database_path: Option<PathBuf>,
    pub disabled_plugins: Vec<String>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            host_version: DEFAULT_HOST_VERSION.to_string(),
            log_level: default_log_level().to_string(),
            log_dir: None,
            database_path: None,
            disabled_plugins: Vec::new(),
        }
    }
}

impl HostConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every field and returns the parsed host version.
    pub fn validate(&self) -> Result<HostVersion, ConfigError> {
        normalize_level(&self.log_level).map_err(ConfigError::InvalidLogLevel)?;
        HostVersion::parse(&self.host_version).map_err(ConfigError::InvalidVersion)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    InvalidVersion(VersionParseError),
    InvalidLogLevel(LoggingError),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config: {err}"),
            Self::InvalidVersion(err) => write!(f, "invalid host_version: {err}"),
            Self::InvalidLogLevel(err) => write!(f, "invalid log_level: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::InvalidVersion(err) => Some(err),
            Self::InvalidLogLevel(err) => Some(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, HostConfig, DEFAULT_HOST_VERSION};
    use crate::plugin::version::HostVersion;

    #[test]
    fn empty_object_uses_defaults() {
        let config = HostConfig::from_json_str("{}").expect("defaults parse");
        assert_eq!(config, HostConfig::default());
        assert_eq!(config.host_version, DEFAULT_HOST_VERSION);
        assert_eq!(config.validate().expect("valid"), HostVersion::new(3, 1, 0, 0));
    }

    #[test]
    fn reads_every_field() {
        let config = HostConfig::from_json_str(
            r#"{
                "host_version": "3.2",
                "log_level": "WARN",
                "log_dir": "/var/log/clinicdesk",
                "database_path": "/srv/clinicdesk.db",
                "disabled_plugins": ["builtin.picture_manager"]
            }"#,
        )
        .expect("full config parses");

        assert_eq!(config.validate().expect("valid"), HostVersion::new(3, 2, 0, 0));
        assert_eq!(config.disabled_plugins, vec!["builtin.picture_manager"]);
        assert!(config.log_dir.is_some());
    }

    #[test]
    fn rejects_unknown_keys_and_bad_values() {
        assert!(matches!(
            HostConfig::from_json_str(r#"{"host_versoin": "3.1"}"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            HostConfig::from_json_str(r#"{"host_version": "three"}"#),
            Err(ConfigError::InvalidVersion(_))
        ));
        assert!(matches!(
            HostConfig::from_json_str(r#"{"log_level": "loud"}"#),
            Err(ConfigError::InvalidLogLevel(_))
        ));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = HostConfig::load("/definitely/not/here/clinicdesk.json")
            .expect_err("missing file must fail");
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
