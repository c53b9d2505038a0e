//! Core configuration: JSON file plus `GRANTDESK_*` environment overrides.
//!
//! # Invariants
//! - Every field has a default, so an empty document is a valid config.
//! - `validate` runs after overrides; a config that fails it is never returned.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_DB_PATH: &str = "GRANTDESK_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "GRANTDESK_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "GRANTDESK_LOG_DIR";
pub const ENV_DEFAULT_PAGE_SIZE: &str = "GRANTDESK_DEFAULT_PAGE_SIZE";
pub const ENV_MAX_PAGE_SIZE: &str = "GRANTDESK_MAX_PAGE_SIZE";
pub const ENV_CURSOR_POLICY: &str = "GRANTDESK_CURSOR_POLICY";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid value `{value}` for {key}")]
    InvalidOverride { key: &'static str, value: String },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// How cursors are allocated for new entities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorPolicy {
    /// Microseconds since the Unix epoch of the creation instant.
    EpochMicros,
    /// Epoch microseconds, bumped past the last issued cursor on collision.
    #[default]
    Monotonic,
}

impl CursorPolicy {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "epoch_micros" => Some(Self::EpochMicros),
            "monotonic" => Some(Self::Monotonic),
            _ => None,
        }
    }
}

/// Page-size defaults applied by every list use-case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagingConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            default_page_size: 50,
            max_page_size: 200,
        }
    }
}

impl PagingConfig {
    /// Absent or zero falls back to the default; larger values clamp to max.
    pub fn normalize(&self, requested: Option<u32>) -> u32 {
        match requested {
            None | Some(0) => self.default_page_size,
            Some(size) => size.min(self.max_page_size),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreConfig {
    /// SQLite file; `None` means an in-memory database.
    pub db_path: Option<PathBuf>,
    /// Log level; `None` uses the build-mode default.
    pub log_level: Option<String>,
    /// Absolute log directory; `None` leaves file logging off.
    pub log_dir: Option<PathBuf>,
    pub paging: PagingConfig,
    pub cursor_policy: CursorPolicy,
}

impl CoreConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Applies `GRANTDESK_*` variables from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides read through `lookup`, then re-validates.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(value) = lookup(ENV_DB_PATH) {
            self.db_path = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup(ENV_LOG_LEVEL) {
            self.log_level = Some(value);
        }
        if let Some(value) = lookup(ENV_LOG_DIR) {
            self.log_dir = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup(ENV_DEFAULT_PAGE_SIZE) {
            self.paging.default_page_size = parse_u32(ENV_DEFAULT_PAGE_SIZE, value)?;
        }
        if let Some(value) = lookup(ENV_MAX_PAGE_SIZE) {
            self.paging.max_page_size = parse_u32(ENV_MAX_PAGE_SIZE, value)?;
        }
        if let Some(value) = lookup(ENV_CURSOR_POLICY) {
            self.cursor_policy =
                CursorPolicy::parse(&value).ok_or(ConfigError::InvalidOverride {
                    key: ENV_CURSOR_POLICY,
                    value,
                })?;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.paging.default_page_size == 0 {
            return Err(ConfigError::Invalid(
                "paging.default_page_size must be positive".to_string(),
            ));
        }
        if self.paging.max_page_size < self.paging.default_page_size {
            return Err(ConfigError::Invalid(format!(
                "paging.max_page_size ({}) is below paging.default_page_size ({})",
                self.paging.max_page_size, self.paging.default_page_size
            )));
        }
        if let Some(dir) = &self.log_dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "log_dir must be an absolute path, got `{}`",
                    dir.display()
                )));
            }
        }
        Ok(())
    }
}

fn parse_u32(key: &'static str, value: String) -> Result<u32, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidOverride { key, value })
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig, CursorPolicy, PagingConfig};
    use std::collections::HashMap;

    #[test]
    fn empty_document_uses_defaults() {
        let config = CoreConfig::from_json_str("{}").expect("empty config should parse");
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.paging.default_page_size, 50);
        assert_eq!(config.cursor_policy, CursorPolicy::Monotonic);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let error = CoreConfig::from_json_str(r#"{"page_size": 10}"#)
            .expect_err("unknown field should fail");
        assert!(matches!(error, ConfigError::Parse(_)));
    }

    #[test]
    fn normalize_defaults_and_clamps() {
        let paging = PagingConfig::default();
        assert_eq!(paging.normalize(None), 50);
        assert_eq!(paging.normalize(Some(0)), 50);
        assert_eq!(paging.normalize(Some(7)), 7);
        assert_eq!(paging.normalize(Some(10_000)), 200);
    }

    #[test]
    fn overrides_replace_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("GRANTDESK_DEFAULT_PAGE_SIZE", "20"),
            ("GRANTDESK_CURSOR_POLICY", "epoch_micros"),
        ]);
        let config = CoreConfig::from_json_str(r#"{"paging": {"max_page_size": 100}}"#)
            .expect("config should parse")
            .with_overrides(|key| env.get(key).map(|value| value.to_string()))
            .expect("overrides should apply");

        assert_eq!(config.paging.default_page_size, 20);
        assert_eq!(config.paging.max_page_size, 100);
        assert_eq!(config.cursor_policy, CursorPolicy::EpochMicros);
    }

    #[test]
    fn malformed_override_names_the_variable() {
        let error = CoreConfig::default()
            .with_overrides(|key| (key == "GRANTDESK_MAX_PAGE_SIZE").then(|| "lots".to_string()))
            .expect_err("non-numeric override should fail");
        assert!(error.to_string().contains("GRANTDESK_MAX_PAGE_SIZE"));
    }

    #[test]
    fn validate_rejects_inverted_page_bounds() {
        let error = CoreConfig::from_json_str(
            r#"{"paging": {"default_page_size": 100, "max_page_size": 10}}"#,
        )
        .expect_err("max below default should fail");
        assert!(matches!(error, ConfigError::Invalid(_)));
    }
}
