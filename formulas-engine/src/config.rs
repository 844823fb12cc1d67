//! Configuration loading and management for the formulas engine.
//!
//! The configuration is stored in TOML format and defines:
//! - Catalog settings (endpoint, timeout, retry policy)
//! - Storage settings (formulas directory, registry file)
//! - Display preferences (hidden/online formulas, debug logging)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Invalid config: {0}")]
    ValidationError(String),
}

/// Remote catalog settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// URL of the catalog document.
    #[serde(default = "default_catalog_url")]
    pub url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Total attempts per request, first try included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Upper bound for the doubling retry delay.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_catalog_url() -> String {
    "https://raw.githubusercontent.com/editor-formulas/formulas/main/catalog.json".to_string()
}

const fn default_timeout_secs() -> u64 {
    15
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    250
}

const fn default_max_backoff_ms() -> u64 {
    4000
}

fn default_user_agent() -> String {
    format!("formulas/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            url: default_catalog_url(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            user_agent: default_user_agent(),
        }
    }
}

impl CatalogConfig {
    /// Per-request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Delay to wait before retry number `retry` (0-based), doubling up to the cap.
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u64.checked_shl(retry).unwrap_or(u64::MAX);
        let millis = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(millis)
    }
}

/// Where formulas and the registry live on disk.
///
/// Unset paths resolve under the XDG data directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formulas_dir: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_path: Option<PathBuf>,
}

/// Listing preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Include formulas the user has hidden.
    #[serde(default)]
    pub show_hidden: bool,

    /// Include formulas that are only available from the catalog.
    #[serde(default = "default_show_online")]
    pub show_online: bool,

    /// Debug-level logging.
    #[serde(default)]
    pub debug: bool,
}

const fn default_show_online() -> bool {
    true
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            show_hidden: false,
            show_online: default_show_online(),
            debug: false,
        }
    }
}

/// Complete formulas configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulasConfig {
    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub display: DisplayConfig,
}

impl FormulasConfig {
    /// Load configuration from a file.
    ///
    /// A missing file yields the default configuration.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: FormulasConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write configuration to a file, creating parent directories.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.catalog.url.trim();
        if url.is_empty() {
            return Err(ConfigError::ValidationError(
                "catalog.url must not be empty".to_string(),
            ));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "catalog.url must be http(s): {url}"
            )));
        }
        if self.catalog.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "catalog.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.catalog.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "catalog.timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.catalog.initial_backoff_ms > self.catalog.max_backoff_ms {
            return Err(ConfigError::ValidationError(format!(
                "catalog.initial_backoff_ms ({}) exceeds catalog.max_backoff_ms ({})",
                self.catalog.initial_backoff_ms, self.catalog.max_backoff_ms
            )));
        }
        Ok(())
    }

    /// Resolve the formulas directory given the data directory (pure function).
    #[must_use]
    pub fn resolve_formulas_dir(&self, data_dir: &Path) -> PathBuf {
        self.storage
            .formulas_dir
            .clone()
            .unwrap_or_else(|| data_dir.join("formulas"))
    }

    /// Resolve the registry file given the data directory (pure function).
    #[must_use]
    pub fn resolve_registry_path(&self, data_dir: &Path) -> PathBuf {
        self.storage
            .registry_path
            .clone()
            .unwrap_or_else(|| data_dir.join("registry.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_empty_config() -> Result<(), Box<dyn std::error::Error>> {
        let config = FormulasConfig::parse("")?;
        assert_eq!(config, FormulasConfig::default());
        assert!(config.display.show_online);
        assert!(!config.display.show_hidden);
        assert_eq!(config.catalog.max_attempts, 3);
        Ok(())
    }

    #[test]
    fn test_parse_full_config() -> Result<(), Box<dyn std::error::Error>> {
        let toml = r#"
[catalog]
url = "https://example.com/catalog.json"
timeout_secs = 5
max_attempts = 4
initial_backoff_ms = 100
max_backoff_ms = 1000
user_agent = "test-agent"

[storage]
formulas_dir = "/srv/formulas"
registry_path = "/srv/registry.toml"

[display]
show_hidden = true
show_online = false
debug = true
"#;
        let config = FormulasConfig::parse(toml)?;
        assert_eq!(config.catalog.url, "https://example.com/catalog.json");
        assert_eq!(config.catalog.timeout(), Duration::from_secs(5));
        assert_eq!(config.catalog.max_attempts, 4);
        assert_eq!(config.storage.formulas_dir, Some(PathBuf::from("/srv/formulas")));
        assert!(config.display.show_hidden);
        assert!(!config.display.show_online);
        assert!(config.display.debug);
        Ok(())
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let cases = [
            "[catalog]\nurl = \"\"",
            "[catalog]\nurl = \"ftp://example.com/catalog.json\"",
            "[catalog]\nmax_attempts = 0",
            "[catalog]\ntimeout_secs = 0",
            "[catalog]\ninitial_backoff_ms = 500\nmax_backoff_ms = 100",
        ];
        for case in cases {
            let Err(err) = FormulasConfig::parse(case) else {
                panic!("expected validation failure for {case:?}");
            };
            assert!(matches!(err, ConfigError::ValidationError(_)), "{case:?}: {err}");
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let catalog = CatalogConfig {
            initial_backoff_ms: 100,
            max_backoff_ms: 500,
            ..Default::default()
        };
        assert_eq!(catalog.backoff(0), Duration::from_millis(100));
        assert_eq!(catalog.backoff(1), Duration::from_millis(200));
        assert_eq!(catalog.backoff(2), Duration::from_millis(400));
        assert_eq!(catalog.backoff(3), Duration::from_millis(500));
        assert_eq!(catalog.backoff(80), Duration::from_millis(500));
    }

    #[test]
    fn test_resolve_paths() {
        let config = FormulasConfig::default();
        let data = Path::new("/data/formulas-engine");
        assert_eq!(config.resolve_formulas_dir(data), data.join("formulas"));
        assert_eq!(config.resolve_registry_path(data), data.join("registry.toml"));

        let config = FormulasConfig {
            storage: StorageConfig {
                formulas_dir: Some(PathBuf::from("/custom")),
                registry_path: None,
            },
            ..Default::default()
        };
        assert_eq!(config.resolve_formulas_dir(data), PathBuf::from("/custom"));
    }

    #[test]
    fn test_save_and_load() -> Result<(), Box<dyn std::error::Error>> {
        let temp = TempDir::new()?;
        let path = temp.path().join("nested").join("formulas.toml");

        let mut config = FormulasConfig::default();
        config.display.show_hidden = true;
        config.catalog.url = "https://example.com/c.json".to_string();
        config.save(&path)?;

        let loaded = FormulasConfig::load(&path)?;
        assert_eq!(loaded, config);
        Ok(())
    }

    #[test]
    fn test_load_missing_file_is_default() -> Result<(), Box<dyn std::error::Error>> {
        let temp = TempDir::new()?;
        let loaded = FormulasConfig::load(temp.path().join("absent.toml"))?;
        assert_eq!(loaded, FormulasConfig::default());
        Ok(())
    }
}
