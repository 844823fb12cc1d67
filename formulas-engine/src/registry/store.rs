//! XDG-compliant storage for the registry and configuration.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::Registry;
use super::error::{RegistryError, Result};
use crate::config::FormulasConfig;
use crate::record::FormulaRecord;

/// Manages on-disk locations for formulas data.
///
/// Defaults:
/// - Config: `~/.config/formulas/formulas.toml`
/// - Data: `~/.local/share/formulas/registry.toml`
/// - Formulas: `~/.local/share/formulas/formulas/`
#[derive(Debug, Clone)]
pub struct RegistryStore {
    config_dir: PathBuf,
    formulas_dir: PathBuf,
    registry_path: PathBuf,
}

/// Serialized shape of the registry file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryDocument {
    #[serde(default)]
    formulas: Vec<FormulaRecord>,
}

/// Locate the XDG project directories.
///
/// # Errors
///
/// Returns an error if no home directory can be determined.
pub fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("dev", "formulas", "formulas").ok_or_else(|| {
        RegistryError::XdgDirectories {
            message: "Could not determine XDG directories".to_string(),
        }
    })
}

impl RegistryStore {
    /// Create a store from configuration, resolving unset paths under XDG directories.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - XDG directories cannot be determined
    /// - Directory creation fails
    pub fn new(config: &FormulasConfig) -> Result<Self> {
        let dirs = project_dirs()?;
        let data_dir = dirs.data_dir();
        Self::with_paths(
            dirs.config_dir().to_path_buf(),
            config.resolve_formulas_dir(data_dir),
            config.resolve_registry_path(data_dir),
        )
    }

    /// Create a store at explicit locations, creating directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation fails.
    pub fn with_paths(
        config_dir: PathBuf,
        formulas_dir: PathBuf,
        registry_path: PathBuf,
    ) -> Result<Self> {
        std::fs::create_dir_all(&config_dir)?;
        std::fs::create_dir_all(&formulas_dir)?;
        if let Some(parent) = registry_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        Ok(Self {
            config_dir,
            formulas_dir,
            registry_path,
        })
    }

    /// Get the config directory path.
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get the directory formula sources are stored in.
    pub fn formulas_dir(&self) -> &Path {
        &self.formulas_dir
    }

    /// Get the registry file path.
    pub fn registry_path(&self) -> &Path {
        &self.registry_path
    }

    /// Default configuration file path.
    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join("formulas.toml")
    }

    /// Load the registry.
    ///
    /// A missing file yields an empty registry. Duplicate names keep the first entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_registry(&self) -> Result<Registry> {
        let path = &self.registry_path;
        if !path.exists() {
            debug!("No registry at {}, starting empty", path.display());
            return Ok(Registry::new());
        }

        let content = std::fs::read_to_string(path)?;
        let document: RegistryDocument =
            toml::from_str(&content).map_err(|e| RegistryError::TomlParse {
                path: path.display().to_string(),
                source: e,
            })?;

        let mut registry = Registry::new();
        for record in document.formulas {
            if registry.contains_key(&record.name) {
                warn!("Duplicate registry entry '{}' ignored", record.name);
                continue;
            }
            registry.insert(record.name.clone(), record);
        }
        Ok(registry)
    }

    /// Save the registry, replacing the file atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn save_registry(&self, registry: &Registry) -> Result<()> {
        let path = &self.registry_path;
        let document = RegistryDocument {
            formulas: registry.values().cloned().collect(),
        };
        let content = toml::to_string_pretty(&document).map_err(|e| {
            RegistryError::TomlSerialize {
                path: path.display().to_string(),
                source: e,
            }
        })?;

        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut file = tempfile::NamedTempFile::new_in(dir)?;
        file.write_all(content.as_bytes())?;
        file.persist(path).map_err(|e| RegistryError::Io { source: e.error })?;

        debug!("Saved {} formula(s) to {}", registry.len(), path.display());
        Ok(())
    }
}
