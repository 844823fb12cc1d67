//! Error types for registry and catalog operations.

use std::fmt;

/// Errors that can occur while syncing, downloading or persisting formulas.
#[derive(Debug)]
pub enum RegistryError {
    /// Error accessing XDG directories
    XdgDirectories { message: String },

    /// Error performing I/O operations
    Io { source: std::io::Error },

    /// Network failure talking to the catalog
    Network {
        url: String,
        source: reqwest::Error,
    },

    /// Catalog answered with a non-success status
    HttpStatus { url: String, status: u16 },

    /// Error parsing a TOML document
    TomlParse {
        path: String,
        source: toml::de::Error,
    },

    /// Error serializing a TOML document
    TomlSerialize {
        path: String,
        source: toml::ser::Error,
    },

    /// Error parsing JSON
    JsonParse { source: serde_json::Error },

    /// Formula not known to the registry
    FormulaNotFound { name: String },

    /// Formula has no remote source to download from
    NoSourceUrl { name: String },

    /// A download for this formula is already running
    DownloadInProgress { name: String },

    /// Download target would land outside the formulas directory
    UnsafeTarget { name: String, path: String },

    /// Checksum verification failed
    ChecksumMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    /// Configuration could not be read, validated or written
    Config { source: crate::config::ConfigError },

    /// A parameter value could not be parsed for its declared kind
    InvalidParam {
        param: String,
        kind: String,
        value: String,
    },
}

impl RegistryError {
    /// Whether this error came from the network and should be treated as non-fatal during sync.
    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::HttpStatus { .. })
    }
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::XdgDirectories { message } => write!(f, "XDG directory error: {message}"),
            Self::Io { source } => write!(f, "I/O error: {source}"),
            Self::Network { url, source } => write!(f, "Network error fetching {url}: {source}"),
            Self::HttpStatus { url, status } => write!(f, "HTTP {status} when fetching {url}"),
            Self::TomlParse { path, source } => {
                write!(f, "Failed to parse TOML at {path}: {source}")
            }
            Self::TomlSerialize { path, source } => {
                write!(f, "Failed to serialize TOML at {path}: {source}")
            }
            Self::JsonParse { source } => write!(f, "Failed to parse JSON: {source}"),
            Self::FormulaNotFound { name } => write!(f, "Formula '{name}' not found in registry"),
            Self::NoSourceUrl { name } => {
                write!(f, "Formula '{name}' has no source URL to download from")
            }
            Self::DownloadInProgress { name } => {
                write!(f, "Formula '{name}' is already being downloaded")
            }
            Self::UnsafeTarget { name, path } => {
                write!(f, "Refusing to write '{name}' outside the formulas directory: {path}")
            }
            Self::ChecksumMismatch {
                name,
                expected,
                actual,
            } => write!(
                f,
                "Checksum mismatch for '{name}': expected {expected}, got {actual}"
            ),
            Self::Config { source } => write!(f, "Configuration error: {source}"),
            Self::InvalidParam { param, kind, value } => {
                write!(f, "Invalid value '{value}' for {kind} parameter '{param}'")
            }
        }
    }
}

impl std::error::Error for RegistryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source } => Some(source),
            Self::Network { source, .. } => Some(source),
            Self::TomlParse { source, .. } => Some(source),
            Self::TomlSerialize { source, .. } => Some(source),
            Self::JsonParse { source } => Some(source),
            Self::Config { source } => Some(source),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RegistryError {
    fn from(source: std::io::Error) -> Self {
        Self::Io { source }
    }
}

impl From<toml::de::Error> for RegistryError {
    fn from(source: toml::de::Error) -> Self {
        Self::TomlParse {
            path: "<unknown>".to_string(),
            source,
        }
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(source: serde_json::Error) -> Self {
        Self::JsonParse { source }
    }
}

impl From<crate::config::ConfigError> for RegistryError {
    fn from(source: crate::config::ConfigError) -> Self {
        Self::Config { source }
    }
}

impl From<reqwest::Error> for RegistryError {
    fn from(source: reqwest::Error) -> Self {
        Self::Network {
            url: source
                .url()
                .map_or_else(|| "<unknown>".to_string(), ToString::to_string),
            source,
        }
    }
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
