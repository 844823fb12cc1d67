//! The formula record tracked by the registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::nicify::nicify;
use crate::params::ParamSpec;

/// Everything the registry knows about one formula.
///
/// `hidden`, `local_path` and `last_downloaded_at` belong to the user's
/// machine and survive reconciliation. `update_available` is recomputed on
/// every sync; `local_file_exists` and `installed` are recomputed from the
/// file system and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormulaRecord {
    /// Stable identifier, matches the source unit name.
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author: String,

    /// Where the formula source is downloaded from.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source_url: String,

    /// Human-facing page (repository or gallery entry).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub page_url: String,

    /// Metadata endpoint for this formula.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_downloaded_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_check_at: Option<DateTime<Utc>>,

    /// Last modification of the remote source, as reported by the catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_updated_at: Option<DateTime<Utc>>,

    /// Hex SHA-256 of the remote source, if the catalog publishes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,

    #[serde(default)]
    pub update_available: bool,

    #[serde(default)]
    pub hidden: bool,

    /// Declared parameters. Kept last so TOML tables follow plain values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<ParamSpec>,

    #[serde(skip)]
    pub local_file_exists: bool,

    #[serde(skip)]
    pub installed: bool,
}

impl FormulaRecord {
    /// Create an empty record for a name.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Title to show for this formula.
    ///
    /// Falls back to the nicified name when the catalog gave no display name.
    #[must_use]
    pub fn title(&self) -> String {
        if self.display_name.is_empty() {
            nicify(&self.name)
        } else {
            self.display_name.clone()
        }
    }

    /// Whether a local copy is on disk.
    #[must_use]
    pub fn has_local_copy(&self) -> bool {
        self.local_path.is_some() && self.local_file_exists
    }

    /// Whether the catalog can provide this formula.
    #[must_use]
    pub fn has_remote_source(&self) -> bool {
        !self.source_url.trim().is_empty()
    }

    /// Records with neither a local copy nor a remote source carry no information.
    #[must_use]
    pub fn is_orphaned(&self) -> bool {
        !self.has_local_copy() && !self.has_remote_source()
    }

    /// Only known remotely: nothing on disk and nothing loadable.
    #[must_use]
    pub fn is_online_only(&self) -> bool {
        !self.installed && !self.local_file_exists
    }

    /// Short status word for listings.
    #[must_use]
    pub fn status(&self) -> &'static str {
        if self.update_available {
            "update"
        } else if self.installed {
            "installed"
        } else if self.local_file_exists {
            "local"
        } else {
            "online"
        }
    }
}
