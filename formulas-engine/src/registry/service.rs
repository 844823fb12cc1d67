//! Registry operations: sync, download, update, hide and delete.

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::Registry;
use super::catalog::Catalog;
use super::error::{RegistryError, Result};
use super::reconcile::{MergeReport, merge_with_report};
use super::scan::{is_formula_name, prune_orphans, refresh_presence, scan_local};
use super::search::{FilterOptions, filter};
use super::store::RegistryStore;
use super::tracker::DownloadTracker;
use crate::record::FormulaRecord;

/// Summary of one sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Found on disk, unknown before.
    pub discovered: Vec<String>,
    /// First seen in the catalog.
    pub added: Vec<String>,
    /// Local copies with a newer remote source.
    pub updates: Vec<String>,
    /// Dropped because neither a local copy nor a catalog listing remains.
    pub pruned: Vec<String>,
    /// Set when the catalog could not be fetched; the merge was skipped.
    pub catalog_error: Option<String>,
    /// Registry size after the pass.
    pub total: usize,
}

/// Result of updating one formula.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UpdateOutcome {
    UpToDate { name: String },
    WouldUpdate { name: String },
    Updated { name: String, path: PathBuf },
    Failed { name: String, error: String },
}

/// Owns the registry on disk and drives it against a catalog.
#[derive(Debug, Clone)]
pub struct FormulaService<C> {
    store: RegistryStore,
    catalog: C,
    tracker: DownloadTracker,
}

impl<C: Catalog> FormulaService<C> {
    /// Create a service over a store and a catalog.
    pub fn new(store: RegistryStore, catalog: C) -> Self {
        Self {
            store,
            catalog,
            tracker: DownloadTracker::new(),
        }
    }

    pub fn store(&self) -> &RegistryStore {
        &self.store
    }

    pub fn tracker(&self) -> &DownloadTracker {
        &self.tracker
    }

    /// Load the registry with presence flags refreshed from disk.
    ///
    /// Orphans are pruned in memory; nothing is written.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be read or the formulas directory cannot be listed.
    pub fn load(&self) -> Result<Registry> {
        let mut registry = self.store.load_registry()?;
        scan_local(&mut registry, self.store.formulas_dir())?;
        Ok(registry)
    }

    /// Look up one formula by name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::FormulaNotFound`] if the name is unknown.
    pub fn get(&self, name: &str) -> Result<FormulaRecord> {
        self.load()?
            .remove(name)
            .ok_or_else(|| RegistryError::FormulaNotFound {
                name: name.to_string(),
            })
    }

    /// Filtered, ordered display list.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be loaded.
    pub fn list(&self, query: &str, options: FilterOptions) -> Result<Vec<FormulaRecord>> {
        let registry = self.load()?;
        Ok(filter(registry.values(), query, options)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Scan local files, fetch the catalog, merge, and persist.
    ///
    /// A catalog failure is not fatal: the merge is skipped, the scanned
    /// registry is still saved, and the error text is reported.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be read or written.
    pub async fn sync(&self) -> Result<SyncReport> {
        let mut registry = self.store.load_registry()?;
        let scan = scan_local(&mut registry, self.store.formulas_dir())?;

        let (registry, merge, catalog_error) = match self.catalog.fetch().await {
            Ok(remote) => {
                let (merged, report) = merge_with_report(registry, &remote, Utc::now());
                (merged, report, None)
            }
            Err(e) => {
                if e.is_network() {
                    warn!("Catalog unreachable, skipping merge: {}", e);
                } else {
                    warn!("Catalog response rejected, skipping merge: {}", e);
                }
                (registry, MergeReport::default(), Some(e.to_string()))
            }
        };

        self.store.save_registry(&registry)?;

        let mut pruned = scan.pruned;
        pruned.extend(merge.pruned);
        let report = SyncReport {
            discovered: scan.discovered,
            added: merge.added,
            updates: merge.updates,
            pruned,
            catalog_error,
            total: registry.len(),
        };
        info!(
            "Sync complete: {} formula(s), {} new, {} update(s)",
            report.total,
            report.added.len() + report.discovered.len(),
            report.updates.len()
        );
        Ok(report)
    }

    /// Download (or re-download) a formula's source into the formulas directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A download for the same name is already running
    /// - The formula is unknown or has no source URL
    /// - The download fails or the checksum does not match
    /// - Writing the file or the registry fails
    pub async fn download(&self, name: &str) -> Result<FormulaRecord> {
        let _guard = self
            .tracker
            .try_begin(name)
            .ok_or_else(|| RegistryError::DownloadInProgress {
                name: name.to_string(),
            })?;

        let record = self.get(name)?;
        if !record.has_remote_source() {
            return Err(RegistryError::NoSourceUrl {
                name: name.to_string(),
            });
        }

        let target = self.download_target(&record)?;

        info!("Downloading {} from {}", name, record.source_url);
        let bytes = self.catalog.fetch_source(&record.source_url).await?;

        if let Some(expected) = record.sha256.as_deref() {
            verify_checksum(name, &bytes, expected)?;
        }

        write_atomically(&target, &bytes)?;

        let mut registry = self.load()?;
        let entry = registry
            .entry(name.to_string())
            .or_insert_with(|| record.clone());
        entry.local_path = Some(target.clone());
        entry.last_downloaded_at = Some(Utc::now());
        entry.update_available = false;
        refresh_presence(entry);
        let updated = entry.clone();
        self.store.save_registry(&registry)?;

        info!("Installed {} at {}", name, target.display());
        Ok(updated)
    }

    /// Where a download of `record` is written. Always directly inside the formulas directory.
    fn download_target(&self, record: &FormulaRecord) -> Result<PathBuf> {
        let formulas_dir = self.store.formulas_dir();
        let target = record
            .local_path
            .clone()
            .unwrap_or_else(|| formulas_dir.join(source_file_name(record)));

        if !is_formula_name(&record.name) || target.parent() != Some(formulas_dir) {
            return Err(RegistryError::UnsafeTarget {
                name: record.name.clone(),
                path: target.display().to_string(),
            });
        }
        Ok(target)
    }

    /// Re-download formulas with an update available.
    ///
    /// With a name, only that formula is considered; otherwise every formula
    /// flagged by the last sync. Downloads run concurrently. Individual
    /// failures are reported as [`UpdateOutcome::Failed`].
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be loaded or `name` is unknown.
    pub async fn update(&self, name: Option<&str>, dry_run: bool) -> Result<Vec<UpdateOutcome>> {
        let registry = self.load()?;

        let targets: Vec<String> = match name {
            Some(name) => {
                let record = registry
                    .get(name)
                    .ok_or_else(|| RegistryError::FormulaNotFound {
                        name: name.to_string(),
                    })?;
                if !record.update_available {
                    return Ok(vec![UpdateOutcome::UpToDate {
                        name: name.to_string(),
                    }]);
                }
                vec![name.to_string()]
            }
            None => registry
                .values()
                .filter(|r| r.update_available)
                .map(|r| r.name.clone())
                .collect(),
        };

        if dry_run {
            return Ok(targets
                .into_iter()
                .map(|name| UpdateOutcome::WouldUpdate { name })
                .collect());
        }

        let results = join_all(targets.iter().map(|n| self.download(n))).await;
        Ok(targets
            .into_iter()
            .zip(results)
            .map(|(name, result)| match result {
                Ok(record) => UpdateOutcome::Updated {
                    name,
                    path: record.local_path.unwrap_or_default(),
                },
                Err(e) => {
                    warn!("Failed to update {}: {}", name, e);
                    UpdateOutcome::Failed {
                        name,
                        error: e.to_string(),
                    }
                }
            })
            .collect())
    }

    /// Set the persisted visibility flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the formula is unknown or the registry cannot be saved.
    pub fn set_hidden(&self, name: &str, hidden: bool) -> Result<FormulaRecord> {
        let mut registry = self.load()?;
        let record = registry
            .get_mut(name)
            .ok_or_else(|| RegistryError::FormulaNotFound {
                name: name.to_string(),
            })?;
        record.hidden = hidden;
        let updated = record.clone();
        self.store.save_registry(&registry)?;
        debug!("{} hidden={}", name, hidden);
        Ok(updated)
    }

    /// Delete the local copy of a formula.
    ///
    /// The record stays while the catalog still provides it.
    ///
    /// # Errors
    ///
    /// Returns an error if the formula is unknown, being downloaded, or the file cannot be removed.
    pub fn delete(&self, name: &str) -> Result<FormulaRecord> {
        if self.tracker.is_downloading(name) {
            return Err(RegistryError::DownloadInProgress {
                name: name.to_string(),
            });
        }

        let mut registry = self.load()?;
        let record = registry
            .get_mut(name)
            .ok_or_else(|| RegistryError::FormulaNotFound {
                name: name.to_string(),
            })?;

        if let Some(path) = record.local_path.as_deref()
            && path.is_file()
        {
            std::fs::remove_file(path)?;
            info!("Removed {}", path.display());
        }
        record.last_downloaded_at = None;
        record.update_available = false;
        refresh_presence(record);
        let deleted = record.clone();

        prune_orphans(&mut registry);
        self.store.save_registry(&registry)?;
        Ok(deleted)
    }
}

/// File name for a downloaded formula: the formula name plus the URL's extension.
fn source_file_name(record: &FormulaRecord) -> String {
    let path = record
        .source_url
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    let segment = path.rsplit('/').next().unwrap_or_default();
    match Path::new(segment).extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() => format!("{}.{}", record.name, ext),
        _ => record.name.clone(),
    }
}

fn verify_checksum(name: &str, bytes: &[u8], expected: &str) -> Result<()> {
    let actual = hex::encode(Sha256::digest(bytes));
    if !actual.eq_ignore_ascii_case(expected) {
        return Err(RegistryError::ChecksumMismatch {
            name: name.to_string(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}

fn write_atomically(target: &Path, bytes: &[u8]) -> Result<()> {
    let dir = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.persist(target)
        .map_err(|e| RegistryError::Io { source: e.error })?;
    Ok(())
}
