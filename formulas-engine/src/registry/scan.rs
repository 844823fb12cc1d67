//! Local presence scan of the formulas directory.

use std::path::Path;
use tracing::{debug, info};

use super::Registry;
use super::error::Result;
use crate::record::FormulaRecord;

/// Outcome of a local scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Names seen on disk that the registry did not know.
    pub discovered: Vec<String>,
    /// Names removed because they had neither a local copy nor a source URL.
    pub pruned: Vec<String>,
}

/// Whether a file stem can be a formula name.
#[must_use]
pub fn is_formula_name(stem: &str) -> bool {
    !stem.is_empty()
        && !stem.starts_with(|c: char| c.is_ascii_digit())
        && stem.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// Refresh `local_file_exists` and `installed` for one record from the file system.
///
/// A missing file means "not installed", never an error.
pub fn refresh_presence(record: &mut FormulaRecord) {
    let Some(path) = record.local_path.as_deref() else {
        record.local_file_exists = false;
        record.installed = false;
        return;
    };
    record.local_file_exists = path.is_file();
    record.installed = record.local_file_exists && is_loadable(path);
}

/// A local copy is loadable when it is a non-empty UTF-8 text file.
fn is_loadable(path: &Path) -> bool {
    match std::fs::read_to_string(path) {
        Ok(content) => !content.trim().is_empty(),
        Err(e) => {
            debug!("{} is not loadable: {}", path.display(), e);
            false
        }
    }
}

/// Scan `formulas_dir`, register new local formulas, refresh presence flags and prune orphans.
///
/// # Errors
///
/// Returns an error if the directory exists but cannot be listed.
pub fn scan_local(registry: &mut Registry, formulas_dir: &Path) -> Result<ScanReport> {
    let mut report = ScanReport::default();

    if formulas_dir.is_dir() {
        let mut paths: Vec<_> = std::fs::read_dir(formulas_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        paths.sort();

        for path in paths {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !is_formula_name(stem) {
                continue;
            }

            match registry.get_mut(stem) {
                Some(record) => {
                    if record.local_path.as_deref().is_none_or(|p| !p.is_file()) {
                        record.local_path = Some(path.clone());
                    }
                }
                None => {
                    let mut record = FormulaRecord::new(stem);
                    record.local_path = Some(path.clone());
                    report.discovered.push(stem.to_string());
                    registry.insert(stem.to_string(), record);
                }
            }
        }
    }

    for record in registry.values_mut() {
        refresh_presence(record);
    }

    report.pruned = prune_orphans(registry);

    if !report.discovered.is_empty() || !report.pruned.is_empty() {
        info!(
            "Local scan: {} new, {} pruned",
            report.discovered.len(),
            report.pruned.len()
        );
    }
    Ok(report)
}

/// Remove records with neither a local copy nor a source URL. Returns the removed names.
pub fn prune_orphans(registry: &mut Registry) -> Vec<String> {
    let orphans: Vec<String> = registry
        .values()
        .filter(|r| r.is_orphaned())
        .map(|r| r.name.clone())
        .collect();
    for name in &orphans {
        registry.remove(name);
    }
    orphans
}
