//! Merging catalog results into the local registry.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::debug;

use super::Registry;
use super::scan::prune_orphans;
use crate::record::FormulaRecord;

/// What a merge changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Names first seen in the catalog.
    pub added: Vec<String>,
    /// Names with a newer remote source than the local copy.
    pub updates: Vec<String>,
    /// Names dropped as orphans.
    pub pruned: Vec<String>,
}

/// Merge `remote` into `local` as of `now`.
///
/// User state (`hidden`, `local_path`, `last_downloaded_at`) is preserved,
/// presentation metadata follows the catalog, `update_available` is
/// recomputed, and orphans are pruned. Records the catalog no longer lists
/// lose their source URL, so they survive only while a local copy exists. Merging the same remote set twice with
/// the same `now` gives the same registry.
#[must_use]
pub fn merge(local: Registry, remote: &[FormulaRecord], now: DateTime<Utc>) -> Registry {
    merge_with_report(local, remote, now).0
}

/// [`merge`], also reporting what changed.
#[must_use]
pub fn merge_with_report(
    mut local: Registry,
    remote: &[FormulaRecord],
    now: DateTime<Utc>,
) -> (Registry, MergeReport) {
    let mut report = MergeReport::default();

    for incoming in remote {
        if incoming.name.is_empty() {
            continue;
        }
        match local.get_mut(&incoming.name) {
            Some(existing) => {
                copy_remote_fields(existing, incoming);
                existing.last_update_check_at = Some(now);
            }
            None => {
                let record = FormulaRecord {
                    local_path: None,
                    last_downloaded_at: None,
                    last_update_check_at: Some(now),
                    update_available: false,
                    hidden: false,
                    local_file_exists: false,
                    installed: false,
                    ..incoming.clone()
                };
                debug!("New catalog formula '{}'", record.name);
                report.added.push(record.name.clone());
                local.insert(record.name.clone(), record);
            }
        }
    }

    let listed: HashSet<&str> = remote.iter().map(|r| r.name.as_str()).collect();
    for record in local.values_mut() {
        if record.has_remote_source() && !listed.contains(record.name.as_str()) {
            debug!("'{}' is no longer listed by the catalog", record.name);
            record.source_url.clear();
        }
        record.update_available = needs_update(record);
        if record.update_available {
            report.updates.push(record.name.clone());
        }
    }

    report.pruned = prune_orphans(&mut local);
    (local, report)
}

/// A local copy is stale when the remote source changed after it was downloaded.
#[must_use]
pub fn needs_update(record: &FormulaRecord) -> bool {
    if !record.has_local_copy() || !record.has_remote_source() {
        return false;
    }
    match (record.last_downloaded_at, record.source_updated_at) {
        (Some(downloaded), Some(updated)) => updated > downloaded,
        _ => false,
    }
}

fn copy_remote_fields(existing: &mut FormulaRecord, incoming: &FormulaRecord) {
    fn take(dst: &mut String, src: &str) {
        if !src.is_empty() {
            *dst = src.to_string();
        }
    }

    take(&mut existing.display_name, &incoming.display_name);
    take(&mut existing.description, &incoming.description);
    take(&mut existing.author, &incoming.author);
    take(&mut existing.source_url, &incoming.source_url);
    take(&mut existing.page_url, &incoming.page_url);
    take(&mut existing.api_url, &incoming.api_url);

    if incoming.source_updated_at.is_some() {
        existing.source_updated_at = incoming.source_updated_at;
    }
    if incoming.sha256.is_some() {
        existing.sha256.clone_from(&incoming.sha256);
    }
    if !incoming.params.is_empty() {
        existing.params.clone_from(&incoming.params);
    }
}
