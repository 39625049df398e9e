use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::fs_utils::format_bytes;

use super::naming::generate_unique;

pub(crate) const DEFAULT_CONFLICT_LIMIT: usize = 20;

/// Placeholder for sizes we refuse to compute (whole directory trees).
const SIZE_UNAVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
}

/// One naming collision between a source node and the destination tree.
/// `destination_path` is the pre-resolution target; `suggested_name` is a
/// collision-free alternative computed at scan time.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConflictEntry {
    pub source_path: String,
    pub destination_path: String,
    pub suggested_name: String,
    pub kind: EntryKind,
    pub source_size: Option<u64>,
    pub dest_size: Option<u64>,
    pub source_size_str: String,
    pub dest_size_str: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConflictReport {
    /// Truncated for display; at most the requested limit.
    pub conflicts: Vec<ConflictEntry>,
    /// Exact, even when `conflicts` is truncated.
    pub total_conflicts: usize,
    pub exceeds_limit: bool,
}

impl ConflictReport {
    pub fn is_empty(&self) -> bool {
        self.total_conflicts == 0
    }
}

/// Walk every top-level source against `dest_dir` and report collisions.
/// Read-only: no candidate names are reserved and nothing is written.
pub(crate) fn scan_conflicts(sources: &[PathBuf], dest_dir: &Path, limit: usize) -> ConflictReport {
    let mut conflicts: Vec<ConflictEntry> = Vec::new();
    let mut total = 0usize;
    for src in sources {
        let Some(name) = src.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            debug!(source = %src.display(), "skipping source without a file name");
            continue;
        };
        let budget = limit.saturating_sub(conflicts.len());
        let (mut found, count) = scan_node(src, dest_dir, &name, budget);
        conflicts.append(&mut found);
        total += count;
    }
    ConflictReport {
        exceeds_limit: total > limit,
        conflicts,
        total_conflicts: total,
    }
}

/// Pure fold over one source node: returns the entries to display (bounded by
/// `budget`) and the exact collision count beneath this node. A conflicting
/// directory is reported once and never descended into; resolving its name or
/// action resolves everything inside it.
fn scan_node(src: &Path, dest_parent: &Path, name: &str, budget: usize) -> (Vec<ConflictEntry>, usize) {
    let target = dest_parent.join(name);
    match fs::symlink_metadata(&target) {
        Ok(target_meta) => {
            let mut entries = Vec::new();
            if budget > 0 {
                entries.push(build_entry(src, &target, dest_parent, name, &target_meta));
            }
            (entries, 1)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            let src_meta = match fs::symlink_metadata(src) {
                Ok(meta) => meta,
                Err(e) => {
                    debug!(source = %src.display(), error = ?e, "scan skipping unreadable source");
                    return (Vec::new(), 0);
                }
            };
            if !src_meta.is_dir() {
                return (Vec::new(), 0);
            }
            let read = match fs::read_dir(src) {
                Ok(read) => read,
                Err(e) => {
                    debug!(source = %src.display(), error = ?e, "scan skipping unreadable directory");
                    return (Vec::new(), 0);
                }
            };
            let mut acc = Vec::new();
            let mut total = 0usize;
            for entry in read {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        debug!(source = %src.display(), error = ?e, "scan skipping unreadable entry");
                        continue;
                    }
                };
                let child_name = entry.file_name().to_string_lossy().into_owned();
                let child_budget = budget.saturating_sub(acc.len());
                let (mut found, count) =
                    scan_node(&entry.path(), &target, &child_name, child_budget);
                acc.append(&mut found);
                total += count;
            }
            (acc, total)
        }
        Err(e) => {
            debug!(target = %target.display(), error = ?e, "scan skipping unreadable target");
            (Vec::new(), 0)
        }
    }
}

fn build_entry(
    src: &Path,
    target: &Path,
    dest_parent: &Path,
    name: &str,
    target_meta: &fs::Metadata,
) -> ConflictEntry {
    let src_meta = fs::symlink_metadata(src).ok();
    let kind = match &src_meta {
        Some(meta) if meta.is_dir() => EntryKind::Dir,
        _ => EntryKind::File,
    };
    // Directory sizes would need a full recursive sum; once the folder-level
    // decision is made nothing inside it matters, so we report a placeholder.
    let source_size = src_meta
        .as_ref()
        .filter(|meta| meta.is_file())
        .map(|meta| meta.len());
    let dest_size = Some(target_meta.len()).filter(|_| target_meta.is_file());
    ConflictEntry {
        source_path: src.to_string_lossy().into_owned(),
        destination_path: target.to_string_lossy().into_owned(),
        suggested_name: generate_unique(dest_parent, name),
        kind,
        source_size,
        dest_size,
        source_size_str: size_str(source_size),
        dest_size_str: size_str(dest_size),
    }
}

fn size_str(size: Option<u64>) -> String {
    size.map(format_bytes)
        .unwrap_or_else(|| SIZE_UNAVAILABLE.to_string())
}
