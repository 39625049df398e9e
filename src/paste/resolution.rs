use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::error::{PasteError, PasteErrorCode, PasteResult};
use super::naming::generate_unique;

/// Caller-supplied two-tier policy: one global strategy plus optional
/// per-entry overrides keyed by the *pre-resolution* top-level destination
/// path (the `destination_path` of the matching `ConflictEntry`), even though
/// the effective write may land elsewhere after renaming.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictResolution {
    pub global_strategy: String,
    #[serde(default)]
    pub per_entry: HashMap<String, EntryResolution>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryResolution {
    pub action: String,
    #[serde(default)]
    pub custom_name: Option<String>,
}

const FORBIDDEN_NAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GlobalStrategy {
    Override,
    Trash,
    AutoName,
    Skip,
}

/// One entry's resolved choice with `customName` already normalized into the
/// auto-name variant carrying the literal name.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ResolvedChoice {
    Override,
    Trash,
    AutoName(Option<String>),
    Skip,
}

#[derive(Debug, Clone)]
pub(crate) struct ParsedResolution {
    global: ResolvedChoice,
    per_entry: HashMap<PathBuf, ResolvedChoice>,
}

impl ParsedResolution {
    /// The implicit policy used when the caller supplies no resolution and no
    /// conflicts exist: plain auto-naming with nothing to rename.
    pub(crate) fn auto_name() -> Self {
        Self {
            global: ResolvedChoice::AutoName(None),
            per_entry: HashMap::new(),
        }
    }

    fn choice_for(&self, target: &Path) -> &ResolvedChoice {
        self.per_entry.get(target).unwrap_or(&self.global)
    }
}

/// Concrete resolved operation for one top-level entry, decided once from
/// policy plus live conflict state and then executed as-is. Never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EffectiveAction {
    /// No conflict; plain write under the original name.
    Written { final_name: String },
    /// Auto- or custom-renamed write.
    Renamed { final_name: String },
    /// Source dir into existing destination dir; destination-only children
    /// survive.
    MergeDirectory { final_name: String },
    /// Existing destination file is deleted, then the source is written.
    ReplaceFile { final_name: String },
    /// Existing destination goes to the platform trash, then the source is
    /// written.
    TrashThenWrite { final_name: String },
    Skipped,
}

impl EffectiveAction {
    pub(crate) fn final_name(&self) -> Option<&str> {
        match self {
            Self::Written { final_name }
            | Self::Renamed { final_name }
            | Self::MergeDirectory { final_name }
            | Self::ReplaceFile { final_name }
            | Self::TrashThenWrite { final_name } => Some(final_name),
            Self::Skipped => None,
        }
    }
}

fn strategy_from_str(value: &str) -> PasteResult<GlobalStrategy> {
    match value.to_lowercase().as_str() {
        "override" => Ok(GlobalStrategy::Override),
        "trash" => Ok(GlobalStrategy::Trash),
        "autoname" => Ok(GlobalStrategy::AutoName),
        "skip" => Ok(GlobalStrategy::Skip),
        _ => Err(PasteError::resolution(format!(
            "Invalid global strategy: {value}"
        ))),
    }
}

fn entry_choice_from(entry: &EntryResolution, path: &str) -> PasteResult<ResolvedChoice> {
    match entry.action.to_lowercase().as_str() {
        "override" => Ok(ResolvedChoice::Override),
        "trash" => Ok(ResolvedChoice::Trash),
        "skip" => Ok(ResolvedChoice::Skip),
        "customname" => {
            let name = entry
                .custom_name
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .ok_or_else(|| {
                    PasteError::resolution(format!("Custom name required for {path}"))
                })?;
            if let Some(bad) = name.chars().find(|c| FORBIDDEN_NAME_CHARS.contains(c)) {
                return Err(PasteError::resolution(format!(
                    "Invalid name for {path}: contains forbidden character '{bad}'"
                )));
            }
            Ok(ResolvedChoice::AutoName(Some(name.to_string())))
        }
        _ => Err(PasteError::resolution(format!(
            "Invalid action \"{}\" for {path}",
            entry.action
        ))),
    }
}

fn parse_resolution(resolution: &ConflictResolution) -> PasteResult<ParsedResolution> {
    let global = match strategy_from_str(&resolution.global_strategy)? {
        GlobalStrategy::Override => ResolvedChoice::Override,
        GlobalStrategy::Trash => ResolvedChoice::Trash,
        GlobalStrategy::AutoName => ResolvedChoice::AutoName(None),
        GlobalStrategy::Skip => ResolvedChoice::Skip,
    };
    let mut per_entry = HashMap::with_capacity(resolution.per_entry.len());
    for (path, entry) in &resolution.per_entry {
        per_entry.insert(PathBuf::from(path), entry_choice_from(entry, path)?);
    }
    Ok(ParsedResolution { global, per_entry })
}

/// Resolve one top-level entry against the policy and the *live* conflict
/// state. Called identically by the validator and the executor so the two can
/// never diverge. Read-only; name generation probes existence but reserves
/// nothing.
pub(crate) fn compute_effective_action(
    source: &Path,
    name: &str,
    dest_dir: &Path,
    resolution: &ParsedResolution,
) -> EffectiveAction {
    let target = dest_dir.join(name);
    let existing = fs::symlink_metadata(&target).ok();
    let has_conflict = existing.is_some();

    match resolution.choice_for(&target) {
        // Skip is a no-op on non-conflicting entries: they always transfer.
        ResolvedChoice::Skip => {
            if has_conflict {
                EffectiveAction::Skipped
            } else {
                EffectiveAction::Written {
                    final_name: name.to_string(),
                }
            }
        }
        ResolvedChoice::AutoName(None) => {
            if has_conflict {
                EffectiveAction::Renamed {
                    final_name: generate_unique(dest_dir, name),
                }
            } else {
                EffectiveAction::Written {
                    final_name: name.to_string(),
                }
            }
        }
        // The custom name is tried verbatim; if it itself collides we quietly
        // fall back to auto-naming it rather than failing the call.
        ResolvedChoice::AutoName(Some(custom)) => EffectiveAction::Renamed {
            final_name: generate_unique(dest_dir, custom),
        },
        choice @ (ResolvedChoice::Override | ResolvedChoice::Trash) => {
            if !has_conflict {
                return EffectiveAction::Written {
                    final_name: name.to_string(),
                };
            }
            let source_is_dir = fs::symlink_metadata(source)
                .map(|meta| meta.is_dir())
                .unwrap_or(false);
            let dest_is_dir = existing.map(|meta| meta.is_dir()).unwrap_or(false);
            let final_name = name.to_string();
            if source_is_dir && dest_is_dir {
                EffectiveAction::MergeDirectory { final_name }
            } else if matches!(choice, ResolvedChoice::Override) {
                EffectiveAction::ReplaceFile { final_name }
            } else {
                EffectiveAction::TrashThenWrite { final_name }
            }
        }
    }
}

/// Static soundness check of a resolution against the current source set.
/// Runs to completion before any mutation; first failure wins. Returns the
/// parsed policy so the executor works from exactly what was validated.
pub(crate) fn validate_resolution(
    sources: &[PathBuf],
    dest_dir: &Path,
    resolution: &ConflictResolution,
) -> PasteResult<ParsedResolution> {
    let parsed = parse_resolution(resolution)?;

    let mut order: Vec<PathBuf> = Vec::new();
    let mut groups: HashMap<PathBuf, Vec<String>> = HashMap::new();
    let mut transferable = 0usize;
    for src in sources {
        let Some(name) = src.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let action = compute_effective_action(src, &name, dest_dir, &parsed);
        let Some(final_name) = action.final_name() else {
            continue;
        };
        let final_dest = dest_dir.join(final_name);
        let group = groups.entry(final_dest.clone()).or_insert_with(|| {
            order.push(final_dest);
            Vec::new()
        });
        group.push(src.to_string_lossy().into_owned());
        transferable += 1;
    }

    for dest in &order {
        let group = &groups[dest];
        if group.len() > 1 {
            return Err(PasteError::new(
                PasteErrorCode::DuplicateDestination,
                format!(
                    "Multiple files would be pasted to {}: {}",
                    dest.display(),
                    group.join(", ")
                ),
            ));
        }
    }

    if transferable == 0 {
        return Err(PasteError::new(
            PasteErrorCode::NothingToPaste,
            "No files would be pasted with this resolution (all files skipped)",
        ));
    }

    Ok(parsed)
}
