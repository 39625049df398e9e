use serde::Serialize;
use serde_json::Value;
use std::{
    fs,
    path::Path,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use tracing::info;

mod error;
mod estimate;
mod naming;
mod resolution;
mod scan;
mod transfer;

pub use error::{map_api_result, PasteError, PasteErrorCode, PasteResult};
pub use resolution::{ConflictResolution, EntryResolution};
pub use scan::{ConflictEntry, ConflictReport, EntryKind};

use crate::clipboard::{ClipboardSlot, ClipboardState};
use crate::errors::DomainError;
use crate::fs_utils::sanitize_path_follow;
use crate::tasks::{TaskDescriptor, TaskId, TaskTracker};
use crate::trash::TrashProvider;

use estimate::estimate_file_count;
use resolution::{validate_resolution, ParsedResolution};
use scan::{scan_conflicts, DEFAULT_CONFLICT_LIMIT};
use transfer::{execute_transfer, TransferContext};

/// Outcome of a paste call. `NeedsResolution` is returned with zero mutation;
/// the caller is expected to come back with a `ConflictResolution`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PasteOutcome {
    NeedsResolution { conflict_data: ConflictReport },
    Completed { pasted_items: Vec<String> },
}

impl PasteOutcome {
    pub fn needs_resolution(&self) -> bool {
        matches!(self, Self::NeedsResolution { .. })
    }
}

/// Public entry point of the transfer engine. Collaborators are injected so
/// hosts and tests can substitute clipboard, task tracking and trash
/// backends. Concurrent calls into overlapping destinations are not
/// coordinated; callers must serialize them.
pub struct PasteEngine {
    clipboard: Arc<dyn ClipboardSlot>,
    tasks: Arc<TaskTracker>,
    trash: Arc<dyn TrashProvider>,
}

impl PasteEngine {
    pub fn new(
        clipboard: Arc<dyn ClipboardSlot>,
        tasks: Arc<TaskTracker>,
        trash: Arc<dyn TrashProvider>,
    ) -> Self {
        Self {
            clipboard,
            tasks,
            trash,
        }
    }

    pub fn tasks(&self) -> &Arc<TaskTracker> {
        &self.tasks
    }

    /// Paste the pending clipboard selection into `destination_dir`.
    ///
    /// Without a `resolution`: conflicts are scanned and, if any exist,
    /// reported back without touching the filesystem; with none present the
    /// whole selection transfers directly. With a `resolution`: it is
    /// statically validated before any write, then executed entry by entry.
    /// The clipboard is cleared only when every selected entry made it over,
    /// so an interrupted cut can simply be retried.
    pub async fn paste_files(
        &self,
        destination_dir: &str,
        resolution: Option<ConflictResolution>,
    ) -> PasteResult<PasteOutcome> {
        let clipboard = self.clipboard.clone();
        let tasks = self.tasks.clone();
        let trash = self.trash.clone();
        let destination = destination_dir.to_string();
        tokio::task::spawn_blocking(move || {
            paste_files_impl(clipboard.as_ref(), &tasks, trash.as_ref(), &destination, resolution)
        })
        .await
        .map_err(|e| {
            PasteError::new(PasteErrorCode::TaskFailed, format!("Paste task failed: {e}"))
        })?
    }
}

fn paste_files_impl(
    clipboard: &dyn ClipboardSlot,
    tasks: &TaskTracker,
    trash: &dyn TrashProvider,
    destination_dir: &str,
    resolution: Option<ConflictResolution>,
) -> PasteResult<PasteOutcome> {
    let state = clipboard
        .get()
        .filter(|state| !state.file_paths.is_empty())
        .ok_or_else(|| {
            PasteError::new(PasteErrorCode::ClipboardEmpty, "No files in clipboard")
        })?;

    let dest_dir = sanitize_path_follow(destination_dir, true).map_err(PasteError::invalid_input)?;
    let dest_meta = fs::metadata(&dest_dir).map_err(|e| {
        PasteError::io(
            format!("Failed to read destination {}", dest_dir.display()),
            &e,
        )
    })?;
    if !dest_meta.is_dir() {
        return Err(PasteError::new(
            PasteErrorCode::NotDirectory,
            format!("Destination is not a directory: {}", dest_dir.display()),
        ));
    }

    // Coarse, all-or-nothing guard: a mixed selection proceeds and the
    // same-directory members resolve per entry like any other conflict.
    if state.cut
        && state
            .file_paths
            .iter()
            .all(|p| p.parent() == Some(dest_dir.as_path()))
    {
        return Err(PasteError::new(
            PasteErrorCode::SameDirectory,
            "Cannot cut and paste in the same directory",
        ));
    }

    let verb = if state.cut { "Moving" } else { "Copying" };
    let descriptor = TaskDescriptor::new(
        "paste",
        format!(
            "{verb} {} item(s) to {}",
            state.file_paths.len(),
            dest_dir.display()
        ),
    );
    let task_id = tasks
        .create(descriptor)
        .map_err(|e| PasteError::new(PasteErrorCode::TaskFailed, e.to_string()))?;

    let outcome = run_paste_task(clipboard, tasks, trash, task_id, &state, &dest_dir, resolution);
    match &outcome {
        Ok(result) => {
            let payload = serde_json::to_value(result).unwrap_or(Value::Null);
            let _ = tasks.result(task_id, Ok(payload));
        }
        Err(error) => {
            let _ = tasks.result(task_id, Err(error.to_api_error()));
        }
    }
    outcome
}

fn run_paste_task(
    clipboard: &dyn ClipboardSlot,
    tasks: &TaskTracker,
    trash: &dyn TrashProvider,
    task_id: TaskId,
    state: &ClipboardState,
    dest_dir: &Path,
    resolution: Option<ConflictResolution>,
) -> PasteResult<PasteOutcome> {
    let sources = &state.file_paths;
    let parsed = match resolution {
        None => {
            let report = scan_conflicts(sources, dest_dir, DEFAULT_CONFLICT_LIMIT);
            if !report.is_empty() {
                info!(
                    total = report.total_conflicts,
                    shown = report.conflicts.len(),
                    "paste requires conflict resolution"
                );
                return Ok(PasteOutcome::NeedsResolution {
                    conflict_data: report,
                });
            }
            ParsedResolution::auto_name()
        }
        Some(resolution) => validate_resolution(sources, dest_dir, &resolution)?,
    };

    let estimate = estimate_file_count(sources);
    if estimate.estimated {
        let _ = tasks.update(task_id, serde_json::json!({ "estimated": true }));
    }

    let cancel = tasks.abort_signal(task_id).ok();
    let files_done = AtomicU64::new(0);
    let on_file = |_path: &Path| {
        let done = files_done.fetch_add(1, Ordering::Relaxed) + 1;
        let percent = (done.min(estimate.files) * 100 / estimate.files) as u8;
        let _ = tasks.progress(task_id, percent);
    };
    let ctx = TransferContext {
        dest_dir,
        cut: state.cut,
        trash,
        cancel: cancel.as_deref(),
        on_file: Some(&on_file),
    };

    let pasted = execute_transfer(sources, &parsed, &ctx)?;
    if pasted.len() == sources.len() {
        clipboard.clear();
    }
    let _ = tasks.progress(task_id, 100);
    info!(
        pasted = pasted.len(),
        selected = sources.len(),
        cut = state.cut,
        "paste finished"
    );
    Ok(PasteOutcome::Completed {
        pasted_items: pasted,
    })
}
