use std::{
    fs,
    io::{ErrorKind, Read, Write},
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};
use tracing::debug;

use crate::fs_utils::metadata_if_exists_nofollow;
use crate::trash::TrashProvider;

use super::error::{PasteError, PasteErrorCode, PasteResult};
use super::resolution::{compute_effective_action, EffectiveAction, ParsedResolution};

const COPY_BUF_SIZE: usize = 512 * 1024;

pub(crate) struct TransferContext<'a> {
    pub dest_dir: &'a Path,
    pub cut: bool,
    pub trash: &'a dyn TrashProvider,
    pub cancel: Option<&'a AtomicBool>,
    /// Invoked once per written leaf file (or per renamed entry on the cut
    /// fast path); drives percent progress upstream.
    pub on_file: Option<&'a (dyn Fn(&Path) + Send + Sync)>,
}

impl TransferContext<'_> {
    fn cancelled(&self) -> bool {
        self.cancel
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    fn notify(&self, path: &Path) {
        if let Some(on_file) = self.on_file {
            on_file(path);
        }
    }
}

/// Execute the transfer of every top-level source, in selection order, never
/// reordered or parallelized. Conflict state is recomputed live per entry via
/// the same effective-action computation the validator ran, so races between
/// scan and execute self-correct. Cancellation is sampled only between
/// top-level entries: if anything was already pasted the partial list is
/// returned as success, otherwise a cancellation error.
pub(crate) fn execute_transfer(
    sources: &[PathBuf],
    resolution: &ParsedResolution,
    ctx: &TransferContext,
) -> PasteResult<Vec<String>> {
    let mut pasted: Vec<String> = Vec::new();
    for src in sources {
        if ctx.cancelled() {
            if pasted.is_empty() {
                return Err(PasteError::cancelled());
            }
            return Ok(pasted);
        }
        let name = src
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                PasteError::invalid_input(format!("Invalid source path: {}", src.display()))
            })?;

        let action = compute_effective_action(src, &name, ctx.dest_dir, resolution);
        debug!(source = %src.display(), ?action, "resolved entry");
        match action {
            EffectiveAction::Skipped => continue,
            EffectiveAction::Written { final_name } | EffectiveAction::Renamed { final_name } => {
                let target = ctx.dest_dir.join(&final_name);
                write_entry(src, &target, ctx)?;
                pasted.push(final_name);
            }
            EffectiveAction::ReplaceFile { final_name } => {
                let target = ctx.dest_dir.join(&final_name);
                ensure_not_self_or_parent(src, &target)?;
                let target_is_dir = fs::symlink_metadata(&target)
                    .map(|meta| meta.is_dir())
                    .unwrap_or(false);
                if target_is_dir {
                    return Err(PasteError::invalid_input(format!(
                        "Cannot replace directory {} with a file",
                        target.display()
                    )));
                }
                // Only plain files are deleted on this path; directories are
                // never wholesale-removed, they merge instead.
                fs::remove_file(&target).map_err(|e| {
                    PasteError::io(
                        format!("Failed to remove existing file {}", target.display()),
                        &e,
                    )
                })?;
                write_entry(src, &target, ctx)?;
                pasted.push(final_name);
            }
            EffectiveAction::TrashThenWrite { final_name } => {
                let target = ctx.dest_dir.join(&final_name);
                ensure_not_self_or_parent(src, &target)?;
                ctx.trash
                    .move_to_trash(&target)
                    .map_err(PasteError::from_external_message)?;
                write_entry(src, &target, ctx)?;
                pasted.push(final_name);
            }
            EffectiveAction::MergeDirectory { final_name } => {
                let target = ctx.dest_dir.join(&final_name);
                ensure_not_self_or_parent(src, &target)?;
                merge_dir(src, &target, ctx)?;
                if ctx.cut {
                    // Children were already moved out one by one; only the
                    // now-empty source skeleton is left to drop.
                    fs::remove_dir_all(src).map_err(|e| {
                        PasteError::io(
                            format!("Failed to remove source dir {}", src.display()),
                            &e,
                        )
                    })?;
                }
                pasted.push(final_name);
            }
        }
    }
    Ok(pasted)
}

fn ensure_not_child(src: &Path, dest: &Path) -> PasteResult<()> {
    if dest.starts_with(src) {
        return Err(PasteError::invalid_input(
            "Cannot paste a directory into itself",
        ));
    }
    Ok(())
}

/// Reject a destructive action whose target is the source itself or one of
/// its ancestors. Must run before any delete, trash or merge, otherwise a
/// self-paste destroys the very entry it was asked to copy.
fn ensure_not_self_or_parent(src: &Path, target: &Path) -> PasteResult<()> {
    if src.starts_with(target) {
        return Err(PasteError::invalid_input(
            "Cannot overwrite the source item or a parent directory of it",
        ));
    }
    Ok(())
}

fn write_entry(src: &Path, dest: &Path, ctx: &TransferContext) -> PasteResult<()> {
    if ctx.cut {
        move_entry(src, dest, ctx)
    } else {
        copy_entry(src, dest, ctx)
    }
}

/// Rename first; if the filesystem refuses (cross-device, for one), fall back
/// to copy-then-delete. The source is only deleted after the copy fully
/// succeeded.
fn move_entry(src: &Path, dest: &Path, ctx: &TransferContext) -> PasteResult<()> {
    ensure_not_child(src, dest)?;
    match fs::rename(src, dest) {
        Ok(_) => {
            ctx.notify(dest);
            Ok(())
        }
        Err(_) => {
            copy_entry(src, dest, ctx)?;
            delete_entry_path(src)
        }
    }
}

fn copy_entry(src: &Path, dest: &Path, ctx: &TransferContext) -> PasteResult<()> {
    let meta = fs::symlink_metadata(src)
        .map_err(|e| PasteError::io(format!("Failed to read metadata for {}", src.display()), &e))?;
    if meta.file_type().is_symlink() {
        return Err(PasteError::new(
            PasteErrorCode::SymlinkUnsupported,
            "Refusing to copy symlinks",
        ));
    }
    if meta.is_dir() {
        ensure_not_child(src, dest)?;
        copy_dir(src, dest, ctx)
    } else {
        copy_file(src, dest, ctx)
    }
}

fn copy_dir(src: &Path, dest: &Path, ctx: &TransferContext) -> PasteResult<()> {
    fs::create_dir(dest).map_err(|e| {
        if e.kind() == ErrorKind::AlreadyExists {
            PasteError::new(
                PasteErrorCode::DestinationExists,
                format!("Destination already exists: {}", dest.display()),
            )
        } else {
            PasteError::io(format!("Failed to create dir {}", dest.display()), &e)
        }
    })?;
    let read = fs::read_dir(src)
        .map_err(|e| PasteError::io(format!("Failed to read dir {}", src.display()), &e))?;
    for entry in read {
        let entry =
            entry.map_err(|e| PasteError::io("Failed to read dir entry".to_string(), &e))?;
        let path = entry.path();
        let meta = fs::symlink_metadata(&path).map_err(|e| {
            PasteError::io(format!("Failed to read metadata for {}", path.display()), &e)
        })?;
        if meta.file_type().is_symlink() {
            return Err(PasteError::new(
                PasteErrorCode::SymlinkUnsupported,
                "Refusing to copy symlinks",
            ));
        }
        let target = dest.join(entry.file_name());
        if meta.is_dir() {
            ensure_not_child(&path, &target)?;
            copy_dir(&path, &target, ctx)?;
        } else {
            copy_file(&path, &target, ctx)?;
        }
    }
    Ok(())
}

fn copy_file(src: &Path, dest: &Path, ctx: &TransferContext) -> PasteResult<()> {
    let mut reader = fs::File::open(src)
        .map_err(|e| PasteError::io(format!("Failed to open {} for copy", src.display()), &e))?;
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    let mut writer = options.open(dest).map_err(|e| {
        if e.kind() == ErrorKind::AlreadyExists {
            PasteError::new(
                PasteErrorCode::DestinationExists,
                format!("Destination already exists: {}", dest.display()),
            )
        } else {
            PasteError::io(format!("Failed to open {} for copy", dest.display()), &e)
        }
    })?;

    let mut buf = vec![0u8; COPY_BUF_SIZE];
    loop {
        let n = reader
            .read(&mut buf)
            .map_err(|e| PasteError::io("Read failed".to_string(), &e))?;
        if n == 0 {
            break;
        }
        writer
            .write_all(&buf[..n])
            .map_err(|e| PasteError::io("Write failed".to_string(), &e))?;
    }
    ctx.notify(dest);
    Ok(())
}

fn delete_entry_path(path: &Path) -> PasteResult<()> {
    let meta = fs::symlink_metadata(path)
        .map_err(|e| PasteError::io(format!("Failed to read metadata for {}", path.display()), &e))?;
    if meta.is_dir() {
        fs::remove_dir_all(path)
            .map_err(|e| PasteError::io("Failed to delete directory".to_string(), &e))
    } else {
        fs::remove_file(path)
            .map_err(|e| PasteError::io("Failed to delete file".to_string(), &e))
    }
}

/// Recursively fold `src` into the existing directory `dest`: children are
/// created or overwritten as needed, destination-only children are never
/// touched. In cut mode each child is moved out individually and the source
/// skeleton is removed by the caller afterwards.
fn merge_dir(src: &Path, dest: &Path, ctx: &TransferContext) -> PasteResult<()> {
    let src_meta = fs::symlink_metadata(src)
        .map_err(|e| PasteError::io("Failed to read source metadata".to_string(), &e))?;
    let dest_meta = fs::symlink_metadata(dest)
        .map_err(|e| PasteError::io("Failed to read target metadata".to_string(), &e))?;
    if !src_meta.is_dir() || !dest_meta.is_dir() {
        return Err(PasteError::invalid_input(
            "Merge requires both source and target to be directories",
        ));
    }

    let read = fs::read_dir(src)
        .map_err(|e| PasteError::io(format!("Failed to read dir {}", src.display()), &e))?;
    for entry in read {
        let entry =
            entry.map_err(|e| PasteError::io("Failed to read dir entry".to_string(), &e))?;
        let path = entry.path();
        let meta = fs::symlink_metadata(&path).map_err(|e| {
            PasteError::io(format!("Failed to read metadata for {}", path.display()), &e)
        })?;
        if meta.file_type().is_symlink() {
            return Err(PasteError::new(
                PasteErrorCode::SymlinkUnsupported,
                "Refusing to copy symlinks",
            ));
        }
        let target = dest.join(entry.file_name());
        let target_meta =
            metadata_if_exists_nofollow(&target).map_err(PasteError::from_external_message)?;
        if matches!(target_meta, Some(ref m) if m.file_type().is_symlink()) {
            return Err(PasteError::new(
                PasteErrorCode::SymlinkUnsupported,
                "Refusing to overwrite symlinks",
            ));
        }
        if meta.is_dir() {
            match target_meta {
                Some(ref m) if m.is_dir() => {
                    merge_dir(&path, &target, ctx)?;
                    if ctx.cut {
                        fs::remove_dir_all(&path).map_err(|e| {
                            PasteError::io(
                                format!("Failed to remove source dir {}", path.display()),
                                &e,
                            )
                        })?;
                    }
                }
                Some(_) => {
                    // A file stands where a directory must go.
                    fs::remove_file(&target).map_err(|e| {
                        PasteError::io(
                            format!("Failed to remove existing file {}", target.display()),
                            &e,
                        )
                    })?;
                    write_entry(&path, &target, ctx)?;
                }
                None => write_entry(&path, &target, ctx)?,
            }
        } else {
            if target_meta.is_some() {
                fs::remove_file(&target).map_err(|e| {
                    PasteError::io(
                        format!("Failed to remove existing file {}", target.display()),
                        &e,
                    )
                })?;
            }
            write_entry(&path, &target, ctx)?;
        }
    }
    Ok(())
}
