use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Canonicalize a caller-supplied path, resolving symlinks, and strip the
/// Windows verbatim prefix so downstream joins produce displayable paths.
/// With `forbid_root` the filesystem root itself is rejected.
pub fn sanitize_path_follow(raw: &str, forbid_root: bool) -> Result<PathBuf, String> {
    let pb = PathBuf::from(raw);
    let canon = match pb.canonicalize() {
        Ok(c) => c,
        Err(e) => {
            debug!(path = %pb.display(), error = ?e, "canonicalize failed");
            return Err(format!("Failed to canonicalize path: {e}"));
        }
    };
    if forbid_root && canon.is_absolute() && canon.parent().is_none() {
        return Err("Refusing to operate on filesystem root".into());
    }
    Ok(normalize_verbatim(&canon))
}

#[cfg(target_os = "windows")]
fn normalize_verbatim(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix(r"\\?\UNC\") {
        return PathBuf::from(format!(r"\\{rest}"));
    }
    if let Some(rest) = s.strip_prefix(r"\\?\") {
        return PathBuf::from(rest);
    }
    path.to_path_buf()
}

#[cfg(not(target_os = "windows"))]
fn normalize_verbatim(path: &Path) -> PathBuf {
    path.to_path_buf()
}

/// Metadata probe that distinguishes "absent" from "unreadable" and does not
/// follow a trailing symlink.
pub fn metadata_if_exists_nofollow(path: &Path) -> Result<Option<fs::Metadata>, String> {
    match fs::symlink_metadata(path) {
        Ok(meta) => Ok(Some(meta)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(format!(
            "Failed to read metadata for {}: {err}",
            path.display()
        )),
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const KI: f64 = 1024.0;
    const MI: f64 = KI * 1024.0;
    const GI: f64 = MI * 1024.0;
    let value = bytes as f64;
    if value >= GI {
        format!("{:.2} GiB", value / GI)
    } else if value >= MI {
        format!("{:.2} MiB", value / MI)
    } else if value >= KI {
        format!("{:.2} KiB", value / KI)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_bytes_picks_unit() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.00 KiB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.00 MiB");
    }

    #[test]
    fn sanitize_rejects_missing_path() {
        let missing = std::env::temp_dir().join("ferry-definitely-not-here-xyz");
        assert!(sanitize_path_follow(&missing.to_string_lossy(), false).is_err());
    }
}
