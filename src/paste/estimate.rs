use std::path::PathBuf;
use walkdir::WalkDir;

/// How deep the progress pre-count looks before giving up and calling the
/// total an estimate. Conflict scanning deliberately does NOT share this
/// bound; a fast denominator is acceptable, an inexact conflict picture is
/// not.
const MAX_ESTIMATE_DEPTH: usize = 4;

pub(crate) struct TransferEstimate {
    pub files: u64,
    pub estimated: bool,
}

/// Count the leaf files about to be transferred, depth-limited. `estimated`
/// flags a truncated walk so hosts can label the percentage accordingly.
pub(crate) fn estimate_file_count(sources: &[PathBuf]) -> TransferEstimate {
    let mut files = 0u64;
    let mut truncated = false;
    for src in sources {
        for entry in WalkDir::new(src)
            .max_depth(MAX_ESTIMATE_DEPTH)
            .into_iter()
            .filter_map(Result::ok)
        {
            if entry.file_type().is_file() {
                files += 1;
            } else if entry.file_type().is_dir() && entry.depth() == MAX_ESTIMATE_DEPTH {
                truncated = true;
            }
        }
    }
    TransferEstimate {
        files: files.max(1),
        estimated: truncated,
    }
}
