use std::path::Path;

/// Split a file name into stem and extension suffix, keeping the dot on the
/// extension side. Leading-dot names like `.config` count as extensionless.
fn split_name(name: &str) -> (&str, &str) {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => {
            let dot = stem.len();
            (&name[..dot], &name[dot..])
        }
        _ => (name, ""),
    }
}

/// Return `name` if it is free in `dir`, otherwise the first free
/// `"stem (n)ext"` for n = 1, 2, … Deterministic; probes the filesystem on
/// each iteration, so a scan-time suggestion may differ from the execution-time
/// result if the directory changed in between. That is fine: the executor
/// always re-runs this against live state.
pub(crate) fn generate_unique(dir: &Path, name: &str) -> String {
    if !dir.join(name).exists() {
        return name.to_string();
    }
    let (stem, ext) = split_name(name);
    let mut n = 1usize;
    loop {
        let candidate = format!("{stem} ({n}){ext}");
        if !dir.join(&candidate).exists() {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_keeps_dot_with_extension() {
        assert_eq!(split_name("report.pdf"), ("report", ".pdf"));
        assert_eq!(split_name("archive.tar.gz"), ("archive.tar", ".gz"));
        assert_eq!(split_name("Makefile"), ("Makefile", ""));
        assert_eq!(split_name(".bashrc"), (".bashrc", ""));
    }
}
