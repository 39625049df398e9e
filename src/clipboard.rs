use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::fs_utils::sanitize_path_follow;

/// One pending selection: the paths the user copied or cut, in selection
/// order. The engine reads it once per paste call and never mutates it.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClipboardState {
    pub file_paths: Vec<PathBuf>,
    pub cut: bool,
}

impl ClipboardState {
    /// Build a selection from raw caller paths, canonicalizing each and
    /// rejecting anything that does not exist.
    pub fn from_paths(paths: Vec<String>, cut: bool) -> Result<Self, String> {
        let mut file_paths = Vec::with_capacity(paths.len());
        for p in paths {
            fs::symlink_metadata(&p).map_err(|e| format!("Path does not exist: {e}"))?;
            file_paths.push(sanitize_path_follow(&p, true)?);
        }
        Ok(Self { file_paths, cut })
    }
}

/// Injected clipboard capability. The engine only needs `get` and `clear`;
/// `set` exists for hosts and tests. Holds at most one pending selection and
/// performs no cross-call locking (callers serialize paste calls).
pub trait ClipboardSlot: Send + Sync {
    fn get(&self) -> Option<ClipboardState>;
    fn set(&self, state: ClipboardState);
    fn clear(&self);
}

/// Default in-process slot.
#[derive(Default)]
pub struct MemoryClipboard {
    inner: Mutex<Option<ClipboardState>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClipboardSlot for MemoryClipboard {
    fn get(&self) -> Option<ClipboardState> {
        self.inner.lock().ok().and_then(|guard| guard.clone())
    }

    fn set(&self, state: ClipboardState) {
        if let Ok(mut guard) = self.inner.lock() {
            *guard = Some(state);
        }
    }

    fn clear(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            *guard = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_holds_one_selection() {
        let slot = MemoryClipboard::new();
        assert!(slot.get().is_none());

        slot.set(ClipboardState {
            file_paths: vec![PathBuf::from("/tmp/a")],
            cut: false,
        });
        let state = slot.get().expect("selection should be present");
        assert_eq!(state.file_paths.len(), 1);
        assert!(!state.cut);

        slot.set(ClipboardState {
            file_paths: vec![PathBuf::from("/tmp/b")],
            cut: true,
        });
        assert!(slot.get().expect("replaced").cut);

        slot.clear();
        assert!(slot.get().is_none());
    }

    #[test]
    fn from_paths_rejects_missing_entries() {
        let missing = std::env::temp_dir().join("ferry-clip-missing-xyz");
        let err = ClipboardState::from_paths(vec![missing.to_string_lossy().to_string()], false)
            .unwrap_err();
        assert!(err.contains("does not exist"), "unexpected error: {err}");
    }
}
