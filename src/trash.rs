use std::path::Path;

/// Seam for the platform trash so the executor can be tested without touching
/// the real trash and so headless hosts can substitute their own backend.
pub trait TrashProvider: Send + Sync {
    fn move_to_trash(&self, path: &Path) -> Result<(), String>;
}

pub struct SystemTrash;

impl TrashProvider for SystemTrash {
    fn move_to_trash(&self, path: &Path) -> Result<(), String> {
        trash::delete(path).map_err(|e| format!("Failed to move to trash: {e}"))
    }
}
