//! Conflict-aware file transfer engine for file managers.
//!
//! The engine copies or moves a previously selected set of files and
//! directories into a destination, enumerates every naming collision up
//! front (bounded for display, exact for counting), validates a declarative
//! two-tier resolution policy before any write, and then executes
//! copy/move/merge/overwrite/trash per entry with progress reporting and
//! cancellation. Clipboard, task tracking and trash are injected
//! collaborators, so any transport (IPC command, HTTP handler, CLI) can wrap
//! the same engine.

pub mod clipboard;
pub mod errors;
pub mod fs_utils;
pub mod logging;
pub mod paste;
pub mod tasks;
pub mod trash;

pub use clipboard::{ClipboardSlot, ClipboardState, MemoryClipboard};
pub use errors::{ApiError, ApiResult};
pub use paste::{
    ConflictEntry, ConflictReport, ConflictResolution, EntryKind, EntryResolution, PasteEngine,
    PasteError, PasteErrorCode, PasteOutcome, PasteResult,
};
pub use tasks::{TaskDescriptor, TaskEvent, TaskId, TaskTracker};
pub use trash::{SystemTrash, TrashProvider};
