use crate::errors::{
    self, classify_io_error, classify_io_hint_from_message, classify_message_by_patterns,
    DomainError, ErrorCode, IoErrorHint,
};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasteErrorCode {
    InvalidInput,
    ClipboardEmpty,
    NotDirectory,
    SameDirectory,
    InvalidResolution,
    DuplicateDestination,
    NothingToPaste,
    SymlinkUnsupported,
    DestinationExists,
    Cancelled,
    TrashFailed,
    TaskFailed,
    IoError,
    UnknownError,
}

impl ErrorCode for PasteErrorCode {
    fn as_code_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::ClipboardEmpty => "clipboard_empty",
            Self::NotDirectory => "not_directory",
            Self::SameDirectory => "same_directory",
            Self::InvalidResolution => "invalid_resolution",
            Self::DuplicateDestination => "duplicate_destination",
            Self::NothingToPaste => "nothing_to_paste",
            Self::SymlinkUnsupported => "symlink_unsupported",
            Self::DestinationExists => "destination_exists",
            Self::Cancelled => "cancelled",
            Self::TrashFailed => "trash_failed",
            Self::TaskFailed => "task_failed",
            Self::IoError => "io_error",
            Self::UnknownError => "unknown_error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PasteError {
    code: PasteErrorCode,
    message: String,
}

impl PasteError {
    pub fn new(code: PasteErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(PasteErrorCode::InvalidInput, message)
    }

    pub fn resolution(message: impl Into<String>) -> Self {
        Self::new(PasteErrorCode::InvalidResolution, message)
    }

    pub fn cancelled() -> Self {
        Self::new(PasteErrorCode::Cancelled, "Paste cancelled")
    }

    pub fn io(context: impl fmt::Display, error: &std::io::Error) -> Self {
        let code = match classify_io_error(error) {
            IoErrorHint::AlreadyExists => PasteErrorCode::DestinationExists,
            _ => PasteErrorCode::IoError,
        };
        Self::new(code, format!("{context}: {error}"))
    }

    pub fn code(&self) -> PasteErrorCode {
        self.code
    }

    pub fn from_external_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if let Some(hint) = classify_io_hint_from_message(&message) {
            let code = match hint {
                IoErrorHint::AlreadyExists => Some(PasteErrorCode::DestinationExists),
                IoErrorHint::NotFound
                | IoErrorHint::PermissionDenied
                | IoErrorHint::ReadOnlyFilesystem => Some(PasteErrorCode::IoError),
                _ => None,
            };
            if let Some(code) = code {
                return Self::new(code, message);
            }
        }

        let code = classify_message_by_patterns(
            &message,
            PASTE_CLASSIFICATION_RULES,
            PasteErrorCode::UnknownError,
        );
        Self::new(code, message)
    }
}

impl fmt::Display for PasteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for PasteError {}

impl DomainError for PasteError {
    fn code_str(&self) -> &'static str {
        self.code.as_code_str()
    }

    fn message(&self) -> &str {
        &self.message
    }
}

pub type PasteResult<T> = Result<T, PasteError>;

pub fn map_api_result<T>(result: PasteResult<T>) -> errors::ApiResult<T> {
    errors::map_api_result(result)
}

const PASTE_CLASSIFICATION_RULES: &[(PasteErrorCode, &[&str])] = &[
    (PasteErrorCode::Cancelled, &["paste cancelled"]),
    (
        PasteErrorCode::ClipboardEmpty,
        &["no files in clipboard", "clipboard is empty"],
    ),
    (
        PasteErrorCode::SameDirectory,
        &["cannot cut and paste in the same directory"],
    ),
    (
        PasteErrorCode::NotDirectory,
        &["destination is not a directory"],
    ),
    (
        PasteErrorCode::TrashFailed,
        &["failed to move to trash"],
    ),
    (
        PasteErrorCode::SymlinkUnsupported,
        &["refusing to copy symlinks", "refusing to overwrite symlinks"],
    ),
    (
        PasteErrorCode::DestinationExists,
        &["already exists", "file exists", "destination exists"],
    ),
    (PasteErrorCode::TaskFailed, &["paste task failed"]),
];
