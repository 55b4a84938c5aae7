//! Error types for the library front-end core

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the core and its collaborators
#[derive(Error, Debug)]
pub enum ShelfError {
    /// Content ID did not have the 16 hex character shape
    #[error("Invalid content id '{id}': {reason}")]
    InvalidContentId { id: String, reason: String },

    /// A companion file required by an action is absent
    #[error("Missing file: {}", path.display())]
    MissingFile { path: PathBuf },

    /// An action needs a selected entry and there is none
    #[error("No entry selected for '{action}'")]
    MissingSelection { action: String },

    /// File system I/O errors with file context
    #[error("File operation failed on '{}'", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Settings could not be read or written
    #[error("Invalid settings: {message}")]
    Settings { message: String, key: Option<String> },

    #[error("Settings file is not valid JSON")]
    Json(#[from] serde_json::Error),

    /// An external collaborator (decrypt, archive, library, download) failed
    #[error("{collaborator} failed: {message}")]
    Collaborator {
        collaborator: &'static str,
        message: String,
    },

    /// Foreground process could not be started or stopped
    #[error("Process error for '{}': {message}", program.display())]
    Process { program: PathBuf, message: String },

    /// Action declined by the user or aborted by shutdown
    #[error("Cancelled: {reason}")]
    Cancelled { reason: String },
}

pub type Result<T> = std::result::Result<T, ShelfError>;

/// Error severity levels for prioritization
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ShelfError {
    pub fn io<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        ShelfError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn collaborator<S: Into<String>>(collaborator: &'static str, message: S) -> Self {
        ShelfError::Collaborator {
            collaborator,
            message: message.into(),
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            ShelfError::InvalidContentId { .. } => "invalid_content_id",
            ShelfError::MissingFile { .. } => "missing_file",
            ShelfError::MissingSelection { .. } => "missing_selection",
            ShelfError::Io { .. } => "io",
            ShelfError::Settings { .. } => "settings",
            ShelfError::Json(_) => "json",
            ShelfError::Collaborator { .. } => "collaborator",
            ShelfError::Process { .. } => "process",
            ShelfError::Cancelled { .. } => "cancelled",
        }
    }

    /// Malformed input and absent resources never escalate past a log line
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ShelfError::InvalidContentId { .. } => ErrorSeverity::Low,
            ShelfError::MissingSelection { .. } => ErrorSeverity::Low,
            ShelfError::Cancelled { .. } => ErrorSeverity::Low,
            ShelfError::MissingFile { .. } => ErrorSeverity::Medium,
            ShelfError::Collaborator { .. } => ErrorSeverity::Medium,
            ShelfError::Process { .. } => ErrorSeverity::High,
            ShelfError::Settings { .. } => ErrorSeverity::High,
            ShelfError::Json(_) => ErrorSeverity::High,
            ShelfError::Io { .. } => ErrorSeverity::High,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_id_is_low_severity() {
        let err = ShelfError::InvalidContentId {
            id: "xyz".to_string(),
            reason: "expected 16 characters, got 3".to_string(),
        };
        assert_eq!(err.category(), "invalid_content_id");
        assert_eq!(err.severity(), ErrorSeverity::Low);
        assert!(err.to_string().contains("xyz"));
    }

    #[test]
    fn test_missing_file_display() {
        let err = ShelfError::MissingFile {
            path: PathBuf::from("/library/game/tmd"),
        };
        assert_eq!(err.to_string(), "Missing file: /library/game/tmd");
        assert!(err.severity() > ErrorSeverity::Low);
    }
}
