//! Error types for Chapterize
//!
//! This module defines error types using thiserror for ergonomic error handling.
//! Errors are grouped by the stage that raises them (configuration, input
//! validation, key resolution, engine, output, state, watch) so callers can
//! decide whether a failure ends one file or the whole run.
//!
//! ## Scope of a failure
//!
//! - Configuration errors abort before any work starts.
//! - `FfmpegNotFound` aborts the whole run (batch or watch).
//! - Everything else is caught at the per-file boundary, logged and recorded.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using our ChapterizeError type
pub type Result<T> = std::result::Result<T, ChapterizeError>;

/// Main error type for Chapterize
#[derive(Error, Debug)]
pub enum ChapterizeError {
    // ===== Configuration Errors =====

    /// Environment variable holds a value that cannot be cast
    #[error("Invalid value `{value}` for variable `{name}` (expected {expected})")]
    InvalidEnvVar {
        name: String,
        value: String,
        expected: &'static str,
    },

    /// Configuration is invalid or incomplete
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    // ===== Input Validation Errors =====

    /// Input file extension is not one we know how to decode
    #[error("'{file}' does not have a known type ({supported})")]
    UnsupportedFileType { file: PathBuf, supported: String },

    /// Input path does not exist
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Input path exists but is a directory or special file
    #[error("'{0}' is not a file")]
    NotAFile(PathBuf),

    /// Input file cannot be opened for reading
    #[error("'{0}' is not readable")]
    FileNotReadable(PathBuf),

    // ===== Key Resolution Errors =====

    /// Neither an explicit value nor the auth file supplied any candidate
    #[error("Activation bytes not found: {0}")]
    ActivationBytesNotFound(String),

    /// The engine rejected the activation bytes (checksum mismatch)
    #[error("Activation bytes do not match '{0}'")]
    ActivationBytesMismatch(PathBuf),

    /// Every candidate was tried and none decrypted the file
    #[error("Unable to find valid activation bytes for '{file}' after {attempts} attempt(s): {last_error}")]
    KeyResolutionFailed {
        file: PathBuf,
        attempts: usize,
        #[source]
        last_error: Box<ChapterizeError>,
    },

    // ===== Engine Errors =====

    /// FFmpeg or FFprobe binary not found in PATH
    #[error("FFmpeg not found. Please ensure ffmpeg and ffprobe are installed and in your PATH.")]
    FfmpegNotFound,

    /// FFmpeg or FFprobe exited unsuccessfully
    #[error("{tool} failed: {message}")]
    FfmpegError { tool: &'static str, message: String },

    /// FFprobe output could not be understood
    #[error("Failed to parse probe output for '{file}': {reason}")]
    ProbeParseFailed { file: PathBuf, reason: String },

    /// Cover art could not be exported
    #[error("Failed to export cover art for '{file}': {source}")]
    CoverExportFailed {
        file: PathBuf,
        #[source]
        source: Box<ChapterizeError>,
    },

    /// A single chapter could not be exported
    #[error("Failed to export chapter {track} '{title}': {source}")]
    ChapterExportFailed {
        track: usize,
        title: String,
        #[source]
        source: Box<ChapterizeError>,
    },

    // ===== Output Errors =====

    /// Output base path exists but is not a directory
    #[error("'{0}' is not a directory")]
    NotADirectory(PathBuf),

    /// Output directory cannot be written to
    #[error("'{0}' is not writable")]
    DirectoryNotWritable(PathBuf),

    // ===== State Errors =====

    /// State file or lock could not be read or written
    #[error("State file error at '{path}': {message}")]
    StateFileError { path: PathBuf, message: String },

    // ===== Watch Errors =====

    /// Filesystem watcher failed
    #[error("Watch error: {0}")]
    WatchError(#[from] notify::Error),

    /// A supervised component exited while the daemon was running
    #[error("{0} stopped unexpectedly")]
    ComponentStopped(&'static str),

    // ===== General Errors =====

    /// Operation was cancelled by user or system
    #[error("Operation cancelled")]
    Cancelled,

    /// Internal error that should not normally occur
    #[error("Internal error: {0}")]
    InternalError(String),

    // ===== External Library Errors =====

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    /// Invalid glob pattern
    #[error("Invalid glob pattern: {0}")]
    GlobPattern(#[from] glob::PatternError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<tokio::task::JoinError> for ChapterizeError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_cancelled() {
            ChapterizeError::Cancelled
        } else {
            ChapterizeError::InternalError(format!("Task failed: {}", err))
        }
    }
}

// Helper methods for creating and classifying errors
impl ChapterizeError {
    /// Create an InvalidEnvVar error
    pub fn invalid_env<N: Into<String>, V: Into<String>>(
        name: N,
        value: V,
        expected: &'static str,
    ) -> Self {
        ChapterizeError::InvalidEnvVar {
            name: name.into(),
            value: value.into(),
            expected,
        }
    }

    /// Create an FfmpegError for the given tool
    pub fn ffmpeg<S: Into<String>>(tool: &'static str, message: S) -> Self {
        ChapterizeError::FfmpegError {
            tool,
            message: message.into(),
        }
    }

    /// Create a StateFileError
    pub fn state_file<S: Into<String>>(path: impl Into<PathBuf>, message: S) -> Self {
        ChapterizeError::StateFileError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an InternalError with a message
    pub fn internal<S: Into<String>>(message: S) -> Self {
        ChapterizeError::InternalError(message.into())
    }

    /// Check if error must stop the whole run rather than a single file
    ///
    /// Returns `true` for configuration errors and a missing engine binary.
    /// Wrapped errors are inspected so a missing engine surfacing during a
    /// cover or chapter export still stops the run.
    pub fn is_fatal_for_run(&self) -> bool {
        match self {
            ChapterizeError::FfmpegNotFound
            | ChapterizeError::InvalidEnvVar { .. }
            | ChapterizeError::ConfigurationError(_) => true,
            ChapterizeError::CoverExportFailed { source, .. }
            | ChapterizeError::ChapterExportFailed { source, .. } => source.is_fatal_for_run(),
            _ => false,
        }
    }

    /// Check if error means "wrong activation bytes, try the next candidate"
    pub fn is_key_mismatch(&self) -> bool {
        matches!(self, ChapterizeError::ActivationBytesMismatch(_))
    }

    /// Check if error is related to the input file itself
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ChapterizeError::UnsupportedFileType { .. }
                | ChapterizeError::FileNotFound(_)
                | ChapterizeError::NotAFile(_)
                | ChapterizeError::FileNotReadable(_)
        )
    }

    /// Get user-friendly error message suitable for display
    pub fn user_message(&self) -> String {
        match self {
            ChapterizeError::ActivationBytesNotFound(_) => {
                "Activation bytes not found. Pass --activation-bytes, set ACTIVATION_BYTES, or place them in the .auth file of the output directory.".to_string()
            }
            ChapterizeError::KeyResolutionFailed { file, attempts, .. } => {
                format!(
                    "None of the {} activation bytes candidate(s) could decrypt '{}'.",
                    attempts,
                    file.display()
                )
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ffmpeg_not_found_is_fatal() {
        assert!(ChapterizeError::FfmpegNotFound.is_fatal_for_run());
        let wrapped = ChapterizeError::ChapterExportFailed {
            track: 2,
            title: "Two".to_string(),
            source: Box::new(ChapterizeError::FfmpegNotFound),
        };
        assert!(wrapped.is_fatal_for_run());
    }

    #[test]
    fn test_per_file_errors_are_not_fatal() {
        assert!(!ChapterizeError::FileNotFound(PathBuf::from("a.aax")).is_fatal_for_run());
        assert!(!ChapterizeError::ffmpeg("ffmpeg", "boom").is_fatal_for_run());
        assert!(!ChapterizeError::Cancelled.is_fatal_for_run());
    }

    #[test]
    fn test_key_resolution_failure_keeps_last_error() {
        let err = ChapterizeError::KeyResolutionFailed {
            file: PathBuf::from("book.aax"),
            attempts: 3,
            last_error: Box::new(ChapterizeError::ActivationBytesMismatch(PathBuf::from(
                "book.aax",
            ))),
        };
        let message = err.to_string();
        assert!(message.contains("3 attempt(s)"));
        assert!(message.contains("do not match"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_unsupported_type_message() {
        let err = ChapterizeError::UnsupportedFileType {
            file: PathBuf::from("notes.txt"),
            supported: "aax, aac, m4b".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "'notes.txt' does not have a known type (aax, aac, m4b)"
        );
        assert!(err.is_input_error());
    }
}
