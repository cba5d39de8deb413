//! Error types for prootctl.

use thiserror::Error;

/// Main error type for setup and management operations.
#[derive(Error, Debug)]
pub enum SetupError {
    /// A required external tool or installation is missing.
    #[error("{message}")]
    Environment { message: String },

    /// An installer or controller step failed.
    #[error("{message}")]
    Install { message: String },

    /// Configuration resolution errors.
    #[error("Configuration error: {kind}")]
    Validation { kind: ValidationErrorKind },

    /// Subprocess execution errors.
    #[error("Command error: {kind}")]
    Command { kind: CommandErrorKind },

    /// Binary acquisition errors (download, checksum, extraction, validation).
    #[error("{kind}")]
    Artifact { kind: ArtifactErrorKind },

    /// Another instance already holds the operation lock.
    #[error("Another prootctl instance already holds the '{name}' lock.")]
    Lock { name: String },

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration validation error kinds.
#[derive(Error, Debug)]
pub enum ValidationErrorKind {
    #[error("invalid port in {var}: '{value}' (expected 1-65535)")]
    InvalidPort { var: String, value: String },

    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },

    #[error("invalid value for {var}: '{value}' (expected one of: yes, no)")]
    InvalidFlag { var: String, value: String },
}

/// Subprocess error kinds.
#[derive(Error, Debug)]
pub enum CommandErrorKind {
    #[error("failed to spawn {program}: {message}")]
    SpawnFailed { program: String, message: String },

    #[error("{program} exited with status {code:?}: {stderr}")]
    NonZeroExit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// Binary acquisition error kinds.
///
/// Each variant carrying a reserved exit code maps one failure class of the
/// collector install path (see [`SetupError::exit_code`]).
#[derive(Error, Debug)]
pub enum ArtifactErrorKind {
    #[error("Download failed: {message}")]
    DownloadFailed { url: String, message: String },

    #[error("Checksum mismatch! Expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Extraction failed: {message}")]
    ExtractionFailed { message: String },

    #[error("Could not locate {name} inside archive.")]
    BinaryNotFound { name: String },

    #[error("Config validation failed")]
    CollectorConfigRejected,
}

impl SetupError {
    /// Process exit code for this error.
    ///
    /// Checksum mismatch, download, extraction, and collector config
    /// validation failures reserve distinct small integers so callers can
    /// distinguish them; everything else exits 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            SetupError::Artifact { kind } => match kind {
                ArtifactErrorKind::ChecksumMismatch { .. } => 3,
                ArtifactErrorKind::DownloadFailed { .. } => 4,
                ArtifactErrorKind::ExtractionFailed { .. } => 5,
                ArtifactErrorKind::CollectorConfigRejected => 6,
                ArtifactErrorKind::BinaryNotFound { .. } => 1,
            },
            _ => 1,
        }
    }
}

/// Result type alias for setup operations.
pub type SetupResult<T> = Result<T, SetupError>;
