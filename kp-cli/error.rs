use std::path::PathBuf;

use kp_core::DetectError;
use thiserror::Error;

use crate::detector_kind::DetectorKind;

/// Failures of a runner operation or CLI invocation
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Unknown detector `{name}` (choose from: {choices})")]
    UnknownDetector { name: String, choices: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Image not found: {}", path.display())]
    ImageNotFound { path: PathBuf },

    #[error("Could not load image {}: {message}", path.display())]
    ImageDecode { path: PathBuf, message: String },

    #[error("Failed to write {}: {message}", path.display())]
    Output { path: PathBuf, message: String },

    #[error("{kind} failed: {source}")]
    Detector {
        kind: DetectorKind,
        #[source]
        source: DetectError,
    },

    #[error("All {0} detectors failed")]
    AllDetectorsFailed(usize),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Error classes reported to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Io,
    Detector,
}

impl ErrorKind {
    /// Process exit code for this class
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::Io => 1,
            ErrorKind::Configuration => 2,
            ErrorKind::Detector => 3,
        }
    }
}

impl RunnerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RunnerError::UnknownDetector { .. } | RunnerError::InvalidConfig(_) => ErrorKind::Configuration,
            RunnerError::ImageNotFound { .. }
            | RunnerError::ImageDecode { .. }
            | RunnerError::Output { .. }
            | RunnerError::Serialization(_) => ErrorKind::Io,
            RunnerError::Detector { .. } | RunnerError::AllDetectorsFailed(_) => ErrorKind::Detector,
        }
    }

    pub(crate) fn output(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        RunnerError::Output {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

pub type RunnerResult<T> = Result<T, RunnerError>;
