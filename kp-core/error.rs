use thiserror::Error;

/// Failures a detector can report for a single call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DetectError {
    #[error("Invalid image dimensions: {width}x{height} (must be > 0)")]
    InvalidImageSize { width: usize, height: usize },

    #[error("Image data length mismatch: expected {expected_len}, got {actual_len}")]
    InvalidImageData { expected_len: usize, actual_len: usize },

    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Keypoint/descriptor mismatch: {keypoints} keypoints, {rows} descriptor rows")]
    DescriptorMismatch { keypoints: usize, rows: usize },

    #[error("{0}")]
    Internal(String),
}

impl DetectError {
    pub fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        DetectError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

pub type DetectResult<T> = Result<T, DetectError>;
