//! Runs SIFT, ORB and BRISK keypoint detectors on an image, draws the
//! keypoints and compares counts and timings across detectors.

pub mod config;
pub mod detector_kind;
pub mod error;
pub mod report;
pub mod runner;
pub mod visualize;

pub use config::{DrawStyle, RunnerConfig};
pub use detector_kind::{DetectorKind, Mode};
pub use error::{ErrorKind, RunnerError, RunnerResult};
pub use report::{ComparisonEntry, ComparisonReport, DetectionSummary};
pub use runner::{DetectionResult, DetectorRunner, FsLoader, ImageLoader, LoadedImage, RunOutcome};

pub use kp_core::{self, Descriptors, FeatureDetector, Image, Keypoint};

/// Size the global Rayon pool used inside detector calls
pub fn init_threads(threads: usize) -> RunnerResult<()> {
    kp_core::init_thread_pool(threads).map_err(|e| RunnerError::InvalidConfig(format!("thread pool: {}", e)))
}
