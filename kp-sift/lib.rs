//! SIFT keypoint detector: difference-of-Gaussian extrema refined to
//! sub-pixel accuracy, oriented by gradient histograms and described by
//! 128-bin float vectors.

pub mod config;
pub mod descriptor;
pub mod detector;
pub mod extrema;
pub mod orientation;
pub mod scale_space;

pub use config::SiftParams;
pub use detector::SiftDetector;
