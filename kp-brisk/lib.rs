//! BRISK keypoint detector: FAST 9-16 corners maximal across octave and
//! intra-octave layers, described by comparisons over a concentric ring
//! sampling pattern.

pub mod config;
pub mod detector;
pub mod integral;
pub mod pattern;
pub mod scale_space;

pub use config::BriskParams;
pub use detector::BriskDetector;
