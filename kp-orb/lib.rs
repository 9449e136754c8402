//! ORB keypoint detector: FAST-9 corners on a scale pyramid ranked by Harris
//! response, oriented by intensity centroid and described with rotated BRIEF.

pub mod brief;
pub mod builder;
pub mod config;
pub mod corner_detection;
pub mod detector;
pub mod pyramid;
pub mod refinement;
pub mod types;

pub use builder::OrbBuilder;
pub use config::{OrbParams, ScoreType};
pub use detector::OrbDetector;
pub use types::ScaleLevel;
