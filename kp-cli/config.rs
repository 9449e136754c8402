use std::path::Path;

use kp_brisk::BriskParams;
use kp_orb::OrbParams;
use kp_sift::SiftParams;
use serde::{Deserialize, Serialize};

use crate::detector_kind::DetectorKind;
use crate::error::{RunnerError, RunnerResult};

/// How keypoints are drawn on the annotated image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawStyle {
    /// Circles sized by keypoint size plus an orientation tick; plain
    /// fixed-size circles otherwise
    pub rich: bool,
    /// Smallest circle radius in pixels
    pub radius_floor: u32,
    /// Draw at most this many keypoints, 0 draws all
    pub max_keypoints: usize,
    pub color: [u8; 3],
}

impl Default for DrawStyle {
    fn default() -> Self {
        Self {
            rich: true,
            radius_floor: 3,
            max_keypoints: 0,
            color: [255, 0, 0],
        }
    }
}

/// Runner settings, loaded from TOML with every field defaulted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Request descriptors as well as keypoints
    pub compute_descriptors: bool,
    /// Worker threads inside a detector call, 0 for one per CPU
    pub threads: usize,
    pub orb: OrbParams,
    pub sift: SiftParams,
    pub brisk: BriskParams,
    pub draw: DrawStyle,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            compute_descriptors: true,
            threads: 1,
            orb: OrbParams::default(),
            sift: SiftParams::default(),
            brisk: BriskParams::default(),
            draw: DrawStyle::default(),
        }
    }
}

impl RunnerConfig {
    pub fn from_toml_str(s: &str) -> RunnerResult<Self> {
        let config: RunnerConfig = toml::from_str(s).map_err(|e| RunnerError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a TOML file
    pub fn load(path: &Path) -> RunnerResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RunnerError::InvalidConfig(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> RunnerResult<String> {
        toml::to_string_pretty(self).map_err(|e| RunnerError::Serialization(e.to_string()))
    }

    /// Check every detector's parameters
    pub fn validate(&self) -> RunnerResult<()> {
        for kind in DetectorKind::ALL {
            kind.build(self)?;
        }
        Ok(())
    }
}
