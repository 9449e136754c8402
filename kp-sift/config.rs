use kp_core::{DetectError, DetectResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// SIFT detector parameters
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SiftParams {
    /// Number of strongest features to keep, 0 keeps all
    pub n_features: usize,
    /// Layers per octave
    pub n_octave_layers: usize,
    /// Minimum DoG contrast, in units of the 0..1 intensity range
    pub contrast_threshold: f32,
    /// Maximum principal curvature ratio before a point counts as an edge
    pub edge_threshold: f32,
    /// Blur of the base image
    pub sigma: f32,
    /// Double the input before building the scale space
    pub upscale: bool,
}

impl Default for SiftParams {
    fn default() -> Self {
        Self {
            n_features: 0,
            n_octave_layers: 3,
            contrast_threshold: 0.04,
            edge_threshold: 10.0,
            sigma: 1.6,
            upscale: true,
        }
    }
}

impl SiftParams {
    pub fn validate(&self) -> DetectResult<()> {
        if self.n_octave_layers == 0 || self.n_octave_layers > 10 {
            return Err(DetectError::invalid_parameter(
                "n_octave_layers",
                format!("{} (must be 1-10)", self.n_octave_layers),
            ));
        }
        if !(self.contrast_threshold > 0.0 && self.contrast_threshold.is_finite()) {
            return Err(DetectError::invalid_parameter(
                "contrast_threshold",
                format!("{} (must be > 0)", self.contrast_threshold),
            ));
        }
        if !(self.edge_threshold > 0.0 && self.edge_threshold.is_finite()) {
            return Err(DetectError::invalid_parameter(
                "edge_threshold",
                format!("{} (must be > 0)", self.edge_threshold),
            ));
        }
        if !(self.sigma > 0.0 && self.sigma.is_finite()) {
            return Err(DetectError::invalid_parameter(
                "sigma",
                format!("{} (must be > 0)", self.sigma),
            ));
        }
        Ok(())
    }

    /// Octave index of the first octave relative to the input resolution
    pub fn first_octave(&self) -> i32 {
        if self.upscale {
            -1
        } else {
            0
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "SIFT: n_features={}, n_octave_layers={}, contrast_threshold={}, edge_threshold={}, sigma={}, upscale={}",
            self.n_features,
            self.n_octave_layers,
            self.contrast_threshold,
            self.edge_threshold,
            self.sigma,
            self.upscale
        )
    }
}
