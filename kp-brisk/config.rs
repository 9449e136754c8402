use kp_core::{DetectError, DetectResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// BRISK detector parameters
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BriskParams {
    /// FAST 9-16 threshold
    pub threshold: u8,
    /// Detection octaves; 0 detects on the input resolution only
    pub octaves: usize,
    /// Scale applied to the sampling pattern
    pub pattern_scale: f32,
}

impl Default for BriskParams {
    fn default() -> Self {
        Self {
            threshold: 30,
            octaves: 3,
            pattern_scale: 1.0,
        }
    }
}

impl BriskParams {
    pub fn validate(&self) -> DetectResult<()> {
        if self.threshold == 0 || self.threshold == u8::MAX {
            return Err(DetectError::invalid_parameter(
                "threshold",
                format!("{} (must be 1-254)", self.threshold),
            ));
        }
        if self.octaves > 8 {
            return Err(DetectError::invalid_parameter(
                "octaves",
                format!("{} (must be 0-8)", self.octaves),
            ));
        }
        if !(self.pattern_scale > 0.0 && self.pattern_scale.is_finite()) {
            return Err(DetectError::invalid_parameter(
                "pattern_scale",
                format!("{} (must be > 0)", self.pattern_scale),
            ));
        }
        Ok(())
    }

    /// Number of detection layers: one octave and one intra-octave layer
    /// per octave
    pub fn layer_count(&self) -> usize {
        if self.octaves == 0 {
            1
        } else {
            2 * self.octaves
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "BRISK: threshold={}, octaves={}, pattern_scale={}",
            self.threshold, self.octaves, self.pattern_scale
        )
    }
}
