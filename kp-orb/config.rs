use kp_core::{DetectError, DetectResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How candidates are ranked before the per-level feature budget is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ScoreType {
    Harris,
    Fast,
}

/// ORB detector parameters
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct OrbParams {
    /// Maximum number of features to retain
    pub n_features: usize,
    /// Pyramid decimation ratio (> 1)
    pub scale_factor: f32,
    /// Number of pyramid levels
    pub n_levels: usize,
    /// Border where no features are detected
    pub edge_threshold: usize,
    /// FAST segment-test threshold
    pub fast_threshold: u8,
    /// Side of the patch used for orientation and BRIEF
    pub patch_size: usize,
    pub score_type: ScoreType,
}

impl Default for OrbParams {
    fn default() -> Self {
        Self {
            n_features: 500,
            scale_factor: 1.2,
            n_levels: 8,
            edge_threshold: 31,
            fast_threshold: 20,
            patch_size: 31,
            score_type: ScoreType::Harris,
        }
    }
}

impl OrbParams {
    /// Fewer levels and a higher threshold, ranked by FAST score
    pub fn fast_preset() -> Self {
        Self {
            n_features: 300,
            n_levels: 4,
            fast_threshold: 30,
            score_type: ScoreType::Fast,
            ..Self::default()
        }
    }

    /// More features over a finer pyramid
    pub fn quality_preset() -> Self {
        Self {
            n_features: 2000,
            scale_factor: 1.15,
            n_levels: 10,
            fast_threshold: 12,
            ..Self::default()
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> DetectResult<()> {
        if self.n_features == 0 {
            return Err(DetectError::invalid_parameter("n_features", "must be > 0"));
        }
        if !(self.scale_factor > 1.0 && self.scale_factor.is_finite()) {
            return Err(DetectError::invalid_parameter(
                "scale_factor",
                format!("{} (must be > 1)", self.scale_factor),
            ));
        }
        if self.n_levels == 0 || self.n_levels > 32 {
            return Err(DetectError::invalid_parameter(
                "n_levels",
                format!("{} (must be 1-32)", self.n_levels),
            ));
        }
        if self.fast_threshold == 0 || self.fast_threshold > 127 {
            return Err(DetectError::invalid_parameter(
                "fast_threshold",
                format!("{} (must be 1-127)", self.fast_threshold),
            ));
        }
        if self.patch_size < 7 || self.patch_size % 2 == 0 {
            return Err(DetectError::invalid_parameter(
                "patch_size",
                format!("{} (must be odd and >= 7)", self.patch_size),
            ));
        }
        if self.edge_threshold < self.patch_size / 2 {
            return Err(DetectError::invalid_parameter(
                "edge_threshold",
                format!(
                    "{} (must be at least half the patch size, {})",
                    self.edge_threshold,
                    self.patch_size / 2
                ),
            ));
        }
        Ok(())
    }

    /// Pixels kept clear of every level's border
    pub fn border(&self) -> usize {
        self.edge_threshold.max(kp_core::fast::FAST_RADIUS)
    }

    /// Generate human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "ORB: n_features={}, scale_factor={}, n_levels={}, edge_threshold={}, fast_threshold={}, patch_size={}, score={:?}",
            self.n_features,
            self.scale_factor,
            self.n_levels,
            self.edge_threshold,
            self.fast_threshold,
            self.patch_size,
            self.score_type
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(OrbParams::default().validate().is_ok());
        assert!(OrbParams::fast_preset().validate().is_ok());
        assert!(OrbParams::quality_preset().validate().is_ok());
    }

    #[test]
    fn test_invalid_threshold() {
        let mut params = OrbParams::default();
        params.fast_threshold = 0;
        assert!(matches!(
            params.validate(),
            Err(DetectError::InvalidParameter { name: "fast_threshold", .. })
        ));
        params.fast_threshold = 200;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_invalid_patch_size() {
        let params = OrbParams {
            patch_size: 16,
            ..OrbParams::default()
        };
        assert!(matches!(
            params.validate(),
            Err(DetectError::InvalidParameter { name: "patch_size", .. })
        ));
    }

    #[test]
    fn test_edge_threshold_must_cover_patch() {
        let params = OrbParams {
            edge_threshold: 5,
            ..OrbParams::default()
        };
        assert!(matches!(
            params.validate(),
            Err(DetectError::InvalidParameter { name: "edge_threshold", .. })
        ));
    }

    #[test]
    fn test_invalid_scale_factor() {
        let params = OrbParams {
            scale_factor: 1.0,
            ..OrbParams::default()
        };
        assert!(params.validate().is_err());
    }
}
