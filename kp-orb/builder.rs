use kp_core::DetectResult;
use crate::config::{OrbParams, ScoreType};
use crate::detector::OrbDetector;

/// Fluent builder for an `OrbDetector`
#[derive(Debug, Clone, Default)]
pub struct OrbBuilder {
    params: OrbParams,
}

impl OrbBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing parameters
    pub fn from_params(params: OrbParams) -> Self {
        Self { params }
    }

    /// Set the maximum number of retained features
    pub fn n_features(mut self, n: usize) -> Self {
        self.params.n_features = n;
        self
    }

    /// Set the pyramid decimation ratio
    pub fn scale_factor(mut self, factor: f32) -> Self {
        self.params.scale_factor = factor;
        self
    }

    /// Set the number of pyramid levels
    pub fn levels(mut self, n: usize) -> Self {
        self.params.n_levels = n;
        self
    }

    /// Set the border excluded from detection
    pub fn edge_threshold(mut self, pixels: usize) -> Self {
        self.params.edge_threshold = pixels;
        self
    }

    /// Set the FAST threshold (1-127)
    pub fn threshold(mut self, threshold: u8) -> Self {
        self.params.fast_threshold = threshold;
        self
    }

    /// Set the patch size for orientation and BRIEF sampling
    pub fn patch_size(mut self, patch_size: usize) -> Self {
        self.params.patch_size = patch_size;
        self
    }

    /// Rank candidates by Harris response or by FAST score
    pub fn score(mut self, score_type: ScoreType) -> Self {
        self.params.score_type = score_type;
        self
    }

    /// Apply the fast preset
    pub fn preset_fast(mut self) -> Self {
        self.params = OrbParams::fast_preset();
        self
    }

    /// Apply the quality preset
    pub fn preset_quality(mut self) -> Self {
        self.params = OrbParams::quality_preset();
        self
    }

    pub fn params(&self) -> &OrbParams {
        &self.params
    }

    /// Validate the parameters and build the detector
    pub fn build(self) -> DetectResult<OrbDetector> {
        OrbDetector::new(self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_fields() {
        let builder = OrbBuilder::new()
            .n_features(42)
            .scale_factor(1.3)
            .levels(4)
            .edge_threshold(20)
            .threshold(25)
            .patch_size(21)
            .score(ScoreType::Fast);
        let p = builder.params();
        assert_eq!(p.n_features, 42);
        assert_eq!(p.n_levels, 4);
        assert_eq!(p.edge_threshold, 20);
        assert_eq!(p.fast_threshold, 25);
        assert_eq!(p.patch_size, 21);
        assert_eq!(p.score_type, ScoreType::Fast);
        assert!(builder.build().is_ok());
    }

    #[test]
    fn test_builder_validates_on_build() {
        assert!(OrbBuilder::new().patch_size(10).build().is_err());
        assert!(OrbBuilder::new().levels(0).build().is_err());
    }

    #[test]
    fn test_presets() {
        let fast = OrbBuilder::new().preset_fast().build().unwrap();
        assert_eq!(fast.params(), &OrbParams::fast_preset());
        let quality = OrbBuilder::from_params(OrbParams::default()).preset_quality();
        assert_eq!(quality.params().n_features, 2000);
    }
}
