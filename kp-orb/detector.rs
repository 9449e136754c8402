use kp_core::{retain_best, DetectResult, Descriptors, FeatureDetector, Image, Keypoint};
use rayon::prelude::*;
use tracing::debug;

use crate::brief::{self, BriefGenerator, DESCRIPTOR_BYTES};
use crate::config::{OrbParams, ScoreType};
use crate::corner_detection::CornerDetector;
use crate::pyramid::ImagePyramid;
use crate::refinement::KeypointRefinement;
use crate::types::ScaleLevel;

/// Oriented FAST and Rotated BRIEF detector
#[derive(Debug, Clone)]
pub struct OrbDetector {
    params: OrbParams,
    brief: BriefGenerator,
    extents: Vec<usize>,
}

impl OrbDetector {
    /// Creates a new ORB detector with validation
    pub fn new(params: OrbParams) -> DetectResult<Self> {
        params.validate()?;
        let half = params.patch_size / 2;
        Ok(Self {
            brief: BriefGenerator::new(half as f32),
            extents: KeypointRefinement::circle_extents(half),
            params,
        })
    }

    pub fn builder() -> crate::builder::OrbBuilder {
        crate::builder::OrbBuilder::new()
    }

    /// Get detector configuration
    pub fn params(&self) -> &OrbParams {
        &self.params
    }

    /// Scale levels this detector would use for an image of the given size
    pub fn scale_levels(&self, width: usize, height: usize) -> Vec<ScaleLevel> {
        ImagePyramid::generate_scale_levels(
            width,
            height,
            self.params.scale_factor,
            self.params.n_levels,
            self.params.border(),
        )
    }

    /// Empty when the base image has no room inside the border
    fn pyramid(&self, img: &Image) -> DetectResult<(Vec<ScaleLevel>, Vec<Image>)> {
        let (w, h) = img.dimensions();
        let levels = self.scale_levels(w, h);
        if levels.is_empty() {
            debug!(width = w, height = h, border = self.params.border(), "image too small for an orb level");
        }
        let images = ImagePyramid::build(img, &levels)?;
        Ok((levels, images))
    }

    /// Detect, rank and orient keypoints on a single level
    fn detect_level(&self, img: &Image, level: &ScaleLevel, budget: usize) -> Vec<Keypoint> {
        let candidates = CornerDetector::detect_fast(img, self.params.fast_threshold, self.params.border());
        let found = candidates.len();

        let mut keypoints: Vec<Keypoint> = candidates
            .into_iter()
            .map(|c| Keypoint {
                x: c.x as f32,
                y: c.y as f32,
                size: self.params.patch_size as f32,
                angle: 0.0,
                response: c.fast_score as f32,
                octave: level.level as i32,
            })
            .collect();

        if self.params.score_type == ScoreType::Harris {
            // Pre-filter on the FAST score, then rank the rest by Harris
            keypoints = retain_best(keypoints, budget.saturating_mul(2));
            for kp in keypoints.iter_mut() {
                kp.response = CornerDetector::harris_response(img, kp.x as usize, kp.y as usize);
            }
        }
        keypoints = retain_best(keypoints, budget);

        for kp in keypoints.iter_mut() {
            kp.angle = KeypointRefinement::compute_orientation(img, kp.x as usize, kp.y as usize, &self.extents);
            kp.x *= level.scale;
            kp.y *= level.scale;
            kp.size *= level.scale;
        }

        debug!(
            level = level.level,
            width = level.width,
            height = level.height,
            candidates = found,
            kept = keypoints.len(),
            "orb level"
        );
        keypoints
    }
}

impl FeatureDetector for OrbDetector {
    fn name(&self) -> &'static str {
        "ORB"
    }

    fn detect(&self, img: &Image) -> DetectResult<Vec<Keypoint>> {
        let (levels, images) = self.pyramid(img)?;
        if levels.is_empty() {
            return Ok(Vec::new());
        }
        let budgets = ImagePyramid::features_per_level(self.params.n_features, self.params.scale_factor, levels.len());

        let per_level: Vec<Vec<Keypoint>> = levels
            .par_iter()
            .zip(images.par_iter())
            .zip(budgets.par_iter())
            .map(|((level, image), &budget)| self.detect_level(image, level, budget))
            .collect();

        Ok(per_level.into_iter().flatten().collect())
    }

    fn compute(&self, img: &Image, keypoints: Vec<Keypoint>) -> DetectResult<(Vec<Keypoint>, Descriptors)> {
        let (levels, images) = self.pyramid(img)?;
        if levels.is_empty() || keypoints.is_empty() {
            return Ok((Vec::new(), Descriptors::empty_binary(DESCRIPTOR_BYTES)));
        }
        let smoothed: Vec<Image> = images.iter().map(brief::smooth).collect::<DetectResult<_>>()?;

        // Level-local coordinates for each keypoint
        let last = levels.len() - 1;
        let points: Vec<(usize, (f32, f32, f32))> = keypoints
            .iter()
            .map(|kp| {
                let level = (kp.octave.max(0) as usize).min(last);
                let scale = levels[level].scale;
                (level, (kp.x / scale, kp.y / scale, kp.angle))
            })
            .collect();

        let mut rows: Vec<Option<brief::Descriptor>> = vec![None; keypoints.len()];
        for (level, image) in smoothed.iter().enumerate() {
            let indices: Vec<usize> = (0..points.len()).filter(|&i| points[i].0 == level).collect();
            if indices.is_empty() {
                continue;
            }
            let level_points: Vec<(f32, f32, f32)> = indices.iter().map(|&i| points[i].1).collect();
            let described = self.brief.generate_descriptors(image, &level_points);
            for (i, d) in indices.into_iter().zip(described) {
                rows[i] = d;
            }
        }

        let mut kept = Vec::with_capacity(keypoints.len());
        let mut data = Vec::with_capacity(keypoints.len() * DESCRIPTOR_BYTES);
        for (kp, row) in keypoints.into_iter().zip(rows) {
            if let Some(d) = row {
                kept.push(kp);
                data.extend_from_slice(&d);
            }
        }
        Ok((kept, Descriptors::Binary { bytes: DESCRIPTOR_BYTES, data }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kp_core::synthetic::squares_scene;
    use kp_core::DetectError;

    fn create_test_params() -> OrbParams {
        OrbParams::default()
    }

    #[test]
    fn test_valid_constructor() {
        assert!(OrbDetector::new(create_test_params()).is_ok());
    }

    #[test]
    fn test_invalid_params_rejected() {
        let params = OrbParams {
            fast_threshold: 0,
            ..create_test_params()
        };
        assert!(matches!(OrbDetector::new(params), Err(DetectError::InvalidParameter { .. })));
    }

    #[test]
    fn test_small_image_yields_no_keypoints() {
        let detector = OrbDetector::new(create_test_params()).unwrap();
        // Below 63 px on either side no level fits inside the border
        for (w, h) in [(1, 1), (40, 40), (300, 50)] {
            let img = Image::filled(w, h, 0).unwrap();
            assert!(detector.scale_levels(w, h).is_empty());
            let features = detector.detect_and_compute(&img, true).unwrap();
            assert!(features.keypoints.is_empty());
            let descriptors = features.descriptors.unwrap();
            assert_eq!((descriptors.rows(), descriptors.row_len()), (0, 32));
        }
    }

    #[test]
    fn test_uniform_image_detection() {
        let detector = OrbDetector::new(create_test_params()).unwrap();
        let img = Image::filled(128, 128, 128).unwrap();
        let keypoints = detector.detect(&img).unwrap();
        // Uniform image should have no corners
        assert!(keypoints.is_empty());
    }

    #[test]
    fn test_corner_detection() {
        let detector = OrbDetector::new(create_test_params()).unwrap();
        let img = squares_scene(256, 256).unwrap();
        let keypoints = detector.detect(&img).unwrap();
        assert!(!keypoints.is_empty());
        assert!(keypoints.len() <= 500);
        for kp in &keypoints {
            assert!(kp.x >= 0.0 && kp.x < 256.0);
            assert!(kp.y >= 0.0 && kp.y < 256.0);
            assert!(kp.size >= 31.0);
            assert!(kp.angle.is_finite());
        }
    }

    #[test]
    fn test_feature_budget_is_respected() {
        let params = OrbParams {
            n_features: 10,
            ..create_test_params()
        };
        let detector = OrbDetector::new(params).unwrap();
        let img = squares_scene(256, 256).unwrap();
        assert!(detector.detect(&img).unwrap().len() <= 10);
    }

    #[test]
    fn test_descriptors_line_up() {
        let detector = OrbDetector::new(create_test_params()).unwrap();
        let img = squares_scene(256, 256).unwrap();
        let features = detector.detect_and_compute(&img, true).unwrap();
        let descriptors = features.descriptors.unwrap();
        assert_eq!(descriptors.rows(), features.keypoints.len());
        assert_eq!(descriptors.row_len(), 32);
        assert!(!features.keypoints.is_empty());
    }

    #[test]
    fn test_detection_is_deterministic() {
        let detector = OrbDetector::new(create_test_params()).unwrap();
        let img = squares_scene(256, 256).unwrap();
        let a = detector.detect_and_compute(&img, true).unwrap();
        let b = detector.detect_and_compute(&img, true).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_fast_score_ranking() {
        let detector = OrbDetector::new(OrbParams::fast_preset()).unwrap();
        let img = squares_scene(256, 256).unwrap();
        let keypoints = detector.detect(&img).unwrap();
        for kp in &keypoints {
            // FAST scores are at least the threshold
            assert!(kp.response >= 30.0);
        }
    }
}
