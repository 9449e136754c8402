use kp_core::{retain_best, DetectResult, Descriptors, FeatureDetector, Image, Keypoint};
use rayon::prelude::*;
use tracing::debug;

use crate::config::SiftParams;
use crate::descriptor::{self, DESCRIPTOR_DIMS};
use crate::extrema::{self, ExtremaParams};
use crate::orientation;
use crate::scale_space::ScaleSpace;

/// Pack a signed octave index and its layer into `Keypoint::octave`
pub fn pack_octave(octave: i32, layer: usize) -> i32 {
    (octave & 0xFF) | ((layer as i32) << 8)
}

/// Inverse of [`pack_octave`]
pub fn unpack_octave(packed: i32) -> (i32, usize) {
    let octave = (packed & 0xFF) as u8 as i8 as i32;
    let layer = ((packed >> 8) & 0xFF) as usize;
    (octave, layer)
}

/// Scale-invariant feature transform detector
#[derive(Debug, Clone)]
pub struct SiftDetector {
    params: SiftParams,
}

impl SiftDetector {
    /// Creates a new SIFT detector with validation
    pub fn new(params: SiftParams) -> DetectResult<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &SiftParams {
        &self.params
    }

    /// `None` when the image is too small for a single octave
    fn scale_space(&self, img: &Image) -> Option<ScaleSpace> {
        let (w, h) = img.dimensions();
        let first_octave = self.params.first_octave();
        if ScaleSpace::octaves_for(w, h, first_octave) == 0 {
            debug!(width = w, height = h, "image too small for a sift octave");
            return None;
        }
        Some(ScaleSpace::build(
            img,
            self.params.n_octave_layers,
            self.params.sigma,
            first_octave,
        ))
    }
}

impl FeatureDetector for SiftDetector {
    fn name(&self) -> &'static str {
        "SIFT"
    }

    fn detect(&self, img: &Image) -> DetectResult<Vec<Keypoint>> {
        let Some(space) = self.scale_space(img) else {
            return Ok(Vec::new());
        };
        let layers = self.params.n_octave_layers;
        let found = extrema::find_extrema(
            &space,
            ExtremaParams {
                contrast_threshold: self.params.contrast_threshold,
                edge_threshold: self.params.edge_threshold,
            },
        );
        let n_extrema = found.len();

        let keypoints: Vec<Keypoint> = found
            .par_iter()
            .flat_map_iter(|e| {
                let scl_octv = e.octave_sigma(self.params.sigma, layers);
                let scale = space.octave_scale(e.octave);
                let mut angles =
                    orientation::dominant_orientations(&space.gaussians[e.octave][e.layer], e.col, e.row, scl_octv);
                if angles.is_empty() {
                    angles.push(0.0);
                }
                let base = Keypoint {
                    x: (e.col as f32 + e.offset.0) * scale,
                    y: (e.row as f32 + e.offset.1) * scale,
                    size: scl_octv * scale * 2.0,
                    angle: 0.0,
                    response: e.contrast,
                    octave: pack_octave(e.octave as i32 + space.first_octave, e.layer),
                };
                angles.into_iter().map(move |angle| Keypoint { angle, ..base })
            })
            .collect();

        let keypoints = if self.params.n_features > 0 {
            retain_best(keypoints, self.params.n_features)
        } else {
            keypoints
        };

        debug!(
            octaves = space.gaussians.len(),
            extrema = n_extrema,
            kept = keypoints.len(),
            "sift scale space"
        );
        Ok(keypoints)
    }

    fn compute(&self, img: &Image, keypoints: Vec<Keypoint>) -> DetectResult<(Vec<Keypoint>, Descriptors)> {
        let Some(space) = self.scale_space(img) else {
            return Ok((Vec::new(), Descriptors::empty_float(DESCRIPTOR_DIMS)));
        };
        let layers = self.params.n_octave_layers;

        let rows: Vec<Option<[f32; DESCRIPTOR_DIMS]>> = keypoints
            .par_iter()
            .map(|kp| {
                let (octave, layer) = unpack_octave(kp.octave);
                let index = octave - space.first_octave;
                if index < 0 || index as usize >= space.gaussians.len() || layer > layers + 2 {
                    return None;
                }
                let index = index as usize;
                let scale = space.octave_scale(index);
                let gaussian = &space.gaussians[index][layer];
                Some(descriptor::describe(
                    gaussian,
                    kp.x / scale,
                    kp.y / scale,
                    kp.angle,
                    kp.size / scale * 0.5,
                ))
            })
            .collect();

        let mut kept = Vec::with_capacity(keypoints.len());
        let mut data = Vec::with_capacity(keypoints.len() * DESCRIPTOR_DIMS);
        for (kp, row) in keypoints.into_iter().zip(rows) {
            if let Some(d) = row {
                kept.push(kp);
                data.extend_from_slice(&d);
            }
        }
        Ok((kept, Descriptors::Float { dims: DESCRIPTOR_DIMS, data }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kp_core::synthetic::squares_scene;
    use kp_core::DetectError;

    fn create_test_params() -> SiftParams {
        // Skip upscaling to keep the scale space small in tests
        SiftParams {
            upscale: false,
            ..SiftParams::default()
        }
    }

    #[test]
    fn test_octave_packing() {
        for (octave, layer) in [(-1, 1), (0, 3), (4, 2)] {
            assert_eq!(unpack_octave(pack_octave(octave, layer)), (octave, layer));
        }
    }

    #[test]
    fn test_invalid_params_rejected() {
        let params = SiftParams {
            n_octave_layers: 0,
            ..create_test_params()
        };
        assert!(matches!(SiftDetector::new(params), Err(DetectError::InvalidParameter { .. })));
    }

    #[test]
    fn test_small_image_yields_no_keypoints() {
        let detector = SiftDetector::new(create_test_params()).unwrap();
        let img = Image::filled(10, 40, 0).unwrap();
        assert!(detector.detect(&img).unwrap().is_empty());

        let features = detector.detect_and_compute(&img, true).unwrap();
        assert!(features.keypoints.is_empty());
        let descriptors = features.descriptors.unwrap();
        assert_eq!((descriptors.rows(), descriptors.row_len()), (0, 128));

        // Upscaling gives a 10 px side room for one octave
        let upscaling = SiftDetector::new(SiftParams::default()).unwrap();
        assert!(upscaling.detect_and_compute(&img, true).is_ok());
        let tiny = Image::filled(1, 1, 0).unwrap();
        assert!(upscaling.detect(&tiny).unwrap().is_empty());
    }

    #[test]
    fn test_uniform_image_detection() {
        let detector = SiftDetector::new(create_test_params()).unwrap();
        let img = Image::filled(96, 96, 90).unwrap();
        assert!(detector.detect(&img).unwrap().is_empty());
    }

    #[test]
    fn test_squares_detection() {
        let detector = SiftDetector::new(create_test_params()).unwrap();
        let img = squares_scene(256, 256).unwrap();
        let keypoints = detector.detect(&img).unwrap();
        assert!(!keypoints.is_empty());
        for kp in &keypoints {
            assert!(kp.x >= 0.0 && kp.x < 256.0);
            assert!(kp.y >= 0.0 && kp.y < 256.0);
            assert!(kp.size > 0.0);
            assert!(kp.response * 3.0 >= 0.04);
            assert!((0.0..std::f32::consts::TAU + 1e-4).contains(&kp.angle));
        }
    }

    #[test]
    fn test_feature_budget_is_respected() {
        let params = SiftParams {
            n_features: 5,
            ..create_test_params()
        };
        let detector = SiftDetector::new(params).unwrap();
        let img = squares_scene(256, 256).unwrap();
        assert!(detector.detect(&img).unwrap().len() <= 5);
    }

    #[test]
    fn test_descriptors_line_up() {
        let detector = SiftDetector::new(create_test_params()).unwrap();
        let img = squares_scene(256, 256).unwrap();
        let features = detector.detect_and_compute(&img, true).unwrap();
        let descriptors = features.descriptors.unwrap();
        assert_eq!(descriptors.rows(), features.keypoints.len());
        assert_eq!(descriptors.row_len(), 128);
        assert_eq!(descriptors.kind_name(), "float");
        if let Descriptors::Float { data, .. } = &descriptors {
            assert!(data.iter().all(|&v| (0.0..=255.0).contains(&v)));
        }
    }

    #[test]
    fn test_detection_is_deterministic() {
        let detector = SiftDetector::new(create_test_params()).unwrap();
        let img = squares_scene(192, 192).unwrap();
        let a = detector.detect_and_compute(&img, true).unwrap();
        let b = detector.detect_and_compute(&img, true).unwrap();
        assert_eq!(a, b);
    }
}
