use kp_core::{DetectResult, Descriptors, FeatureDetector, Image, Keypoint};
use rayon::prelude::*;
use tracing::debug;

use crate::config::BriskParams;
use crate::integral::IntegralImage;
use crate::pattern::{BriskPattern, BASIC_SIZE, DESCRIPTOR_BYTES};
use crate::scale_space::{ScaleSpace, MIN_LAYER_SIDE};

/// Binary robust invariant scalable keypoints
#[derive(Debug, Clone)]
pub struct BriskDetector {
    params: BriskParams,
    pattern: BriskPattern,
}

impl BriskDetector {
    /// Creates a new BRISK detector with validation
    pub fn new(params: BriskParams) -> DetectResult<Self> {
        params.validate()?;
        Ok(Self {
            pattern: BriskPattern::new(params.pattern_scale),
            params,
        })
    }

    pub fn params(&self) -> &BriskParams {
        &self.params
    }

    pub fn pattern(&self) -> &BriskPattern {
        &self.pattern
    }
}

impl FeatureDetector for BriskDetector {
    fn name(&self) -> &'static str {
        "BRISK"
    }

    fn detect(&self, img: &Image) -> DetectResult<Vec<Keypoint>> {
        let (w, h) = img.dimensions();
        if w < MIN_LAYER_SIDE || h < MIN_LAYER_SIDE {
            debug!(width = w, height = h, "image too small for a brisk layer");
            return Ok(Vec::new());
        }
        let space = ScaleSpace::build(img, self.params.layer_count(), self.params.threshold)?;
        let maxima = space.maxima();
        let integral = IntegralImage::new(img);

        let keypoints: Vec<Keypoint> = maxima
            .par_iter()
            .map(|&(layer, x, y, score)| {
                let (kx, ky, scale) = space.refine(layer, x, y);
                let angle = if self.pattern.fits(w, h, kx, ky, scale) {
                    let values = self.pattern.sample(&integral, kx, ky, scale, 0.0);
                    self.pattern.orientation(&values)
                } else {
                    0.0
                };
                Keypoint {
                    x: kx,
                    y: ky,
                    size: BASIC_SIZE * scale,
                    angle,
                    response: score as f32,
                    octave: layer as i32,
                }
            })
            .collect();

        debug!(
            layers = space.layers.len(),
            kept = keypoints.len(),
            "brisk scale space"
        );
        Ok(keypoints)
    }

    fn compute(&self, img: &Image, keypoints: Vec<Keypoint>) -> DetectResult<(Vec<Keypoint>, Descriptors)> {
        if keypoints.is_empty() {
            return Ok((keypoints, Descriptors::empty_binary(DESCRIPTOR_BYTES)));
        }
        let integral = IntegralImage::new(img);
        let (w, h) = img.dimensions();

        let rows: Vec<Option<(Keypoint, [u8; DESCRIPTOR_BYTES])>> = keypoints
            .par_iter()
            .map(|kp| {
                let scale = kp.size / BASIC_SIZE;
                if !self.pattern.fits(w, h, kp.x, kp.y, scale) {
                    return None;
                }
                let unrotated = self.pattern.sample(&integral, kp.x, kp.y, scale, 0.0);
                let angle = self.pattern.orientation(&unrotated);
                let rotated = self.pattern.sample(&integral, kp.x, kp.y, scale, angle);
                Some((Keypoint { angle, ..*kp }, self.pattern.describe(&rotated)))
            })
            .collect();

        let mut kept = Vec::with_capacity(keypoints.len());
        let mut data = Vec::with_capacity(keypoints.len() * DESCRIPTOR_BYTES);
        for (kp, d) in rows.into_iter().flatten() {
            kept.push(kp);
            data.extend_from_slice(&d);
        }
        Ok((kept, Descriptors::Binary { bytes: DESCRIPTOR_BYTES, data }))
    }
}
