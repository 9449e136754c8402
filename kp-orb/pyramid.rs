use kp_core::{DetectResult, Image};
use crate::types::ScaleLevel;

/// Image pyramid operations for multi-scale feature detection
pub struct ImagePyramid;

impl ImagePyramid {
    /// Generate scale levels, stopping once a level has no room left
    /// inside `border`
    pub fn generate_scale_levels(
        width: usize,
        height: usize,
        scale_factor: f32,
        n_levels: usize,
        border: usize,
    ) -> Vec<ScaleLevel> {
        let min_side = 2 * border + 1;
        let mut levels = Vec::with_capacity(n_levels);
        let mut scale = 1.0f32;

        for level in 0..n_levels {
            let scaled_width = ((width as f32) / scale).round() as usize;
            let scaled_height = ((height as f32) / scale).round() as usize;
            if scaled_width < min_side || scaled_height < min_side {
                break;
            }
            levels.push(ScaleLevel {
                level,
                scale,
                width: scaled_width,
                height: scaled_height,
            });
            scale *= scale_factor;
        }
        levels
    }

    /// Build image pyramid from base image
    pub fn build(img: &Image, scale_levels: &[ScaleLevel]) -> DetectResult<Vec<Image>> {
        scale_levels
            .iter()
            .map(|level| {
                if level.level == 0 {
                    Ok(img.clone())
                } else {
                    img.resize(level.width, level.height)
                }
            })
            .collect()
    }

    /// Features assigned to each level, decreasing geometrically with scale
    pub fn features_per_level(n_features: usize, scale_factor: f32, n_levels: usize) -> Vec<usize> {
        if n_levels == 0 {
            return Vec::new();
        }
        let factor = 1.0 / scale_factor;
        let mut desired = n_features as f32 * (1.0 - factor) / (1.0 - factor.powi(n_levels as i32));
        let mut counts = Vec::with_capacity(n_levels);
        let mut assigned = 0usize;
        for _ in 0..n_levels - 1 {
            let n = (desired.round() as usize).min(n_features - assigned);
            counts.push(n);
            assigned += n;
            desired *= factor;
        }
        counts.push(n_features - assigned);
        counts
    }
}
