use std::f32::consts::PI;

use crate::integral::IntegralImage;

/// Keypoint size that corresponds to a pattern scale of 1
pub const BASIC_SIZE: f32 = 12.0;
pub const DESCRIPTOR_BYTES: usize = 64;
const MAX_SHORT_PAIRS: usize = DESCRIPTOR_BYTES * 8;

const RING_RADII: [f32; 5] = [0.0, 2.9, 4.9, 7.4, 10.8];
const RING_POINTS: [usize; 5] = [1, 10, 14, 15, 20];
const RING_SIGMAS: [f32; 5] = [0.72, 0.95, 1.25, 1.8, 2.5];
const SHORT_DISTANCE: f32 = 5.85;
const LONG_DISTANCE: f32 = 8.2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternPoint {
    pub x: f32,
    pub y: f32,
    /// Smoothing radius applied when sampling this point
    pub sigma: f32,
}

/// Indices into the pattern point list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointPair {
    pub i: usize,
    pub j: usize,
}

/// Concentric ring sampling pattern with its short and long point pairs
#[derive(Debug, Clone)]
pub struct BriskPattern {
    points: Vec<PatternPoint>,
    short_pairs: Vec<PointPair>,
    long_pairs: Vec<PointPair>,
}

impl BriskPattern {
    pub fn new(pattern_scale: f32) -> Self {
        let f = 0.85 * pattern_scale;
        let mut points = Vec::with_capacity(RING_POINTS.iter().sum());
        for ring in 0..RING_RADII.len() {
            let n = RING_POINTS[ring];
            for k in 0..n {
                let alpha = k as f32 * 2.0 * PI / n as f32;
                points.push(PatternPoint {
                    x: f * RING_RADII[ring] * alpha.cos(),
                    y: f * RING_RADII[ring] * alpha.sin(),
                    sigma: f * RING_SIGMAS[ring],
                });
            }
        }

        let d_short = SHORT_DISTANCE * f;
        let d_long = LONG_DISTANCE * f;
        let mut short_pairs = Vec::new();
        let mut long_pairs = Vec::new();
        for i in 1..points.len() {
            for j in 0..i {
                let dx = points[j].x - points[i].x;
                let dy = points[j].y - points[i].y;
                let d2 = dx * dx + dy * dy;
                if d2 > d_long * d_long {
                    long_pairs.push(PointPair { i, j });
                } else if d2 < d_short * d_short && short_pairs.len() < MAX_SHORT_PAIRS {
                    short_pairs.push(PointPair { i, j });
                }
            }
        }

        Self {
            points,
            short_pairs,
            long_pairs,
        }
    }

    pub fn points(&self) -> &[PatternPoint] {
        &self.points
    }

    pub fn short_pairs(&self) -> &[PointPair] {
        &self.short_pairs
    }

    pub fn long_pairs(&self) -> &[PointPair] {
        &self.long_pairs
    }

    /// Distance from the centre to the far edge of the outermost smoothing
    /// box at pattern scale 1
    pub fn extent(&self) -> f32 {
        self.points
            .iter()
            .map(|p| (p.x * p.x + p.y * p.y).sqrt() + p.sigma)
            .fold(0.0, f32::max)
    }

    /// Whether the pattern at `scale` fits around `(x, y)` in any rotation
    pub fn fits(&self, width: usize, height: usize, x: f32, y: f32, scale: f32) -> bool {
        let margin = self.extent() * scale + 1.0;
        x >= margin && y >= margin && x <= width as f32 - 1.0 - margin && y <= height as f32 - 1.0 - margin
    }

    /// Smoothed intensities of every pattern point around `(x, y)`, scaled
    /// by `scale` and rotated by `angle` radians
    pub fn sample(&self, integral: &IntegralImage, x: f32, y: f32, scale: f32, angle: f32) -> Vec<f32> {
        let (s, c) = angle.sin_cos();
        self.points
            .iter()
            .map(|p| {
                let px = x + scale * (c * p.x - s * p.y);
                let py = y + scale * (s * p.x + c * p.y);
                integral.box_mean(px, py, (p.sigma * scale).max(0.5))
            })
            .collect()
    }

    /// Keypoint direction from the local gradient over the long pairs
    pub fn orientation(&self, values: &[f32]) -> f32 {
        let mut gx = 0.0f32;
        let mut gy = 0.0f32;
        for pair in &self.long_pairs {
            let (pi, pj) = (self.points[pair.i], self.points[pair.j]);
            let dx = pj.x - pi.x;
            let dy = pj.y - pi.y;
            let d2 = dx * dx + dy * dy;
            let diff = values[pair.j] - values[pair.i];
            gx += diff * dx / d2;
            gy += diff * dy / d2;
        }
        if gx == 0.0 && gy == 0.0 {
            return 0.0;
        }
        gy.atan2(gx).rem_euclid(2.0 * PI)
    }

    /// 512-bit string of short-pair comparisons, packed LSB-first
    pub fn describe(&self, values: &[f32]) -> [u8; DESCRIPTOR_BYTES] {
        let mut d = [0u8; DESCRIPTOR_BYTES];
        for (bit, pair) in self.short_pairs.iter().enumerate() {
            if values[pair.i] > values[pair.j] {
                d[bit / 8] |= 1 << (bit % 8);
            }
        }
        d
    }
}
