use kp_core::{DetectResult, Image};
use rayon::prelude::*;

pub const DESCRIPTOR_BYTES: usize = 32;
const DESCRIPTOR_BITS: usize = DESCRIPTOR_BYTES * 8;
const PATTERN_SEED: u64 = 0x9E37_79B9_7F4A_7C15;

/// 256-bit binary descriptor = 32 bytes
pub type Descriptor = [u8; DESCRIPTOR_BYTES];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternPair {
    pub p1: (f32, f32),
    pub p2: (f32, f32),
}

/// Rotated BRIEF: 256 intensity comparisons around each keypoint, steered by
/// the keypoint angle and sampled on a smoothed image
#[derive(Debug, Clone)]
pub struct BriefGenerator {
    pattern: Vec<PatternPair>,
    radius: f32,
}

impl BriefGenerator {
    /// Pattern points lie inside a disc of `radius` pixels
    pub fn new(radius: f32) -> Self {
        Self {
            pattern: generate_pattern(DESCRIPTOR_BITS, radius),
            radius,
        }
    }

    pub fn pattern(&self) -> &[PatternPair] {
        &self.pattern
    }

    /// Pixels a keypoint needs on every side so the rotated pattern and its
    /// bilinear footprint stay inside the image
    pub fn margin(&self) -> f32 {
        self.radius + 1.0
    }

    /// Describe keypoints given in `img` coordinates with angles in radians.
    /// Returns `None` for points too close to the border.
    pub fn generate_descriptors(&self, img: &Image, points: &[(f32, f32, f32)]) -> Vec<Option<Descriptor>> {
        let (w, h) = img.dimensions();
        let margin = self.margin();
        points
            .par_iter()
            .map(|&(cx, cy, angle)| {
                if cx < margin || cy < margin || cx > w as f32 - 1.0 - margin || cy > h as f32 - 1.0 - margin {
                    return None;
                }
                let (s, c) = angle.sin_cos();
                let mut d = [0u8; DESCRIPTOR_BYTES];
                for (i, pair) in self.pattern.iter().enumerate() {
                    let (x1, y1) = rotate(pair.p1, c, s, cx, cy);
                    let (x2, y2) = rotate(pair.p2, c, s, cx, cy);
                    if img.bilinear(x1, y1) < img.bilinear(x2, y2) {
                        d[i / 8] |= 1 << (i % 8);
                    }
                }
                Some(d)
            })
            .collect()
    }
}

#[inline]
fn rotate(point: (f32, f32), c: f32, s: f32, cx: f32, cy: f32) -> (f32, f32) {
    let (px, py) = point;
    (cx + c * px - s * py, cy + s * px + c * py)
}

/// Gaussian smoothing (7 taps, sigma 2) applied before sampling BRIEF tests
pub fn smooth(img: &Image) -> DetectResult<Image> {
    const KERNEL: [f32; 7] = [0.0702, 0.1311, 0.1907, 0.2160, 0.1907, 0.1311, 0.0702];
    let (w, h) = img.dimensions();

    let mut tmp = vec![0f32; w * h];
    tmp.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
        for (x, out) in row.iter_mut().enumerate() {
            let mut acc = 0.0;
            for (k, weight) in KERNEL.iter().enumerate() {
                acc += weight * img.get_clamped(x as isize + k as isize - 3, y as isize) as f32;
            }
            *out = acc;
        }
    });

    let mut data = vec![0u8; w * h];
    data.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
        for (x, out) in row.iter_mut().enumerate() {
            let mut acc = 0.0;
            for (k, weight) in KERNEL.iter().enumerate() {
                let yy = (y as isize + k as isize - 3).clamp(0, h as isize - 1) as usize;
                acc += weight * tmp[yy * w + x];
            }
            *out = acc.round().clamp(0.0, 255.0) as u8;
        }
    });

    Image::new(w, h, data)
}

fn generate_pattern(count: usize, radius: f32) -> Vec<PatternPair> {
    let mut rng = XorShift64::new(PATTERN_SEED);
    let radius_sq = radius * radius;
    (0..count)
        .map(|_| PatternPair {
            p1: random_point(&mut rng, radius, radius_sq),
            p2: random_point(&mut rng, radius, radius_sq),
        })
        .collect()
}

fn random_point(rng: &mut XorShift64, radius: f32, radius_sq: f32) -> (f32, f32) {
    loop {
        let x = (rng.next_f32() * 2.0 - 1.0) * radius;
        let y = (rng.next_f32() * 2.0 - 1.0) * radius;
        if x * x + y * y <= radius_sq {
            return (x, y);
        }
    }
}

struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    fn next_f32(&mut self) -> f32 {
        let bits = self.next_u64() >> 40; // upper 24 bits
        bits as f32 / (1u64 << 24) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_is_deterministic_and_inside_disc() {
        let a = BriefGenerator::new(15.0);
        let b = BriefGenerator::new(15.0);
        assert_eq!(a.pattern(), b.pattern());
        assert_eq!(a.pattern().len(), 256);
        for pair in a.pattern() {
            for (x, y) in [pair.p1, pair.p2] {
                assert!(x * x + y * y <= 15.0 * 15.0 + 1e-3);
            }
        }
    }

    #[test]
    fn test_border_points_are_rejected() {
        let img = kp_core::synthetic::squares_scene(128, 128).unwrap();
        let brief = BriefGenerator::new(15.0);
        let out = brief.generate_descriptors(&img, &[(5.0, 5.0, 0.0), (64.0, 64.0, 0.3)]);
        assert!(out[0].is_none());
        assert!(out[1].is_some());
    }

    #[test]
    fn test_uniform_patch_gives_zero_descriptor() {
        let img = Image::filled(64, 64, 100).unwrap();
        let brief = BriefGenerator::new(15.0);
        let out = brief.generate_descriptors(&img, &[(32.0, 32.0, 1.0)]);
        assert_eq!(out[0], Some([0u8; DESCRIPTOR_BYTES]));
    }

    #[test]
    fn test_smooth_keeps_flat_regions() {
        let img = Image::filled(16, 9, 200).unwrap();
        let blurred = smooth(&img).unwrap();
        assert_eq!(blurred.dimensions(), (16, 9));
        assert!(blurred.as_raw().iter().all(|&v| (199..=201).contains(&v)));
    }
}
