use kp_core::fast::{self, FAST_RADIUS};
use kp_core::{DetectResult, Image};
use rayon::prelude::*;

/// Layers stop once either side would drop below this
pub const MIN_LAYER_SIDE: usize = 16;
const SEGMENT_ARC: usize = 9;

/// One detection layer: an octave (`c_i`) or intra-octave (`d_i`) image
/// with its FAST 9-16 score map
#[derive(Debug, Clone)]
pub struct Layer {
    pub image: Image,
    /// Size of a layer pixel in input pixels
    pub scale: f32,
    /// Input coordinate of layer pixel 0
    pub offset: f32,
    pub scores: Vec<u8>,
}

impl Layer {
    fn new(image: Image, scale: f32, threshold: u8) -> Self {
        let scores = fast::score_map(&image, threshold, SEGMENT_ARC, FAST_RADIUS);
        Self {
            image,
            scale,
            offset: 0.5 * scale - 0.5,
            scores,
        }
    }

    pub fn width(&self) -> usize {
        self.image.width()
    }

    pub fn height(&self) -> usize {
        self.image.height()
    }

    #[inline]
    pub fn score(&self, x: usize, y: usize) -> u8 {
        self.scores[y * self.width() + x]
    }

    /// Layer coordinates to input coordinates
    pub fn to_input(&self, x: f32, y: f32) -> (f32, f32) {
        (x * self.scale + self.offset, y * self.scale + self.offset)
    }

    /// Input coordinates to layer coordinates
    pub fn from_input(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.offset) / self.scale, (y - self.offset) / self.scale)
    }

    /// Highest score in the 3x3 window around an input-space location
    pub fn max_score_near(&self, x: f32, y: f32) -> u8 {
        let (lx, ly) = self.from_input(x, y);
        let cx = lx.round() as isize;
        let cy = ly.round() as isize;
        let mut best = 0;
        for dy in -1..=1 {
            for dx in -1..=1 {
                let (xx, yy) = (cx + dx, cy + dy);
                if xx < 0 || yy < 0 || xx >= self.width() as isize || yy >= self.height() as isize {
                    continue;
                }
                best = best.max(self.score(xx as usize, yy as usize));
            }
        }
        best
    }
}

/// Layers ordered by increasing scale: c0, d0, c1, d1, ...
#[derive(Debug, Clone)]
pub struct ScaleSpace {
    pub layers: Vec<Layer>,
}

impl ScaleSpace {
    pub fn build(img: &Image, layer_count: usize, threshold: u8) -> DetectResult<ScaleSpace> {
        let (w, h) = img.dimensions();
        let mut specs: Vec<(usize, usize, f32)> = vec![(w, h, 1.0)];
        for i in 1..layer_count {
            // Odd layers sit at 1.5 * 2^k, even layers at 2^k
            let octave = (i / 2) as i32;
            let scale = if i % 2 == 1 {
                1.5 * 2f32.powi(octave)
            } else {
                2f32.powi(octave)
            };
            let (lw, lh) = ((w as f32 / scale) as usize, (h as f32 / scale) as usize);
            if lw < MIN_LAYER_SIDE || lh < MIN_LAYER_SIDE {
                break;
            }
            specs.push((lw, lh, scale));
        }

        let layers = specs
            .into_par_iter()
            .map(|(lw, lh, scale)| -> DetectResult<Layer> {
                let image = if lw == w && lh == h { img.clone() } else { img.resize(lw, lh)? };
                Ok(Layer::new(image, scale, threshold))
            })
            .collect::<DetectResult<Vec<_>>>()?;
        Ok(ScaleSpace { layers })
    }

    /// Corners that are maximal in their layer and against both
    /// neighbouring layers, as `(layer, x, y, score)`
    pub fn maxima(&self) -> Vec<(usize, usize, usize, u8)> {
        let per_layer: Vec<Vec<(usize, usize, usize, u8)>> = self
            .layers
            .par_iter()
            .enumerate()
            .map(|(i, layer)| {
                fast::non_max_suppression(&layer.scores, layer.width(), layer.height())
                    .into_iter()
                    .filter(|&(x, y, s)| {
                        let (ix, iy) = layer.to_input(x as f32, y as f32);
                        let below = i.checked_sub(1).map(|j| self.layers[j].max_score_near(ix, iy));
                        let above = self.layers.get(i + 1).map(|l| l.max_score_near(ix, iy));
                        below.map_or(true, |b| b <= s) && above.map_or(true, |a| a <= s)
                    })
                    .map(|(x, y, s)| (i, x, y, s))
                    .collect()
            })
            .collect();
        per_layer.into_iter().flatten().collect()
    }

    /// Sub-pixel position (input coordinates) and interpolated scale of a
    /// maximum
    pub fn refine(&self, layer: usize, x: usize, y: usize) -> (f32, f32, f32) {
        let l = &self.layers[layer];
        let s = |dx: isize, dy: isize| {
            let xx = (x as isize + dx).clamp(0, l.width() as isize - 1) as usize;
            let yy = (y as isize + dy).clamp(0, l.height() as isize - 1) as usize;
            l.score(xx, yy) as f32
        };
        let centre = s(0, 0);
        let dx = parabola_peak(s(-1, 0), centre, s(1, 0));
        let dy = parabola_peak(s(0, -1), centre, s(0, 1));
        let (ix, iy) = l.to_input(x as f32 + dx, y as f32 + dy);

        let below = layer
            .checked_sub(1)
            .map(|j| self.layers[j].max_score_near(ix, iy) as f32)
            .unwrap_or(0.0);
        let above = self
            .layers
            .get(layer + 1)
            .map(|n| n.max_score_near(ix, iy) as f32)
            .unwrap_or(0.0);
        let ds = parabola_peak(below, centre, above);
        let scale = if ds >= 0.0 {
            let next = self.layers.get(layer + 1).map_or(l.scale * 1.5, |n| n.scale);
            l.scale + ds * (next - l.scale)
        } else {
            let prev = layer.checked_sub(1).map_or(l.scale / 1.5, |j| self.layers[j].scale);
            l.scale + ds * (l.scale - prev)
        };
        (ix, iy, scale)
    }
}

/// Offset of the vertex of the parabola through `(-1, l)`, `(0, c)`, `(1, r)`,
/// limited to half a sample
fn parabola_peak(l: f32, c: f32, r: f32) -> f32 {
    let denom = l - 2.0 * c + r;
    if denom >= 0.0 {
        return 0.0;
    }
    (0.5 * (l - r) / denom).clamp(-0.5, 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kp_core::synthetic::squares_scene;

    #[test]
    fn test_layer_scales() {
        let img = squares_scene(256, 256).unwrap();
        let space = ScaleSpace::build(&img, 6, 30).unwrap();
        let scales: Vec<f32> = space.layers.iter().map(|l| l.scale).collect();
        assert_eq!(scales, vec![1.0, 1.5, 2.0, 3.0, 4.0, 6.0]);
        assert_eq!(space.layers[1].width(), 170);
        assert_eq!(space.layers[4].width(), 64);
    }

    #[test]
    fn test_small_image_truncates_layers() {
        let img = Image::filled(40, 40, 0).unwrap();
        let space = ScaleSpace::build(&img, 6, 30).unwrap();
        // 40, 26, 20 fit; 13 does not
        assert_eq!(space.layers.len(), 3);
    }

    #[test]
    fn test_coordinate_mapping() {
        let img = Image::filled(64, 64, 0).unwrap();
        let space = ScaleSpace::build(&img, 3, 30).unwrap();
        let layer = &space.layers[2];
        let (ix, iy) = layer.to_input(10.0, 4.0);
        let (lx, ly) = layer.from_input(ix, iy);
        assert!((lx - 10.0).abs() < 1e-5 && (ly - 4.0).abs() < 1e-5);
    }

    #[test]
    fn test_parabola_peak() {
        assert_eq!(parabola_peak(1.0, 2.0, 1.0), 0.0);
        assert!(parabola_peak(1.0, 3.0, 2.0) > 0.0);
        assert!(parabola_peak(2.0, 3.0, 1.0) < 0.0);
        assert_eq!(parabola_peak(3.0, 1.0, 3.0), 0.0);
    }

    #[test]
    fn test_maxima_on_squares() {
        let img = squares_scene(256, 256).unwrap();
        let space = ScaleSpace::build(&img, 6, 30).unwrap();
        let maxima = space.maxima();
        assert!(!maxima.is_empty());
        for &(layer, x, y, s) in &maxima {
            assert!(s >= 30);
            assert_eq!(space.layers[layer].score(x, y), s);
        }
    }

    #[test]
    fn test_uniform_image_has_no_maxima() {
        let img = Image::filled(128, 128, 60).unwrap();
        let space = ScaleSpace::build(&img, 6, 30).unwrap();
        assert!(space.maxima().is_empty());
    }
}
