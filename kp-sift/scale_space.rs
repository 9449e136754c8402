use kp_core::Image;
use rayon::prelude::*;

/// Blur assumed to be present in the input image
const INPUT_BLUR: f32 = 0.5;
/// Octaves stop once the short side would drop below this
pub const MIN_OCTAVE_SIDE: usize = 16;

/// Single-channel float image, intensities on the 0..255 scale
#[derive(Debug, Clone, PartialEq)]
pub struct FloatImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl FloatImage {
    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    pub fn from_image(img: &Image) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            data: img.as_raw().iter().map(|&v| v as f32).collect(),
        }
    }

    #[inline]
    pub fn at(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    /// Double both sides with bilinear interpolation
    pub fn upsample(&self) -> FloatImage {
        let (w, h) = (self.width * 2, self.height * 2);
        let mut out = FloatImage::zeros(w, h);
        out.data.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
            let sy = (y as f32 * 0.5).min((self.height - 1) as f32);
            let y0 = sy.floor() as usize;
            let y1 = (y0 + 1).min(self.height - 1);
            let fy = sy - y0 as f32;
            for (x, out) in row.iter_mut().enumerate() {
                let sx = (x as f32 * 0.5).min((self.width - 1) as f32);
                let x0 = sx.floor() as usize;
                let x1 = (x0 + 1).min(self.width - 1);
                let fx = sx - x0 as f32;
                let top = self.at(x0, y0) * (1.0 - fx) + self.at(x1, y0) * fx;
                let bottom = self.at(x0, y1) * (1.0 - fx) + self.at(x1, y1) * fx;
                *out = top * (1.0 - fy) + bottom * fy;
            }
        });
        out
    }

    /// Keep every second pixel in both directions
    pub fn downsample(&self) -> FloatImage {
        let (w, h) = ((self.width / 2).max(1), (self.height / 2).max(1));
        let mut out = FloatImage::zeros(w, h);
        for y in 0..h {
            for x in 0..w {
                out.data[y * w + x] = self.at(x * 2, y * 2);
            }
        }
        out
    }

    /// Separable Gaussian blur with replicated borders
    pub fn blur(&self, sigma: f32) -> FloatImage {
        let kernel = gaussian_kernel(sigma);
        let r = (kernel.len() / 2) as isize;
        let (w, h) = (self.width, self.height);

        let mut tmp = FloatImage::zeros(w, h);
        tmp.data.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
            let src = &self.data[y * w..(y + 1) * w];
            for (x, out) in row.iter_mut().enumerate() {
                let mut acc = 0.0;
                for (k, weight) in kernel.iter().enumerate() {
                    let xx = (x as isize + k as isize - r).clamp(0, w as isize - 1) as usize;
                    acc += weight * src[xx];
                }
                *out = acc;
            }
        });

        let mut out = FloatImage::zeros(w, h);
        out.data.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
            for (x, out) in row.iter_mut().enumerate() {
                let mut acc = 0.0;
                for (k, weight) in kernel.iter().enumerate() {
                    let yy = (y as isize + k as isize - r).clamp(0, h as isize - 1) as usize;
                    acc += weight * tmp.data[yy * w + x];
                }
                *out = acc;
            }
        });
        out
    }

    /// Pixel-wise `self - other`
    pub fn subtract(&self, other: &FloatImage) -> FloatImage {
        FloatImage {
            width: self.width,
            height: self.height,
            data: self.data.iter().zip(other.data.iter()).map(|(a, b)| a - b).collect(),
        }
    }
}

/// Normalised Gaussian kernel covering four sigmas on each side
pub fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = ((sigma * 4.0).round() as usize).max(1);
    let denom = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (0..=2 * radius)
        .map(|i| {
            let d = i as f32 - radius as f32;
            (-(d * d) / denom).exp()
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|v| *v /= sum);
    kernel
}

/// Gaussian and difference-of-Gaussian pyramids
#[derive(Debug, Clone)]
pub struct ScaleSpace {
    /// `layers + 3` blurred images per octave
    pub gaussians: Vec<Vec<FloatImage>>,
    /// `layers + 2` DoG images per octave
    pub dogs: Vec<Vec<FloatImage>>,
    pub n_octave_layers: usize,
    pub first_octave: i32,
}

impl ScaleSpace {
    /// `first_octave` of -1 doubles the input before the first octave
    pub fn build(img: &Image, n_octave_layers: usize, sigma: f32, first_octave: i32) -> ScaleSpace {
        let upscale = first_octave < 0;
        let base = Self::base_image(img, sigma, upscale);
        let n_octaves = Self::octave_count(base.width, base.height);
        let sigmas = Self::layer_sigmas(n_octave_layers, sigma);

        let mut gaussians: Vec<Vec<FloatImage>> = Vec::with_capacity(n_octaves);
        for o in 0..n_octaves {
            let mut octave = Vec::with_capacity(n_octave_layers + 3);
            let first = if o == 0 {
                base.clone()
            } else {
                gaussians[o - 1][n_octave_layers].downsample()
            };
            octave.push(first);
            for s in sigmas.iter().skip(1) {
                let next = octave[octave.len() - 1].blur(*s);
                octave.push(next);
            }
            gaussians.push(octave);
        }

        let dogs = gaussians
            .iter()
            .map(|octave| octave.windows(2).map(|pair| pair[1].subtract(&pair[0])).collect())
            .collect();

        ScaleSpace {
            gaussians,
            dogs,
            n_octave_layers,
            first_octave: if upscale { -1 } else { 0 },
        }
    }

    /// Octaves an input of this size yields, zero when it is too small
    pub fn octaves_for(width: usize, height: usize, first_octave: i32) -> usize {
        if first_octave < 0 {
            Self::octave_count(width * 2, height * 2)
        } else {
            Self::octave_count(width, height)
        }
    }

    /// Octave `o` relative to the input: `2^(o + first_octave)`
    pub fn octave_scale(&self, o: usize) -> f32 {
        2f32.powi(o as i32 + self.first_octave)
    }

    fn base_image(img: &Image, sigma: f32, upscale: bool) -> FloatImage {
        let input = FloatImage::from_image(img);
        if upscale {
            let diff = (sigma * sigma - 4.0 * INPUT_BLUR * INPUT_BLUR).max(0.01).sqrt();
            input.upsample().blur(diff)
        } else {
            let diff = (sigma * sigma - INPUT_BLUR * INPUT_BLUR).max(0.01).sqrt();
            input.blur(diff)
        }
    }

    fn octave_count(width: usize, height: usize) -> usize {
        let mut side = width.min(height);
        let mut n = 0;
        while side >= MIN_OCTAVE_SIDE {
            n += 1;
            side /= 2;
        }
        n
    }

    /// Incremental blur applied to reach each layer from the previous one;
    /// entry 0 is the base blur
    pub fn layer_sigmas(n_octave_layers: usize, sigma: f32) -> Vec<f32> {
        let k = 2f32.powf(1.0 / n_octave_layers as f32);
        let mut sigmas = vec![sigma];
        for i in 1..n_octave_layers + 3 {
            let prev = k.powi(i as i32 - 1) * sigma;
            let total = prev * k;
            sigmas.push((total * total - prev * prev).sqrt());
        }
        sigmas
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_is_normalised() {
        for sigma in [0.8f32, 1.6, 3.2] {
            let k = gaussian_kernel(sigma);
            assert_eq!(k.len() % 2, 1);
            let sum: f32 = k.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5);
            assert!(k[k.len() / 2] >= k[0]);
        }
    }

    #[test]
    fn test_blur_preserves_constant_image() {
        let img = FloatImage {
            width: 10,
            height: 7,
            data: vec![42.0; 70],
        };
        let blurred = img.blur(2.0);
        assert!(blurred.data.iter().all(|v| (v - 42.0).abs() < 1e-3));
    }

    #[test]
    fn test_resampling_sizes() {
        let img = FloatImage::zeros(30, 20);
        let up = img.upsample();
        assert_eq!((up.width, up.height), (60, 40));
        let down = up.downsample();
        assert_eq!((down.width, down.height), (30, 20));
    }

    #[test]
    fn test_pyramid_shape() {
        let img = kp_core::synthetic::squares_scene(128, 96).unwrap();
        let space = ScaleSpace::build(&img, 3, 1.6, 0);
        // 96 -> 48 -> 24 -> 12: three octaves
        assert_eq!(space.gaussians.len(), 3);
        for (g, d) in space.gaussians.iter().zip(space.dogs.iter()) {
            assert_eq!(g.len(), 6);
            assert_eq!(d.len(), 5);
        }
        assert_eq!(space.gaussians[1][0].width, 64);
        assert_eq!(space.octave_scale(1), 2.0);

        let upscaled = ScaleSpace::build(&img, 3, 1.6, -1);
        assert_eq!(upscaled.gaussians[0][0].width, 256);
        assert_eq!(upscaled.octave_scale(0), 0.5);
    }

    #[test]
    fn test_octaves_for_small_inputs() {
        assert_eq!(ScaleSpace::octaves_for(128, 96, 0), 3);
        assert_eq!(ScaleSpace::octaves_for(15, 200, 0), 0);
        // Doubling lets a 10 px side reach the first octave
        assert_eq!(ScaleSpace::octaves_for(10, 40, -1), 1);
        assert_eq!(ScaleSpace::octaves_for(1, 1, -1), 0);
    }

    #[test]
    fn test_layer_sigmas_reach_double_sigma() {
        let sigmas = ScaleSpace::layer_sigmas(3, 1.6);
        assert_eq!(sigmas.len(), 6);
        // Accumulated blur after `layers` steps is twice the base
        let total: f32 = sigmas[..4].iter().map(|s| s * s).sum::<f32>().sqrt();
        assert!((total - 3.2).abs() < 1e-3);
    }
}
