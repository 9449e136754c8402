use crate::error::{DetectError, DetectResult};

/// Row-major 8-bit grayscale image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl Image {
    /// Wraps a row-major buffer, validating the dimensions against its length
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> DetectResult<Self> {
        if width == 0 || height == 0 {
            return Err(DetectError::InvalidImageSize { width, height });
        }
        let expected_len = width * height;
        if data.len() != expected_len {
            return Err(DetectError::InvalidImageData {
                expected_len,
                actual_len: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn filled(width: usize, height: usize, value: u8) -> DetectResult<Self> {
        Self::new(width, height, vec![value; width * height])
    }

    pub fn from_fn<F>(width: usize, height: usize, mut f: F) -> DetectResult<Self>
    where
        F: FnMut(usize, usize) -> u8,
    {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self::new(width, height, data)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    pub fn row(&self, y: usize) -> &[u8] {
        &self.data[y * self.width..(y + 1) * self.width]
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    /// Pixel lookup with coordinates clamped to the image border
    #[inline]
    pub fn get_clamped(&self, x: isize, y: isize) -> u8 {
        let xx = x.clamp(0, self.width as isize - 1) as usize;
        let yy = y.clamp(0, self.height as isize - 1) as usize;
        self.data[yy * self.width + xx]
    }

    /// Bilinear interpolation for subpixel sampling, clamped at the border
    pub fn bilinear(&self, x: f32, y: f32) -> f32 {
        let max_x = (self.width - 1) as f32;
        let max_y = (self.height - 1) as f32;
        let x = x.clamp(0.0, max_x);
        let y = y.clamp(0.0, max_y);

        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let fx = x - x0 as f32;
        let fy = y - y0 as f32;

        let p00 = self.get(x0, y0) as f32;
        let p10 = self.get(x1, y0) as f32;
        let p01 = self.get(x0, y1) as f32;
        let p11 = self.get(x1, y1) as f32;

        let top = p00 * (1.0 - fx) + p10 * fx;
        let bottom = p01 * (1.0 - fx) + p11 * fx;
        top * (1.0 - fy) + bottom * fy
    }

    /// Resample to `width` x `height` with bilinear interpolation
    pub fn resize(&self, width: usize, height: usize) -> DetectResult<Image> {
        if width == 0 || height == 0 {
            return Err(DetectError::InvalidImageSize { width, height });
        }
        let x_ratio = self.width as f32 / width as f32;
        let y_ratio = self.height as f32 / height as f32;
        Image::from_fn(width, height, |x, y| {
            // Sample at pixel centres so downsampling does not drift towards the origin
            let sx = (x as f32 + 0.5) * x_ratio - 0.5;
            let sy = (y as f32 + 0.5) * y_ratio - 0.5;
            self.bilinear(sx, sy).round().clamp(0.0, 255.0) as u8
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_new_validates_dimensions() {
        assert!(matches!(
            Image::new(0, 10, vec![]),
            Err(DetectError::InvalidImageSize { .. })
        ));
        assert!(matches!(
            Image::new(10, 10, vec![0; 50]),
            Err(DetectError::InvalidImageData {
                expected_len: 100,
                actual_len: 50
            })
        ));
        assert!(Image::new(10, 10, vec![0; 100]).is_ok());
    }

    #[test]
    fn test_from_fn_is_row_major() {
        let img = Image::from_fn(4, 3, |x, y| (y * 10 + x) as u8).unwrap();
        assert_eq!(img.get(3, 0), 3);
        assert_eq!(img.get(0, 2), 20);
        assert_eq!(img.row(1), &[10, 11, 12, 13]);
    }

    #[test]
    fn test_bilinear_midpoint() {
        let img = Image::new(2, 1, vec![0, 100]).unwrap();
        assert!((img.bilinear(0.5, 0.0) - 50.0).abs() < 1e-4);
        // Out of range coordinates clamp to the border
        assert_eq!(img.bilinear(-3.0, 0.0), 0.0);
        assert_eq!(img.bilinear(7.0, 0.0), 100.0);
    }

    #[test]
    fn test_resize_keeps_uniform_value() {
        let img = Image::filled(40, 30, 77).unwrap();
        let small = img.resize(33, 25).unwrap();
        assert_eq!(small.dimensions(), (33, 25));
        assert!(small.as_raw().iter().all(|&v| v == 77));
    }

    proptest! {
        #[test]
        fn prop_clamped_lookup_never_panics(x in -100isize..100, y in -100isize..100) {
            let img = Image::from_fn(13, 7, |x, y| (x + y) as u8).unwrap();
            let v = img.get_clamped(x, y);
            prop_assert!(v <= 18);
        }

        #[test]
        fn prop_bilinear_stays_in_pixel_range(x in -5.0f32..20.0, y in -5.0f32..20.0) {
            let img = Image::from_fn(9, 9, |x, y| ((x * 31 + y * 17) % 256) as u8).unwrap();
            let v = img.bilinear(x, y);
            prop_assert!((0.0..=255.0).contains(&v));
        }
    }
}
