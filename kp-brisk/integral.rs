use kp_core::Image;

/// Summed-area table with a zero row and column in front
#[derive(Debug, Clone)]
pub struct IntegralImage {
    width: usize,
    height: usize,
    sums: Vec<u64>,
}

impl IntegralImage {
    pub fn new(img: &Image) -> Self {
        let (w, h) = img.dimensions();
        let stride = w + 1;
        let mut sums = vec![0u64; stride * (h + 1)];
        for y in 0..h {
            let mut row_sum = 0u64;
            for (x, &v) in img.row(y).iter().enumerate() {
                row_sum += v as u64;
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row_sum;
            }
        }
        Self { width: w, height: h, sums }
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Sum over the half-open box `[x0, x1) x [y0, y1)`, clipped to the image
    pub fn box_sum(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> u64 {
        let x1 = x1.min(self.width);
        let y1 = y1.min(self.height);
        if x0 >= x1 || y0 >= y1 {
            return 0;
        }
        let stride = self.width + 1;
        let at = |x: usize, y: usize| self.sums[y * stride + x];
        at(x1, y1) + at(x0, y0) - at(x1, y0) - at(x0, y1)
    }

    /// Mean intensity of the box of half-width `radius` centred on `(x, y)`
    pub fn box_mean(&self, x: f32, y: f32, radius: f32) -> f32 {
        let x0 = (x - radius).round().max(0.0) as usize;
        let y0 = (y - radius).round().max(0.0) as usize;
        let x1 = ((x + radius).round().max(0.0) as usize + 1).min(self.width);
        let y1 = ((y + radius).round().max(0.0) as usize + 1).min(self.height);
        let area = x1.saturating_sub(x0) * y1.saturating_sub(y0);
        if area == 0 {
            return 0.0;
        }
        self.box_sum(x0, y0, x1, y1) as f32 / area as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn brute_sum(img: &Image, x0: usize, y0: usize, x1: usize, y1: usize) -> u64 {
        let mut total = 0;
        for y in y0..y1 {
            for x in x0..x1 {
                total += img.get(x, y) as u64;
            }
        }
        total
    }

    #[test]
    fn test_full_sum() {
        let img = Image::from_fn(5, 4, |x, y| (x + 10 * y) as u8).unwrap();
        let integral = IntegralImage::new(&img);
        let expected: u64 = img.as_raw().iter().map(|&v| v as u64).sum();
        assert_eq!(integral.box_sum(0, 0, 5, 4), expected);
        assert_eq!(integral.box_sum(3, 3, 3, 4), 0);
    }

    #[test]
    fn test_box_mean_of_constant() {
        let img = Image::filled(20, 20, 77).unwrap();
        let integral = IntegralImage::new(&img);
        assert!((integral.box_mean(10.3, 9.7, 2.4) - 77.0).abs() < 1e-4);
    }

    proptest! {
        #[test]
        fn prop_box_sum_matches_brute_force(
            seed in 0u8..255,
            x0 in 0usize..12, y0 in 0usize..9,
            w in 0usize..12, h in 0usize..9,
        ) {
            let img = Image::from_fn(12, 9, |x, y| ((x * 31 + y * 17) as u8).wrapping_add(seed)).unwrap();
            let integral = IntegralImage::new(&img);
            let x1 = (x0 + w).min(12);
            let y1 = (y0 + h).min(9);
            prop_assert_eq!(integral.box_sum(x0, y0, x1, y1), brute_sum(&img, x0, y0, x1, y1));
        }
    }
}
