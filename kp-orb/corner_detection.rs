use kp_core::fast;
use kp_core::Image;
use crate::types::Candidate;

/// Side of the window Harris sums gradients over
pub const HARRIS_BLOCK_SIZE: usize = 7;
const HARRIS_K: f32 = 0.04;

/// Corner detection algorithms (FAST and Harris)
pub struct CornerDetector;

impl CornerDetector {
    /// FAST-9 corners after 3x3 non-maximum suppression, in raster order
    pub(crate) fn detect_fast(img: &Image, threshold: u8, border: usize) -> Vec<Candidate> {
        let (w, h) = img.dimensions();
        let scores = fast::score_map(img, threshold, 9, border);
        fast::non_max_suppression(&scores, w, h)
            .into_iter()
            .map(|(x, y, fast_score)| Candidate { x, y, fast_score })
            .collect()
    }

    /// Harris corner response at a pixel over a `HARRIS_BLOCK_SIZE` window.
    ///
    /// Gradients are Sobel responses normalised to the 0..1 intensity range.
    pub fn harris_response(img: &Image, x: usize, y: usize) -> f32 {
        let (w, h) = img.dimensions();
        let r = (HARRIS_BLOCK_SIZE / 2) as isize;
        // Window plus the Sobel footprint must stay inside the image
        if (x as isize) < r + 1
            || (y as isize) < r + 1
            || x as isize + r + 1 >= w as isize
            || y as isize + r + 1 >= h as isize
        {
            return 0.0;
        }

        let mut ixx = 0.0f32;
        let mut ixy = 0.0f32;
        let mut iyy = 0.0f32;
        for dy in -r..=r {
            for dx in -r..=r {
                let (gx, gy) = Self::sobel(img, (x as isize + dx) as usize, (y as isize + dy) as usize);
                ixx += gx * gx;
                ixy += gx * gy;
                iyy += gy * gy;
            }
        }

        let det = ixx * iyy - ixy * ixy;
        let trace = ixx + iyy;
        det - HARRIS_K * trace * trace
    }

    /// Image gradients using the Sobel operator, scaled to unit intensity
    fn sobel(img: &Image, x: usize, y: usize) -> (f32, f32) {
        let p = |dx: isize, dy: isize| img.get((x as isize + dx) as usize, (y as isize + dy) as usize) as f32;

        // Sobel X kernel: [-1, 0, 1; -2, 0, 2; -1, 0, 1]
        let gx = p(1, -1) + 2.0 * p(1, 0) + p(1, 1) - p(-1, -1) - 2.0 * p(-1, 0) - p(-1, 1);
        // Sobel Y kernel: [-1, -2, -1; 0, 0, 0; 1, 2, 1]
        let gy = p(-1, 1) + 2.0 * p(0, 1) + p(1, 1) - p(-1, -1) - 2.0 * p(0, -1) - p(1, -1);

        const SCALE: f32 = 1.0 / (4.0 * 255.0);
        (gx * SCALE, gy * SCALE)
    }
}
