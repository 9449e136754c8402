use kp_core::Image;

/// Orientation assignment by intensity centroid
pub struct KeypointRefinement;

impl KeypointRefinement {
    /// Horizontal half-extent of the circular patch for each row offset
    /// `0..=half`
    pub fn circle_extents(half: usize) -> Vec<usize> {
        let r2 = (half * half) as f32;
        (0..=half)
            .map(|dy| ((r2 - (dy * dy) as f32).max(0.0).sqrt()).round() as usize)
            .collect()
    }

    /// Angle in radians of the vector from the patch centre to its intensity
    /// centroid. The caller guarantees the patch fits inside the image.
    pub fn compute_orientation(img: &Image, x: usize, y: usize, extents: &[usize]) -> f32 {
        let half = extents.len().saturating_sub(1) as isize;
        let (cx, cy) = (x as isize, y as isize);
        let mut m10 = 0i64; // Use i64 to prevent overflow
        let mut m01 = 0i64;

        for dy in -half..=half {
            let reach = extents[dy.unsigned_abs()] as isize;
            let yy = (cy + dy) as usize;
            let row = img.row(yy);
            for dx in -reach..=reach {
                let val = row[(cx + dx) as usize] as i64;
                m10 += dx as i64 * val;
                m01 += dy as i64 * val;
            }
        }

        if m10 == 0 && m01 == 0 {
            0.0
        } else {
            (m01 as f32).atan2(m10 as f32)
        }
    }
}
