//! FAST segment test on the 16-pixel Bresenham circle of radius 3.

use crate::image::Image;

/// FAST circle offsets, clockwise from the top
pub const FAST_OFFSETS: [(isize, isize); 16] = [
    (0, -3), (1, -3), (2, -2), (3, -1),
    (3, 0), (3, 1), (2, 2), (1, 3),
    (0, 3), (-1, 3), (-2, 2), (-3, 1),
    (-3, 0), (-3, -1), (-2, -2), (-1, -3),
];

/// Pixels the segment test needs on every side of the centre
pub const FAST_RADIUS: usize = 3;

/// Check if there are at least `min_count` consecutive set bits in the
/// circular 16-bit mask
pub fn has_consecutive_bits(mask: u16, min_count: usize) -> bool {
    if min_count > 16 || min_count == 0 {
        return false;
    }

    // For a run of length n: mask & rotl(mask, 1) & ... & rotl(mask, n - 1)
    let mut test_mask = mask;
    for i in 1..min_count {
        test_mask &= mask.rotate_left(i as u32);
        if test_mask == 0 {
            return false;
        }
    }
    test_mask != 0
}

/// Reference implementation of the circular run check
pub fn has_consecutive_pixels(pixels: &[bool; 16], min_count: usize) -> bool {
    if min_count > 16 {
        return false;
    }
    let mut current = 0;
    // Walk the ring twice to handle wrap-around
    for i in 0..32 {
        if pixels[i % 16] {
            current += 1;
            if current >= min_count {
                return true;
            }
        } else {
            current = 0;
        }
    }
    false
}

/// Reads the 16 circle pixels around `(x, y)`. The caller guarantees a
/// border of `FAST_RADIUS`.
#[inline]
pub fn circle(img: &Image, x: usize, y: usize) -> [u8; 16] {
    let mut ring = [0u8; 16];
    for (slot, &(dx, dy)) in ring.iter_mut().zip(FAST_OFFSETS.iter()) {
        *slot = img.get((x as isize + dx) as usize, (y as isize + dy) as usize);
    }
    ring
}

/// Bright/dark masks of the ring relative to `center` at `threshold`
#[inline]
pub fn classify(ring: &[u8; 16], center: u8, threshold: u8) -> (u16, u16) {
    let hi = center as i16 + threshold as i16;
    let lo = center as i16 - threshold as i16;
    let mut bright = 0u16;
    let mut dark = 0u16;
    for (i, &q) in ring.iter().enumerate() {
        let q = q as i16;
        if q > hi {
            bright |= 1 << i;
        } else if q < lo {
            dark |= 1 << i;
        }
    }
    (bright, dark)
}

/// Segment test: `arc` contiguous circle pixels all brighter or all darker
/// than the centre by more than `threshold`
#[inline]
pub fn is_corner(ring: &[u8; 16], center: u8, threshold: u8, arc: usize) -> bool {
    let (bright, dark) = classify(ring, center, threshold);
    has_consecutive_bits(bright, arc) || has_consecutive_bits(dark, arc)
}

/// Largest threshold for which the point still passes the segment test,
/// or 0 when it fails at `threshold`
pub fn corner_score(ring: &[u8; 16], center: u8, threshold: u8, arc: usize) -> u8 {
    if !is_corner(ring, center, threshold, arc) {
        return 0;
    }
    let mut lo = threshold as u16;
    let mut hi = 255u16;
    // Invariant: corner at `lo`, not known at `hi`
    while lo < hi {
        let mid = lo + (hi - lo + 1) / 2;
        if is_corner(ring, center, mid as u8, arc) {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    (lo as u8).max(1)
}

/// Score map of `img`: segment-test score per pixel, 0 for non-corners and
/// for pixels within `border` of the edge
pub fn score_map(img: &Image, threshold: u8, arc: usize, border: usize) -> Vec<u8> {
    use rayon::prelude::*;

    let (w, h) = img.dimensions();
    let border = border.max(FAST_RADIUS);
    let mut scores = vec![0u8; w * h];
    if w <= 2 * border || h <= 2 * border {
        return scores;
    }

    scores
        .par_chunks_mut(w)
        .enumerate()
        .filter(|(y, _)| *y >= border && *y < h - border)
        .for_each(|(y, row)| {
            for x in border..w - border {
                let p = img.get(x, y);
                // Any arc of 9 or more covers at least two compass points
                let compass = [
                    img.get(x, y - 3),
                    img.get(x + 3, y),
                    img.get(x, y + 3),
                    img.get(x - 3, y),
                ];
                let hi = p as i16 + threshold as i16;
                let lo = p as i16 - threshold as i16;
                let n_bright = compass.iter().filter(|&&q| q as i16 > hi).count();
                let n_dark = compass.iter().filter(|&&q| (q as i16) < lo).count();
                if arc >= 9 && n_bright < 2 && n_dark < 2 {
                    continue;
                }
                let ring = circle(img, x, y);
                row[x] = corner_score(&ring, p, threshold, arc);
            }
        });
    scores
}

/// 3x3 non-maximum suppression over a score map.
///
/// Ties are broken in raster order so a plateau keeps its first pixel.
/// Returns `(x, y, score)` in raster order.
pub fn non_max_suppression(scores: &[u8], width: usize, height: usize) -> Vec<(usize, usize, u8)> {
    let mut kept = Vec::new();
    if width < 3 || height < 3 {
        return kept;
    }
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let s = scores[y * width + x];
            if s == 0 {
                continue;
            }
            let mut is_max = true;
            'window: for dy in -1isize..=1 {
                for dx in -1isize..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = (x as isize + dx) as usize;
                    let ny = (y as isize + dy) as usize;
                    let n = scores[ny * width + nx];
                    let before = dy < 0 || (dy == 0 && dx < 0);
                    if n > s || (before && n == s) {
                        is_max = false;
                        break 'window;
                    }
                }
            }
            if is_max {
                kept.push((x, y, s));
            }
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn corner_image() -> Image {
        // Bright 6x6 block whose top-left corner sits at (10, 10)
        Image::from_fn(24, 24, |x, y| {
            if (10..16).contains(&x) && (10..16).contains(&y) {
                230
            } else {
                30
            }
        })
        .unwrap()
    }

    #[test]
    fn test_consecutive_pixels_simple() {
        let mut pixels = [false; 16];
        for p in pixels.iter_mut().take(9) {
            *p = true;
        }
        assert!(has_consecutive_pixels(&pixels, 9));
        assert!(!has_consecutive_pixels(&pixels, 10));
        assert!(has_consecutive_bits(0b1_1111_1111, 9));
        assert!(!has_consecutive_bits(0b1_1111_1111, 10));
    }

    #[test]
    fn test_consecutive_bits_wrap_around() {
        // Bits 12..16 and 0..5 form one run of 9
        let mask: u16 = 0xF000 | 0x001F;
        assert!(has_consecutive_bits(mask, 9));
        assert!(!has_consecutive_bits(0xAAAA, 2));
        assert!(!has_consecutive_bits(0xFFFF, 0));
    }

    #[test]
    fn test_block_corner_is_detected() {
        let img = corner_image();
        let ring = circle(&img, 10, 10);
        assert!(is_corner(&ring, img.get(10, 10), 20, 9));
        let score = corner_score(&ring, img.get(10, 10), 20, 9);
        assert!(score >= 20);

        // Middle of a flat area is not a corner
        let ring = circle(&img, 4, 4);
        assert_eq!(corner_score(&ring, img.get(4, 4), 20, 9), 0);
    }

    #[test]
    fn test_score_map_and_nms() {
        let img = corner_image();
        let scores = score_map(&img, 20, 9, 3);
        assert_eq!(scores.len(), 24 * 24);
        let peaks = non_max_suppression(&scores, 24, 24);
        assert!(!peaks.is_empty());
        for &(x, y, s) in &peaks {
            assert!(s > 0);
            assert!((3..21).contains(&x) && (3..21).contains(&y));
        }
        // Suppression leaves no two peaks adjacent
        for (i, a) in peaks.iter().enumerate() {
            for b in &peaks[i + 1..] {
                let dx = a.0.abs_diff(b.0);
                let dy = a.1.abs_diff(b.1);
                assert!(dx > 1 || dy > 1);
            }
        }
    }

    #[test]
    fn test_uniform_image_has_no_corners() {
        let img = Image::filled(32, 32, 128).unwrap();
        let scores = score_map(&img, 10, 9, 3);
        assert!(scores.iter().all(|&s| s == 0));
    }

    proptest! {
        #[test]
        fn prop_bitmask_matches_reference(mask in any::<u16>(), n in 1usize..=16) {
            let mut pixels = [false; 16];
            for (i, p) in pixels.iter_mut().enumerate() {
                *p = mask & (1 << i) != 0;
            }
            prop_assert_eq!(has_consecutive_bits(mask, n), has_consecutive_pixels(&pixels, n));
        }
    }
}
