use std::f32::consts::PI;

use crate::scale_space::FloatImage;

/// Spatial cells per side
pub const DESCR_WIDTH: usize = 4;
/// Orientation bins per cell
pub const DESCR_HIST_BINS: usize = 8;
/// 4 x 4 x 8
pub const DESCRIPTOR_DIMS: usize = DESCR_WIDTH * DESCR_WIDTH * DESCR_HIST_BINS;

const DESCR_SCL_FCTR: f32 = 3.0;
const DESCR_MAG_THR: f32 = 0.2;
const INT_DESCR_FCTR: f32 = 512.0;

/// 128-dimensional gradient histogram descriptor for a keypoint at
/// `(x, y)` of the given octave-local `scale`, rotated by `angle` radians.
///
/// Values are normalised, clipped at 0.2, renormalised and scaled into
/// `0..=255`.
pub fn describe(img: &FloatImage, x: f32, y: f32, angle: f32, scale: f32) -> [f32; DESCRIPTOR_DIMS] {
    let d = DESCR_WIDTH;
    let n = DESCR_HIST_BINS;
    let (cos_t, sin_t) = (angle.cos(), angle.sin());
    let bins_per_rad = n as f32 / (2.0 * PI);
    let exp_scale = -1.0 / (d as f32 * d as f32 * 0.5);
    let hist_width = DESCR_SCL_FCTR * scale;
    let radius = ((hist_width * std::f32::consts::SQRT_2 * (d as f32 + 1.0) * 0.5).round() as isize)
        .min(((img.width * img.width + img.height * img.height) as f32).sqrt() as isize);
    let (cos_t, sin_t) = (cos_t / hist_width, sin_t / hist_width);

    let (xi, yi) = (x.round() as isize, y.round() as isize);
    // (d + 2)^2 * (n + 2) with one guard cell on each side
    let mut hist = vec![0f32; (d + 2) * (d + 2) * (n + 2)];

    for i in -radius..=radius {
        for j in -radius..=radius {
            // Rotate the sample offset into the keypoint frame
            let c_rot = j as f32 * cos_t - i as f32 * sin_t;
            let r_rot = j as f32 * sin_t + i as f32 * cos_t;
            let rbin = r_rot + d as f32 / 2.0 - 0.5;
            let cbin = c_rot + d as f32 / 2.0 - 0.5;

            if rbin <= -1.0 || rbin >= d as f32 || cbin <= -1.0 || cbin >= d as f32 {
                continue;
            }
            let r = yi + i;
            let c = xi + j;
            if r <= 0 || r >= img.height as isize - 1 || c <= 0 || c >= img.width as isize - 1 {
                continue;
            }
            let (r, c) = (r as usize, c as usize);
            let dx = img.at(c + 1, r) - img.at(c - 1, r);
            let dy = img.at(c, r + 1) - img.at(c, r - 1);
            let weight = ((c_rot * c_rot + r_rot * r_rot) * exp_scale).exp();
            let mag = (dx * dx + dy * dy).sqrt() * weight;
            let ori = (dy.atan2(dx) - angle).rem_euclid(2.0 * PI);
            let obin = ori * bins_per_rad;

            accumulate(&mut hist, rbin, cbin, obin, mag);
        }
    }

    let mut out = [0f32; DESCRIPTOR_DIMS];
    for r in 0..d {
        for c in 0..d {
            let base = ((r + 1) * (d + 2) + (c + 1)) * (n + 2);
            // Fold the wrap-around orientation bins back in
            hist[base] += hist[base + n];
            hist[base + 1] += hist[base + n + 1];
            for k in 0..n {
                out[(r * d + c) * n + k] = hist[base + k];
            }
        }
    }

    normalize(&mut out);
    out
}

/// Trilinear interpolation of one sample into the (row, col, orientation)
/// histogram with guard cells
fn accumulate(hist: &mut [f32], rbin: f32, cbin: f32, obin: f32, mag: f32) {
    let d = DESCR_WIDTH;
    let n = DESCR_HIST_BINS;
    let (r0, c0, o0) = (rbin.floor(), cbin.floor(), obin.floor());
    let (dr, dc, dob) = (rbin - r0, cbin - c0, obin - o0);
    let mut o0 = o0 as isize;
    if o0 < 0 {
        o0 += n as isize;
    }
    if o0 >= n as isize {
        o0 -= n as isize;
    }

    let rows = [(r0 as isize, 1.0 - dr), (r0 as isize + 1, dr)];
    let cols = [(c0 as isize, 1.0 - dc), (c0 as isize + 1, dc)];
    let oris = [(o0, 1.0 - dob), (o0 + 1, dob)];

    for (r, wr) in rows {
        for (c, wc) in cols {
            let idx = ((r + 1) as usize * (d + 2) + (c + 1) as usize) * (n + 2);
            for (o, wo) in oris {
                hist[idx + o as usize] += mag * wr * wc * wo;
            }
        }
    }
}

fn normalize(v: &mut [f32; DESCRIPTOR_DIMS]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm <= f32::EPSILON {
        return;
    }
    let thr = norm * DESCR_MAG_THR;
    let mut norm2 = 0f32;
    for x in v.iter_mut() {
        *x = x.min(thr);
        norm2 += *x * *x;
    }
    let scale = INT_DESCR_FCTR / norm2.sqrt().max(f32::EPSILON);
    for x in v.iter_mut() {
        *x = (*x * scale).round().clamp(0.0, 255.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(width: usize, height: usize) -> FloatImage {
        let mut img = FloatImage::zeros(width, height);
        for y in 0..height {
            for x in 0..width {
                let v = ((x * 7 + y * 13) % 31) as f32 * 6.0 + if x > width / 2 { 40.0 } else { 0.0 };
                img.data[y * width + x] = v;
            }
        }
        img
    }

    #[test]
    fn test_values_are_in_byte_range() {
        let img = pattern(64, 64);
        let desc = describe(&img, 32.0, 32.0, 0.3, 2.0);
        assert_eq!(desc.len(), 128);
        assert!(desc.iter().all(|&v| (0.0..=255.0).contains(&v)));
        assert!(desc.iter().any(|&v| v > 0.0));
    }

    #[test]
    fn test_flat_patch_is_all_zero() {
        let mut img = FloatImage::zeros(40, 40);
        img.data.iter_mut().for_each(|v| *v = 80.0);
        let desc = describe(&img, 20.0, 20.0, 0.0, 1.6);
        assert!(desc.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_deterministic() {
        let img = pattern(48, 48);
        assert_eq!(describe(&img, 24.0, 24.0, 1.0, 1.8), describe(&img, 24.0, 24.0, 1.0, 1.8));
    }

    #[test]
    fn test_clipping_limits_dominant_bin() {
        // One strong edge puts most energy in few bins; clipping keeps them bounded
        let mut img = FloatImage::zeros(48, 48);
        for y in 0..48 {
            for x in 24..48 {
                img.data[y * 48 + x] = 200.0;
            }
        }
        let desc = describe(&img, 24.0, 24.0, 0.0, 2.0);
        let max = desc.iter().cloned().fold(0.0f32, f32::max);
        assert!(max > 0.0);
        assert!(max <= 255.0);
    }
}
