use std::f32::consts::PI;

use crate::scale_space::FloatImage;

pub const ORI_HIST_BINS: usize = 36;
const ORI_SIG_FCTR: f32 = 1.5;
const ORI_RADIUS: f32 = 3.0 * ORI_SIG_FCTR;
const ORI_PEAK_RATIO: f32 = 0.8;

/// Dominant gradient orientations around `(x, y)` in radians, `[0, 2π)`.
///
/// Builds a Gaussian-weighted 36-bin histogram, smooths it and returns every
/// local peak within 80% of the maximum, refined by parabolic interpolation.
pub fn dominant_orientations(img: &FloatImage, x: usize, y: usize, scale: f32) -> Vec<f32> {
    let hist = orientation_histogram(img, x, y, scale);
    peaks(&hist)
}

fn orientation_histogram(img: &FloatImage, x: usize, y: usize, scale: f32) -> [f32; ORI_HIST_BINS] {
    let sigma = ORI_SIG_FCTR * scale;
    let radius = (ORI_RADIUS * scale).round() as isize;
    let expf = -1.0 / (2.0 * sigma * sigma);
    let mut raw = [0f32; ORI_HIST_BINS];

    for dy in -radius..=radius {
        let yy = y as isize + dy;
        if yy <= 0 || yy >= img.height as isize - 1 {
            continue;
        }
        for dx in -radius..=radius {
            let xx = x as isize + dx;
            if xx <= 0 || xx >= img.width as isize - 1 {
                continue;
            }
            let (xx, yy) = (xx as usize, yy as usize);
            let gx = img.at(xx + 1, yy) - img.at(xx - 1, yy);
            let gy = img.at(xx, yy + 1) - img.at(xx, yy - 1);
            let weight = (((dx * dx + dy * dy) as f32) * expf).exp();
            let mag = (gx * gx + gy * gy).sqrt();
            let angle = gy.atan2(gx).rem_euclid(2.0 * PI);
            let bin = ((ORI_HIST_BINS as f32 * angle / (2.0 * PI)).round() as usize) % ORI_HIST_BINS;
            raw[bin] += weight * mag;
        }
    }

    // [1 4 6 4 1] / 16 circular smoothing
    let n = ORI_HIST_BINS;
    let mut hist = [0f32; ORI_HIST_BINS];
    for (i, slot) in hist.iter_mut().enumerate() {
        *slot = (raw[(i + n - 2) % n] + raw[(i + 2) % n]) * (1.0 / 16.0)
            + (raw[(i + n - 1) % n] + raw[(i + 1) % n]) * (4.0 / 16.0)
            + raw[i] * (6.0 / 16.0);
    }
    hist
}

fn peaks(hist: &[f32; ORI_HIST_BINS]) -> Vec<f32> {
    let n = ORI_HIST_BINS;
    let max = hist.iter().cloned().fold(0.0f32, f32::max);
    if max <= 0.0 {
        return Vec::new();
    }
    let threshold = max * ORI_PEAK_RATIO;

    let mut out = Vec::new();
    for i in 0..n {
        let l = hist[(i + n - 1) % n];
        let r = hist[(i + 1) % n];
        let v = hist[i];
        if v > l && v > r && v >= threshold {
            let bin = i as f32 + 0.5 * (l - r) / (l - 2.0 * v + r);
            let angle = (2.0 * PI * bin / n as f32).rem_euclid(2.0 * PI);
            out.push(angle);
        }
    }
    out
}
