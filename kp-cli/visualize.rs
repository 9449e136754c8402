use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut};
use kp_core::{Image, Keypoint};

use crate::config::DrawStyle;

/// Copy of `base` with a circle at every keypoint.
///
/// The rich style sizes each circle by the keypoint size and adds a tick
/// along its orientation. Keypoints outside the image are clipped.
pub fn draw_keypoints(base: &RgbImage, keypoints: &[Keypoint], style: &DrawStyle) -> RgbImage {
    let mut output = base.clone();
    let color = Rgb(style.color);
    let limit = if style.max_keypoints == 0 {
        keypoints.len()
    } else {
        style.max_keypoints.min(keypoints.len())
    };
    let floor = style.radius_floor.max(1) as i32;

    for kp in &keypoints[..limit] {
        if !(kp.x.is_finite() && kp.y.is_finite()) {
            continue;
        }
        let centre = (kp.x.round() as i32, kp.y.round() as i32);
        if !style.rich {
            draw_hollow_circle_mut(&mut output, centre, floor, color);
            continue;
        }
        let radius = if kp.size.is_finite() {
            ((kp.size * 0.5).round() as i32).max(floor)
        } else {
            floor
        };
        draw_hollow_circle_mut(&mut output, centre, radius, color);
        let (s, c) = kp.angle.sin_cos();
        let end = (kp.x + radius as f32 * c, kp.y + radius as f32 * s);
        draw_line_segment_mut(&mut output, (kp.x, kp.y), end, color);
    }
    output
}

/// Grayscale image expanded to three equal channels
pub fn gray_to_rgb(img: &Image) -> RgbImage {
    let (w, h) = img.dimensions();
    RgbImage::from_fn(w as u32, h as u32, |x, y| {
        let v = img.get(x as usize, y as usize);
        Rgb([v, v, v])
    })
}
