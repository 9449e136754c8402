//! Deterministic synthetic scenes for tests and benchmarks.

use crate::error::DetectResult;
use crate::image::Image;

const BACKGROUND: u8 = 40;
const MARGIN: usize = 40;
const SPACING: usize = 48;
const SIDES: [usize; 5] = [8, 11, 14, 18, 22];
const INTENSITIES: [u8; 3] = [210, 235, 180];

/// Bright squares of varying size on a dark background with a faint
/// horizontal gradient.
///
/// Squares are laid out on a grid that keeps `MARGIN` pixels clear of the
/// border, so every detector in the workspace can describe them.
pub fn squares_scene(width: usize, height: usize) -> DetectResult<Image> {
    let squares = square_layout(width, height);
    Image::from_fn(width, height, |x, y| {
        for &(sx, sy, side, value) in &squares {
            if x >= sx && x < sx + side && y >= sy && y < sy + side {
                return value;
            }
        }
        BACKGROUND + ((x * 12) / width.max(1)) as u8
    })
}

/// Top-left corner, side and intensity of every square in the scene
pub fn square_layout(width: usize, height: usize) -> Vec<(usize, usize, usize, u8)> {
    let mut squares = Vec::new();
    let mut i = 0;
    let mut y = MARGIN;
    while y + SIDES[SIDES.len() - 1] + MARGIN <= height {
        let mut x = MARGIN;
        while x + SIDES[SIDES.len() - 1] + MARGIN <= width {
            let side = SIDES[i % SIDES.len()];
            let value = INTENSITIES[i % INTENSITIES.len()];
            squares.push((x, y, side, value));
            i += 1;
            x += SPACING;
        }
        y += SPACING;
    }
    squares
}
