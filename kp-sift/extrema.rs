use rayon::prelude::*;

use crate::scale_space::{FloatImage, ScaleSpace};

/// Pixels skipped at every octave border
pub const IMG_BORDER: usize = 5;
const MAX_INTERP_STEPS: usize = 5;
/// DoG values are on the 0..255 scale; thresholds are on 0..1
const IMG_SCALE: f32 = 1.0 / 255.0;

/// Scale-space extremum after sub-pixel localisation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extremum {
    pub octave: usize,
    pub layer: usize,
    /// Integer location in the octave after refinement
    pub col: usize,
    pub row: usize,
    /// Sub-pixel offsets in (x, y, layer)
    pub offset: (f32, f32, f32),
    /// Interpolated |DoG| on the 0..1 scale
    pub contrast: f32,
}

impl Extremum {
    /// Octave-local scale of the refined point
    pub fn octave_sigma(&self, sigma: f32, n_octave_layers: usize) -> f32 {
        sigma * 2f32.powf((self.layer as f32 + self.offset.2) / n_octave_layers as f32)
    }
}

/// Thresholds used while scanning and refining extrema
#[derive(Debug, Clone, Copy)]
pub struct ExtremaParams {
    pub contrast_threshold: f32,
    pub edge_threshold: f32,
}

/// Find and refine scale-space extrema over every octave and layer
pub fn find_extrema(space: &ScaleSpace, params: ExtremaParams) -> Vec<Extremum> {
    let layers = space.n_octave_layers;
    // Prefilter on the raw 0..255 DoG
    let threshold = (0.5 * params.contrast_threshold / layers as f32 * 255.0).floor();

    let mut found = Vec::new();
    for (o, dogs) in space.dogs.iter().enumerate() {
        let (w, h) = (dogs[0].width, dogs[0].height);
        if w <= 2 * IMG_BORDER || h <= 2 * IMG_BORDER {
            continue;
        }
        for layer in 1..=layers {
            let level: Vec<Extremum> = (IMG_BORDER..h - IMG_BORDER)
                .into_par_iter()
                .flat_map_iter(|r| {
                    let mut v = Vec::new();
                    for c in IMG_BORDER..w - IMG_BORDER {
                        let val = dogs[layer].at(c, r);
                        if val.abs() <= threshold || !is_extremum(dogs, layer, c, r, val) {
                            continue;
                        }
                        if let Some(e) = localize(dogs, o, layer, c, r, layers, params) {
                            v.push(e);
                        }
                    }
                    v
                })
                .collect();
            found.extend(level);
        }
    }
    found
}

/// Compare against the 26 neighbours in space and scale
fn is_extremum(dogs: &[FloatImage], layer: usize, c: usize, r: usize, val: f32) -> bool {
    for img in &dogs[layer - 1..=layer + 1] {
        for y in r - 1..=r + 1 {
            for x in c - 1..=c + 1 {
                let n = img.at(x, y);
                if val > 0.0 && n > val {
                    return false;
                }
                if val < 0.0 && n < val {
                    return false;
                }
            }
        }
    }
    true
}

/// First derivatives and Hessian of the DoG at a sample, on the 0..1 scale
fn derivatives(dogs: &[FloatImage], layer: usize, c: usize, r: usize) -> ([f32; 3], [[f32; 3]; 3]) {
    let prev = &dogs[layer - 1];
    let img = &dogs[layer];
    let next = &dogs[layer + 1];

    let deriv_scale = IMG_SCALE * 0.5;
    let second_scale = IMG_SCALE;
    let cross_scale = IMG_SCALE * 0.25;

    let v2 = img.at(c, r) * 2.0;
    let dx = (img.at(c + 1, r) - img.at(c - 1, r)) * deriv_scale;
    let dy = (img.at(c, r + 1) - img.at(c, r - 1)) * deriv_scale;
    let ds = (next.at(c, r) - prev.at(c, r)) * deriv_scale;

    let dxx = (img.at(c + 1, r) + img.at(c - 1, r) - v2) * second_scale;
    let dyy = (img.at(c, r + 1) + img.at(c, r - 1) - v2) * second_scale;
    let dss = (next.at(c, r) + prev.at(c, r) - v2) * second_scale;
    let dxy = (img.at(c + 1, r + 1) - img.at(c - 1, r + 1) - img.at(c + 1, r - 1) + img.at(c - 1, r - 1)) * cross_scale;
    let dxs = (next.at(c + 1, r) - next.at(c - 1, r) - prev.at(c + 1, r) + prev.at(c - 1, r)) * cross_scale;
    let dys = (next.at(c, r + 1) - next.at(c, r - 1) - prev.at(c, r + 1) + prev.at(c, r - 1)) * cross_scale;

    (
        [dx, dy, ds],
        [[dxx, dxy, dxs], [dxy, dyy, dys], [dxs, dys, dss]],
    )
}

/// Solve `h * x = b` by Cramer's rule; `None` for a singular system
fn solve3(h: [[f32; 3]; 3], b: [f32; 3]) -> Option<[f32; 3]> {
    let det = |m: [[f32; 3]; 3]| {
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1]) - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    };
    let d = det(h);
    if d.abs() < f32::EPSILON * 1e-3 || !d.is_finite() {
        return None;
    }
    let mut x = [0f32; 3];
    for (col, slot) in x.iter_mut().enumerate() {
        let mut m = h;
        for row in 0..3 {
            m[row][col] = b[row];
        }
        *slot = det(m) / d;
    }
    Some(x)
}

/// Quadratic refinement of an extremum, rejecting low-contrast and edge
/// responses
fn localize(
    dogs: &[FloatImage],
    octave: usize,
    layer: usize,
    c: usize,
    r: usize,
    n_octave_layers: usize,
    params: ExtremaParams,
) -> Option<Extremum> {
    let (w, h) = (dogs[0].width, dogs[0].height);
    let (mut c, mut r, mut layer) = (c, r, layer);
    let mut offset = [0f32; 3];
    let mut converged = false;

    for _ in 0..MAX_INTERP_STEPS {
        let (grad, hess) = derivatives(dogs, layer, c, r);
        let step = solve3(hess, grad)?;
        offset = [-step[0], -step[1], -step[2]];

        if offset.iter().all(|v| v.abs() < 0.5) {
            converged = true;
            break;
        }
        if offset.iter().any(|v| v.abs() > (i32::MAX / 3) as f32) {
            return None;
        }

        let nc = c as i64 + offset[0].round() as i64;
        let nr = r as i64 + offset[1].round() as i64;
        let nl = layer as i64 + offset[2].round() as i64;
        if nl < 1
            || nl > n_octave_layers as i64
            || nc < IMG_BORDER as i64
            || nc >= (w - IMG_BORDER) as i64
            || nr < IMG_BORDER as i64
            || nr >= (h - IMG_BORDER) as i64
        {
            return None;
        }
        c = nc as usize;
        r = nr as usize;
        layer = nl as usize;
    }
    if !converged {
        return None;
    }

    let (grad, hess) = derivatives(dogs, layer, c, r);
    let t = grad[0] * offset[0] + grad[1] * offset[1] + grad[2] * offset[2];
    let contrast = dogs[layer].at(c, r) * IMG_SCALE + t * 0.5;
    if contrast.abs() * (n_octave_layers as f32) < params.contrast_threshold {
        return None;
    }

    // Principal curvature ratio
    let (dxx, dyy, dxy) = (hess[0][0], hess[1][1], hess[0][1]);
    let trace = dxx + dyy;
    let det = dxx * dyy - dxy * dxy;
    let e = params.edge_threshold;
    if det <= 0.0 || trace * trace * e >= (e + 1.0) * (e + 1.0) * det {
        return None;
    }

    Some(Extremum {
        octave,
        layer,
        col: c,
        row: r,
        offset: (offset[0], offset[1], offset[2]),
        contrast: contrast.abs(),
    })
}
