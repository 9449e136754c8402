//! Types shared by the keypoint detector crates and the detector contract
//! the comparison runner drives.

pub mod error;
pub mod fast;
pub mod image;
pub mod synthetic;

pub use error::{DetectError, DetectResult};
pub use image::Image;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A detected keypoint in level-0 pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    /// Diameter of the meaningful neighbourhood
    pub size: f32,
    /// Orientation in radians
    pub angle: f32,
    pub response: f32,
    /// Pyramid level or octave the point was found on
    pub octave: i32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, size: f32) -> Self {
        Self {
            x,
            y,
            size,
            angle: 0.0,
            response: 0.0,
            octave: 0,
        }
    }
}

/// Descriptor matrix with one row per keypoint
#[derive(Debug, Clone, PartialEq)]
pub enum Descriptors {
    /// Bit strings packed into `bytes` bytes per row
    Binary { bytes: usize, data: Vec<u8> },
    /// Float vectors of `dims` values per row
    Float { dims: usize, data: Vec<f32> },
}

impl Descriptors {
    pub fn empty_binary(bytes: usize) -> Self {
        Descriptors::Binary {
            bytes,
            data: Vec::new(),
        }
    }

    pub fn empty_float(dims: usize) -> Self {
        Descriptors::Float {
            dims,
            data: Vec::new(),
        }
    }

    pub fn rows(&self) -> usize {
        match self {
            Descriptors::Binary { bytes, data } => data.len() / (*bytes).max(1),
            Descriptors::Float { dims, data } => data.len() / (*dims).max(1),
        }
    }

    /// Row width in elements (bytes or floats)
    pub fn row_len(&self) -> usize {
        match self {
            Descriptors::Binary { bytes, .. } => *bytes,
            Descriptors::Float { dims, .. } => *dims,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows() == 0
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Descriptors::Binary { .. } => "binary",
            Descriptors::Float { .. } => "float",
        }
    }

    /// Short shape label such as `500x32 binary`
    pub fn shape(&self) -> String {
        format!("{}x{} {}", self.rows(), self.row_len(), self.kind_name())
    }
}

/// Output of one `detect_and_compute` call
#[derive(Debug, Clone, PartialEq)]
pub struct Features {
    pub keypoints: Vec<Keypoint>,
    pub descriptors: Option<Descriptors>,
}

/// Capability contract every detector collaborator fulfils.
///
/// Parameters are fixed when the detector is constructed; calls are
/// deterministic for the same image.
pub trait FeatureDetector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Find keypoints in the image
    fn detect(&self, img: &Image) -> DetectResult<Vec<Keypoint>>;

    /// Describe the given keypoints. Keypoints whose sampling area does not
    /// fit in the image are dropped; returned keypoints and rows line up.
    fn compute(
        &self,
        img: &Image,
        keypoints: Vec<Keypoint>,
    ) -> DetectResult<(Vec<Keypoint>, Descriptors)>;

    fn detect_and_compute(&self, img: &Image, with_descriptors: bool) -> DetectResult<Features> {
        let keypoints = self.detect(img)?;
        if !with_descriptors {
            return Ok(Features {
                keypoints,
                descriptors: None,
            });
        }
        let (keypoints, descriptors) = self.compute(img, keypoints)?;
        if descriptors.rows() != keypoints.len() {
            return Err(DetectError::DescriptorMismatch {
                keypoints: keypoints.len(),
                rows: descriptors.rows(),
            });
        }
        Ok(Features {
            keypoints,
            descriptors: Some(descriptors),
        })
    }
}

/// Keep the `n` strongest keypoints, preserving their original order
pub fn retain_best(keypoints: Vec<Keypoint>, n: usize) -> Vec<Keypoint> {
    if keypoints.len() <= n {
        return keypoints;
    }
    let mut order: Vec<usize> = (0..keypoints.len()).collect();
    order.sort_by(|&a, &b| {
        keypoints[b]
            .response
            .total_cmp(&keypoints[a].response)
            .then(a.cmp(&b))
    });
    order.truncate(n);
    order.sort_unstable();
    order.into_iter().map(|i| keypoints[i]).collect()
}

/// Number of worker threads to use; `0` means one per logical CPU
pub fn resolve_threads(requested: usize) -> usize {
    if requested == 0 {
        num_cpus::get().max(1)
    } else {
        requested
    }
}

/// Initialize Rayon thread pool with the specified number of threads
pub fn init_thread_pool(n_threads: usize) -> Result<(), rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(resolve_threads(n_threads))
        .build_global()
}
