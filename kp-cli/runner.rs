use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use image::{ImageReader, RgbImage};
use kp_core::{Descriptors, FeatureDetector, Image, Keypoint};
use tracing::{info, warn};

use crate::config::RunnerConfig;
use crate::detector_kind::{DetectorKind, Mode};
use crate::error::{RunnerError, RunnerResult};
use crate::report::{ComparisonEntry, ComparisonReport};
use crate::visualize;

/// An image read from disk: the colour version for annotation and the
/// grayscale version the detectors see
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub path: PathBuf,
    pub color: RgbImage,
    pub gray: Image,
}

impl LoadedImage {
    /// Wrap a grayscale image that did not come from a file
    pub fn from_gray(path: impl Into<PathBuf>, gray: Image) -> Self {
        Self {
            path: path.into(),
            color: visualize::gray_to_rgb(&gray),
            gray,
        }
    }
}

/// Source of images for `DetectorRunner::run`
pub trait ImageLoader: Send + Sync {
    fn load(&self, path: &Path) -> RunnerResult<LoadedImage>;
}

/// Reads and decodes images from the filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLoader;

impl ImageLoader for FsLoader {
    fn load(&self, path: &Path) -> RunnerResult<LoadedImage> {
        if !path.exists() {
            return Err(RunnerError::ImageNotFound {
                path: path.to_path_buf(),
            });
        }
        let decode_err = |message: String| RunnerError::ImageDecode {
            path: path.to_path_buf(),
            message,
        };
        let decoded = ImageReader::open(path)
            .map_err(|e| decode_err(e.to_string()))?
            .with_guessed_format()
            .map_err(|e| decode_err(e.to_string()))?
            .decode()
            .map_err(|e| decode_err(e.to_string()))?;

        let luma = decoded.to_luma8();
        let (w, h) = luma.dimensions();
        let gray = Image::new(w as usize, h as usize, luma.into_raw()).map_err(|e| decode_err(e.to_string()))?;
        Ok(LoadedImage {
            path: path.to_path_buf(),
            color: decoded.to_rgb8(),
            gray,
        })
    }
}

/// Keypoints from one detector call with its timing
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    pub detector: DetectorKind,
    /// In the order the detector returned them
    pub keypoints: Vec<Keypoint>,
    pub descriptors: Option<Descriptors>,
    pub elapsed: Duration,
    pub width: usize,
    pub height: usize,
}

impl DetectionResult {
    pub fn count(&self) -> usize {
        self.keypoints.len()
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    pub fn descriptor_shape(&self) -> Option<String> {
        self.descriptors.as_ref().map(Descriptors::shape)
    }
}

/// What `DetectorRunner::run` produced
#[derive(Debug)]
pub enum RunOutcome {
    Single {
        image: LoadedImage,
        result: DetectionResult,
    },
    Compare {
        image: LoadedImage,
        report: ComparisonReport,
    },
}

/// Runs the detector collaborators on images and collects their results
pub struct DetectorRunner {
    config: RunnerConfig,
    detectors: BTreeMap<DetectorKind, Box<dyn FeatureDetector>>,
    loader: Box<dyn ImageLoader>,
}

impl std::fmt::Debug for DetectorRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorRunner")
            .field("config", &self.config)
            .field("detectors", &self.detectors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl DetectorRunner {
    /// Build every detector from `config`; invalid parameters are
    /// configuration errors
    pub fn new(config: RunnerConfig) -> RunnerResult<Self> {
        let mut detectors = BTreeMap::new();
        for kind in DetectorKind::ALL {
            detectors.insert(kind, kind.build(&config)?);
        }
        Ok(Self {
            config,
            detectors,
            loader: Box::new(FsLoader),
        })
    }

    /// Replace the collaborator used for `kind`
    pub fn with_detector(mut self, kind: DetectorKind, detector: Box<dyn FeatureDetector>) -> Self {
        self.detectors.insert(kind, detector);
        self
    }

    pub fn with_loader(mut self, loader: Box<dyn ImageLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn load_image(&self, path: &Path) -> RunnerResult<LoadedImage> {
        self.loader.load(path)
    }

    pub fn detect(&self, image: &Image, kind: DetectorKind) -> RunnerResult<DetectionResult> {
        let detector = self
            .detectors
            .get(&kind)
            .ok_or_else(|| RunnerError::InvalidConfig(format!("no collaborator registered for {}", kind)))?;

        let start = Instant::now();
        let features = detector
            .detect_and_compute(image, self.config.compute_descriptors)
            .map_err(|source| RunnerError::Detector { kind, source })?;
        let elapsed = start.elapsed();

        info!(
            detector = %kind,
            keypoints = features.keypoints.len(),
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "detection finished"
        );
        Ok(DetectionResult {
            detector: kind,
            keypoints: features.keypoints,
            descriptors: features.descriptors,
            elapsed,
            width: image.width(),
            height: image.height(),
        })
    }

    /// Parse `name` first; unknown names never reach a detector
    pub fn detect_named(&self, image: &Image, name: &str) -> RunnerResult<DetectionResult> {
        let kind: DetectorKind = name.parse()?;
        self.detect(image, kind)
    }

    /// Run every detector in turn. A failing detector is recorded in its
    /// entry and the rest still run.
    pub fn compare_all(&self, image: &Image) -> ComparisonReport {
        let mut report = ComparisonReport::new();
        for kind in DetectorKind::ALL {
            let entry = match self.detect(image, kind) {
                Ok(result) => ComparisonEntry::Completed(result),
                Err(err) => {
                    warn!(detector = %kind, error = %err, "detector failed during comparison");
                    ComparisonEntry::Failed(err)
                }
            };
            report.insert(kind, entry);
        }
        report
    }

    /// Annotated copy of `base`; the input is left untouched
    pub fn visualize(&self, base: &RgbImage, result: &DetectionResult) -> RgbImage {
        visualize::draw_keypoints(base, &result.keypoints, &self.config.draw)
    }

    /// Parse the mode, then load the image and run it
    pub fn run(&self, path: &Path, mode_name: &str) -> RunnerResult<RunOutcome> {
        let mode: Mode = mode_name.parse()?;
        self.run_mode(path, mode)
    }

    pub fn run_mode(&self, path: &Path, mode: Mode) -> RunnerResult<RunOutcome> {
        let image = self.load_image(path)?;
        info!(
            path = %path.display(),
            width = image.gray.width(),
            height = image.gray.height(),
            "image loaded"
        );
        match mode {
            Mode::Single(kind) => {
                let result = self.detect(&image.gray, kind)?;
                Ok(RunOutcome::Single { image, result })
            }
            Mode::Compare => {
                let report = self.compare_all(&image.gray);
                Ok(RunOutcome::Compare { image, report })
            }
        }
    }
}

/// `<stem>_<detector>_keypoints.png` inside `out_dir`
pub fn output_path(out_dir: &Path, image_path: &Path, kind: DetectorKind) -> PathBuf {
    let stem = image_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    out_dir.join(format!("{}_{}_keypoints.png", stem, kind.name().to_lowercase()))
}

/// Write an annotated image, creating parent directories as needed
pub fn save_annotated(image: &RgbImage, path: &Path) -> RunnerResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| RunnerError::output(parent, e))?;
    }
    image.save(path).map_err(|e| RunnerError::output(path, e))?;
    info!(path = %path.display(), "annotated image saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kp_core::synthetic::squares_scene;

    #[test]
    fn test_output_path() {
        let path = output_path(Path::new("out"), Path::new("/data/lenna.png"), DetectorKind::Brisk);
        assert_eq!(path, PathBuf::from("out/lenna_brisk_keypoints.png"));
    }

    #[test]
    fn test_fs_loader_missing_file() {
        let err = FsLoader.load(Path::new("/no/such/image.png")).unwrap_err();
        assert!(matches!(err, RunnerError::ImageNotFound { .. }));
    }

    #[test]
    fn test_fs_loader_reads_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.png");
        let gray = squares_scene(96, 80).unwrap();
        let luma = image::GrayImage::from_raw(96, 80, gray.as_raw().to_vec()).unwrap();
        luma.save(&path).unwrap();

        let loaded = FsLoader.load(&path).unwrap();
        assert_eq!(loaded.gray, gray);
        assert_eq!(loaded.color.dimensions(), (96, 80));
    }

    #[test]
    fn test_fs_loader_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not an image").unwrap();
        assert!(matches!(FsLoader.load(&path), Err(RunnerError::ImageDecode { .. })));
    }

    #[test]
    fn test_descriptors_can_be_disabled() {
        let config = RunnerConfig {
            compute_descriptors: false,
            ..RunnerConfig::default()
        };
        let runner = DetectorRunner::new(config).unwrap();
        let img = squares_scene(128, 128).unwrap();
        let result = runner.detect(&img, DetectorKind::Orb).unwrap();
        assert!(result.descriptors.is_none());
        assert_eq!((result.width, result.height), (128, 128));
    }

    #[test]
    fn test_save_annotated_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.png");
        save_annotated(&RgbImage::new(4, 4), &path).unwrap();
        assert!(path.exists());
    }
}
