use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use serde::Serialize;
use tracing::warn;

use crate::detector_kind::DetectorKind;
use crate::error::{RunnerError, RunnerResult};
use crate::runner::DetectionResult;

/// Outcome of one detector within a comparison
#[derive(Debug)]
pub enum ComparisonEntry {
    Completed(DetectionResult),
    Failed(RunnerError),
}

impl ComparisonEntry {
    pub fn result(&self) -> Option<&DetectionResult> {
        match self {
            ComparisonEntry::Completed(result) => Some(result),
            ComparisonEntry::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ComparisonEntry::Failed(_))
    }
}

/// One row of the comparison table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionSummary {
    pub detector: DetectorKind,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keypoint_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descriptor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DetectionSummary {
    pub fn from_result(result: &DetectionResult) -> Self {
        Self {
            detector: result.detector,
            status: "ok",
            keypoint_count: Some(result.count()),
            elapsed_seconds: Some(result.elapsed_secs()),
            descriptor: result.descriptor_shape(),
            error: None,
        }
    }
}

/// Results of running every detector on the same image, keyed and iterated
/// in the order SIFT, ORB, BRISK
#[derive(Debug, Default)]
pub struct ComparisonReport {
    entries: BTreeMap<DetectorKind, ComparisonEntry>,
}

const PLOT_COLORS: [[u8; 3]; 3] = [[66, 133, 244], [219, 68, 55], [15, 157, 88]];

impl ComparisonReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: DetectorKind, entry: ComparisonEntry) {
        self.entries.insert(kind, entry);
    }

    pub fn get(&self, kind: DetectorKind) -> Option<&ComparisonEntry> {
        self.entries.get(&kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DetectorKind, &ComparisonEntry)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    pub fn failures(&self) -> usize {
        self.entries.values().filter(|e| e.is_failed()).count()
    }

    /// Fails only when every detector failed; partial failure is logged
    pub fn check(&self) -> RunnerResult<()> {
        let failed = self.failures();
        if !self.is_empty() && failed == self.len() {
            return Err(RunnerError::AllDetectorsFailed(failed));
        }
        if failed > 0 {
            warn!(failed, total = self.len(), "comparison finished with failures");
        }
        Ok(())
    }

    pub fn summaries(&self) -> Vec<DetectionSummary> {
        self.iter()
            .map(|(kind, entry)| match entry {
                ComparisonEntry::Completed(result) => DetectionSummary::from_result(result),
                ComparisonEntry::Failed(err) => DetectionSummary {
                    detector: kind,
                    status: "failed",
                    keypoint_count: None,
                    elapsed_seconds: None,
                    descriptor: None,
                    error: Some(err.to_string()),
                },
            })
            .collect()
    }

    /// Completed detector with the most keypoints; ties go to the earlier one
    pub fn most_keypoints(&self) -> Option<(DetectorKind, usize)> {
        let mut best: Option<(DetectorKind, usize)> = None;
        for (kind, entry) in self.iter() {
            if let Some(result) = entry.result() {
                if best.map_or(true, |(_, n)| result.count() > n) {
                    best = Some((kind, result.count()));
                }
            }
        }
        best
    }

    /// Completed detector with the shortest elapsed time
    pub fn fastest(&self) -> Option<(DetectorKind, f64)> {
        let mut best: Option<(DetectorKind, f64)> = None;
        for (kind, entry) in self.iter() {
            if let Some(result) = entry.result() {
                let secs = result.elapsed_secs();
                if best.map_or(true, |(_, t)| secs < t) {
                    best = Some((kind, secs));
                }
            }
        }
        best
    }

    pub fn to_json(&self) -> RunnerResult<String> {
        serde_json::to_string_pretty(&self.summaries()).map_err(|e| RunnerError::Serialization(e.to_string()))
    }

    /// Bar chart: keypoint counts on the left panel, elapsed time on the
    /// right, one bar per detector. Failed entries leave an empty slot.
    pub fn render_plot(&self, width: u32, height: u32) -> RgbImage {
        let mut canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
        let counts: Vec<f64> = self.bar_values(|r| r.count() as f64);
        let times: Vec<f64> = self.bar_values(|r| r.elapsed_secs());

        let panel_w = width / 2;
        draw_panel(&mut canvas, 0, panel_w, height, &counts);
        draw_panel(&mut canvas, panel_w, width - panel_w, height, &times);
        canvas
    }

    pub fn save_plot(&self, path: &Path) -> RunnerResult<()> {
        self.render_plot(800, 400)
            .save(path)
            .map_err(|e| RunnerError::output(path, e))
    }

    fn bar_values(&self, value: impl Fn(&DetectionResult) -> f64) -> Vec<f64> {
        DetectorKind::ALL
            .iter()
            .map(|k| self.get(*k).and_then(|e| e.result()).map_or(0.0, &value))
            .collect()
    }
}

fn draw_panel(canvas: &mut RgbImage, x0: u32, width: u32, height: u32, values: &[f64]) {
    let margin = (width / 10).max(1);
    let axis_y = height.saturating_sub(margin);
    let max = values.iter().cloned().fold(0.0f64, f64::max);
    let slot = (width.saturating_sub(2 * margin) / values.len().max(1) as u32).max(1);
    let bar_w = (slot * 2 / 3).max(1);

    // Baseline
    let baseline = Rect::at(x0 as i32 + margin as i32, axis_y as i32).of_size(width.saturating_sub(2 * margin).max(1), 2);
    draw_filled_rect_mut(canvas, baseline, Rgb([40, 40, 40]));

    if max <= 0.0 {
        return;
    }
    let usable = axis_y.saturating_sub(margin) as f64;
    for (i, &v) in values.iter().enumerate() {
        let bar_h = ((v / max) * usable).round() as u32;
        if bar_h == 0 {
            continue;
        }
        let x = x0 + margin + i as u32 * slot + (slot - bar_w) / 2;
        let rect = Rect::at(x as i32, (axis_y - bar_h) as i32).of_size(bar_w, bar_h);
        draw_filled_rect_mut(canvas, rect, Rgb(PLOT_COLORS[i % PLOT_COLORS.len()]));
    }
}

impl fmt::Display for ComparisonReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<10} {:<8} {:>10} {:>12} {:<16}",
            "Detector", "Status", "Keypoints", "Time (s)", "Descriptors"
        )?;
        writeln!(f, "{}", "-".repeat(60))?;
        for summary in self.summaries() {
            match summary.error {
                Some(err) => writeln!(
                    f,
                    "{:<10} {:<8} {:>10} {:>12} {}",
                    summary.detector.name(),
                    summary.status,
                    "-",
                    "-",
                    err
                )?,
                None => writeln!(
                    f,
                    "{:<10} {:<8} {:>10} {:>12.4} {:<16}",
                    summary.detector.name(),
                    summary.status,
                    summary.keypoint_count.unwrap_or(0),
                    summary.elapsed_seconds.unwrap_or(0.0),
                    summary.descriptor.unwrap_or_else(|| "-".to_string())
                )?,
            }
        }
        if let Some((kind, n)) = self.most_keypoints() {
            writeln!(f, "Most keypoints: {} ({})", kind, n)?;
        }
        if let Some((kind, secs)) = self.fastest() {
            writeln!(f, "Fastest: {} ({:.4} s)", kind, secs)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kp_core::{DetectError, Descriptors, Keypoint};
    use std::time::Duration;

    fn completed(kind: DetectorKind, count: usize, millis: u64) -> ComparisonEntry {
        ComparisonEntry::Completed(DetectionResult {
            detector: kind,
            keypoints: vec![Keypoint::new(1.0, 1.0, 2.0); count],
            descriptors: Some(Descriptors::Binary {
                bytes: 32,
                data: vec![0; count * 32],
            }),
            elapsed: Duration::from_millis(millis),
            width: 64,
            height: 64,
        })
    }

    fn sample_report() -> ComparisonReport {
        let mut report = ComparisonReport::new();
        report.insert(DetectorKind::Brisk, completed(DetectorKind::Brisk, 7, 30));
        report.insert(
            DetectorKind::Sift,
            ComparisonEntry::Failed(RunnerError::Detector {
                kind: DetectorKind::Sift,
                source: DetectError::Internal("no memory".into()),
            }),
        );
        report.insert(DetectorKind::Orb, completed(DetectorKind::Orb, 12, 10));
        report
    }

    #[test]
    fn test_iteration_order_is_fixed() {
        let report = sample_report();
        let order: Vec<DetectorKind> = report.iter().map(|(k, _)| k).collect();
        assert_eq!(order, DetectorKind::ALL.to_vec());
        assert_eq!(report.failures(), 1);
    }

    fn failed(kind: DetectorKind) -> ComparisonEntry {
        ComparisonEntry::Failed(RunnerError::Detector {
            kind,
            source: DetectError::Internal("crashed".into()),
        })
    }

    #[test]
    fn test_check_fails_when_every_detector_failed() {
        let mut report = ComparisonReport::new();
        for kind in DetectorKind::ALL {
            report.insert(kind, failed(kind));
        }
        let err = report.check().unwrap_err();
        assert!(matches!(err, RunnerError::AllDetectorsFailed(3)));
        assert_eq!(err.kind().exit_code(), 3);
    }

    #[test]
    fn test_check_allows_partial_failure() {
        assert!(sample_report().check().is_ok());

        let mut report = ComparisonReport::new();
        report.insert(DetectorKind::Sift, failed(DetectorKind::Sift));
        report.insert(DetectorKind::Orb, failed(DetectorKind::Orb));
        report.insert(DetectorKind::Brisk, completed(DetectorKind::Brisk, 0, 5));
        assert!(report.check().is_ok());
    }

    #[test]
    fn test_best_lines_skip_failures() {
        let report = sample_report();
        assert_eq!(report.most_keypoints(), Some((DetectorKind::Orb, 12)));
        assert_eq!(report.fastest().map(|(k, _)| k), Some(DetectorKind::Orb));
    }

    #[test]
    fn test_table_rendering() {
        let text = sample_report().to_string();
        assert!(text.contains("SIFT"));
        assert!(text.contains("failed"));
        assert!(text.contains("no memory"));
        assert!(text.contains("12x32 binary"));
        assert!(text.contains("Most keypoints: ORB (12)"));
        assert!(text.contains("Fastest: ORB"));
    }

    #[test]
    fn test_json_summaries() {
        let json: serde_json::Value = serde_json::from_str(&sample_report().to_json().unwrap()).unwrap();
        let rows = json.as_array().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["detector"], "SIFT");
        assert_eq!(rows[0]["status"], "failed");
        assert!(rows[0].get("keypoint_count").is_none());
        assert_eq!(rows[1]["keypoint_count"], 12);
        assert_eq!(rows[2]["detector"], "BRISK");
    }

    #[test]
    fn test_plot_has_bars() {
        let plot = sample_report().render_plot(300, 150);
        assert_eq!(plot.dimensions(), (300, 150));
        let orb_color = Rgb(PLOT_COLORS[1]);
        assert!(plot.pixels().any(|p| *p == orb_color));
        // Failed SIFT leaves its slot empty
        assert!(!plot.pixels().any(|p| *p == Rgb(PLOT_COLORS[0])));
    }

    #[test]
    fn test_empty_report_plot() {
        let plot = ComparisonReport::new().render_plot(100, 60);
        assert_eq!(plot.dimensions(), (100, 60));
    }
}
