use std::fmt;
use std::str::FromStr;

use kp_brisk::BriskDetector;
use kp_core::FeatureDetector;
use kp_orb::OrbDetector;
use kp_sift::SiftDetector;
use serde::{Deserialize, Serialize};

use crate::config::RunnerConfig;
use crate::error::{RunnerError, RunnerResult};

/// Supported detectors, ordered the way comparisons run them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DetectorKind {
    Sift,
    Orb,
    Brisk,
}

impl DetectorKind {
    pub const ALL: [DetectorKind; 3] = [DetectorKind::Sift, DetectorKind::Orb, DetectorKind::Brisk];

    pub fn name(self) -> &'static str {
        match self {
            DetectorKind::Sift => "SIFT",
            DetectorKind::Orb => "ORB",
            DetectorKind::Brisk => "BRISK",
        }
    }

    /// Construct the collaborator with the parameters from `config`
    pub fn build(self, config: &RunnerConfig) -> RunnerResult<Box<dyn FeatureDetector>> {
        let detector: Result<Box<dyn FeatureDetector>, _> = match self {
            DetectorKind::Sift => SiftDetector::new(config.sift.clone()).map(|d| Box::new(d) as _),
            DetectorKind::Orb => OrbDetector::new(config.orb.clone()).map(|d| Box::new(d) as _),
            DetectorKind::Brisk => BriskDetector::new(config.brisk.clone()).map(|d| Box::new(d) as _),
        };
        detector.map_err(|e| RunnerError::InvalidConfig(format!("{}: {}", self.name(), e)))
    }

    /// One-line parameter summary for listings
    pub fn summary(self, config: &RunnerConfig) -> String {
        match self {
            DetectorKind::Sift => config.sift.summary(),
            DetectorKind::Orb => config.orb.summary(),
            DetectorKind::Brisk => config.brisk.summary(),
        }
    }

    fn choices() -> String {
        DetectorKind::ALL.iter().map(|k| k.name()).collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DetectorKind {
    type Err = RunnerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        DetectorKind::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| RunnerError::UnknownDetector {
                name: s.to_string(),
                choices: DetectorKind::choices(),
            })
    }
}

/// What a `run` invocation does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Single(DetectorKind),
    Compare,
}

impl FromStr for Mode {
    type Err = RunnerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("COMPARE") {
            return Ok(Mode::Compare);
        }
        s.parse::<DetectorKind>()
            .map(Mode::Single)
            .map_err(|_| RunnerError::UnknownDetector {
                name: s.to_string(),
                choices: format!("{}, COMPARE", DetectorKind::choices()),
            })
    }
}
