//! Session configuration: per-stage settings and detector selection.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::blob::{BlobConfig, MotionConfig};
use crate::calibration::CalibrationConfig;
use crate::conic::EllipseConfig;
use crate::hough::HoughConfig;
use crate::kalman::KalmanConfig;
use crate::preprocess::PreprocessConfig;

/// Standard gravity (m/s²).
pub const STANDARD_GRAVITY: f64 = 9.80665;

/// One detection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Ball,
    Target,
    Luminance,
    Motion,
    Hough,
}

/// Which strategies run on each frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSet {
    /// HSV ball band.
    pub ball: bool,
    /// HSV target band.
    pub target: bool,
    /// Dark/bright luminance cutoffs.
    pub luminance: bool,
    /// Background subtraction, tried only when no other strategy fires.
    pub motion: bool,
    /// Hough circle on the grayscale edge map.
    pub hough: bool,
}

impl Default for DetectorSet {
    fn default() -> Self {
        Self {
            ball: true,
            target: true,
            luminance: false,
            motion: true,
            hough: false,
        }
    }
}

impl DetectorSet {
    /// Enable exactly one strategy.
    pub fn only(strategy: Strategy) -> Self {
        let mut set = Self {
            ball: false,
            target: false,
            luminance: false,
            motion: false,
            hough: false,
        };
        match strategy {
            Strategy::Ball => set.ball = true,
            Strategy::Target => set.target = true,
            Strategy::Luminance => set.luminance = true,
            Strategy::Motion => set.motion = true,
            Strategy::Hough => set.hough = true,
        }
        set
    }
}

/// Multi-frame target sampling used by `auto_calibrate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoCalibrationConfig {
    /// Frames pulled from the source.
    pub samples: usize,
    /// Delay between pulls (milliseconds).
    pub pace_ms: u64,
}

impl Default for AutoCalibrationConfig {
    fn default() -> Self {
        Self {
            samples: 8,
            pace_ms: 150,
        }
    }
}

impl AutoCalibrationConfig {
    pub fn pace(&self) -> Duration {
        Duration::from_millis(self.pace_ms)
    }
}

/// Full tracking configuration.
///
/// Every section falls back to its defaults when omitted from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub preprocess: PreprocessConfig,
    pub hough: HoughConfig,
    pub ellipse: EllipseConfig,
    pub blob: BlobConfig,
    pub motion: MotionConfig,
    pub calibration: CalibrationConfig,
    pub kalman: KalmanConfig,
    pub auto_calibration: AutoCalibrationConfig,
    pub detectors: DetectorSet,
    /// Gravity used to turn an along-slope acceleration into an incline angle.
    pub gravity_m_s2: f64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            preprocess: PreprocessConfig::default(),
            hough: HoughConfig::default(),
            ellipse: EllipseConfig::default(),
            blob: BlobConfig::default(),
            motion: MotionConfig::default(),
            calibration: CalibrationConfig::default(),
            kalman: KalmanConfig::default(),
            auto_calibration: AutoCalibrationConfig::default(),
            detectors: DetectorSet::default(),
            gravity_m_s2: STANDARD_GRAVITY,
        }
    }
}

impl TrackingConfig {
    /// Load from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
