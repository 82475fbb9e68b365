//! Calibration run configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::layout::{Alignment, GridLayoutGenerator, LayoutError, ScreenSize, TARGET_PADDING};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("max_resample_points must be at least 1")]
    ZeroResamplePoints,

    #[error(transparent)]
    Layout(#[from] LayoutError),
}

/// Settings for one calibration run.
///
/// Every field has a default, so a JSON file only needs the fields it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Number of targets, 1, a perfect square, or 12.
    pub point_count: usize,
    /// Delay between showing a target and starting to sample it.
    pub latency_ms: u64,
    /// How long each target is sampled.
    pub recording_ms: u64,
    /// Grid padding as a fraction of the screen height.
    pub padding: f64,
    /// Resample rounds allowed before the run fails.
    pub max_resample_attempts: u32,
    /// Queue size at which resampling gives up.
    pub max_resample_points: usize,
    pub horizontal_alignment: Alignment,
    pub vertical_alignment: Alignment,
    pub screen: ScreenSize,
    /// Part of the screen to calibrate, full screen when absent.
    pub area: Option<ScreenSize>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            point_count: 9,
            latency_ms: 500,
            recording_ms: 750,
            padding: TARGET_PADDING,
            max_resample_attempts: 3,
            max_resample_points: 4,
            horizontal_alignment: Alignment::Center,
            vertical_alignment: Alignment::Center,
            screen: ScreenSize::new(1920, 1080),
            area: None,
        }
    }
}

impl CalibrationConfig {
    /// Load and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.latency_ms == 0 {
            return Err(ConfigError::ZeroDuration("latency_ms"));
        }
        if self.recording_ms == 0 {
            return Err(ConfigError::ZeroDuration("recording_ms"));
        }
        if self.max_resample_points == 0 {
            return Err(ConfigError::ZeroResamplePoints);
        }
        self.layout_generator().validate()?;
        Ok(())
    }

    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }

    pub fn recording(&self) -> Duration {
        Duration::from_millis(self.recording_ms)
    }

    pub fn layout_generator(&self) -> GridLayoutGenerator {
        let generator =
            GridLayoutGenerator::new(self.point_count, self.screen).with_padding(self.padding);
        match self.area {
            Some(area) => generator.with_area(area, self.horizontal_alignment, self.vertical_alignment),
            None => generator,
        }
    }
}
