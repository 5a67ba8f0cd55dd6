use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::shared::constants::*;
use crate::shared::pacer::period_for_rate;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration file {path}: {reason}")]
    Parse { path: String, reason: String },
}

/// Everything the pipeline reads once at startup.
///
/// Every field has a default, so a partial (or empty) JSON document is a
/// valid configuration. Call [`GuardConfig::validate`] before use.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    pub camera: CameraConfig,
    pub detection: DetectionConfig,
    pub privacy: PrivacyConfig,
    pub ui: UiConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Device name understood by the capture backend (`/dev/video0`, `0`, ...).
    pub device: Option<String>,
    /// ffmpeg input format override (`v4l2`, `avfoundation`, `dshow`).
    pub input_format: Option<String>,
    pub target_fps: f64,
    pub width: u32,
    pub height: u32,
    pub max_consecutive_failures: u32,
    pub read_timeout_ms: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: None,
            input_format: None,
            target_fps: DEFAULT_TARGET_FPS,
            width: DEFAULT_CAPTURE_WIDTH,
            height: DEFAULT_CAPTURE_HEIGHT,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub analysis_width: u32,
    pub analysis_height: u32,
    /// Run one analysis cycle per this many capture frames.
    pub detection_interval_frames: u32,
    pub min_detection_confidence: f64,
    /// Consecutive failed cycles before the pipeline reports degraded mode.
    pub degraded_after_errors: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            analysis_width: DEFAULT_ANALYSIS_WIDTH,
            analysis_height: DEFAULT_ANALYSIS_HEIGHT,
            detection_interval_frames: DEFAULT_DETECTION_INTERVAL_FRAMES,
            min_detection_confidence: DEFAULT_MIN_DETECTION_CONFIDENCE,
            degraded_after_errors: DEFAULT_DEGRADED_AFTER_ERRORS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PrivacyConfig {
    pub face_count_threshold: usize,
    pub area_ratio_threshold: f64,
    pub debounce_on_frames: u32,
    pub debounce_off_seconds: f64,
    pub blur_kernel_size: usize,
    pub verification_threshold: f64,
    /// Without a verifier, treat the largest qualifying face as the operator.
    pub assume_operator_present: bool,
}

impl Default for PrivacyConfig {
    fn default() -> Self {
        Self {
            face_count_threshold: DEFAULT_FACE_COUNT_THRESHOLD,
            area_ratio_threshold: DEFAULT_AREA_RATIO_THRESHOLD,
            debounce_on_frames: DEFAULT_DEBOUNCE_ON_FRAMES,
            debounce_off_seconds: DEFAULT_DEBOUNCE_OFF_SECONDS,
            blur_kernel_size: DEFAULT_BLUR_KERNEL_SIZE,
            verification_threshold: DEFAULT_VERIFICATION_THRESHOLD,
            assume_operator_present: false,
        }
    }
}

impl PrivacyConfig {
    /// Continuous safe time needed to turn privacy off. Out-of-range values
    /// are clamped; `GuardConfig::validate` rejects them first.
    pub fn debounce_off(&self) -> Duration {
        let secs = self
            .debounce_off_seconds
            .clamp(0.0, MAX_DEBOUNCE_OFF_SECONDS);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub show_status: bool,
    pub show_fps: bool,
    pub show_annotations: bool,
    pub render_fps: f64,
    pub headless: bool,
    /// TrueType/OpenType font for the status text. Without one the status
    /// band carries colour only.
    pub font_path: Option<PathBuf>,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            show_status: true,
            show_fps: true,
            show_annotations: false,
            render_fps: DEFAULT_RENDER_FPS,
            headless: false,
            font_path: None,
        }
    }
}

impl GuardConfig {
    /// Rejects values the pipeline cannot run with. Fatal at startup only.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive_rate("camera.target_fps", self.camera.target_fps)?;
        non_zero("camera.width", self.camera.width as u64)?;
        non_zero("camera.height", self.camera.height as u64)?;
        non_zero(
            "camera.max_consecutive_failures",
            self.camera.max_consecutive_failures as u64,
        )?;
        non_zero("camera.read_timeout_ms", self.camera.read_timeout_ms)?;

        non_zero("detection.analysis_width", self.detection.analysis_width as u64)?;
        non_zero(
            "detection.analysis_height",
            self.detection.analysis_height as u64,
        )?;
        non_zero(
            "detection.detection_interval_frames",
            self.detection.detection_interval_frames as u64,
        )?;
        unit_interval(
            "detection.min_detection_confidence",
            self.detection.min_detection_confidence,
        )?;
        non_zero(
            "detection.degraded_after_errors",
            self.detection.degraded_after_errors as u64,
        )?;

        non_zero(
            "privacy.face_count_threshold",
            self.privacy.face_count_threshold as u64,
        )?;
        unit_interval(
            "privacy.area_ratio_threshold",
            self.privacy.area_ratio_threshold,
        )?;
        non_zero(
            "privacy.debounce_on_frames",
            self.privacy.debounce_on_frames as u64,
        )?;
        let off = self.privacy.debounce_off_seconds;
        if !(0.0..=MAX_DEBOUNCE_OFF_SECONDS).contains(&off) {
            return Err(ConfigError::Invalid {
                field: "privacy.debounce_off_seconds",
                reason: format!(
                    "must be between 0 and {MAX_DEBOUNCE_OFF_SECONDS} seconds, got {off}"
                ),
            });
        }
        non_zero(
            "privacy.blur_kernel_size",
            self.privacy.blur_kernel_size as u64,
        )?;
        unit_interval(
            "privacy.verification_threshold",
            self.privacy.verification_threshold,
        )?;

        positive_rate("ui.render_fps", self.ui.render_fps)?;
        Ok(())
    }

    /// Gaussian kernels must be odd; even sizes are rounded up.
    pub fn blur_kernel_size(&self) -> usize {
        self.privacy.blur_kernel_size | 1
    }

    /// Analysis cadence: one cycle every `detection_interval_frames` capture periods.
    pub fn analysis_period(&self) -> Duration {
        period_for_rate(self.camera.target_fps)
            .saturating_mul(self.detection.detection_interval_frames)
    }

    pub fn render_period(&self) -> Duration {
        period_for_rate(self.ui.render_fps)
    }
}

fn non_zero(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            field,
            reason: "must be greater than zero".into(),
        });
    }
    Ok(())
}

fn positive_rate(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < MIN_RATE_HZ {
        return Err(ConfigError::Invalid {
            field,
            reason: format!("must be a rate of at least {MIN_RATE_HZ} per second, got {value}"),
        });
    }
    Ok(())
}

fn unit_interval(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::Invalid {
            field,
            reason: format!("must be within [0, 1], got {value}"),
        });
    }
    Ok(())
}
