pub const DEFAULT_TARGET_FPS: f64 = 30.0;
pub const DEFAULT_CAPTURE_WIDTH: u32 = 640;
pub const DEFAULT_CAPTURE_HEIGHT: u32 = 480;

/// Consecutive failed reads before a capture device is declared lost (~1 s at 30 fps).
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 30;
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 1000;

pub const DEFAULT_ANALYSIS_WIDTH: u32 = 320;
pub const DEFAULT_ANALYSIS_HEIGHT: u32 = 240;
pub const DEFAULT_DETECTION_INTERVAL_FRAMES: u32 = 3;
pub const DEFAULT_MIN_DETECTION_CONFIDENCE: f64 = 0.5;
pub const DEFAULT_DEGRADED_AFTER_ERRORS: u32 = 3;

pub const DEFAULT_FACE_COUNT_THRESHOLD: usize = 1;
pub const DEFAULT_AREA_RATIO_THRESHOLD: f64 = 0.02;
pub const DEFAULT_DEBOUNCE_ON_FRAMES: u32 = 2;
pub const DEFAULT_DEBOUNCE_OFF_SECONDS: f64 = 0.8;
pub const DEFAULT_BLUR_KERNEL_SIZE: usize = 31;
pub const DEFAULT_VERIFICATION_THRESHOLD: f64 = 0.6;

pub const DEFAULT_RENDER_FPS: f64 = 30.0;

/// Slowest capture or render rate accepted; one event every 100 s.
pub const MIN_RATE_HZ: f64 = 0.01;
/// Longest accepted deactivation window.
pub const MAX_DEBOUNCE_OFF_SECONDS: f64 = 3600.0;

/// Decisions retained by the engine for inspection.
pub const DECISION_HISTORY_LEN: usize = 100;

/// Pixels of context added around a face before it is cropped for verification.
pub const FACE_CROP_PADDING: u32 = 10;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

/// File names looked up in the model directory when no path is given.
pub const DETECTOR_MODEL_NAME: &str = "blazeface_short_range.onnx";
pub const EMBEDDER_MODEL_NAME: &str = "arcface.onnx";
