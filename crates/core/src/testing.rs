//! In-memory stand-ins for the camera, detector, verifier and display, so the
//! loops can be driven without hardware or models.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::blurring::domain::frame_obscurer::{FrameObscurer, ObscureError};
use crate::capture::domain::capture_device::{CaptureDevice, CaptureError, RawImage};
use crate::detection::domain::face_detector::{
    Detection, DetectionError, DetectionResult, FaceDetector,
};
use crate::detection::domain::verifier::{
    FaceRegion, Identity, IdentityLabel, VerificationError, Verifier,
};
use crate::render::display_sink::{DisplayError, DisplaySink};
use crate::render::compositor::ComposedFrame;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// Polls `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
}

pub fn solid_frame(width: u32, height: u32, fill: u8, sequence: u64) -> Frame {
    Frame::new(
        vec![fill; (width * height * 3) as usize],
        width,
        height,
        3,
        sequence,
    )
}

/// Square box centred in the frame covering `ratio` of its area.
pub fn centred_box(ratio: f64) -> BoundingBox {
    let half = ratio.sqrt() / 2.0;
    BoundingBox::new(0.5 - half, 0.5 - half, 0.5 + half, 0.5 + half)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeviceStep {
    /// A solid image of this value.
    Frame(u8),
    Fail,
}

/// Capture device that plays back a script; the last step repeats forever.
pub struct ScriptedDevice {
    width: u32,
    height: u32,
    steps: Vec<DeviceStep>,
    cursor: usize,
    fail_open: bool,
    opens: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl ScriptedDevice {
    pub fn solid(width: u32, height: u32, fill: u8) -> Self {
        Self::scripted(width, height, vec![DeviceStep::Frame(fill)])
    }

    pub fn scripted(width: u32, height: u32, steps: Vec<DeviceStep>) -> Self {
        Self {
            width,
            height,
            steps,
            cursor: 0,
            fail_open: false,
            opens: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn open_count(&self) -> Arc<AtomicUsize> {
        self.opens.clone()
    }

    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        self.closed.clone()
    }
}

impl CaptureDevice for ScriptedDevice {
    fn open(&mut self) -> Result<(), CaptureError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail_open {
            return Err(CaptureError::Device("scripted open failure".into()));
        }
        Ok(())
    }

    fn read(&mut self) -> Result<RawImage, CaptureError> {
        let step = self
            .steps
            .get(self.cursor)
            .or_else(|| self.steps.last())
            .copied()
            .unwrap_or(DeviceStep::Fail);
        self.cursor += 1;
        match step {
            DeviceStep::Frame(fill) => Ok(RawImage {
                data: vec![fill; (self.width * self.height * 3) as usize],
                width: self.width,
                height: self.height,
            }),
            DeviceStep::Fail => Err(CaptureError::Transient("scripted read failure".into())),
        }
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn describe(&self) -> String {
        "scripted device".into()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetectorStep {
    Faces(Vec<Detection>),
    Fail,
}

/// Detector that plays back a script; the last step repeats forever.
pub struct ScriptedDetector {
    steps: Vec<DetectorStep>,
    cursor: usize,
    calls: Arc<AtomicUsize>,
    input_sizes: Arc<Mutex<Vec<(u32, u32)>>>,
}

impl ScriptedDetector {
    pub fn new(steps: Vec<DetectorStep>) -> Self {
        Self {
            steps,
            cursor: 0,
            calls: Arc::new(AtomicUsize::new(0)),
            input_sizes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Always reports one face of the given area ratio.
    pub fn one_face(ratio: f64) -> Self {
        Self::new(vec![DetectorStep::Faces(vec![Detection::new(
            centred_box(ratio),
            0.9,
        )])])
    }

    pub fn empty() -> Self {
        Self::new(vec![DetectorStep::Faces(Vec::new())])
    }

    pub fn call_count(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    pub fn input_sizes(&self) -> Arc<Mutex<Vec<(u32, u32)>>> {
        self.input_sizes.clone()
    }
}

impl FaceDetector for ScriptedDetector {
    fn detect(&mut self, frame: &Frame) -> Result<DetectionResult, DetectionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut sizes) = self.input_sizes.lock() {
            sizes.push((frame.width(), frame.height()));
        }
        let step = self
            .steps
            .get(self.cursor)
            .or_else(|| self.steps.last())
            .cloned()
            .unwrap_or(DetectorStep::Faces(Vec::new()));
        self.cursor += 1;
        match step {
            DetectorStep::Faces(detections) => Ok(DetectionResult::new(
                detections,
                frame.sequence(),
                Instant::now(),
            )),
            DetectorStep::Fail => Err(DetectionError::Inference("scripted failure".into())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VerifierMode {
    Label(IdentityLabel),
    NoTemplate,
    Fail,
}

/// Verifier that answers every face the same way.
pub struct ScriptedVerifier {
    mode: VerifierMode,
    calls: Arc<AtomicUsize>,
    crop_sizes: Arc<Mutex<Vec<(u32, u32)>>>,
}

impl ScriptedVerifier {
    pub fn new(mode: VerifierMode) -> Self {
        Self {
            mode,
            calls: Arc::new(AtomicUsize::new(0)),
            crop_sizes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn call_count(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    pub fn crop_sizes(&self) -> Arc<Mutex<Vec<(u32, u32)>>> {
        self.crop_sizes.clone()
    }
}

impl Verifier for ScriptedVerifier {
    fn verify(&mut self, face: &FaceRegion) -> Result<Identity, VerificationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut sizes) = self.crop_sizes.lock() {
            sizes.push((face.crop.width(), face.crop.height()));
        }
        match self.mode {
            VerifierMode::Label(label) => Ok(Identity {
                label,
                similarity: if label == IdentityLabel::Operator { 0.9 } else { 0.1 },
                bbox: face.bbox,
            }),
            VerifierMode::NoTemplate => Err(VerificationError::NoTemplate),
            VerifierMode::Fail => Err(VerificationError::Failed("scripted failure".into())),
        }
    }
}

/// What a `RecordingSink` saw for one displayed frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Shown {
    pub frame_sequence: u64,
    pub decision_sequence: Option<u64>,
    pub obscured: bool,
    pub first_pixel: [u8; 3],
    pub status: Option<String>,
}

#[derive(Default)]
pub struct RecordingSink {
    shown: Arc<Mutex<Vec<Shown>>>,
    closed: Arc<AtomicBool>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shown(&self) -> Arc<Mutex<Vec<Shown>>> {
        self.shown.clone()
    }

    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        self.closed.clone()
    }
}

impl DisplaySink for RecordingSink {
    fn show(&mut self, composed: &ComposedFrame) -> Result<(), DisplayError> {
        let data = composed.frame.data();
        let entry = Shown {
            frame_sequence: composed.frame.sequence(),
            decision_sequence: composed.decision_sequence,
            obscured: composed.obscured,
            first_pixel: [data[0], data[1], data[2]],
            status: composed.status.as_ref().map(|s| s.to_string()),
        };
        self.shown
            .lock()
            .map_err(|_| DisplayError::Output("recording poisoned".into()))?
            .push(entry);
        Ok(())
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Obscurer that always fails.
pub struct BrokenObscurer;

impl FrameObscurer for BrokenObscurer {
    fn obscure(&mut self, _frame: &mut Frame) -> Result<(), ObscureError> {
        Err(ObscureError::Unsupported("broken on purpose".into()))
    }
}
