use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::capture::domain::capture_device::{CaptureDevice, CaptureError, RawImage};
use crate::config::CameraConfig;
use crate::shared::frame::Frame;
use crate::shared::latest_slot::LatestSlot;
use crate::shared::pacer::Pacer;

/// Called on the capture thread when acquisition ends with a fatal error.
pub type FatalHandler = Box<dyn Fn(&CaptureError) + Send>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSourceSettings {
    pub target_fps: f64,
    pub max_consecutive_failures: u32,
}

impl FrameSourceSettings {
    pub fn from_config(camera: &CameraConfig) -> Self {
        Self {
            target_fps: camera.target_fps,
            max_consecutive_failures: camera.max_consecutive_failures.max(1),
        }
    }
}

/// Counters updated by the capture thread, readable from anywhere.
#[derive(Debug, Default)]
pub struct CaptureCounters {
    pub frames: AtomicU64,
    pub transient_failures: AtomicU64,
}

/// Owns the capture device and publishes frames into a shared latest-frame slot.
///
/// Acquisition runs on its own thread at the configured rate regardless of
/// how fast consumers read: a slow consumer sees the same frame again, a fast
/// one never holds up the producer. Sequence numbers start at 1.
pub struct FrameSource {
    device: Option<Box<dyn CaptureDevice>>,
    settings: FrameSourceSettings,
    slot: Arc<LatestSlot<Frame>>,
    stop: Arc<AtomicBool>,
    counters: Arc<CaptureCounters>,
    on_fatal: Option<FatalHandler>,
    handle: Option<JoinHandle<Result<(), CaptureError>>>,
}

impl FrameSource {
    pub fn new(device: Box<dyn CaptureDevice>, settings: FrameSourceSettings) -> Self {
        Self {
            device: Some(device),
            settings,
            slot: Arc::new(LatestSlot::new()),
            stop: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(CaptureCounters::default()),
            on_fatal: None,
            handle: None,
        }
    }

    /// Shares an externally owned stop signal (e.g. the pipeline's global one).
    pub fn with_stop_signal(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    pub fn on_fatal(mut self, handler: FatalHandler) -> Self {
        self.on_fatal = Some(handler);
        self
    }

    /// Opens the device on the calling thread and starts acquisition.
    ///
    /// An open failure is returned as-is and the device is kept, so the
    /// caller decides whether to retry.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.handle.is_some() {
            return Err(CaptureError::Device("frame source already running".into()));
        }
        let mut device = self
            .device
            .take()
            .ok_or_else(|| CaptureError::Device("frame source cannot be restarted".into()))?;

        if let Err(e) = device.open() {
            log::error!("Failed to open {}: {e}", device.describe());
            self.device = Some(device);
            return Err(e);
        }
        log::info!(
            "Capturing from {} at {:.1} fps",
            device.describe(),
            self.settings.target_fps
        );

        let worker = CaptureWorker {
            device,
            settings: self.settings,
            slot: self.slot.clone(),
            stop: self.stop.clone(),
            counters: self.counters.clone(),
            on_fatal: self.on_fatal.take(),
        };
        self.handle = Some(std::thread::spawn(move || worker.run()));
        Ok(())
    }

    /// Most recent frame, or `None` before the first one. Never blocks the producer.
    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.slot.latest()
    }

    pub fn slot(&self) -> Arc<LatestSlot<Frame>> {
        self.slot.clone()
    }

    pub fn counters(&self) -> Arc<CaptureCounters> {
        self.counters.clone()
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signals the capture thread, waits for it to close the device and
    /// returns how acquisition ended. Calling it again is a no-op.
    pub fn stop(&mut self) -> Result<(), CaptureError> {
        self.stop.store(true, Ordering::SeqCst);
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .unwrap_or_else(|_| Err(CaptureError::Device("capture thread panicked".into()))),
            None => Ok(()),
        }
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

struct CaptureWorker {
    device: Box<dyn CaptureDevice>,
    settings: FrameSourceSettings,
    slot: Arc<LatestSlot<Frame>>,
    stop: Arc<AtomicBool>,
    counters: Arc<CaptureCounters>,
    on_fatal: Option<FatalHandler>,
}

impl CaptureWorker {
    fn run(mut self) -> Result<(), CaptureError> {
        let mut pacer = Pacer::from_rate(self.settings.target_fps);
        let max_failures = self.settings.max_consecutive_failures;
        let live = self.device.is_live();
        let mut consecutive_failures = 0u32;
        let mut sequence = 0u64;

        let outcome = loop {
            if self.stop.load(Ordering::Relaxed) {
                break Ok(());
            }

            let read = self.device.read().and_then(|raw| {
                let next = sequence + 1;
                frame_from_raw(raw, next).map(|frame| (frame, next))
            });

            match read {
                Ok((frame, seq)) => {
                    sequence = seq;
                    consecutive_failures = 0;
                    self.slot.publish(frame);
                    self.counters.frames.fetch_add(1, Ordering::Relaxed);
                }
                Err(CaptureError::Transient(reason)) => {
                    consecutive_failures += 1;
                    self.counters
                        .transient_failures
                        .fetch_add(1, Ordering::Relaxed);
                    log::warn!(
                        "Skipping frame: {reason} ({consecutive_failures}/{max_failures})"
                    );
                    if consecutive_failures >= max_failures {
                        break Err(CaptureError::DeviceLost {
                            consecutive: consecutive_failures,
                        });
                    }
                }
                Err(fatal) => break Err(fatal),
            }

            // Live devices pace themselves; failures are always spaced out so a
            // dead device cannot spin the thread.
            if (!live || consecutive_failures > 0) && !pacer.wait(&self.stop) {
                break Ok(());
            }
        };

        self.device.close();
        match &outcome {
            Ok(()) => log::debug!("Capture stopped after {sequence} frames"),
            Err(e) => {
                log::error!("Capture aborted: {e}");
                if let Some(handler) = &self.on_fatal {
                    handler(e);
                }
            }
        }
        outcome
    }
}

fn frame_from_raw(raw: RawImage, sequence: u64) -> Result<Frame, CaptureError> {
    let expected = raw.width as usize * raw.height as usize * 3;
    if raw.width == 0 || raw.height == 0 || raw.data.len() != expected {
        return Err(CaptureError::Transient(format!(
            "malformed image: {}x{} with {} bytes",
            raw.width,
            raw.height,
            raw.data.len()
        )));
    }
    Ok(Frame::new(raw.data, raw.width, raw.height, 3, sequence))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{wait_until, DeviceStep, ScriptedDevice};
    use std::sync::Mutex;
    use std::time::Duration;

    fn settings(max_failures: u32) -> FrameSourceSettings {
        FrameSourceSettings {
            target_fps: 200.0,
            max_consecutive_failures: max_failures,
        }
    }

    #[test]
    fn test_latest_is_none_before_start() {
        let source = FrameSource::new(Box::new(ScriptedDevice::solid(4, 4, 10)), settings(3));
        assert!(source.latest().is_none());
    }

    #[test]
    fn test_frames_are_published_with_increasing_sequence() {
        let mut source = FrameSource::new(Box::new(ScriptedDevice::solid(4, 4, 10)), settings(3));
        source.start().unwrap();

        assert!(wait_until(Duration::from_secs(2), || source
            .latest()
            .is_some_and(|f| f.sequence() >= 3)));
        let first = source.latest().unwrap().sequence();
        assert!(wait_until(Duration::from_secs(2), || source
            .latest()
            .is_some_and(|f| f.sequence() > first)));

        source.stop().unwrap();
    }

    #[test]
    fn test_open_failure_is_returned_and_not_retried() {
        let device = ScriptedDevice::solid(4, 4, 0).failing_open();
        let opens = device.open_count();
        let mut source = FrameSource::new(Box::new(device), settings(3));

        assert!(matches!(source.start(), Err(CaptureError::Device(_))));
        assert_eq!(opens.load(Ordering::SeqCst), 1);
        assert!(source.latest().is_none());
        assert!(source.stop().is_ok());
    }

    #[test]
    fn test_transient_failures_are_skipped() {
        let device = ScriptedDevice::scripted(
            4,
            4,
            vec![
                DeviceStep::Frame(1),
                DeviceStep::Fail,
                DeviceStep::Fail,
                DeviceStep::Frame(2),
            ],
        );
        let mut source = FrameSource::new(Box::new(device), settings(3));
        source.start().unwrap();

        assert!(wait_until(Duration::from_secs(2), || source
            .latest()
            .is_some_and(|f| f.sequence() >= 2)));
        let frame = source.latest().unwrap();
        assert_eq!(frame.data()[0], 2);

        source.stop().unwrap();
        assert_eq!(source.counters().transient_failures.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_consecutive_failures_escalate_to_device_lost() {
        let device = ScriptedDevice::scripted(4, 4, vec![DeviceStep::Frame(1), DeviceStep::Fail]);
        let closed = device.closed_flag();
        let reported = Arc::new(Mutex::new(None));
        let sink = reported.clone();

        let mut source = FrameSource::new(Box::new(device), settings(3)).on_fatal(Box::new(
            move |e| {
                *sink.lock().unwrap() = Some(e.to_string());
            },
        ));
        source.start().unwrap();

        assert!(wait_until(Duration::from_secs(2), || !source.is_running()));
        assert!(matches!(
            source.stop(),
            Err(CaptureError::DeviceLost { consecutive: 3 })
        ));
        assert!(closed.load(Ordering::SeqCst));
        assert!(reported.lock().unwrap().as_deref().unwrap().contains("3 consecutive"));
    }

    #[test]
    fn test_stop_is_idempotent_and_closes_device() {
        let device = ScriptedDevice::solid(4, 4, 0);
        let closed = device.closed_flag();
        let mut source = FrameSource::new(Box::new(device), settings(3));
        source.start().unwrap();

        assert!(source.stop().is_ok());
        assert!(closed.load(Ordering::SeqCst));
        assert!(source.stop().is_ok());
        assert!(matches!(source.start(), Err(CaptureError::Device(_))));
    }

    #[test]
    fn test_external_stop_signal_ends_capture() {
        let stop = Arc::new(AtomicBool::new(false));
        let device = ScriptedDevice::solid(4, 4, 0);
        let closed = device.closed_flag();
        let mut source =
            FrameSource::new(Box::new(device), settings(3)).with_stop_signal(stop.clone());
        source.start().unwrap();

        stop.store(true, Ordering::SeqCst);
        assert!(wait_until(Duration::from_secs(1), || closed.load(Ordering::SeqCst)));
        assert!(source.stop().is_ok());
    }

    #[test]
    fn test_malformed_image_is_transient() {
        let raw = RawImage {
            data: vec![0; 5],
            width: 2,
            height: 2,
        };
        assert!(matches!(
            frame_from_raw(raw, 1),
            Err(CaptureError::Transient(_))
        ));
    }
}
