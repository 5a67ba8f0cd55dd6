use std::path::Path;
use std::time::Duration;

use crate::capture::domain::capture_device::{CaptureDevice, CaptureError, RawImage};
use crate::config::CameraConfig;

/// Packets tried per `read` before giving up on the current frame.
const MAX_PACKETS_PER_READ: usize = 16;

/// Live camera capture through libavdevice (`v4l2`, `avfoundation`, `dshow`).
///
/// Decoded frames are converted to RGB24. A failed open is a device error;
/// any failure while reading or decoding a single frame is transient.
pub struct FfmpegCamera {
    device: String,
    input_format: String,
    width: u32,
    height: u32,
    fps: f64,
    read_timeout: Duration,
    input: Option<ffmpeg_next::format::context::Input>,
    decoder: Option<ffmpeg_next::decoder::Video>,
    scaler: Option<Scaler>,
    stream_index: usize,
}

struct Scaler {
    context: ffmpeg_next::software::scaling::Context,
    format: ffmpeg_next::format::Pixel,
    width: u32,
    height: u32,
}

// Safety: FfmpegCamera is only driven by the capture thread that owns it.
// The raw pointers inside ffmpeg types are never shared across threads.
unsafe impl Send for FfmpegCamera {}

impl FfmpegCamera {
    pub fn from_config(camera: &CameraConfig) -> Result<Self, CaptureError> {
        let device = match &camera.device {
            Some(d) => d.clone(),
            None => default_device().ok_or_else(|| {
                CaptureError::Device("no default camera on this platform; pass a device name".into())
            })?,
        };
        let input_format = camera
            .input_format
            .clone()
            .unwrap_or_else(|| default_input_format().to_string());

        Ok(Self {
            device,
            input_format,
            width: camera.width,
            height: camera.height,
            fps: camera.target_fps,
            read_timeout: Duration::from_millis(camera.read_timeout_ms),
            input: None,
            decoder: None,
            scaler: None,
            stream_index: 0,
        })
    }

    fn options(&self) -> ffmpeg_next::Dictionary<'static> {
        let mut options = ffmpeg_next::Dictionary::new();
        options.set("framerate", &format!("{}", self.fps.round().max(1.0) as u32));
        options.set("video_size", &format!("{}x{}", self.width, self.height));
        // Microseconds; honoured by backends that support blocking-read timeouts.
        let timeout_us = self.read_timeout.as_micros().to_string();
        options.set("timeout", &timeout_us);
        options.set("rw_timeout", &timeout_us);
        options
    }

    fn decode_next(&mut self) -> Result<RawImage, CaptureError> {
        let (Some(input), Some(decoder)) = (self.input.as_mut(), self.decoder.as_mut()) else {
            return Err(CaptureError::Device(format!("{} is not open", self.device)));
        };

        for _ in 0..MAX_PACKETS_PER_READ {
            let mut packet = ffmpeg_next::Packet::empty();
            packet
                .read(input)
                .map_err(|e| CaptureError::Transient(format!("read failed: {e}")))?;
            if packet.stream() != self.stream_index {
                continue;
            }
            decoder
                .send_packet(&packet)
                .map_err(|e| CaptureError::Transient(format!("decode failed: {e}")))?;

            let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
            if decoder.receive_frame(&mut decoded).is_ok() {
                return to_rgb(&mut self.scaler, &decoded);
            }
        }
        Err(CaptureError::Transient("no frame decoded".into()))
    }
}

impl CaptureDevice for FfmpegCamera {
    fn open(&mut self) -> Result<(), CaptureError> {
        ffmpeg_next::init().map_err(|e| CaptureError::Device(format!("ffmpeg init: {e}")))?;
        ffmpeg_next::device::register_all();

        let format = ffmpeg_next::device::input::video()
            .find(|f| f.name() == self.input_format)
            .ok_or_else(|| {
                CaptureError::Device(format!("input format {} not available", self.input_format))
            })?;

        let input = match ffmpeg_next::format::open_with(
            &Path::new(&self.device),
            &ffmpeg_next::format::Format::Input(format),
            self.options(),
        ) {
            Ok(ffmpeg_next::format::context::Context::Input(input)) => input,
            Ok(_) => {
                return Err(CaptureError::Device(format!(
                    "{} did not open as an input",
                    self.device
                )))
            }
            Err(e) => {
                return Err(CaptureError::Device(format!(
                    "cannot open {}: {e}",
                    self.device
                )))
            }
        };

        let stream = input
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| CaptureError::Device(format!("{} has no video stream", self.device)))?;
        let stream_index = stream.index();
        let decoder = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .and_then(|ctx| ctx.decoder().video())
            .map_err(|e| CaptureError::Device(format!("no decoder for {}: {e}", self.device)))?;

        log::debug!(
            "Opened {} ({}) at {}x{}",
            self.device,
            self.input_format,
            decoder.width(),
            decoder.height()
        );

        self.stream_index = stream_index;
        self.decoder = Some(decoder);
        self.input = Some(input);
        Ok(())
    }

    fn read(&mut self) -> Result<RawImage, CaptureError> {
        self.decode_next()
    }

    fn close(&mut self) {
        self.scaler = None;
        self.decoder = None;
        self.input = None;
    }

    fn is_live(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        format!("camera {} ({})", self.device, self.input_format)
    }
}

/// Converts a decoded frame to packed RGB24, rebuilding the scaler when the
/// source geometry or pixel format changes mid-stream.
fn to_rgb(
    scaler: &mut Option<Scaler>,
    decoded: &ffmpeg_next::util::frame::video::Video,
) -> Result<RawImage, CaptureError> {
    let (format, width, height) = (decoded.format(), decoded.width(), decoded.height());
    let stale = scaler
        .as_ref()
        .map_or(true, |s| s.format != format || s.width != width || s.height != height);
    if stale {
        let context = ffmpeg_next::software::scaling::Context::get(
            format,
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .map_err(|e| CaptureError::Transient(format!("scaler: {e}")))?;
        *scaler = Some(Scaler {
            context,
            format,
            width,
            height,
        });
    }
    let Some(active) = scaler.as_mut() else {
        return Err(CaptureError::Transient("scaler unavailable".into()));
    };

    let mut rgb = ffmpeg_next::util::frame::video::Video::empty();
    active
        .context
        .run(decoded, &mut rgb)
        .map_err(|e| CaptureError::Transient(format!("colour conversion: {e}")))?;

    Ok(RawImage {
        data: packed_rgb(rgb.data(0), rgb.stride(0), width, height),
        width,
        height,
    })
}

/// Strips per-row stride padding from an RGB24 plane.
fn packed_rgb(plane: &[u8], stride: usize, width: u32, height: u32) -> Vec<u8> {
    let row_bytes = width as usize * 3;
    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&plane[start..start + row_bytes]);
    }
    pixels
}

#[cfg(target_os = "linux")]
fn default_input_format() -> &'static str {
    "v4l2"
}

#[cfg(target_os = "macos")]
fn default_input_format() -> &'static str {
    "avfoundation"
}

#[cfg(target_os = "windows")]
fn default_input_format() -> &'static str {
    "dshow"
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn default_input_format() -> &'static str {
    "video4linux2"
}

fn default_device() -> Option<String> {
    if cfg!(target_os = "macos") {
        Some("0".into())
    } else if cfg!(target_os = "windows") {
        // dshow needs the camera's friendly name ("video=Integrated Camera").
        None
    } else {
        Some("/dev/video0".into())
    }
}
