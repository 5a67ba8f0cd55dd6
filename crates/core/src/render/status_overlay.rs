use std::fmt;
use std::fs;
use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{ImageBuffer, Rgb};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::config::ConfigError;
use crate::decision::privacy_decision::PrivacyDecision;
use crate::detection::domain::verifier::IdentityLabel;
use crate::render::annotations::Annotations;
use crate::shared::frame::Frame;

/// Longest reason shown on the status line.
pub const MAX_REASON_CHARS: usize = 50;

const COLOR_ON: [u8; 3] = [220, 40, 40];
const COLOR_OFF: [u8; 3] = [40, 180, 70];
const COLOR_PENDING: [u8; 3] = [120, 120, 120];
const COLOR_DEGRADED: [u8; 3] = [230, 160, 30];
const COLOR_PAUSED: [u8; 3] = [70, 110, 200];
const COLOR_OTHER: [u8; 3] = [255, 0, 0];
const COLOR_OPERATOR: [u8; 3] = [0, 255, 0];
const COLOR_TEXT: [u8; 3] = [255, 255, 255];

/// Bands thinner than this carry no text.
const MIN_TEXT_BAND: u32 = 10;

/// Borrowed RGB view of a frame that imageproc can draw on.
type Canvas<'a> = ImageBuffer<Rgb<u8>, &'a mut [u8]>;

fn canvas(frame: &mut Frame) -> Option<Canvas<'_>> {
    if frame.channels() != 3 {
        return None;
    }
    let (w, h) = (frame.width(), frame.height());
    ImageBuffer::from_raw(w, h, frame.data_mut())
}

/// Loads the font used for the status text.
pub fn load_font(path: &Path) -> Result<FontArc, ConfigError> {
    let bytes = fs::read(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    FontArc::try_from_vec(bytes).map_err(|e| ConfigError::Invalid {
        field: "ui.font_path",
        reason: format!("{}: {e}", path.display()),
    })
}

/// Render-time flags that are not part of the decision itself.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RenderStatus {
    pub fps: Option<f64>,
    pub paused: bool,
    pub degraded: bool,
}

/// Text form of the overlay, for sinks that print instead of drawing.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusLine {
    /// `None` until the first decision exists.
    pub privacy_on: Option<bool>,
    pub reason: String,
    pub fps: Option<f64>,
    pub paused: bool,
    pub degraded: bool,
}

impl StatusLine {
    pub fn new(decision: Option<&PrivacyDecision>, status: &RenderStatus, show_fps: bool) -> Self {
        Self {
            privacy_on: decision.map(|d| d.on),
            reason: decision
                .map(|d| d.reason.chars().take(MAX_REASON_CHARS).collect())
                .unwrap_or_else(|| "waiting for first analysis".into()),
            fps: if show_fps { status.fps } else { None },
            paused: status.paused,
            degraded: status.degraded,
        }
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.privacy_on {
            Some(true) => write!(f, "PRIVACY ON")?,
            Some(false) => write!(f, "PRIVACY OFF")?,
            None => write!(f, "STARTING")?,
        }
        write!(f, " | {}", self.reason)?;
        if let Some(fps) = self.fps {
            write!(f, " | {fps:.1} fps")?;
        }
        if self.paused {
            write!(f, " | PAUSED")?;
        }
        if self.degraded {
            write!(f, " | DEGRADED")?;
        }
        Ok(())
    }
}

/// Colour band across the top of the frame showing the privacy state, with
/// an amber block at its right end while analysis is degraded and the status
/// text on top when a font is available. A second band runs along the bottom
/// while analysis is paused.
pub fn draw_status_band(frame: &mut Frame, line: &StatusLine, font: Option<&FontArc>) {
    let Some(mut image) = canvas(frame) else {
        return;
    };
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return;
    }
    let band = (h / 24).max(4).min(h);
    let state = match line.privacy_on {
        Some(true) => COLOR_ON,
        Some(false) => COLOR_OFF,
        None => COLOR_PENDING,
    };
    draw_filled_rect_mut(&mut image, Rect::at(0, 0).of_size(w, band), Rgb(state));
    if line.degraded {
        let marker = (band * 3).min(w);
        draw_filled_rect_mut(
            &mut image,
            Rect::at((w - marker) as i32, 0).of_size(marker, band),
            Rgb(COLOR_DEGRADED),
        );
    }
    if line.paused {
        draw_filled_rect_mut(
            &mut image,
            Rect::at(0, (h - band) as i32).of_size(w, band),
            Rgb(COLOR_PAUSED),
        );
    }
    if let Some(font) = font.filter(|_| band >= MIN_TEXT_BAND) {
        let scale = PxScale::from(band as f32 * 0.8);
        let y = (band / 10) as i32;
        draw_text_mut(&mut image, Rgb(COLOR_TEXT), 4, y, scale, font, &line.to_string());
    }
}

/// Outlines each annotated face: red for OTHER or unverified, green for the operator.
pub fn draw_annotations(frame: &mut Frame, annotations: &Annotations) {
    let (fw, fh) = (frame.width(), frame.height());
    let Some(mut image) = canvas(frame) else {
        return;
    };
    for face in &annotations.faces {
        let color = match face.label {
            Some(IdentityLabel::Operator) => COLOR_OPERATOR,
            _ => COLOR_OTHER,
        };
        let rect = face.bbox.to_pixel_rect(fw, fh);
        if rect.is_empty() {
            continue;
        }
        for t in 0..2u32 {
            if rect.width <= 2 * t || rect.height <= 2 * t {
                break;
            }
            let outline = Rect::at((rect.x + t) as i32, (rect.y + t) as i32)
                .of_size(rect.width - 2 * t, rect.height - 2 * t);
            draw_hollow_rect_mut(&mut image, outline, Rgb(color));
        }
    }
}
