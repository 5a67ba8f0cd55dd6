use ab_glyph::FontArc;

use crate::blurring::domain::frame_obscurer::FrameObscurer;
use crate::blurring::infrastructure::cpu_frame_obscurer::PRIVACY_TINT;
use crate::config::UiConfig;
use crate::decision::privacy_decision::PrivacyDecision;
use crate::render::annotations::Annotations;
use crate::render::status_overlay::{draw_annotations, draw_status_band, RenderStatus, StatusLine};
use crate::shared::frame::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlaySettings {
    pub show_status: bool,
    pub show_fps: bool,
    pub show_annotations: bool,
}

impl OverlaySettings {
    pub fn from_config(ui: &UiConfig) -> Self {
        Self {
            show_status: ui.show_status,
            show_fps: ui.show_fps,
            show_annotations: ui.show_annotations,
        }
    }
}

/// One frame ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedFrame {
    pub frame: Frame,
    /// Whether the privacy transform was applied (or the frame blanked).
    pub obscured: bool,
    pub privacy_on: Option<bool>,
    pub decision_sequence: Option<u64>,
    pub status: Option<StatusLine>,
}

/// Builds the displayed image from the latest frame and decision.
///
/// `compose` depends only on its arguments: the same frame, decision,
/// annotations and status always produce the same output, so re-rendering a
/// stale pair is harmless.
pub struct Compositor {
    obscurer: Box<dyn FrameObscurer>,
    overlay: OverlaySettings,
    font: Option<FontArc>,
    obscure_failed: bool,
}

impl Compositor {
    pub fn new(obscurer: Box<dyn FrameObscurer>, overlay: OverlaySettings) -> Self {
        Self {
            obscurer,
            overlay,
            font: None,
            obscure_failed: false,
        }
    }

    /// Draws the status text into the band as well as its colour.
    pub fn with_font(mut self, font: FontArc) -> Self {
        self.font = Some(font);
        self
    }

    /// Before the first decision exists the raw frame is shown unobscured.
    /// If the privacy transform fails the frame is blanked instead of shown.
    pub fn compose(
        &mut self,
        frame: &Frame,
        decision: Option<&PrivacyDecision>,
        annotations: Option<&Annotations>,
        status: &RenderStatus,
    ) -> ComposedFrame {
        let mut output = frame.clone();
        let on = decision.is_some_and(|d| d.on);

        if on {
            if let Err(e) = self.obscurer.obscure(&mut output) {
                if !self.obscure_failed {
                    log::error!("Privacy transform failed, blanking output: {e}");
                    self.obscure_failed = true;
                }
                blank(&mut output);
            }
        }

        if self.overlay.show_annotations {
            if let Some(annotations) = annotations {
                draw_annotations(&mut output, annotations);
            }
        }

        let status = self.overlay.show_status.then(|| {
            let line = StatusLine::new(decision, status, self.overlay.show_fps);
            draw_status_band(&mut output, &line, self.font.as_ref());
            line
        });

        ComposedFrame {
            frame: output,
            obscured: on,
            privacy_on: decision.map(|d| d.on),
            decision_sequence: decision.map(|d| d.sequence),
            status,
        }
    }
}

fn blank(frame: &mut Frame) {
    let ch = frame.channels() as usize;
    for px in frame.data_mut().chunks_exact_mut(ch.max(1)) {
        for (v, t) in px.iter_mut().zip(PRIVACY_TINT) {
            *v = t;
        }
    }
}
