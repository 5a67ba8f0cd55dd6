use crate::render::compositor::ComposedFrame;
use crate::render::display_sink::{DisplayError, DisplaySink};

/// Logs what the user would be seeing: one line per change of the displayed
/// privacy state, plus the status line at debug level.
#[derive(Default)]
pub struct LoggingDisplaySink {
    last_state: Option<bool>,
    frames: u64,
}

impl LoggingDisplaySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_shown(&self) -> u64 {
        self.frames
    }
}

impl DisplaySink for LoggingDisplaySink {
    fn show(&mut self, composed: &ComposedFrame) -> Result<(), DisplayError> {
        self.frames += 1;
        if composed.privacy_on.is_some() && composed.privacy_on != self.last_state {
            let reason = composed
                .status
                .as_ref()
                .map(|s| s.reason.as_str())
                .unwrap_or("");
            log::info!(
                "Display now {} at frame {} {reason}",
                if composed.obscured { "OBSCURED" } else { "CLEAR" },
                composed.frame.sequence()
            );
            self.last_state = composed.privacy_on;
        }
        if let Some(status) = &composed.status {
            log::debug!("{status}");
        }
        Ok(())
    }

    fn close(&mut self) {
        log::info!("Display closed after {} frames", self.frames);
    }
}
