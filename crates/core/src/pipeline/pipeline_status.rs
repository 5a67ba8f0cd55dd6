use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use crate::capture::frame_source::CaptureCounters;

/// Flags and counters shared by the loops of one pipeline.
#[derive(Debug, Default)]
pub struct PipelineStatus {
    paused: AtomicBool,
    degraded: AtomicBool,
    pub analysis_cycles: AtomicU64,
    /// Cycles that found no frame newer than the last one analysed.
    pub skipped_cycles: AtomicU64,
    pub failed_cycles: AtomicU64,
    pub transitions: AtomicU64,
    pub frames_rendered: AtomicU64,
}

impl PipelineStatus {
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    /// Returns the previous value.
    pub fn set_paused(&self, paused: bool) -> bool {
        self.paused.swap(paused, Ordering::SeqCst)
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    pub fn set_degraded(&self, degraded: bool) {
        self.degraded.store(degraded, Ordering::SeqCst);
    }

    pub fn summary(&self, capture: &CaptureCounters, duration: Duration) -> SessionSummary {
        SessionSummary {
            duration,
            frames_captured: capture.frames.load(Ordering::Relaxed),
            transient_failures: capture.transient_failures.load(Ordering::Relaxed),
            analysis_cycles: self.analysis_cycles.load(Ordering::Relaxed),
            skipped_cycles: self.skipped_cycles.load(Ordering::Relaxed),
            failed_cycles: self.failed_cycles.load(Ordering::Relaxed),
            transitions: self.transitions.load(Ordering::Relaxed),
            frames_rendered: self.frames_rendered.load(Ordering::Relaxed),
        }
    }
}

/// What one session did, reported when the pipeline stops.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SessionSummary {
    pub duration: Duration,
    pub frames_captured: u64,
    pub transient_failures: u64,
    pub analysis_cycles: u64,
    pub skipped_cycles: u64,
    pub failed_cycles: u64,
    pub transitions: u64,
    pub frames_rendered: u64,
}

impl SessionSummary {
    pub fn capture_fps(&self) -> f64 {
        rate(self.frames_captured, self.duration)
    }

    pub fn render_fps(&self) -> f64 {
        rate(self.frames_rendered, self.duration)
    }
}

fn rate(count: u64, over: Duration) -> f64 {
    let secs = over.as_secs_f64();
    if secs > 0.0 {
        count as f64 / secs
    } else {
        0.0
    }
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Session summary ({:.1}s):", self.duration.as_secs_f64())?;
        writeln!(
            f,
            "  captured {} frames ({:.1} fps), {} transient failures",
            self.frames_captured,
            self.capture_fps(),
            self.transient_failures
        )?;
        writeln!(
            f,
            "  analysed {} cycles, {} skipped as duplicates, {} failed",
            self.analysis_cycles, self.skipped_cycles, self.failed_cycles
        )?;
        writeln!(f, "  {} privacy transitions", self.transitions)?;
        write!(
            f,
            "  rendered {} frames ({:.1} fps)",
            self.frames_rendered,
            self.render_fps()
        )
    }
}
