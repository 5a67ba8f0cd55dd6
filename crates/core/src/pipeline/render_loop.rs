use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::shared_state::PipelineShared;
use crate::render::compositor::Compositor;
use crate::render::display_sink::DisplaySink;
use crate::render::status_overlay::RenderStatus;
use crate::shared::pacer::Pacer;

/// Smoothing factor of the displayed frame rate.
const FPS_SMOOTHING: f64 = 0.1;

/// Exponentially smoothed rate of `tick` calls.
#[derive(Debug, Default)]
struct FpsMeter {
    last: Option<Instant>,
    fps: Option<f64>,
}

impl FpsMeter {
    fn tick(&mut self, at: Instant) {
        if let Some(last) = self.last {
            let secs = at.duration_since(last).as_secs_f64();
            if secs > 0.0 {
                let instant = 1.0 / secs;
                self.fps = Some(match self.fps {
                    Some(fps) => fps + FPS_SMOOTHING * (instant - fps),
                    None => instant,
                });
            }
        }
        self.last = Some(at);
    }

    fn fps(&self) -> Option<f64> {
        self.fps
    }
}

/// The presentation loop: at its own fixed rate, composes the newest frame
/// with the newest decision and hands the result to the display sink.
///
/// It never waits for analysis. Nothing is shown until the first frame
/// exists, and until the first decision exists frames are shown raw.
pub struct RenderLoop {
    compositor: Compositor,
    sink: Box<dyn DisplaySink>,
    period: Duration,
    shared: PipelineShared,
    logger: Box<dyn PipelineLogger>,
}

impl RenderLoop {
    pub fn new(
        compositor: Compositor,
        sink: Box<dyn DisplaySink>,
        period: Duration,
        shared: PipelineShared,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            compositor,
            sink,
            period,
            shared,
            logger,
        }
    }

    /// Runs until the stop signal is raised, closes the sink and hands the
    /// logger back.
    pub fn run(mut self) -> Box<dyn PipelineLogger> {
        let mut pacer = Pacer::new(self.period);
        let mut meter = FpsMeter::default();
        let mut last_frame: Option<u64> = None;
        let mut display_errors = 0u64;

        loop {
            if self.shared.is_stopping() {
                break;
            }

            if let Some(frame) = self.shared.frames.latest() {
                self.logger.cycle();
                let decision = self.shared.decisions.latest();
                let annotations = self.shared.annotations.latest();
                let status = RenderStatus {
                    fps: meter.fps(),
                    paused: self.shared.status.is_paused(),
                    degraded: self.shared.status.is_degraded(),
                };

                let started = Instant::now();
                let composed = self.compositor.compose(
                    &frame,
                    decision.as_deref(),
                    annotations.as_deref(),
                    &status,
                );
                self.logger.timing("compose", started.elapsed());
                let reused = last_frame == Some(frame.sequence());
                self.logger
                    .metric("frame_reuse", if reused { 1.0 } else { 0.0 });
                last_frame = Some(frame.sequence());

                let started = Instant::now();
                if let Err(e) = self.sink.show(&composed) {
                    display_errors += 1;
                    if display_errors == 1 {
                        log::warn!("Display failed: {e}");
                    } else {
                        log::debug!("Display failed ({display_errors} so far): {e}");
                    }
                }
                self.logger.timing("display", started.elapsed());

                self.shared
                    .status
                    .frames_rendered
                    .fetch_add(1, Ordering::Relaxed);
                meter.tick(Instant::now());
            }

            if !pacer.wait(&self.shared.stop) {
                break;
            }
        }

        self.sink.close();
        log::debug!("Render loop stopped");
        self.logger
    }
}
