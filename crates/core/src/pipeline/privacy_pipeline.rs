use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use ab_glyph::FontArc;
use crossbeam_channel::{Receiver, Sender};

use crate::blurring::domain::frame_obscurer::FrameObscurer;
use crate::capture::domain::capture_device::{CaptureDevice, CaptureError};
use crate::capture::frame_source::{FrameSource, FrameSourceSettings};
use crate::config::GuardConfig;
use crate::decision::decision_engine::{DecisionEngine, DecisionSettings};
use crate::decision::privacy_decision::PrivacyDecision;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::verifier::Verifier;
use crate::pipeline::analysis_loop::{
    AnalysisCommand, AnalysisLoop, AnalyzerSettings, FrameAnalyzer,
};
use crate::pipeline::error::PipelineError;
use crate::pipeline::pipeline_events::{event_channel, EventSender, PipelineEvent};
use crate::pipeline::pipeline_logger::{NullPipelineLogger, PipelineLogger};
use crate::pipeline::pipeline_status::SessionSummary;
use crate::pipeline::render_loop::RenderLoop;
use crate::pipeline::shared_state::PipelineShared;
use crate::render::compositor::{Compositor, OverlaySettings};
use crate::render::display_sink::DisplaySink;

type LoopHandle = JoinHandle<Box<dyn PipelineLogger>>;

/// How a stopped session ended, kept so every `stop` call reports the same.
#[derive(Debug, Clone)]
enum Ending {
    Clean(SessionSummary),
    Capture(CaptureError),
    Panicked(&'static str),
}

impl Ending {
    fn to_result(&self) -> Result<SessionSummary, PipelineError> {
        match self {
            Ending::Clean(summary) => Ok(*summary),
            Ending::Capture(e) => Err(PipelineError::Capture(e.clone())),
            Ending::Panicked(name) => Err(PipelineError::ThreadPanicked(name)),
        }
    }
}

/// The collaborators a pipeline is assembled from.
pub struct PipelineParts {
    pub device: Box<dyn CaptureDevice>,
    pub detector: Box<dyn FaceDetector>,
    pub verifier: Option<Box<dyn Verifier>>,
    pub obscurer: Box<dyn FrameObscurer>,
    pub sink: Box<dyn DisplaySink>,
    pub analysis_logger: Box<dyn PipelineLogger>,
    pub render_logger: Box<dyn PipelineLogger>,
    pub font: Option<FontArc>,
}

impl PipelineParts {
    pub fn new(
        device: Box<dyn CaptureDevice>,
        detector: Box<dyn FaceDetector>,
        obscurer: Box<dyn FrameObscurer>,
        sink: Box<dyn DisplaySink>,
    ) -> Self {
        Self {
            device,
            detector,
            verifier: None,
            obscurer,
            sink,
            analysis_logger: Box::new(NullPipelineLogger),
            render_logger: Box::new(NullPipelineLogger),
            font: None,
        }
    }

    pub fn with_font(mut self, font: FontArc) -> Self {
        self.font = Some(font);
        self
    }

    pub fn with_verifier(mut self, verifier: Box<dyn Verifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn with_loggers(
        mut self,
        analysis: Box<dyn PipelineLogger>,
        render: Box<dyn PipelineLogger>,
    ) -> Self {
        self.analysis_logger = analysis;
        self.render_logger = render;
        self
    }
}

/// Capture, analysis and render loops wired around shared latest-value
/// slots, plus the commands a control surface needs.
///
/// One pipeline runs once: `start` consumes the parts and `stop` is final.
pub struct PrivacyPipeline {
    config: GuardConfig,
    parts: Option<PipelineParts>,
    stop: Arc<AtomicBool>,
    events_tx: EventSender,
    events_rx: Receiver<PipelineEvent>,
    commands: Option<Sender<AnalysisCommand>>,
    shared: Option<PipelineShared>,
    source: Option<FrameSource>,
    analysis: Option<LoopHandle>,
    render: Option<LoopHandle>,
    started_at: Option<Instant>,
    ending: Option<Ending>,
}

impl PrivacyPipeline {
    /// Validates the configuration; an invalid one is rejected here, before
    /// any device is touched.
    pub fn new(config: GuardConfig, parts: PipelineParts) -> Result<Self, PipelineError> {
        config.validate()?;
        let (events_tx, events_rx) = event_channel();
        Ok(Self {
            config,
            parts: Some(parts),
            stop: Arc::new(AtomicBool::new(false)),
            events_tx,
            events_rx,
            commands: None,
            shared: None,
            source: None,
            analysis: None,
            render: None,
            started_at: None,
            ending: None,
        })
    }

    /// Opens the capture device and starts all three loops. A device that
    /// cannot be opened is reported and not retried. Once stopped, or once
    /// the stop signal is raised, a pipeline cannot be started.
    pub fn start(&mut self) -> Result<(), PipelineError> {
        if self.ending.is_some() || self.is_stopping() {
            return Err(PipelineError::AlreadyStopped);
        }
        let parts = self.parts.take().ok_or(PipelineError::AlreadyRunning)?;
        let config = &self.config;

        let events = self.events_tx.clone();
        let fatal_stop = self.stop.clone();
        let settings = FrameSourceSettings::from_config(&config.camera);
        let mut source = FrameSource::new(parts.device, settings)
            .with_stop_signal(self.stop.clone())
            .on_fatal(Box::new(move |e| {
                fatal_stop.store(true, Ordering::SeqCst);
                events.emit(PipelineEvent::DeviceLost(e.to_string()));
            }));
        source.start()?;

        let shared =
            PipelineShared::new(source.slot(), self.events_tx.clone(), self.stop.clone());
        let (commands, command_rx) = crossbeam_channel::unbounded();

        let analysis = AnalysisLoop::new(
            FrameAnalyzer::new(
                parts.detector,
                parts.verifier,
                AnalyzerSettings::from_config(config),
            ),
            DecisionEngine::new(DecisionSettings::from_config(&config.privacy)),
            config.analysis_period(),
            shared.clone(),
            command_rx,
            parts.analysis_logger,
        );
        let mut compositor =
            Compositor::new(parts.obscurer, OverlaySettings::from_config(&config.ui));
        if let Some(font) = parts.font {
            compositor = compositor.with_font(font);
        }
        let render = RenderLoop::new(
            compositor,
            parts.sink,
            config.render_period(),
            shared.clone(),
            parts.render_logger,
        );

        log::info!(
            "Analysing every {:.0}ms, rendering every {:.0}ms",
            config.analysis_period().as_secs_f64() * 1000.0,
            config.render_period().as_secs_f64() * 1000.0
        );
        self.analysis = Some(std::thread::spawn(move || analysis.run()));
        self.render = Some(std::thread::spawn(move || render.run()));
        self.commands = Some(commands);
        self.shared = Some(shared);
        self.source = Some(source);
        self.started_at = Some(Instant::now());
        Ok(())
    }

    /// Raises the stop signal, joins every loop and releases the device.
    ///
    /// Returns the session summary, or the fatal error that ended the
    /// session. Later calls return the same result without side effects.
    pub fn stop(&mut self) -> Result<SessionSummary, PipelineError> {
        if let Some(ending) = &self.ending {
            return ending.to_result();
        }
        self.stop.store(true, Ordering::SeqCst);

        let render = join_loop(self.render.take(), "render");
        let analysis = join_loop(self.analysis.take(), "analysis");
        let capture = match self.source.as_mut() {
            Some(source) => source.stop(),
            None => Ok(()),
        };

        let duration = self.started_at.map(|t| t.elapsed()).unwrap_or_default();
        let summary = match (&self.shared, &self.source) {
            (Some(shared), Some(source)) => shared.status.summary(&source.counters(), duration),
            _ => SessionSummary::default(),
        };
        self.events_tx.emit(PipelineEvent::Stopped);

        if self.started_at.is_some() {
            for logger in [&analysis, &render] {
                if let Ok(Some(logger)) = logger {
                    logger.summary();
                }
            }
            log::info!("\n\n{summary}");
        }

        let ending = match (capture, render, analysis) {
            (Err(e), _, _) => Ending::Capture(e),
            (_, Err(name), _) | (_, _, Err(name)) => Ending::Panicked(name),
            _ => Ending::Clean(summary),
        };
        let result = ending.to_result();
        self.ending = Some(ending);
        result
    }

    pub fn pause(&self) {
        if let Some(shared) = &self.shared {
            if !shared.status.set_paused(true) {
                log::info!("Analysis paused; current decision stays in force");
            }
        }
    }

    pub fn resume(&self) {
        if let Some(shared) = &self.shared {
            if shared.status.set_paused(false) {
                log::info!("Analysis resumed");
            }
        }
    }

    pub fn is_paused(&self) -> bool {
        self.shared.as_ref().is_some_and(|s| s.status.is_paused())
    }

    /// Asks the analysis thread to clear the decision engine. Applied
    /// before its next cycle, even while paused.
    pub fn reset(&self) {
        if let Some(commands) = &self.commands {
            if commands.send(AnalysisCommand::Reset).is_err() {
                log::warn!("Reset ignored: analysis loop has stopped");
            }
        }
    }

    pub fn current_decision(&self) -> Option<Arc<PrivacyDecision>> {
        self.shared.as_ref().and_then(|s| s.decisions.latest())
    }

    pub fn is_degraded(&self) -> bool {
        self.shared.as_ref().is_some_and(|s| s.status.is_degraded())
    }

    pub fn events(&self) -> Receiver<PipelineEvent> {
        self.events_rx.clone()
    }

    /// The global stop signal. Raising it (e.g. from a Ctrl-C handler) ends
    /// every loop within one of its periods; `stop` still has to be called
    /// to collect the threads.
    pub fn stop_signal(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn is_stopping(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
}

impl Drop for PrivacyPipeline {
    fn drop(&mut self) {
        if self.ending.is_none() {
            let _ = self.stop();
        }
    }
}

fn join_loop(
    handle: Option<LoopHandle>,
    name: &'static str,
) -> Result<Option<Box<dyn PipelineLogger>>, &'static str> {
    match handle {
        Some(h) => h.join().map(Some).map_err(|_| name),
        None => Ok(None),
    }
}
