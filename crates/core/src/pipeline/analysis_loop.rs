use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;

use crate::config::GuardConfig;
use crate::decision::decision_engine::DecisionEngine;
use crate::decision::privacy_decision::PrivacyDecision;
use crate::decision::risk_assessment::{ObservedFace, Observation, RiskAssessment, RiskCriteria};
use crate::detection::domain::face_detector::{Detection, FaceDetector};
use crate::detection::domain::verifier::{
    FaceRegion, Identity, IdentityLabel, VerificationError, Verifier,
};
use crate::pipeline::pipeline_events::PipelineEvent;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::shared_state::PipelineShared;
use crate::render::annotations::{AnnotatedFace, Annotations};
use crate::shared::constants::FACE_CROP_PADDING;
use crate::shared::frame::Frame;
use crate::shared::pacer::Pacer;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyzerSettings {
    pub analysis_width: u32,
    pub analysis_height: u32,
    pub min_confidence: f64,
    pub criteria: RiskCriteria,
    pub degraded_after_errors: u32,
}

impl AnalyzerSettings {
    pub fn from_config(config: &GuardConfig) -> Self {
        Self {
            analysis_width: config.detection.analysis_width,
            analysis_height: config.detection.analysis_height,
            min_confidence: config.detection.min_detection_confidence,
            criteria: RiskCriteria {
                area_ratio_threshold: config.privacy.area_ratio_threshold,
                assume_operator_present: config.privacy.assume_operator_present,
            },
            degraded_after_errors: config.detection.degraded_after_errors.max(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthChange {
    Degraded { consecutive_errors: u32 },
    Recovered,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CycleTimings {
    pub detect: Duration,
    /// `None` when no verifier ran this cycle.
    pub verify: Option<Duration>,
}

/// Result of analysing one new frame.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisCycle {
    pub observation: Observation,
    /// Faces above the confidence floor, before the area filter.
    pub faces: Vec<ObservedFace>,
    pub health: Option<HealthChange>,
    pub timings: CycleTimings,
}

impl AnalysisCycle {
    pub fn failed(&self) -> bool {
        matches!(self.observation, Observation::Inconclusive { .. })
    }
}

/// Turns frames into risk observations: downscale, detect, optionally
/// verify each face, filter.
///
/// Holding the verifier as an `Option` is what "verification enabled" means.
/// A verifier that reports it has no template is dropped for good and every
/// face is treated as OTHER from then on.
pub struct FrameAnalyzer {
    detector: Box<dyn FaceDetector>,
    verifier: Option<Box<dyn Verifier>>,
    settings: AnalyzerSettings,
    last_sequence: Option<u64>,
    consecutive_errors: u32,
    degraded: bool,
}

impl FrameAnalyzer {
    pub fn new(
        detector: Box<dyn FaceDetector>,
        verifier: Option<Box<dyn Verifier>>,
        settings: AnalyzerSettings,
    ) -> Self {
        Self {
            detector,
            verifier,
            settings,
            last_sequence: None,
            consecutive_errors: 0,
            degraded: false,
        }
    }

    pub fn has_verifier(&self) -> bool {
        self.verifier.is_some()
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    /// Analyses `frame`, or returns `None` if it is not newer than the last
    /// frame analysed. Detector and verifier errors never escape: they yield
    /// an inconclusive observation.
    pub fn analyze(&mut self, frame: &Frame) -> Option<AnalysisCycle> {
        let sequence = frame.sequence();
        if self.last_sequence.is_some_and(|last| sequence <= last) {
            return None;
        }
        self.last_sequence = Some(sequence);

        let mut timings = CycleTimings::default();
        let (observation, faces) = match self.observe(frame, &mut timings) {
            Ok(faces) => {
                let assessment = RiskAssessment::assess(&faces, &self.settings.criteria, sequence);
                (Observation::Assessed(assessment), faces)
            }
            Err(cause) => {
                log::warn!("Analysis of frame {sequence} failed: {cause}");
                (
                    Observation::Inconclusive {
                        frame_sequence: sequence,
                        cause,
                    },
                    Vec::new(),
                )
            }
        };
        let health = self.track_health(matches!(observation, Observation::Assessed(_)));

        Some(AnalysisCycle {
            observation,
            faces,
            health,
            timings,
        })
    }

    fn observe(
        &mut self,
        frame: &Frame,
        timings: &mut CycleTimings,
    ) -> Result<Vec<ObservedFace>, String> {
        let (aw, ah) = (self.settings.analysis_width, self.settings.analysis_height);
        let downscaled;
        let input = if frame.width() > aw || frame.height() > ah {
            downscaled = frame.resized(aw, ah);
            &downscaled
        } else {
            frame
        };

        let started = Instant::now();
        let result = self.detector.detect(input).map_err(|e| e.to_string())?;
        timings.detect = started.elapsed();

        let detections: Vec<Detection> = result
            .detections
            .into_iter()
            .filter(|d| d.confidence >= self.settings.min_confidence)
            .collect();

        let started = Instant::now();
        let faces = self.verify_all(frame, &detections)?;
        if self.verifier.is_some() && !detections.is_empty() {
            timings.verify = Some(started.elapsed());
        }
        Ok(faces)
    }

    /// Faces are cropped from the full-resolution frame, not the downscaled one.
    fn verify_all(
        &mut self,
        frame: &Frame,
        detections: &[Detection],
    ) -> Result<Vec<ObservedFace>, String> {
        let unverified = || -> Vec<ObservedFace> {
            detections
                .iter()
                .map(|d| ObservedFace::unverified(d.bbox, d.confidence))
                .collect()
        };
        let Some(verifier) = self.verifier.as_mut() else {
            return Ok(unverified());
        };

        let mut faces = Vec::with_capacity(detections.len());
        let mut template_missing = false;
        for detection in detections {
            let rect = detection
                .bbox
                .to_pixel_rect(frame.width(), frame.height())
                .padded(FACE_CROP_PADDING, frame.width(), frame.height());
            let identity = if rect.is_empty() {
                Identity {
                    label: IdentityLabel::Other,
                    similarity: 0.0,
                    bbox: detection.bbox,
                }
            } else {
                let region = FaceRegion {
                    crop: frame.crop(rect),
                    bbox: detection.bbox,
                };
                match verifier.verify(&region) {
                    Ok(identity) => identity,
                    Err(VerificationError::NoTemplate) => {
                        template_missing = true;
                        break;
                    }
                    Err(e) => return Err(e.to_string()),
                }
            };
            faces.push(ObservedFace {
                bbox: detection.bbox,
                confidence: detection.confidence,
                identity: Some(identity),
            });
        }

        if template_missing {
            log::info!("No enrollment template loaded; verification disabled, all faces count as OTHER");
            self.verifier = None;
            return Ok(unverified());
        }
        Ok(faces)
    }

    fn track_health(&mut self, succeeded: bool) -> Option<HealthChange> {
        if succeeded {
            self.consecutive_errors = 0;
            if self.degraded {
                self.degraded = false;
                return Some(HealthChange::Recovered);
            }
            return None;
        }
        self.consecutive_errors = self.consecutive_errors.saturating_add(1);
        if !self.degraded && self.consecutive_errors >= self.settings.degraded_after_errors {
            self.degraded = true;
            return Some(HealthChange::Degraded {
                consecutive_errors: self.consecutive_errors,
            });
        }
        None
    }
}

/// Requests the analysis thread handles between cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisCommand {
    Reset,
}

/// The inference loop: pulls the newest frame at a fixed cadence, analyses
/// it and feeds the decision engine, which it owns.
///
/// A slow detector simply makes the next cycle pick up whatever frame is
/// newest by then; nothing queues.
pub struct AnalysisLoop {
    analyzer: FrameAnalyzer,
    engine: DecisionEngine,
    period: Duration,
    shared: PipelineShared,
    commands: Receiver<AnalysisCommand>,
    logger: Box<dyn PipelineLogger>,
}

impl AnalysisLoop {
    pub fn new(
        analyzer: FrameAnalyzer,
        engine: DecisionEngine,
        period: Duration,
        shared: PipelineShared,
        commands: Receiver<AnalysisCommand>,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            analyzer,
            engine,
            period,
            shared,
            commands,
            logger,
        }
    }

    /// Runs until the stop signal is raised, then hands the logger back.
    pub fn run(mut self) -> Box<dyn PipelineLogger> {
        let mut pacer = Pacer::new(self.period);
        // Time spent paused is not safe time: the first evaluation after
        // start or resume gets dt = 0.
        let mut last_evaluation: Option<Instant> = None;

        loop {
            if self.shared.is_stopping() {
                break;
            }
            self.handle_commands();

            if self.shared.status.is_paused() {
                last_evaluation = None;
            } else if let Some(frame) = self.shared.frames.latest() {
                self.logger.cycle();
                self.analyse(&frame, &mut last_evaluation);
            }

            if !pacer.wait(&self.shared.stop) {
                break;
            }
        }
        log::debug!("Analysis loop stopped");
        self.logger
    }

    fn handle_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                AnalysisCommand::Reset => {
                    let decision = self.engine.reset(Instant::now());
                    self.publish(decision);
                }
            }
        }
    }

    fn analyse(&mut self, frame: &Frame, last_evaluation: &mut Option<Instant>) {
        let status = &self.shared.status;
        let Some(cycle) = self.analyzer.analyze(frame) else {
            status.skipped_cycles.fetch_add(1, Ordering::Relaxed);
            self.logger.metric("frame_reuse", 1.0);
            return;
        };
        status.analysis_cycles.fetch_add(1, Ordering::Relaxed);
        self.logger.metric("frame_reuse", 0.0);
        self.logger.timing("detect", cycle.timings.detect);
        if let Some(verify) = cycle.timings.verify {
            self.logger.timing("verify", verify);
        }
        if cycle.failed() {
            status.failed_cycles.fetch_add(1, Ordering::Relaxed);
        } else {
            self.logger.metric("faces", cycle.faces.len() as f64);
        }

        match cycle.health {
            Some(HealthChange::Degraded { consecutive_errors }) => {
                log::warn!("Analysis degraded after {consecutive_errors} failed cycles");
                status.set_degraded(true);
                self.shared
                    .events
                    .emit(PipelineEvent::Degraded { consecutive_errors });
            }
            Some(HealthChange::Recovered) => {
                log::info!("Analysis recovered");
                status.set_degraded(false);
                self.shared.events.emit(PipelineEvent::Recovered);
            }
            None => {}
        }

        let now = Instant::now();
        let dt = last_evaluation.map_or(Duration::ZERO, |t| now.duration_since(t));
        *last_evaluation = Some(now);

        let decision = self.engine.evaluate(&cycle.observation, dt, now);
        self.logger.timing("decide", now.elapsed());

        if !cycle.failed() {
            self.shared.annotations.publish(Annotations {
                frame_sequence: frame.sequence(),
                faces: cycle
                    .faces
                    .iter()
                    .map(|f| AnnotatedFace {
                        bbox: f.bbox,
                        confidence: f.confidence,
                        label: f.identity.map(|i| i.label),
                    })
                    .collect(),
            });
        }
        self.publish(decision);
    }

    fn publish(&self, decision: PrivacyDecision) {
        if decision.changed {
            self.shared.status.transitions.fetch_add(1, Ordering::Relaxed);
            self.shared
                .events
                .emit(PipelineEvent::DecisionChanged(decision.clone()));
        }
        self.shared.decisions.publish(decision);
    }
}
