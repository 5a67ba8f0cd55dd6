use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::decision::privacy_decision::PrivacyDecision;
use crate::pipeline::pipeline_events::EventSender;
use crate::pipeline::pipeline_status::PipelineStatus;
use crate::render::annotations::Annotations;
use crate::shared::frame::Frame;
use crate::shared::latest_slot::LatestSlot;

/// Handles every loop of one pipeline holds: the published slots, the
/// status flags and the global stop signal. Cloning shares them.
#[derive(Clone)]
pub struct PipelineShared {
    pub frames: Arc<LatestSlot<Frame>>,
    pub decisions: Arc<LatestSlot<PrivacyDecision>>,
    pub annotations: Arc<LatestSlot<Annotations>>,
    pub status: Arc<PipelineStatus>,
    pub events: EventSender,
    pub stop: Arc<AtomicBool>,
}

impl PipelineShared {
    pub fn new(frames: Arc<LatestSlot<Frame>>, events: EventSender, stop: Arc<AtomicBool>) -> Self {
        Self {
            frames,
            decisions: Arc::new(LatestSlot::new()),
            annotations: Arc::new(LatestSlot::new()),
            status: Arc::new(PipelineStatus::default()),
            events,
            stop,
        }
    }

    pub fn is_stopping(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
}
