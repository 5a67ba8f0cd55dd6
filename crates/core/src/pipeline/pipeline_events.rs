use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::decision::privacy_decision::PrivacyDecision;

/// Events not consumed within this many are dropped.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Notable moments in a running pipeline, for whatever control surface
/// drives it.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// The privacy state flipped (including a reset that turned it off).
    DecisionChanged(PrivacyDecision),
    /// Analysis has failed this many cycles in a row.
    Degraded { consecutive_errors: u32 },
    Recovered,
    /// Capture ended with a fatal error; the pipeline is shutting down.
    DeviceLost(String),
    Stopped,
}

/// Non-blocking sending half: a loop never waits on a slow listener.
#[derive(Clone)]
pub struct EventSender {
    tx: Sender<PipelineEvent>,
}

impl EventSender {
    pub fn emit(&self, event: PipelineEvent) {
        match self.tx.try_send(event) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(event)) => {
                log::debug!("Event queue full, dropping {event:?}");
            }
        }
    }
}

pub fn event_channel() -> (EventSender, Receiver<PipelineEvent>) {
    let (tx, rx) = crossbeam_channel::bounded(EVENT_CHANNEL_CAPACITY);
    (EventSender { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_arrive_in_order() {
        let (tx, rx) = event_channel();
        tx.emit(PipelineEvent::Degraded {
            consecutive_errors: 3,
        });
        tx.emit(PipelineEvent::Recovered);
        assert_eq!(
            rx.try_recv().unwrap(),
            PipelineEvent::Degraded {
                consecutive_errors: 3
            }
        );
        assert_eq!(rx.try_recv().unwrap(), PipelineEvent::Recovered);
    }

    #[test]
    fn test_full_queue_does_not_block() {
        let (tx, rx) = event_channel();
        for _ in 0..EVENT_CHANNEL_CAPACITY + 10 {
            tx.emit(PipelineEvent::Recovered);
        }
        assert_eq!(rx.len(), EVENT_CHANNEL_CAPACITY);
    }

    #[test]
    fn test_emit_without_listener_is_silent() {
        let (tx, rx) = event_channel();
        drop(rx);
        tx.emit(PipelineEvent::Stopped);
    }
}
