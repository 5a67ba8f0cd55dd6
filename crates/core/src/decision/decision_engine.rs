use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::config::PrivacyConfig;
use crate::decision::privacy_decision::PrivacyDecision;
use crate::decision::risk_assessment::{Observation, RiskAssessment};
use crate::shared::constants::DECISION_HISTORY_LEN;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionSettings {
    pub face_count_threshold: usize,
    pub debounce_on_frames: u32,
    pub debounce_off: Duration,
}

impl DecisionSettings {
    pub fn from_config(privacy: &PrivacyConfig) -> Self {
        Self {
            face_count_threshold: privacy.face_count_threshold,
            debounce_on_frames: privacy.debounce_on_frames.max(1),
            debounce_off: privacy.debounce_off(),
        }
    }
}

/// Hysteresis counters. The two directions are tracked independently:
/// activation counts consecutive risky assessments, deactivation measures
/// continuous safe time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineState {
    pub risk_streak: u32,
    pub safe_duration: Duration,
    pub on: bool,
}

/// Two-state (OFF/ON) machine turning noisy per-cycle assessments into a
/// stable privacy decision.
///
/// OFF -> ON after `debounce_on_frames` consecutive risky assessments (fast).
/// ON -> OFF after `debounce_off` of uninterrupted safe time (slow). An
/// inconclusive cycle is evidence of neither and leaves both counters alone.
pub struct DecisionEngine {
    settings: DecisionSettings,
    state: EngineState,
    last_frame_sequence: Option<u64>,
    decisions_emitted: u64,
    history: VecDeque<PrivacyDecision>,
}

impl DecisionEngine {
    pub fn new(settings: DecisionSettings) -> Self {
        Self {
            settings,
            state: EngineState::default(),
            last_frame_sequence: None,
            decisions_emitted: 0,
            history: VecDeque::with_capacity(DECISION_HISTORY_LEN),
        }
    }

    pub fn settings(&self) -> &DecisionSettings {
        &self.settings
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_on(&self) -> bool {
        self.state.on
    }

    /// Emitted decisions, oldest first, bounded to the most recent 100.
    pub fn history(&self) -> impl Iterator<Item = &PrivacyDecision> {
        self.history.iter()
    }

    /// Advances the state machine by one observation.
    ///
    /// `dt` is the wall-clock time since the previous evaluation. An
    /// observation that refers to a frame no newer than the last one
    /// evaluated carries no new evidence and is handled like an
    /// inconclusive cycle.
    pub fn evaluate(&mut self, observation: &Observation, dt: Duration, at: Instant) -> PrivacyDecision {
        let frame_sequence = observation.frame_sequence();
        let stale = self
            .last_frame_sequence
            .is_some_and(|last| frame_sequence <= last);

        let decision = match observation {
            Observation::Assessed(_) if stale => self.hold(
                format!("hold: stale assessment for frame {frame_sequence}"),
                frame_sequence,
                at,
            ),
            Observation::Assessed(assessment) => {
                self.last_frame_sequence = Some(frame_sequence);
                self.step(assessment, dt, at)
            }
            Observation::Inconclusive { cause, .. } => {
                if !stale {
                    self.last_frame_sequence = Some(frame_sequence);
                }
                self.hold(
                    format!("hold: analysis inconclusive ({cause})"),
                    frame_sequence,
                    at,
                )
            }
        };

        self.record(decision.clone());
        decision
    }

    /// Operator recovery: clears both counters and forces OFF.
    pub fn reset(&mut self, at: Instant) -> PrivacyDecision {
        let was_on = self.state.on;
        self.state = EngineState::default();
        if was_on {
            log::info!("Privacy OFF: reset by operator");
        }
        let decision = self.emit(false, "reset: state cleared by operator".into(), 0.0, 0, None, at, was_on);
        self.record(decision.clone());
        decision
    }

    fn step(&mut self, assessment: &RiskAssessment, dt: Duration, at: Instant) -> PrivacyDecision {
        let risky = assessment.is_risky(self.settings.face_count_threshold);
        let risk_reason = || {
            format!(
                "risk: {} other face(s), area={:.3}",
                assessment.other_faces,
                assessment.risk_score()
            )
        };

        let (reason, changed) = if !self.state.on {
            if risky {
                self.state.risk_streak = self.state.risk_streak.saturating_add(1);
                if self.state.risk_streak >= self.settings.debounce_on_frames {
                    self.state = EngineState {
                        risk_streak: 0,
                        safe_duration: Duration::ZERO,
                        on: true,
                    };
                    (risk_reason(), true)
                } else {
                    (
                        format!(
                            "{} (streak {}/{})",
                            risk_reason(),
                            self.state.risk_streak,
                            self.settings.debounce_on_frames
                        ),
                        false,
                    )
                }
            } else {
                self.state.risk_streak = 0;
                (
                    format!("safe: {} other face(s) in view", assessment.other_faces),
                    false,
                )
            }
        } else if risky {
            self.state.safe_duration = Duration::ZERO;
            (risk_reason(), false)
        } else {
            self.state.safe_duration += dt;
            let safe = self.state.safe_duration;
            if safe >= self.settings.debounce_off {
                self.state = EngineState::default();
                (
                    format!("safe: {:.1} consecutive safe seconds", safe.as_secs_f64()),
                    true,
                )
            } else {
                (
                    format!(
                        "holding: {:.1}s of {:.1}s safe",
                        safe.as_secs_f64(),
                        self.settings.debounce_off.as_secs_f64()
                    ),
                    false,
                )
            }
        };

        if changed {
            log::info!("Privacy {}: {reason}", if self.state.on { "ON" } else { "OFF" });
        }
        self.emit(
            self.state.on,
            reason,
            assessment.risk_score(),
            assessment.other_faces,
            Some(assessment.frame_sequence),
            at,
            changed,
        )
    }

    fn hold(&mut self, reason: String, frame_sequence: u64, at: Instant) -> PrivacyDecision {
        log::debug!("{reason}");
        self.emit(self.state.on, reason, 0.0, 0, Some(frame_sequence), at, false)
    }

    #[allow(clippy::too_many_arguments)]
    fn emit(
        &mut self,
        on: bool,
        reason: String,
        risk_score: f64,
        other_faces: usize,
        frame_sequence: Option<u64>,
        timestamp: Instant,
        changed: bool,
    ) -> PrivacyDecision {
        self.decisions_emitted += 1;
        PrivacyDecision {
            on,
            reason,
            risk_score,
            other_faces,
            frame_sequence,
            sequence: self.decisions_emitted,
            timestamp,
            changed,
        }
    }

    fn record(&mut self, decision: PrivacyDecision) {
        if self.history.len() == DECISION_HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back(decision);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const TICK: Duration = Duration::from_millis(100);

    fn settings(on_frames: u32, off_secs: f64) -> DecisionSettings {
        DecisionSettings {
            face_count_threshold: 1,
            debounce_on_frames: on_frames,
            debounce_off: Duration::from_secs_f64(off_secs),
        }
    }

    /// Feeds observations with increasing frame sequences at a fixed tick.
    struct Driver {
        engine: DecisionEngine,
        frame: u64,
        now: Instant,
    }

    impl Driver {
        fn new(settings: DecisionSettings) -> Self {
            Self {
                engine: DecisionEngine::new(settings),
                frame: 0,
                now: Instant::now(),
            }
        }

        fn assessment(&mut self, other_faces: usize) -> Observation {
            self.frame += 1;
            Observation::Assessed(RiskAssessment {
                other_faces,
                max_area_ratio: (other_faces > 0).then_some(0.05),
                total_faces: other_faces,
                frame_sequence: self.frame,
            })
        }

        fn feed(&mut self, observation: Observation, dt: Duration) -> PrivacyDecision {
            self.now += dt;
            self.engine.evaluate(&observation, dt, self.now)
        }

        fn risky(&mut self) -> PrivacyDecision {
            let o = self.assessment(1);
            self.feed(o, TICK)
        }

        fn safe(&mut self) -> PrivacyDecision {
            let o = self.assessment(0);
            self.feed(o, TICK)
        }

        fn failed(&mut self) -> PrivacyDecision {
            self.frame += 1;
            let o = Observation::Inconclusive {
                frame_sequence: self.frame,
                cause: "detector error".into(),
            };
            self.feed(o, TICK)
        }

        fn turn_on(&mut self) {
            while !self.engine.is_on() {
                self.risky();
            }
        }
    }

    #[test]
    fn test_initial_state_is_off() {
        let engine = DecisionEngine::new(settings(2, 0.8));
        assert_eq!(engine.state(), EngineState::default());
        assert!(!engine.is_on());
    }

    // Scenario A
    #[test]
    fn test_two_consecutive_risky_turn_on_at_second() {
        let mut d = Driver::new(settings(2, 0.8));
        let first = d.risky();
        assert!(!first.on);
        assert!(first.reason.contains("streak 1/2"));
        let second = d.risky();
        assert!(second.on);
        assert!(second.changed);
        assert_eq!(second.reason, "risk: 1 other face(s), area=0.050");
    }

    #[test]
    fn test_interrupted_risk_never_turns_on() {
        let mut d = Driver::new(settings(2, 0.8));
        for _ in 0..10 {
            assert!(!d.risky().on);
            assert!(!d.safe().on);
        }
        assert_eq!(d.engine.state().risk_streak, 0);
    }

    #[test]
    fn test_single_frame_activation() {
        let mut d = Driver::new(settings(1, 0.8));
        assert!(d.risky().on);
    }

    // Scenario B
    #[rstest]
    #[case::spans_0_9s(9, false)]
    #[case::spans_0_5s(5, true)]
    #[case::exactly_0_8s(8, false)]
    fn test_safe_time_needed_to_turn_off(#[case] safe_ticks: usize, #[case] still_on: bool) {
        let mut d = Driver::new(settings(2, 0.8));
        d.turn_on();
        for _ in 0..safe_ticks {
            d.safe();
        }
        assert_eq!(d.engine.is_on(), still_on);
    }

    #[test]
    fn test_risk_while_on_restarts_safe_window() {
        let mut d = Driver::new(settings(1, 0.8));
        d.turn_on();
        for _ in 0..7 {
            d.safe();
        }
        d.risky();
        assert_eq!(d.engine.state().safe_duration, Duration::ZERO);
        for _ in 0..7 {
            assert!(d.safe().on);
        }
        let off = d.safe();
        assert!(!off.on);
        assert!(off.changed);
        assert_eq!(off.reason, "safe: 0.8 consecutive safe seconds");
    }

    #[test]
    fn test_holding_reason_reports_progress() {
        let mut d = Driver::new(settings(1, 0.8));
        d.turn_on();
        let held = d.safe();
        assert!(held.on);
        assert_eq!(held.reason, "holding: 0.1s of 0.8s safe");
    }

    // Scenario D
    #[test]
    fn test_errors_do_not_move_off_state() {
        let mut d = Driver::new(settings(2, 0.8));
        d.risky();
        let before = d.engine.state();
        for _ in 0..5 {
            let decision = d.failed();
            assert!(!decision.on);
            assert!(decision.reason.starts_with("hold: analysis inconclusive"));
        }
        assert_eq!(d.engine.state(), before);
    }

    #[test]
    fn test_errors_do_not_advance_safe_time() {
        let mut d = Driver::new(settings(1, 0.8));
        d.turn_on();
        d.safe();
        let before = d.engine.state();
        for _ in 0..5 {
            assert!(d.failed().on);
        }
        assert_eq!(d.engine.state(), before);
        assert_eq!(before.safe_duration, TICK);
    }

    #[test]
    fn test_reset_forces_off_and_clears_counters() {
        let mut d = Driver::new(settings(1, 0.8));
        d.turn_on();
        d.safe();
        let decision = d.engine.reset(d.now);
        assert!(!decision.on);
        assert!(decision.changed);
        assert_eq!(decision.frame_sequence, None);
        assert_eq!(d.engine.state(), EngineState::default());

        let mut off = Driver::new(settings(3, 0.8));
        off.risky();
        off.engine.reset(off.now);
        assert_eq!(off.engine.state(), EngineState::default());
    }

    #[test]
    fn test_stale_assessment_is_ignored() {
        let mut d = Driver::new(settings(2, 0.8));
        d.frame = 10;
        d.risky();
        d.frame = 5;
        let stale = d.risky();
        assert!(!stale.on);
        assert!(stale.reason.contains("stale"));
        assert_eq!(d.engine.state().risk_streak, 1);
    }

    #[test]
    fn test_decision_sequence_is_monotonic() {
        let mut d = Driver::new(settings(2, 0.8));
        let a = d.risky();
        let b = d.failed();
        let c = d.engine.reset(d.now);
        assert!(a.sequence < b.sequence && b.sequence < c.sequence);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut d = Driver::new(settings(2, 0.8));
        for _ in 0..(DECISION_HISTORY_LEN + 20) {
            d.safe();
        }
        let history: Vec<_> = d.engine.history().collect();
        assert_eq!(history.len(), DECISION_HISTORY_LEN);
        assert_eq!(history[0].sequence, 21);
        assert_eq!(
            history.last().unwrap().sequence,
            (DECISION_HISTORY_LEN + 20) as u64
        );
    }

    #[test]
    fn test_face_count_threshold_applies() {
        let mut d = Driver::new(DecisionSettings {
            face_count_threshold: 2,
            ..settings(1, 0.8)
        });
        assert!(!d.risky().on);
        let two = d.assessment(2);
        assert!(d.feed(two, TICK).on);
    }

    /// Small deterministic generator so the property checks need no extra crates.
    fn xorshift(state: &mut u64) -> u64 {
        *state ^= *state << 13;
        *state ^= *state >> 7;
        *state ^= *state << 17;
        *state
    }

    #[rstest]
    #[case(1, 0.3)]
    #[case(2, 0.8)]
    #[case(4, 0.25)]
    fn test_hysteresis_properties_hold_for_random_streams(
        #[case] on_frames: u32,
        #[case] off_secs: f64,
    ) {
        let settings = settings(on_frames, off_secs);
        let mut d = Driver::new(settings);
        let mut rng = 0x9e37_79b9_7f4a_7c15u64;
        let mut consecutive_risky = 0u32;
        let mut safe_since_risk = Duration::ZERO;

        for _ in 0..5000 {
            let roll = xorshift(&mut rng) % 10;
            let dt = Duration::from_millis(20 + xorshift(&mut rng) % 100);
            let was_on = d.engine.is_on();

            let decision = match roll {
                0..=3 => {
                    consecutive_risky += 1;
                    safe_since_risk = Duration::ZERO;
                    let o = d.assessment(1);
                    d.feed(o, dt)
                }
                4..=8 => {
                    consecutive_risky = 0;
                    safe_since_risk += dt;
                    let o = d.assessment(0);
                    d.feed(o, dt)
                }
                _ => {
                    d.frame += 1;
                    let o = Observation::Inconclusive {
                        frame_sequence: d.frame,
                        cause: "x".into(),
                    };
                    d.feed(o, dt)
                }
            };

            if !was_on && decision.on {
                assert!(consecutive_risky >= on_frames);
            }
            if was_on && !decision.on {
                assert!(safe_since_risk >= settings.debounce_off);
            }
            if decision.changed {
                consecutive_risky = 0;
            }
        }
    }
}
