use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Cross-cutting logger for per-stage timings of one pipeline loop.
///
/// Each loop owns its logger and hands it back when its thread is joined,
/// so recording never needs a lock shared with another loop.
pub trait PipelineLogger: Send {
    /// Count one iteration of the owning loop.
    fn cycle(&mut self);

    /// Record how long a named stage took.
    fn timing(&mut self, stage: &str, duration: Duration);

    /// Record a point-in-time metric (e.g. faces per cycle).
    fn metric(&mut self, name: &str, value: f64);

    /// Emit an end-of-session summary. Default: no-op.
    fn summary(&self) {}
}

/// Silent logger that discards all events.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn cycle(&mut self) {}
    fn timing(&mut self, _stage: &str, _duration: Duration) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
}

#[derive(Debug, Default, Clone, Copy)]
struct Aggregate {
    count: u64,
    total: f64,
    max: f64,
}

impl Aggregate {
    fn add(&mut self, value: f64) {
        self.count += 1;
        self.total += value;
        self.max = self.max.max(value);
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

/// Aggregates timings and metrics (count, mean, max) for a long-running loop
/// and logs them on `summary`.
///
/// Only running totals are kept, so memory stays flat no matter how long the
/// session runs.
pub struct SummaryPipelineLogger {
    label: String,
    timings: HashMap<String, Aggregate>,
    metrics: HashMap<String, Aggregate>,
    start_time: Instant,
    cycles: u64,
}

impl SummaryPipelineLogger {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            cycles: 0,
        }
    }

    /// Returns the formatted summary string, or `None` if no data recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.cycles == 0 && self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let mut lines = vec![format!(
            "{} summary ({} cycles, {:.1}s):",
            self.label,
            self.cycles,
            elapsed_ms / 1000.0
        )];

        let mut stages: Vec<_> = self.timings.iter().collect();
        stages.sort_by(|a, b| a.0.cmp(b.0));
        for (stage, agg) in stages {
            let pct = if elapsed_ms > 0.0 {
                agg.total / elapsed_ms * 100.0
            } else {
                0.0
            };
            lines.push(format!(
                "  {stage:12}: avg {:6.1}ms  max {:6.1}ms  total {:7.0}ms  ({pct:4.1}%)",
                agg.mean(),
                agg.max,
                agg.total
            ));
        }

        let mut names: Vec<_> = self.metrics.iter().collect();
        names.sort_by(|a, b| a.0.cmp(b.0));
        for (name, agg) in names {
            lines.push(format!("  {name}: avg {:.1}  max {:.1}", agg.mean(), agg.max));
        }

        if self.cycles > 0 && elapsed_ms > 0.0 {
            let rate = self.cycles as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Rate: {rate:.1}/s"));
        }

        Some(lines.join("\n"))
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// (count, mean ms, max ms) for a stage.
    pub fn timing_for(&self, stage: &str) -> Option<(u64, f64, f64)> {
        self.timings.get(stage).map(|a| (a.count, a.mean(), a.max))
    }

    /// (count, mean, max) for a metric.
    pub fn metric_for(&self, name: &str) -> Option<(u64, f64, f64)> {
        self.metrics.get(name).map(|a| (a.count, a.mean(), a.max))
    }
}

impl PipelineLogger for SummaryPipelineLogger {
    fn cycle(&mut self) {
        self.cycles += 1;
    }

    fn timing(&mut self, stage: &str, duration: Duration) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .add(duration.as_secs_f64() * 1000.0);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().add(value);
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
