use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Fixed-rate ticker for the capture, analysis and render loops.
///
/// Deadlines advance by a constant period from the start, so time spent
/// inside a cycle is absorbed instead of stretching it. When a cycle overruns
/// by more than a period the schedule restarts from now rather than firing a
/// burst of catch-up ticks.
pub struct Pacer {
    period: Duration,
    next: Instant,
}

impl Pacer {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next: Instant::now() + period,
        }
    }

    pub fn from_rate(per_second: f64) -> Self {
        Self::new(period_for_rate(per_second))
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Sleeps until the next tick. Returns `false` if `stop` was raised,
    /// checked both before and after sleeping, so a stop request is observed
    /// within one period.
    pub fn wait(&mut self, stop: &AtomicBool) -> bool {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let now = Instant::now();
        if self.next > now {
            thread::sleep(self.next - now);
            self.next += self.period;
        } else {
            self.next = now + self.period;
        }
        !stop.load(Ordering::Relaxed)
    }
}

/// Period for a rate in events per second. Rates with no representable
/// period (non-positive, NaN, or so small the period overflows) map to one
/// second.
pub fn period_for_rate(per_second: f64) -> Duration {
    if per_second.is_finite() && per_second > 0.0 {
        Duration::try_from_secs_f64(1.0 / per_second).unwrap_or(Duration::from_secs(1))
    } else {
        Duration::from_secs(1)
    }
}
