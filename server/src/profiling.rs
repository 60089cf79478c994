//! Per-pulse profiling with named markers.
//!
//! Each update phase (and the expensive inner operations: per-area reset,
//! player save, script execution) brackets itself with a marker. At pulse
//! end the scheduler checks wall-clock against the budget; an over-budget
//! pulse logs a rate-limited warning naming the three most expensive
//! markers of that pulse.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use core::constants::PULSE_BUDGET_MS;

/// Minimum spacing between over-budget warnings.
const WARN_INTERVAL: Duration = Duration::from_secs(10);

pub struct Profiler {
    /// Accumulated time per marker for the current pulse.
    pulse_markers: HashMap<&'static str, Duration>,
    /// Accumulated time per marker since the last snapshot reset.
    totals: HashMap<&'static str, Duration>,
    pulse_start: Instant,
    budget: Duration,
    last_warning: Option<Instant>,
    /// Pulses measured and pulses that blew the budget, for the 99% check.
    pub pulses_seen: u64,
    pub pulses_over: u64,
}

/// RAII guard: records elapsed time under its marker when dropped.
pub struct Span<'a> {
    profiler: &'a mut Profiler,
    name: &'static str,
    start: Instant,
}

impl Drop for Span<'_> {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        *self
            .profiler
            .pulse_markers
            .entry(self.name)
            .or_default() += elapsed;
        *self.profiler.totals.entry(self.name).or_default() += elapsed;
    }
}

impl Profiler {
    pub fn new() -> Self {
        Profiler {
            pulse_markers: HashMap::new(),
            totals: HashMap::new(),
            pulse_start: Instant::now(),
            budget: Duration::from_millis(PULSE_BUDGET_MS),
            last_warning: None,
            pulses_seen: 0,
            pulses_over: 0,
        }
    }

    pub fn set_budget(&mut self, budget: Duration) {
        self.budget = budget;
    }

    pub fn pulse_begin(&mut self) {
        self.pulse_markers.clear();
        self.pulse_start = Instant::now();
    }

    /// Bracket a phase: the returned guard charges its marker on drop.
    pub fn span(&mut self, name: &'static str) -> Span<'_> {
        Span {
            name,
            start: Instant::now(),
            profiler: self,
        }
    }

    /// Charge an already-measured duration to a marker; for phases
    /// whose body needs the whole server mutably.
    pub fn record(&mut self, name: &'static str, elapsed: Duration) {
        *self.pulse_markers.entry(name).or_default() += elapsed;
        *self.totals.entry(name).or_default() += elapsed;
    }

    /// Called at pulse end. Over-budget pulses emit one warning per
    /// [`WARN_INTERVAL`] identifying the top three markers.
    pub fn pulse_end(&mut self) {
        self.pulses_seen += 1;
        let elapsed = self.pulse_start.elapsed();
        if elapsed <= self.budget {
            return;
        }
        self.pulses_over += 1;

        let now = Instant::now();
        if let Some(last) = self.last_warning {
            if now.duration_since(last) < WARN_INTERVAL {
                return;
            }
        }
        self.last_warning = Some(now);

        let mut worst: Vec<(&str, Duration)> = self
            .pulse_markers
            .iter()
            .map(|(&k, &v)| (k, v))
            .collect();
        worst.sort_by(|a, b| b.1.cmp(&a.1));
        worst.truncate(3);

        let detail = worst
            .iter()
            .map(|(name, d)| format!("{name} {:.1}ms", d.as_secs_f64() * 1000.0))
            .collect::<Vec<_>>()
            .join(", ");
        log::warn!(
            "pulse took {:.1}ms (budget {:.0}ms): {}",
            elapsed.as_secs_f64() * 1000.0,
            self.budget.as_secs_f64() * 1000.0,
            if detail.is_empty() { "no markers" } else { &detail }
        );
    }

    /// Snapshot the accumulated totals (for the admin `profile` command)
    /// and reset them.
    pub fn snapshot(&mut self) -> Vec<(&'static str, Duration)> {
        let mut all: Vec<(&'static str, Duration)> =
            self.totals.drain().collect();
        all.sort_by(|a, b| b.1.cmp(&a.1));
        all
    }
}

impl Default for Profiler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_accumulate_under_marker() {
        let mut prof = Profiler::new();
        prof.pulse_begin();
        {
            let _s = prof.span("area_reset");
            std::thread::sleep(Duration::from_millis(2));
        }
        {
            let _s = prof.span("area_reset");
        }
        let snap = prof.snapshot();
        let (name, dur) = snap[0];
        assert_eq!(name, "area_reset");
        assert!(dur >= Duration::from_millis(2));
    }

    #[test]
    fn over_budget_pulse_is_counted() {
        let mut prof = Profiler::new();
        prof.set_budget(Duration::from_millis(1));
        prof.pulse_begin();
        std::thread::sleep(Duration::from_millis(3));
        prof.pulse_end();
        assert_eq!(prof.pulses_seen, 1);
        assert_eq!(prof.pulses_over, 1);
    }

    #[test]
    fn in_budget_pulse_is_clean() {
        let mut prof = Profiler::new();
        prof.pulse_begin();
        prof.pulse_end();
        assert_eq!(prof.pulses_over, 0);
    }
}
