use std::time::{Duration, Instant};

use serde::Serialize;

/// Cycle statistics over one reporting window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PollStatsSnapshot {
    pub cycles: u32,
    pub advances: u32,
    pub debounced: u32,
    pub advance_failures: u32,
    pub aggregation_failures: u32,
    pub avg_scan_ms: f32,
    pub cycles_per_sec: f32,
}

/// Counters since the loop was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PollTotals {
    pub cycles: u64,
    pub advances: u64,
    pub debounced: u64,
    pub advance_failures: u64,
    pub aggregation_failures: u64,
}

#[derive(Debug)]
pub(crate) struct PollStatsAccumulator {
    interval_start: Instant,
    interval: Duration,
    cycles: u32,
    advances: u32,
    debounced: u32,
    advance_failures: u32,
    aggregation_failures: u32,
    scan_time_sum: Duration,
    totals: PollTotals,
}

impl PollStatsAccumulator {
    pub(crate) fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval_start: now,
            interval,
            cycles: 0,
            advances: 0,
            debounced: 0,
            advance_failures: 0,
            aggregation_failures: 0,
            scan_time_sum: Duration::ZERO,
            totals: PollTotals::default(),
        }
    }

    pub(crate) fn record_cycle(&mut self, scan_time: Duration, aggregation_failures: usize) {
        let failures = u32::try_from(aggregation_failures).unwrap_or(u32::MAX);
        self.cycles = self.cycles.saturating_add(1);
        self.aggregation_failures = self.aggregation_failures.saturating_add(failures);
        self.scan_time_sum = self.scan_time_sum.saturating_add(scan_time);
        self.totals.cycles = self.totals.cycles.saturating_add(1);
        self.totals.aggregation_failures = self
            .totals
            .aggregation_failures
            .saturating_add(u64::from(failures));
    }

    pub(crate) fn record_advance(&mut self) {
        self.advances = self.advances.saturating_add(1);
        self.totals.advances = self.totals.advances.saturating_add(1);
    }

    pub(crate) fn record_debounced(&mut self) {
        self.debounced = self.debounced.saturating_add(1);
        self.totals.debounced = self.totals.debounced.saturating_add(1);
    }

    pub(crate) fn record_advance_failure(&mut self) {
        self.advance_failures = self.advance_failures.saturating_add(1);
        self.totals.advance_failures = self.totals.advance_failures.saturating_add(1);
    }

    pub(crate) fn totals(&self) -> PollTotals {
        self.totals
    }

    /// Restarts the window without emitting, e.g. after polling resumes.
    pub(crate) fn reset_window(&mut self, now: Instant) {
        self.interval_start = now;
        self.cycles = 0;
        self.advances = 0;
        self.debounced = 0;
        self.advance_failures = 0;
        self.aggregation_failures = 0;
        self.scan_time_sum = Duration::ZERO;
    }

    pub(crate) fn maybe_snapshot(&mut self, now: Instant) -> Option<PollStatsSnapshot> {
        let elapsed = now.saturating_duration_since(self.interval_start);
        if elapsed < self.interval {
            return None;
        }

        let elapsed_seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let avg_scan_ms = if self.cycles == 0 {
            0.0
        } else {
            (self.scan_time_sum.as_secs_f32() / self.cycles as f32) * 1000.0
        };

        let snapshot = PollStatsSnapshot {
            cycles: self.cycles,
            advances: self.advances,
            debounced: self.debounced,
            advance_failures: self.advance_failures,
            aggregation_failures: self.aggregation_failures,
            avg_scan_ms,
            cycles_per_sec: self.cycles as f32 / elapsed_seconds,
        };

        self.reset_window(now);
        Some(snapshot)
    }
}
