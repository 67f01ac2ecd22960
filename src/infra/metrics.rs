//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics for hot-path counters to avoid mutex contention.
//!
//! NOTE: All atomics use Relaxed ordering intentionally—these are statistical
//! counters only. Do NOT use these atomics for coordination or logic decisions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Lock-free metrics collector for the live sync core
pub struct Metrics {
    /// Stream events received from the transport (monotonic)
    stream_events_received: AtomicU64,
    /// Stream events dropped because the pump channel was full (monotonic)
    stream_events_dropped: AtomicU64,
    /// Reconnect attempts made by the stream task (monotonic)
    stream_reconnects: AtomicU64,
    /// Access events routed into a per-gate log (monotonic)
    events_routed: AtomicU64,
    /// Access events that addressed a gate missing from the snapshot (monotonic)
    unknown_gate_events: AtomicU64,
    /// Zone occupancy updates applied (monotonic)
    occupancy_updates: AtomicU64,
    /// Manual override commands dispatched (monotonic)
    commands_sent: AtomicU64,
    /// Manual override commands that failed (monotonic)
    commands_failed: AtomicU64,
    /// Events since last report (reset on report)
    events_since_report: AtomicU64,
    /// When this collector was created
    started_at: Instant,
    /// When the last report was taken
    last_report: parking_lot::Mutex<Instant>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            stream_events_received: AtomicU64::new(0),
            stream_events_dropped: AtomicU64::new(0),
            stream_reconnects: AtomicU64::new(0),
            events_routed: AtomicU64::new(0),
            unknown_gate_events: AtomicU64::new(0),
            occupancy_updates: AtomicU64::new(0),
            commands_sent: AtomicU64::new(0),
            commands_failed: AtomicU64::new(0),
            events_since_report: AtomicU64::new(0),
            started_at: now,
            last_report: parking_lot::Mutex::new(now),
        }
    }

    pub fn record_stream_event_received(&self) {
        self.stream_events_received.fetch_add(1, Ordering::Relaxed);
        self.events_since_report.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stream_event_dropped(&self) {
        self.stream_events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stream_reconnect(&self) {
        self.stream_reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event_routed(&self) {
        self.events_routed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unknown_gate_event(&self) {
        self.unknown_gate_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_occupancy_update(&self) {
        self.occupancy_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_command_sent(&self) {
        self.commands_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_command_failed(&self) {
        self.commands_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a consistent snapshot of the counters.
    ///
    /// Rate counters reset on each report; totals are monotonic.
    pub fn report(&self) -> MetricsSummary {
        let now = Instant::now();
        let elapsed_since_report = {
            let mut last = self.last_report.lock();
            let elapsed = now.duration_since(*last);
            *last = now;
            elapsed
        };

        let events_in_window = self.events_since_report.swap(0, Ordering::Relaxed);
        let events_per_sec = if elapsed_since_report.as_secs_f64() > 0.0 {
            events_in_window as f64 / elapsed_since_report.as_secs_f64()
        } else {
            0.0
        };

        MetricsSummary {
            uptime_secs: now.duration_since(self.started_at).as_secs(),
            stream_events_received: self.stream_events_received.load(Ordering::Relaxed),
            stream_events_dropped: self.stream_events_dropped.load(Ordering::Relaxed),
            stream_reconnects: self.stream_reconnects.load(Ordering::Relaxed),
            events_routed: self.events_routed.load(Ordering::Relaxed),
            unknown_gate_events: self.unknown_gate_events.load(Ordering::Relaxed),
            occupancy_updates: self.occupancy_updates.load(Ordering::Relaxed),
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            commands_failed: self.commands_failed.load(Ordering::Relaxed),
            events_per_sec,
        }
    }
}

/// Point-in-time snapshot produced by [`Metrics::report`]
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub uptime_secs: u64,
    pub stream_events_received: u64,
    pub stream_events_dropped: u64,
    pub stream_reconnects: u64,
    pub events_routed: u64,
    pub unknown_gate_events: u64,
    pub occupancy_updates: u64,
    pub commands_sent: u64,
    pub commands_failed: u64,
    pub events_per_sec: f64,
}

impl MetricsSummary {
    /// Log the summary as one structured line
    pub fn log(&self) {
        info!(
            uptime_secs = %self.uptime_secs,
            events_received = %self.stream_events_received,
            events_dropped = %self.stream_events_dropped,
            events_routed = %self.events_routed,
            unknown_gate_events = %self.unknown_gate_events,
            occupancy_updates = %self.occupancy_updates,
            reconnects = %self.stream_reconnects,
            commands_sent = %self.commands_sent,
            commands_failed = %self.commands_failed,
            events_per_sec = %format!("{:.1}", self.events_per_sec),
            "metrics_summary"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = Metrics::new();
        metrics.record_stream_event_received();
        metrics.record_stream_event_received();
        metrics.record_event_routed();
        metrics.record_unknown_gate_event();
        metrics.record_command_sent();
        metrics.record_command_failed();

        let summary = metrics.report();
        assert_eq!(summary.stream_events_received, 2);
        assert_eq!(summary.events_routed, 1);
        assert_eq!(summary.unknown_gate_events, 1);
        assert_eq!(summary.commands_sent, 1);
        assert_eq!(summary.commands_failed, 1);
    }

    #[test]
    fn test_rate_window_resets_on_report() {
        let metrics = Metrics::new();
        metrics.record_stream_event_received();
        let _ = metrics.report();

        let summary = metrics.report();
        // Totals are monotonic, the per-window rate is not.
        assert_eq!(summary.stream_events_received, 1);
        assert_eq!(summary.events_per_sec, 0.0);
    }
}
