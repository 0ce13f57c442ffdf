use serde::Serialize;
use std::collections::VecDeque;

pub const LATENCY_WINDOW: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub command_count: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub last_latency_ms: Option<u64>,
    pub rolling_average_latency_ms: Option<f64>,
}

/// Counters plus a rolling latency window over completed dispatches.
#[derive(Debug, Default)]
pub struct Metrics {
    command_count: u64,
    success_count: u64,
    error_count: u64,
    last_latency_ms: Option<u64>,
    latencies: VecDeque<u64>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// A dispatch attempt began.
    pub fn record_command(&mut self) {
        self.command_count += 1;
    }

    pub fn record_success(&mut self, latency_ms: u64) {
        self.success_count += 1;
        self.record_latency(latency_ms);
    }

    /// A dispatch completed without success. The error itself is counted
    /// by `record_error` when the machine enters `Error`.
    pub fn record_failed_completion(&mut self, latency_ms: u64) {
        self.record_latency(latency_ms);
    }

    pub fn record_error(&mut self) {
        self.error_count += 1;
    }

    fn record_latency(&mut self, latency_ms: u64) {
        if self.latencies.len() >= LATENCY_WINDOW {
            self.latencies.pop_front();
        }
        self.latencies.push_back(latency_ms);
        self.last_latency_ms = Some(latency_ms);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let rolling_average_latency_ms = if self.latencies.is_empty() {
            None
        } else {
            Some(self.latencies.iter().sum::<u64>() as f64 / self.latencies.len() as f64)
        };

        MetricsSnapshot {
            command_count: self.command_count,
            success_count: self.success_count,
            error_count: self.error_count,
            last_latency_ms: self.last_latency_ms,
            rolling_average_latency_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_average_uses_last_hundred_samples() {
        let mut metrics = Metrics::new();
        for _ in 0..50 {
            metrics.record_success(1_000);
        }
        for _ in 0..LATENCY_WINDOW {
            metrics.record_success(10);
        }
        let snap = metrics.snapshot();
        assert_eq!(snap.success_count, 150);
        assert_eq!(snap.last_latency_ms, Some(10));
        assert_eq!(snap.rolling_average_latency_ms, Some(10.0));
    }

    #[test]
    fn empty_metrics_have_no_latency() {
        let snap = Metrics::new().snapshot();
        assert_eq!(snap, MetricsSnapshot::default());
    }
}
