//! Pool metrics and telemetry.
//!
//! Counters are atomics; recent job durations are kept in a bounded buffer
//! for P50/P95/P99.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Maximum number of duration samples to keep in memory.
const MAX_DURATION_SAMPLES: usize = 1000;

/// Pool metrics collector.
#[derive(Debug, Default)]
pub struct PoolMetrics {
    /// Jobs accepted by `submit`.
    pub jobs_submitted: AtomicU64,
    /// Jobs that produced output.
    pub jobs_completed: AtomicU64,
    /// Jobs failed by their adapter.
    pub jobs_failed: AtomicU64,
    /// Jobs lost to a slot crash.
    pub jobs_crashed: AtomicU64,
    /// Jobs failed by pool termination.
    pub jobs_terminated: AtomicU64,
    /// Slots replaced after a crash.
    pub slots_replaced: AtomicU64,
    /// Total bytes of output produced.
    pub total_output_bytes: AtomicU64,
    duration_samples: Mutex<Vec<Duration>>,
}

impl PoolMetrics {
    /// Create a new empty metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submitted(&self) {
        self.jobs_submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed job with its run time and output size.
    pub fn record_completed(&self, duration: Duration, output_bytes: u64) {
        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
        self.total_output_bytes
            .fetch_add(output_bytes, Ordering::Relaxed);
        self.add_duration_sample(duration);
    }

    pub fn record_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a slot crash; `lost_job` is true when a job was running.
    pub fn record_crash(&self, lost_job: bool) {
        self.slots_replaced.fetch_add(1, Ordering::Relaxed);
        if lost_job {
            self.jobs_crashed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_terminated(&self, jobs: u64) {
        self.jobs_terminated.fetch_add(jobs, Ordering::Relaxed);
    }

    fn add_duration_sample(&self, duration: Duration) {
        if let Ok(mut samples) = self.duration_samples.lock() {
            if samples.len() >= MAX_DURATION_SAMPLES {
                samples.remove(0);
            }
            samples.push(duration);
        }
    }

    /// Get the current snapshot of metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let durations = self
            .duration_samples
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default();

        let (p50, p95, p99) = calculate_percentiles(&durations);

        MetricsSnapshot {
            jobs_submitted: self.jobs_submitted.load(Ordering::Relaxed),
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            jobs_crashed: self.jobs_crashed.load(Ordering::Relaxed),
            jobs_terminated: self.jobs_terminated.load(Ordering::Relaxed),
            slots_replaced: self.slots_replaced.load(Ordering::Relaxed),
            total_output_bytes: self.total_output_bytes.load(Ordering::Relaxed),
            duration_p50_ms: p50.map(|d| d.as_millis() as u64),
            duration_p95_ms: p95.map(|d| d.as_millis() as u64),
            duration_p99_ms: p99.map(|d| d.as_millis() as u64),
            sample_count: durations.len() as u64,
        }
    }
}

fn calculate_percentiles(
    durations: &[Duration],
) -> (Option<Duration>, Option<Duration>, Option<Duration>) {
    if durations.is_empty() {
        return (None, None, None);
    }

    let mut sorted = durations.to_vec();
    sorted.sort();
    let len = sorted.len();

    let p50 = sorted.get(len * 50 / 100).copied();
    let p95 = sorted.get(len * 95 / 100).copied();
    let p99 = sorted.get(len.saturating_sub(1) * 99 / 100).copied();

    (p50, p95, p99)
}

/// A point-in-time snapshot of pool metrics.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MetricsSnapshot {
    pub jobs_submitted: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub jobs_crashed: u64,
    pub jobs_terminated: u64,
    pub slots_replaced: u64,
    pub total_output_bytes: u64,
    /// P50 job run time in milliseconds.
    pub duration_p50_ms: Option<u64>,
    /// P95 job run time in milliseconds.
    pub duration_p95_ms: Option<u64>,
    /// P99 job run time in milliseconds.
    pub duration_p99_ms: Option<u64>,
    /// Number of duration samples collected.
    pub sample_count: u64,
}
