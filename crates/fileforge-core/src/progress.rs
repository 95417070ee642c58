//! Progress reporting for conversion pipelines.
//!
//! Adapters receive a [`ProgressReporter`] and call [`ProgressReporter::report`]
//! with values on their own `0..=100` scale. Multi-phase adapters derive
//! child reporters with [`ProgressReporter::scaled`] so each phase maps into
//! its slice of the parent range. All reporters derived from one root share
//! a high-water mark: values are clamped to `0..=100`, and values that do
//! not advance past the mark are dropped.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Callback receiving progress values in `0..=100`.
pub type ProgressFn = Arc<dyn Fn(f64) + Send + Sync>;

/// Monotonic, range-mapped progress sink.
#[derive(Clone)]
pub struct ProgressReporter {
    sink: Option<ProgressFn>,
    /// Highest value forwarded so far, stored as `f64` bits.
    high_water: Arc<AtomicU64>,
    offset: f64,
    scale: f64,
}

impl ProgressReporter {
    /// Reporter forwarding to `sink`.
    pub fn new(sink: ProgressFn) -> Self {
        Self::from_option(Some(sink))
    }

    /// Reporter forwarding to `sink` when present.
    pub fn from_option(sink: Option<ProgressFn>) -> Self {
        Self {
            sink,
            high_water: Arc::new(AtomicU64::new(f64::NEG_INFINITY.to_bits())),
            offset: 0.0,
            scale: 1.0,
        }
    }

    /// Reporter that discards every value.
    pub fn silent() -> Self {
        Self::from_option(None)
    }

    /// Child reporter mapping its `0..=100` onto `offset + value * scale`
    /// of this reporter's range.
    pub fn scaled(&self, offset: f64, scale: f64) -> Self {
        Self {
            sink: self.sink.clone(),
            high_water: Arc::clone(&self.high_water),
            offset: self.offset + offset * self.scale,
            scale: self.scale * scale,
        }
    }

    /// Report a value on this reporter's local scale. Only values above
    /// everything reported so far reach the sink.
    pub fn report(&self, value: f64) {
        let Some(sink) = &self.sink else {
            return;
        };
        if !value.is_finite() {
            return;
        }
        let mapped = (self.offset + value * self.scale).clamp(0.0, 100.0);

        let advanced = self
            .high_water
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                (mapped > f64::from_bits(bits)).then_some(mapped.to_bits())
            })
            .is_ok();

        if advanced {
            sink(mapped);
        }
    }

    /// Report the end of the pipeline.
    pub fn finish(&self) {
        self.report(100.0);
    }

    /// Highest value forwarded so far, if any.
    pub fn current(&self) -> Option<f64> {
        let value = f64::from_bits(self.high_water.load(Ordering::Acquire));
        value.is_finite().then_some(value)
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("offset", &self.offset)
            .field("scale", &self.scale)
            .field("current", &self.current())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording() -> (ProgressReporter, Arc<Mutex<Vec<f64>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reporter = ProgressReporter::new(Arc::new(move |p| {
            sink.lock().expect("lock").push(p);
        }));
        (reporter, seen)
    }

    #[test]
    fn test_values_clamped_and_monotonic() {
        let (reporter, seen) = recording();
        reporter.report(-5.0);
        reporter.report(40.0);
        reporter.report(30.0);
        reporter.report(40.0);
        reporter.report(f64::NAN);
        reporter.report(250.0);
        assert_eq!(*seen.lock().expect("lock"), vec![0.0, 40.0, 100.0]);
    }

    #[test]
    fn test_scaled_children_share_high_water() {
        let (reporter, seen) = recording();
        let extract = reporter.scaled(0.0, 0.8);
        let repack = reporter.scaled(80.0, 0.2);
        extract.report(50.0);
        extract.report(100.0);
        repack.report(50.0);
        repack.finish();
        assert_eq!(*seen.lock().expect("lock"), vec![40.0, 80.0, 90.0, 100.0]);
    }

    #[test]
    fn test_nested_scaling() {
        let (reporter, seen) = recording();
        let child = reporter.scaled(50.0, 0.5).scaled(50.0, 0.5);
        child.report(0.0);
        child.report(100.0);
        assert_eq!(*seen.lock().expect("lock"), vec![75.0, 100.0]);
    }

    #[test]
    fn test_silent_reporter() {
        let reporter = ProgressReporter::silent();
        reporter.report(50.0);
        assert_eq!(reporter.current(), None);
    }
}
