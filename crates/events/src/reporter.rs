//! Monotonic progress reporting for a single build

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use crate::{EventEmitter, EventSender};

/// Caller supplied progress callback: `(ratio, status)`.
pub type ProgressSink = Arc<dyn Fn(f32, &str) + Send + Sync>;

/// Forwards progress to the caller's sink and the event channel.
///
/// Values are clamped to `[0, 1]` and never go below the highest value
/// already reported, so overlapping stage windows cannot make the bar move
/// backwards. A panicking sink is logged and ignored.
pub struct ProgressReporter {
    build_id: Uuid,
    sink: Option<ProgressSink>,
    events: Option<EventSender>,
    last: AtomicU32,
}

impl ProgressReporter {
    #[must_use]
    pub fn new(build_id: Uuid) -> Self {
        Self {
            build_id,
            sink: None,
            events: None,
            last: AtomicU32::new(0f32.to_bits()),
        }
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Option<ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    #[must_use]
    pub fn with_events(mut self, events: Option<EventSender>) -> Self {
        self.events = events;
        self
    }

    /// Highest value reported so far
    #[must_use]
    pub fn last(&self) -> f32 {
        f32::from_bits(self.last.load(Ordering::Acquire))
    }

    /// Report progress and return the value actually delivered.
    pub fn report(&self, ratio: f32, status: &str) -> f32 {
        let requested = if ratio.is_nan() { 0.0 } else { ratio.clamp(0.0, 1.0) };
        let value = requested.max(self.last());
        self.last.store(value.to_bits(), Ordering::Release);

        if let Some(sink) = &self.sink {
            let outcome = catch_unwind(AssertUnwindSafe(|| sink(value, status)));
            if outcome.is_err() {
                warn!(build_id = %self.build_id, status, "progress sink panicked");
            }
        }
        self.events.emit_progress(self.build_id, value, status);
        value
    }

    /// Report the position of item `index` out of `count` inside `[start, end]`.
    pub fn report_within(&self, start: f32, end: f32, index: usize, count: usize, status: &str) -> f32 {
        self.report(interpolate(start, end, index, count), status)
    }
}

/// Evenly spread `index / count` across `[start, end]`. Zero items maps to `start`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn interpolate(start: f32, end: f32, index: usize, count: usize) -> f32 {
    if count == 0 {
        return start;
    }
    let fraction = index.min(count) as f32 / count as f32;
    start + (end - start) * fraction
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("build_id", &self.build_id)
            .field("last", &self.last())
            .field("has_sink", &self.sink.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording() -> (ProgressSink, Arc<Mutex<Vec<f32>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let clone = Arc::clone(&seen);
        let sink: ProgressSink = Arc::new(move |value: f32, _status: &str| {
            clone.lock().unwrap().push(value);
        });
        (sink, seen)
    }

    #[test]
    fn values_never_decrease() {
        let (sink, seen) = recording();
        let reporter = ProgressReporter::new(Uuid::new_v4()).with_sink(Some(sink));
        reporter.report(0.4, "compiling");
        reporter.report(0.2, "processing");
        reporter.report(1.5, "done");
        assert_eq!(*seen.lock().unwrap(), vec![0.4, 0.4, 1.0]);
    }

    #[test]
    fn nan_does_not_poison_progress() {
        let reporter = ProgressReporter::new(Uuid::new_v4());
        reporter.report(0.3, "a");
        assert!((reporter.report(f32::NAN, "b") - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn panicking_sink_is_contained() {
        let sink: ProgressSink = Arc::new(|_: f32, _: &str| panic!("ui went away"));
        let reporter = ProgressReporter::new(Uuid::new_v4()).with_sink(Some(sink));
        assert!((reporter.report(0.5, "x") - 0.5).abs() < f32::EPSILON);
        assert!((reporter.last() - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn interpolation_spreads_evenly() {
        assert!((interpolate(0.2, 0.7, 0, 2) - 0.2).abs() < 1e-6);
        assert!((interpolate(0.2, 0.7, 1, 2) - 0.45).abs() < 1e-6);
        assert!((interpolate(0.2, 0.7, 2, 2) - 0.7).abs() < 1e-6);
        assert!((interpolate(0.2, 0.7, 5, 0) - 0.2).abs() < 1e-6);
    }
}
