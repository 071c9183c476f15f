use crate::error::{Result, ToolError};

/// Receiver for progress updates and source of cancellation requests.
///
/// All long-running operations take a `ProgressSink`. Implementations must be cheap to call:
/// operations poll `cancel_requested` at least once per percent of work and report progress with
/// the same granularity.
pub trait ProgressSink: Sync {
    /// Reports that the operation labelled `label` has completed `percent` of its work
    fn update_progress(&self, label: &str, percent: i32);
    /// Returns true if the caller wants the operation to stop
    fn cancel_requested(&self) -> bool;
}

/// A `ProgressSink` that discards all updates and never requests cancellation
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn update_progress(&self, _label: &str, _percent: i32) {}

    fn cancel_requested(&self) -> bool {
        false
    }
}

/// Helper that turns raw loop counters into percent-granular progress reports.
///
/// Forwards to the underlying sink only when the integer percentage actually changes, and folds
/// the cancellation poll into the same call so loops need a single line per iteration.
///
/// # Example
/// ```
/// use terrane_core::progress::{ProgressTicker, SilentProgress};
///
/// let sink = SilentProgress;
/// let mut ticker = ProgressTicker::new(&sink, "resampling", 1000);
/// for i in 0..1000 {
///     ticker.tick(i).unwrap();
/// }
/// ```
pub struct ProgressTicker<'a> {
    sink: &'a dyn ProgressSink,
    label: &'a str,
    total: usize,
    last_percent: i32,
}

impl<'a> ProgressTicker<'a> {
    /// Creates a ticker for an operation of `total` steps. A `total` of zero reports nothing.
    pub fn new(sink: &'a dyn ProgressSink, label: &'a str, total: usize) -> Self {
        Self {
            sink,
            label,
            total,
            last_percent: -1,
        }
    }

    /// Records that step `current` of the operation has completed. Returns
    /// `Err(ToolError::Cancelled)` if the sink requested cancellation.
    pub fn tick(&mut self, current: usize) -> Result<()> {
        if self.sink.cancel_requested() {
            return Err(ToolError::Cancelled);
        }
        if self.total == 0 {
            return Ok(());
        }
        let percent = ((current + 1) as f64 / self.total as f64 * 100.0) as i32;
        if percent != self.last_percent {
            self.last_percent = percent;
            self.sink.update_progress(self.label, percent);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct CountingSink {
        updates: AtomicUsize,
        cancel: AtomicBool,
    }

    impl ProgressSink for CountingSink {
        fn update_progress(&self, _label: &str, _percent: i32) {
            self.updates.fetch_add(1, Ordering::Relaxed);
        }

        fn cancel_requested(&self) -> bool {
            self.cancel.load(Ordering::Relaxed)
        }
    }

    #[test]
    fn reports_once_per_percent() {
        let sink = CountingSink {
            updates: AtomicUsize::new(0),
            cancel: AtomicBool::new(false),
        };
        let mut ticker = ProgressTicker::new(&sink, "test", 10_000);
        for i in 0..10_000 {
            ticker.tick(i).unwrap();
        }
        // percents 0 through 100 inclusive
        assert_eq!(sink.updates.load(Ordering::Relaxed), 101);
    }

    #[test]
    fn surfaces_cancellation() {
        let sink = CountingSink {
            updates: AtomicUsize::new(0),
            cancel: AtomicBool::new(true),
        };
        let mut ticker = ProgressTicker::new(&sink, "test", 10);
        assert_eq!(ticker.tick(0), Err(ToolError::Cancelled));
    }
}
