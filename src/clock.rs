//! Monotonic timing primitive for measurement windows

use tokio::time::Instant;

/// Opaque point in time produced by [`SampleClock::mark`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Mark(Instant);

/// Wall-clock independent stopwatch.
///
/// Backed by `tokio::time::Instant`, so elapsed values are monotonic and
/// follow the tokio clock when it is paused in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleClock;

impl SampleClock {
    pub fn new() -> Self {
        Self
    }

    pub fn mark(&self) -> Mark {
        Mark(Instant::now())
    }

    /// Seconds elapsed since `mark`
    pub fn elapsed(&self, mark: &Mark) -> f64 {
        mark.0.elapsed().as_secs_f64()
    }

    /// Milliseconds elapsed since `mark`
    pub fn elapsed_ms(&self, mark: &Mark) -> f64 {
        self.elapsed(mark) * 1000.0
    }
}
