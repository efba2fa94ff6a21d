//! Invocation timing.

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Simple span timing helper.
#[derive(Debug)]
pub struct SpanTimer {
    start: Instant,
    name: String,
}

impl SpanTimer {
    /// Starts a new span timer.
    #[must_use]
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Returns the elapsed milliseconds and restarts the timer.
    pub fn lap(&mut self) -> f64 {
        let elapsed = self.elapsed_ms();
        self.start = Instant::now();
        elapsed
    }

    /// Returns the span name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Finishes the span and returns the duration.
    #[must_use]
    pub fn finish(self) -> f64 {
        self.elapsed_ms()
    }
}

/// Per-phase durations of one invocation, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InvocationTimings {
    /// Attaching the run and building the context.
    pub prepare_ms: f64,
    /// The entry-point call.
    pub call_ms: f64,
    /// Collecting outputs and detaching.
    pub outputs_ms: f64,
}

impl InvocationTimings {
    /// Sum of all phases.
    #[must_use]
    pub fn total_ms(&self) -> f64 {
        self.prepare_ms + self.call_ms + self.outputs_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_timer() {
        let timer = SpanTimer::start("call");
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert_eq!(timer.name(), "call");
        assert!(timer.finish() >= 10.0);
    }

    #[test]
    fn test_lap_restarts() {
        let mut timer = SpanTimer::start("phases");
        std::thread::sleep(std::time::Duration::from_millis(5));
        let first = timer.lap();
        assert!(first >= 5.0);
        assert!(timer.elapsed_ms() < first);
    }

    #[test]
    fn test_total() {
        let timings = InvocationTimings {
            prepare_ms: 1.0,
            call_ms: 2.5,
            outputs_ms: 0.5,
        };
        assert!((timings.total_ms() - 4.0).abs() < f64::EPSILON);
    }
}
