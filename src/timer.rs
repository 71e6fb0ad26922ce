//! The stopwatch that accumulates a coroutine's active time.
//!
//! A [`Timer`] is created once per coroutine invocation, started and stopped
//! by the driver around every call into the coroutine's code, and finalized
//! exactly once when the coroutine terminates. Accumulated runtime is the sum
//! of all run intervals; time between a stop and the next start is never
//! attributed.
//!
//! All state-machine violations (double start, stop without start, double
//! finalize) are panics. A stray stop-without-start means the driver has
//! desynchronized from the coroutine's actual run state, and the timing data
//! is untrustworthy; silently absorbing that would corrupt reported stats
//! without any signal to operators.

use crate::clock::{Time, TimeSource};
use crate::stats::StatsSink;
use std::sync::Arc;
use std::time::Duration;

/// Accumulating stopwatch with a single-shot finalize hook.
pub struct Timer {
    identifier: Arc<str>,
    start_time: Option<Time>,
    stop_time: Option<Time>,
    accumulated_runtime: Duration,
    tags: Vec<String>,
    clock: Arc<dyn TimeSource>,
    sink: Arc<dyn StatsSink>,
    finalized: bool,
}

impl Timer {
    /// Creates a stopped timer with zero accumulated runtime.
    #[must_use]
    pub fn new(
        identifier: Arc<str>,
        tags: Vec<String>,
        clock: Arc<dyn TimeSource>,
        sink: Arc<dyn StatsSink>,
    ) -> Self {
        Self {
            identifier,
            start_time: None,
            stop_time: None,
            accumulated_runtime: Duration::ZERO,
            tags,
            clock,
            sink,
            finalized: false,
        }
    }

    /// Begins a run interval.
    ///
    /// # Panics
    ///
    /// Panics if a run interval is already open, or if the timer has been
    /// finalized.
    pub fn start(&mut self) {
        assert!(
            !self.finalized,
            "timer {:?} started after finalize",
            self.identifier
        );
        assert!(
            self.start_time.is_none(),
            "timer {:?} started while already running",
            self.identifier
        );
        self.start_time = Some(self.clock.now());
    }

    /// Ends the current run interval and adds its duration to the
    /// accumulated runtime.
    ///
    /// # Panics
    ///
    /// Panics if no run interval is open. A stop without a matching start
    /// means the driver's state machine has desynchronized from the
    /// coroutine's actual run/suspend state.
    pub fn stop(&mut self) {
        let Some(start) = self.start_time.take() else {
            panic!(
                "timer {:?} stopped without a matching start",
                self.identifier
            );
        };
        let now = self.clock.now();
        self.stop_time = Some(now);
        self.accumulated_runtime += now.duration_since(start);
    }

    /// Reports `(identifier, accumulated_runtime, tags)` to the stats sink.
    ///
    /// # Panics
    ///
    /// Panics if called twice, or while a run interval is open.
    pub fn finalize(&mut self) {
        assert!(
            !self.finalized,
            "timer {:?} finalized twice",
            self.identifier
        );
        assert!(
            self.start_time.is_none(),
            "timer {:?} finalized while running",
            self.identifier
        );
        self.finalized = true;
        self.sink
            .record(&self.identifier, self.accumulated_runtime, &self.tags);
    }

    /// Starts the timer and returns a guard that stops it when dropped.
    ///
    /// If the guard is dropped during unwinding, the timer is additionally
    /// finalized: an error escaping a scoped run means no further run/stop
    /// cycles will occur for this timer.
    pub fn scoped(&mut self) -> RunScope<'_> {
        self.start();
        RunScope { timer: self }
    }

    /// Runs `f` inside a scoped run interval.
    pub fn run<T>(&mut self, f: impl FnOnce() -> T) -> T {
        let _scope = self.scoped();
        f()
    }

    /// Returns the identifier this timer reports under.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Returns the total active time accumulated so far.
    #[must_use]
    pub fn accumulated_runtime(&self) -> Duration {
        self.accumulated_runtime
    }

    /// Returns true while a run interval is open.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.start_time.is_some()
    }

    /// Returns the instant of the most recent stop, if any.
    #[must_use]
    pub fn last_stop(&self) -> Option<Time> {
        self.stop_time
    }

    /// Returns true once the timer has reported to the sink.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}

impl std::fmt::Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timer")
            .field("identifier", &self.identifier)
            .field("start_time", &self.start_time)
            .field("stop_time", &self.stop_time)
            .field("accumulated_runtime", &self.accumulated_runtime)
            .field("tags", &self.tags)
            .field("finalized", &self.finalized)
            .finish_non_exhaustive()
    }
}

/// RAII guard for one run interval.
///
/// Created by [`Timer::scoped`]. Stops the timer on every exit path; also
/// finalizes it when dropped during unwinding.
#[derive(Debug)]
pub struct RunScope<'a> {
    timer: &'a mut Timer,
}

impl Drop for RunScope<'_> {
    fn drop(&mut self) {
        self.timer.stop();
        if std::thread::panicking() && !self.timer.finalized {
            self.timer.finalize();
        }
    }
}
