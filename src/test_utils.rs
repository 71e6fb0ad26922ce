//! Test utilities for Coroutime.
//!
//! This module provides shared helpers for unit and integration tests:
//! - Consistent tracing-based logging initialization
//! - Phase/section macros for readable test output
//! - A scripted coroutine that simulates busy work on a virtual clock
//!
//! # Example
//! ```
//! use coroutime::clock::VirtualClock;
//! use coroutime::suspend::{Step, Suspendable};
//! use coroutime::test_utils::{init_test_logging, ScriptedCoroutine, ScriptedStep};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! init_test_logging();
//! let clock = Arc::new(VirtualClock::new());
//! let mut coroutine = ScriptedCoroutine::new(
//!     clock.clone(),
//!     vec![ScriptedStep::complete(Duration::from_millis(5), 42)],
//! );
//! assert_eq!(coroutine.resume(0), Ok(Step::Completed(42)));
//! ```

use crate::clock::VirtualClock;
use crate::suspend::{Step, Suspendable};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tracing_subscriber::fmt::format::FmtSpan;

static INIT_LOGGING: Once = Once::new();
static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Initialize test logging with trace-level output.
///
/// Safe to call multiple times; only initializes once.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom level.
///
/// The first call wins; later calls are no-ops.
pub fn init_test_logging_with_level(level: tracing::Level) {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .try_init();
    });
}

/// Acquire the global environment lock for tests that mutate env vars.
pub fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Log a test phase transition with a visual separator.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = %$name, "========================================");
        tracing::info!(phase = %$name, "TEST PHASE: {}", $name);
        tracing::info!(phase = %$name, "========================================");
    };
}

/// Log a section within a test phase.
#[macro_export]
macro_rules! test_section {
    ($name:expr) => {
        tracing::debug!(section = %$name, "--- {} ---", $name);
    };
}

/// Log test completion with summary.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = %$name, "test completed successfully: {}", $name);
    };
    ($name:expr, $($key:ident = $value:expr),* $(,)?) => {
        tracing::info!(
            test = %$name,
            $($key = %$value,)*
            "test completed successfully: {}",
            $name
        );
    };
}

/// Log before assertions for context.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        tracing::debug!(
            expected = ?$expected,
            actual = ?$actual,
            "Asserting: {}",
            $msg
        );
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}

/// A protocol message received by a [`ScriptedCoroutine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// A value delivered through `resume`.
    Resumed(u32),
    /// An error delivered through `inject`.
    Injected(String),
}

/// One scripted reaction: busy work on the virtual clock, then an outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedStep {
    /// Advance the clock by `busy`, then suspend with `value`.
    Suspend {
        /// Simulated active time for this step.
        busy: Duration,
        /// The suspension value handed to the scheduler.
        value: u32,
    },
    /// Advance the clock by `busy`, then complete with `result`.
    Complete {
        /// Simulated active time for this step.
        busy: Duration,
        /// The final result.
        result: u32,
    },
    /// Advance the clock by `busy`, then fail with `error`.
    Fail {
        /// Simulated active time for this step.
        busy: Duration,
        /// The error to surface.
        error: String,
    },
}

impl ScriptedStep {
    /// A step that works for `busy`, then suspends with `value`.
    #[must_use]
    pub const fn suspend(busy: Duration, value: u32) -> Self {
        Self::Suspend { busy, value }
    }

    /// A step that works for `busy`, then completes with `result`.
    #[must_use]
    pub const fn complete(busy: Duration, result: u32) -> Self {
        Self::Complete { busy, result }
    }

    /// A step that works for `busy`, then fails with `error`.
    #[must_use]
    pub fn fail(busy: Duration, error: impl Into<String>) -> Self {
        Self::Fail {
            busy,
            error: error.into(),
        }
    }

    /// Returns this step's busy duration.
    #[must_use]
    pub const fn busy(&self) -> Duration {
        match self {
            Self::Suspend { busy, .. } | Self::Complete { busy, .. } | Self::Fail { busy, .. } => {
                *busy
            }
        }
    }
}

/// A deterministic [`Suspendable`] driven by a script.
///
/// Every `resume` or `inject` pops the next step, advances the shared
/// [`VirtualClock`] by the step's busy duration (simulating the coroutine's
/// own work), and produces the scripted outcome. Every message received is
/// recorded, so tests can assert that the driver relays values and errors
/// unchanged.
///
/// Driving past the end of the script panics, the same way a real coroutine
/// must not be driven after completion.
#[derive(Debug)]
pub struct ScriptedCoroutine {
    script: VecDeque<ScriptedStep>,
    clock: Arc<VirtualClock>,
    messages: Arc<parking_lot::Mutex<Vec<Message>>>,
}

impl ScriptedCoroutine {
    /// Creates a scripted coroutine whose construction takes no time.
    #[must_use]
    pub fn new(clock: Arc<VirtualClock>, script: Vec<ScriptedStep>) -> Self {
        Self {
            script: script.into(),
            clock,
            messages: Arc::new(parking_lot::Mutex::new(Vec::new())),
        }
    }

    /// Creates a scripted coroutine whose construction advances the clock.
    ///
    /// Models user code running inside the coroutine's constructor, which the
    /// driver must attribute to the coroutine.
    #[must_use]
    pub fn with_construction_busy(
        clock: Arc<VirtualClock>,
        busy: Duration,
        script: Vec<ScriptedStep>,
    ) -> Self {
        clock.advance(busy);
        Self::new(clock, script)
    }

    /// Returns a handle to the recorded messages.
    ///
    /// Clone this before the coroutine moves into a driver; the log remains
    /// readable afterwards.
    #[must_use]
    pub fn messages(&self) -> Arc<parking_lot::Mutex<Vec<Message>>> {
        self.messages.clone()
    }

    /// Total busy time remaining in the script.
    #[must_use]
    pub fn remaining_busy(&self) -> Duration {
        self.script.iter().map(ScriptedStep::busy).sum()
    }

    fn step(&mut self) -> Result<Step<u32, u32>, String> {
        let Some(step) = self.script.pop_front() else {
            panic!("scripted coroutine driven after its script ended");
        };
        self.clock.advance(step.busy());
        match step {
            ScriptedStep::Suspend { value, .. } => Ok(Step::Suspended(value)),
            ScriptedStep::Complete { result, .. } => Ok(Step::Completed(result)),
            ScriptedStep::Fail { error, .. } => Err(error),
        }
    }
}

impl Suspendable for ScriptedCoroutine {
    type Yield = u32;
    type Resume = u32;
    type Output = u32;
    type Error = String;

    fn resume(&mut self, value: u32) -> Result<Step<u32, u32>, String> {
        self.messages.lock().push(Message::Resumed(value));
        self.step()
    }

    fn inject(&mut self, error: String) -> Result<Step<u32, u32>, String> {
        self.messages.lock().push(Message::Injected(error));
        self.step()
    }
}
