//! Coroutime: active-time instrumentation for cooperatively suspendable coroutines.
//!
//! # Overview
//!
//! Coroutime measures how long a coroutine actually *runs* — excluding every
//! moment it spends suspended waiting on its scheduler — without changing the
//! coroutine's observable behavior. The core is an interception driver that
//! sits between a coroutine and whatever drives it, relays every protocol
//! message unchanged, and toggles a stopwatch exactly at the boundaries
//! between running and suspended.
//!
//! # Core Guarantees
//!
//! - **Transparent relay**: the scheduler observes the same suspensions,
//!   results, and errors it would observe driving the coroutine directly
//! - **Exact attribution**: the timer runs precisely while a call into the
//!   coroutine's code is on the stack — construction, each resume, each
//!   error injection — and at no other time
//! - **One report per invocation**: the accumulated runtime reaches the
//!   stats sink exactly once, on completion, failure, or escaping panic
//! - **Fail-loud invariants**: a desynchronized driver panics instead of
//!   silently corrupting reported timings
//! - **Deterministic testing**: timers read an injected time source, so every
//!   timing property is testable exactly on a virtual clock
//!
//! # Module Structure
//!
//! - [`clock`]: nanosecond time values and the wall/virtual time sources
//! - [`suspend`]: the coroutine protocol (`Step`, `Suspendable`)
//! - [`factory`]: coroutine factories and the wrap-time capability check
//! - [`name`]: dotted identifier derivation and the receiver naming hook
//! - [`stats`]: the injected stats sink and its stock implementations
//! - [`timer`]: the accumulating stopwatch with scoped-run guard
//! - [`config`]: wrap-time options, collaborators, environment loading
//! - [`driver`]: the interception driver itself
//! - [`test_utils`]: logging init, test macros, scripted coroutines
//!
//! # Example
//!
//! ```
//! use coroutime::clock::VirtualClock;
//! use coroutime::config::TimingConfig;
//! use coroutime::coroutine_path;
//! use coroutime::driver::time_coroutine;
//! use coroutime::factory::{from_fn, CoroutineFactory};
//! use coroutime::stats::RecordingSink;
//! use coroutime::suspend::{Step, Suspendable};
//! use coroutime::test_utils::{ScriptedCoroutine, ScriptedStep};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let clock = Arc::new(VirtualClock::new());
//! let sink = RecordingSink::new();
//! let factory_clock = clock.clone();
//!
//! let timed = time_coroutine(
//!     from_fn(move |(): ()| {
//!         ScriptedCoroutine::new(
//!             factory_clock.clone(),
//!             vec![
//!                 ScriptedStep::suspend(Duration::from_millis(500), 1),
//!                 ScriptedStep::complete(Duration::from_millis(500), 0),
//!             ],
//!         )
//!     }),
//!     coroutine_path!("sleeper"),
//!     TimingConfig::new().with_clock(clock.clone()).with_sink(sink.clone()),
//! );
//!
//! let mut coroutine = timed.call(());
//! assert_eq!(coroutine.resume(0), Ok(Step::Suspended(1)));
//! clock.advance(Duration::from_millis(500)); // suspended delay, not attributed
//! assert_eq!(coroutine.resume(0), Ok(Step::Completed(0)));
//!
//! let records = sink.records();
//! assert_eq!(records[0].runtime, Duration::from_secs(1));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::module_name_repetitions)]

pub mod clock;
pub mod config;
pub mod driver;
pub mod factory;
pub mod name;
pub mod stats;
pub mod suspend;
pub mod test_utils;
pub mod timer;

// Re-exports for convenient access to core types
pub use clock::{Time, TimeSource, VirtualClock, WallClock};
pub use config::{ConfigError, IdentifierScope, TimingConfig};
pub use driver::{time_coroutine, DriverState, MaybeTimed, Timed, TimedCoroutine, TimedFactory};
pub use factory::{from_fn, from_immediate, CoroutineFactory, FnFactory, Immediate, ImmediateFn};
pub use name::{derive_identifier, CoroutinePath, Receiver};
pub use stats::{LogSink, NoOpSink, RecordingSink, StatsRecord, StatsSink};
pub use suspend::{Step, Suspendable};
pub use timer::{RunScope, Timer};
