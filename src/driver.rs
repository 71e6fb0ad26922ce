//! The interception driver: times a coroutine without changing its behavior.
//!
//! [`time_coroutine`] takes a [`CoroutineFactory`] and returns a drop-in
//! replacement with the same calling convention. Each invocation of the
//! replacement constructs the underlying coroutine inside a timed scope and
//! returns a [`TimedCoroutine`] that relays every protocol message unchanged,
//! toggling its [`Timer`] exactly at the running/suspended boundaries:
//!
//! - the timer stops *before* a suspension value is handed to the scheduler,
//!   so scheduler wait time is never attributed to the coroutine;
//! - the timer starts *before* a resume value or injected error is forwarded
//!   into the coroutine, so its handling time is attributed.
//!
//! The timer is running exactly while a call into the coroutine's code is on
//! the stack: construction, each resume, each injection. Completion or
//! failure finalizes the timer exactly once; a panic escaping the coroutine
//! finalizes it on the way out through the run scope.
//!
//! Factories that declare [`SUSPENDABLE`](CoroutineFactory::SUSPENDABLE) as
//! `false` are returned unwrapped with a single warning: no timer, no stats.

use crate::config::{IdentifierScope, TimingConfig};
use crate::factory::CoroutineFactory;
use crate::name::{derive_identifier, CoroutinePath, Receiver};
use crate::suspend::{Step, Suspendable};
use crate::timer::Timer;
use std::sync::{Arc, OnceLock};

/// Wraps a coroutine factory so each invocation's active time is measured
/// and reported.
///
/// The applicability check happens here, once, at wrap time. Ineligible
/// factories come back as [`Timed::Passthrough`] holding the original value.
pub fn time_coroutine<F: CoroutineFactory>(
    factory: F,
    path: CoroutinePath,
    config: TimingConfig,
) -> Timed<F> {
    if !F::SUSPENDABLE {
        tracing::warn!(
            module = path.module(),
            function = path.function(),
            "factory cannot suspend and will not be timed"
        );
        return Timed::Passthrough(factory);
    }
    Timed::Instrumented(TimedFactory {
        inner: factory,
        path,
        receiver: Receiver::None,
        identifier: OnceLock::new(),
        config,
    })
}

/// The replacement factory produced by [`time_coroutine`].
#[derive(Debug)]
pub enum Timed<F: CoroutineFactory> {
    /// The factory is wrapped; every invocation is timed and reported.
    Instrumented(TimedFactory<F>),
    /// The factory cannot suspend; invocations go straight through.
    Passthrough(F),
}

impl<F: CoroutineFactory> Timed<F> {
    /// Sets the receiver naming hook.
    ///
    /// No effect on a pass-through factory, which never derives an
    /// identifier.
    #[must_use]
    pub fn with_receiver(mut self, receiver: Receiver<F::Args>) -> Self {
        if let Self::Instrumented(factory) = &mut self {
            factory.receiver = receiver;
        }
        self
    }

    /// Returns true if the factory was declined at wrap time.
    #[must_use]
    pub const fn is_passthrough(&self) -> bool {
        matches!(self, Self::Passthrough(_))
    }

    /// Returns the original factory.
    pub fn into_inner(self) -> F {
        match self {
            Self::Instrumented(factory) => factory.inner,
            Self::Passthrough(factory) => factory,
        }
    }
}

impl<F: CoroutineFactory> CoroutineFactory for Timed<F> {
    type Args = F::Args;
    type Coroutine = MaybeTimed<F::Coroutine>;

    fn call(&self, args: F::Args) -> MaybeTimed<F::Coroutine> {
        match self {
            Self::Instrumented(factory) => MaybeTimed::Timed(factory.call(args)),
            Self::Passthrough(factory) => MaybeTimed::Direct(factory.call(args)),
        }
    }
}

/// An instrumented factory: owns the original plus naming and timing state.
///
/// The cached identifier is the one deliberate piece of cross-invocation
/// shared state: under [`IdentifierScope::Aggregate`] it is written once, by
/// whichever invocation comes first, and read by all others.
pub struct TimedFactory<F: CoroutineFactory> {
    inner: F,
    path: CoroutinePath,
    receiver: Receiver<F::Args>,
    identifier: OnceLock<Arc<str>>,
    config: TimingConfig,
}

impl<F: CoroutineFactory> TimedFactory<F> {
    /// Returns the path this factory derives identifiers from.
    #[must_use]
    pub const fn path(&self) -> &CoroutinePath {
        &self.path
    }

    /// Returns the cached identifier, if an invocation has derived one.
    #[must_use]
    pub fn cached_identifier(&self) -> Option<&str> {
        self.identifier.get().map(AsRef::as_ref)
    }

    fn identifier_for(&self, args: &F::Args) -> Arc<str> {
        match self.config.scope {
            IdentifierScope::Aggregate => self
                .identifier
                .get_or_init(|| self.derive(args))
                .clone(),
            IdentifierScope::PerInvocation => self.derive(args),
        }
    }

    fn derive(&self, args: &F::Args) -> Arc<str> {
        let receiver = self.receiver.name(args);
        Arc::from(derive_identifier(&self.path, receiver.as_deref()))
    }
}

impl<F: CoroutineFactory> CoroutineFactory for TimedFactory<F> {
    type Args = F::Args;
    type Coroutine = TimedCoroutine<F::Coroutine>;

    fn call(&self, args: F::Args) -> TimedCoroutine<F::Coroutine> {
        let identifier = self.identifier_for(&args);
        tracing::trace!(identifier = %identifier, "constructing coroutine");
        let mut timer = Timer::new(
            identifier,
            self.config.tags.clone(),
            self.config.clock.clone(),
            self.config.sink.clone(),
        );
        // Construction may run user code and is timed like a resume.
        let inner = timer.run(|| self.inner.call(args));
        TimedCoroutine {
            inner,
            timer,
            state: DriverState::NotStarted,
        }
    }
}

impl<F: CoroutineFactory> std::fmt::Debug for TimedFactory<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimedFactory")
            .field("path", &self.path)
            .field("receiver", &self.receiver)
            .field("identifier", &self.identifier)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Where one driver instance stands in the coroutine's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Constructed, not yet resumed.
    NotStarted,
    /// A call into the coroutine's code is on the stack.
    Running,
    /// Waiting for the scheduler to resume or inject.
    Suspended,
    /// Terminal step observed; finalize in progress.
    Finalizing,
    /// Terminated and reported. Driving again is an invariant violation.
    Done,
}

/// One invocation's driver: exclusively owns the coroutine and its timer.
#[derive(Debug)]
pub struct TimedCoroutine<C: Suspendable> {
    inner: C,
    timer: Timer,
    state: DriverState,
}

impl<C: Suspendable> TimedCoroutine<C> {
    /// Returns the driver's current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> DriverState {
        self.state
    }

    /// Returns the timer, for inspecting accumulated runtime.
    #[must_use]
    pub const fn timer(&self) -> &Timer {
        &self.timer
    }

    fn enter(&mut self, operation: &str) {
        match self.state {
            DriverState::NotStarted | DriverState::Suspended => {}
            DriverState::Running | DriverState::Finalizing => panic!(
                "driver for {:?} re-entered during {operation}; state machine desynchronized",
                self.timer.identifier()
            ),
            DriverState::Done => panic!(
                "driver for {:?} received {operation} after completion",
                self.timer.identifier()
            ),
        }
        self.state = DriverState::Running;
    }

    fn settle(
        &mut self,
        step: Result<Step<C::Yield, C::Output>, C::Error>,
    ) -> Result<Step<C::Yield, C::Output>, C::Error> {
        match &step {
            Ok(Step::Suspended(_)) => {
                tracing::trace!(
                    identifier = %self.timer.identifier(),
                    runtime_s = self.timer.accumulated_runtime().as_secs_f64(),
                    "coroutine suspended"
                );
                self.state = DriverState::Suspended;
            }
            Ok(Step::Completed(_)) => {
                tracing::trace!(
                    identifier = %self.timer.identifier(),
                    runtime_s = self.timer.accumulated_runtime().as_secs_f64(),
                    "coroutine completed"
                );
                self.state = DriverState::Finalizing;
                self.timer.finalize();
                self.state = DriverState::Done;
            }
            Err(_) => {
                tracing::trace!(
                    identifier = %self.timer.identifier(),
                    runtime_s = self.timer.accumulated_runtime().as_secs_f64(),
                    "coroutine failed"
                );
                self.state = DriverState::Finalizing;
                self.timer.finalize();
                self.state = DriverState::Done;
            }
        }
        step
    }
}

impl<C: Suspendable> Suspendable for TimedCoroutine<C> {
    type Yield = C::Yield;
    type Resume = C::Resume;
    type Output = C::Output;
    type Error = C::Error;

    fn resume(&mut self, value: C::Resume) -> Result<Step<C::Yield, C::Output>, C::Error> {
        self.enter("resume");
        tracing::trace!(identifier = %self.timer.identifier(), "resuming coroutine");
        let step = {
            let _scope = self.timer.scoped();
            self.inner.resume(value)
        };
        self.settle(step)
    }

    fn inject(&mut self, error: C::Error) -> Result<Step<C::Yield, C::Output>, C::Error> {
        self.enter("inject");
        tracing::trace!(identifier = %self.timer.identifier(), "injecting error into coroutine");
        let step = {
            let _scope = self.timer.scoped();
            self.inner.inject(error)
        };
        self.settle(step)
    }
}

/// The coroutine type produced by a [`Timed`] factory.
///
/// Keeps the replacement factory's calling convention identical to the
/// original's: instrumented invocations drive through the timing relay,
/// pass-through invocations drive the coroutine directly.
#[derive(Debug)]
pub enum MaybeTimed<C: Suspendable> {
    /// Driven through the timing relay.
    Timed(TimedCoroutine<C>),
    /// Driven directly, untimed.
    Direct(C),
}

impl<C: Suspendable> Suspendable for MaybeTimed<C> {
    type Yield = C::Yield;
    type Resume = C::Resume;
    type Output = C::Output;
    type Error = C::Error;

    fn resume(&mut self, value: C::Resume) -> Result<Step<C::Yield, C::Output>, C::Error> {
        match self {
            Self::Timed(coroutine) => coroutine.resume(value),
            Self::Direct(coroutine) => coroutine.resume(value),
        }
    }

    fn inject(&mut self, error: C::Error) -> Result<Step<C::Yield, C::Output>, C::Error> {
        match self {
            Self::Timed(coroutine) => coroutine.inject(error),
            Self::Direct(coroutine) => coroutine.inject(error),
        }
    }
}
