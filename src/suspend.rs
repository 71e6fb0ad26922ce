//! The coroutine protocol: suspend, resume, inject.
//!
//! A [`Suspendable`] is a computation driven step-by-step by a scheduler.
//! Each step either suspends (handing the scheduler a value describing what
//! the coroutine is waiting on), completes with a final result, or fails.
//! Steps are tagged variants, not control-flow exceptions: both protocol
//! operations return `Result<Step<_, _>, Error>`, where `Err` is the terminal
//! failure arm.
//!
//! The scheduler resumes a suspended coroutine with [`resume`] or delivers an
//! error into it with [`inject`] — the error surfaces inside the coroutine at
//! its suspension point, and the coroutine may recover, transform, re-raise,
//! or complete anyway. Cancellation is expressed as an injected error.
//!
//! [`resume`]: Suspendable::resume
//! [`inject`]: Suspendable::inject

/// One step of a suspendable computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<Y, R> {
    /// The coroutine paused and yields `Y` to the scheduler, describing what
    /// it is waiting on.
    Suspended(Y),
    /// The coroutine finished with result `R`. It must not be driven again.
    Completed(R),
}

impl<Y, R> Step<Y, R> {
    /// Returns true if this step is a suspension request.
    #[must_use]
    pub const fn is_suspended(&self) -> bool {
        matches!(self, Self::Suspended(_))
    }

    /// Returns true if this step is a completion.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Returns the suspension value, if any.
    pub fn suspended(self) -> Option<Y> {
        match self {
            Self::Suspended(y) => Some(y),
            Self::Completed(_) => None,
        }
    }

    /// Returns the completion result, if any.
    pub fn completed(self) -> Option<R> {
        match self {
            Self::Suspended(_) => None,
            Self::Completed(r) => Some(r),
        }
    }

    /// Maps the suspension value.
    pub fn map_suspended<Y2, F: FnOnce(Y) -> Y2>(self, f: F) -> Step<Y2, R> {
        match self {
            Self::Suspended(y) => Step::Suspended(f(y)),
            Self::Completed(r) => Step::Completed(r),
        }
    }

    /// Maps the completion result.
    pub fn map_completed<R2, F: FnOnce(R) -> R2>(self, f: F) -> Step<Y, R2> {
        match self {
            Self::Suspended(y) => Step::Suspended(y),
            Self::Completed(r) => Step::Completed(f(r)),
        }
    }
}

/// A computation that can suspend mid-execution and later be resumed.
///
/// Both operations take `&mut self`: one coroutine has exactly one logical
/// driver at a time, and the borrow checker makes concurrent driving of a
/// single instance unrepresentable.
///
/// # Contract
///
/// - After `Ok(Step::Completed(_))` or `Err(_)`, the coroutine is terminal
///   and must not be driven again. Implementations should fail fast (panic)
///   if they are.
/// - `inject` delivers the error at the suspension point; the coroutine
///   decides what happens next. Returning `Err(e)` with the same error is the
///   "re-raise" case; returning a new `Ok` step is recovery.
pub trait Suspendable {
    /// The suspension request handed to the scheduler.
    type Yield;
    /// The value the scheduler sends back in on resume.
    type Resume;
    /// The final result of the computation.
    type Output;
    /// The error domain, used both for failures and for injection.
    type Error;

    /// Runs the coroutine until its next suspension, completion, or failure,
    /// delivering `value` at the current suspension point.
    fn resume(&mut self, value: Self::Resume)
        -> Result<Step<Self::Yield, Self::Output>, Self::Error>;

    /// Delivers `error` at the current suspension point, as if raised there,
    /// then runs the coroutine until its next suspension, completion, or
    /// failure.
    fn inject(&mut self, error: Self::Error)
        -> Result<Step<Self::Yield, Self::Output>, Self::Error>;
}
