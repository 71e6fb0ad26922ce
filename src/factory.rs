//! Factories: the callables the timing wrapper accepts.
//!
//! A [`CoroutineFactory`] produces one fresh [`Suspendable`] per call, the
//! way calling a generator function produces one generator. The associated
//! [`SUSPENDABLE`](CoroutineFactory::SUSPENDABLE) constant is the wrap-time
//! capability check: it is a static property of the factory's definition, not
//! of any particular call, and the driver consults it exactly once when
//! wrapping.
//!
//! Two adapters cover the common cases: [`from_fn`] for closures returning a
//! genuine coroutine, and [`from_immediate`] for plain value functions that
//! were handed to the wrapper even though they can never suspend. The latter
//! declares `SUSPENDABLE = false`, which makes the driver pass it through
//! untimed.

use crate::suspend::{Step, Suspendable};
use std::marker::PhantomData;

/// Produces one coroutine per call.
pub trait CoroutineFactory {
    /// The arguments one invocation takes.
    type Args;
    /// The coroutine a call constructs.
    type Coroutine: Suspendable;

    /// Whether calls to this factory can actually suspend.
    ///
    /// Factories that compute their result eagerly and can never suspend set
    /// this to `false`; the driver then declines to wrap them.
    const SUSPENDABLE: bool = true;

    /// Constructs a fresh coroutine. May run user code.
    fn call(&self, args: Self::Args) -> Self::Coroutine;
}

/// Adapts a `Fn(Args) -> C` closure into a [`CoroutineFactory`].
pub struct FnFactory<F, Args, C> {
    f: F,
    _marker: PhantomData<fn(Args) -> C>,
}

/// Wraps a coroutine-producing closure as a factory.
pub fn from_fn<F, Args, C>(f: F) -> FnFactory<F, Args, C>
where
    F: Fn(Args) -> C,
    C: Suspendable,
{
    FnFactory {
        f,
        _marker: PhantomData,
    }
}

impl<F, Args, C> CoroutineFactory for FnFactory<F, Args, C>
where
    F: Fn(Args) -> C,
    C: Suspendable,
{
    type Args = Args;
    type Coroutine = C;

    fn call(&self, args: Args) -> C {
        (self.f)(args)
    }
}

impl<F, Args, C> std::fmt::Debug for FnFactory<F, Args, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FnFactory(..)")
    }
}

/// A coroutine that already holds its result.
///
/// Produced by [`ImmediateFn`]: the underlying plain function ran eagerly at
/// factory-call time, so the first resume completes immediately and there is
/// never a suspension.
#[derive(Debug)]
pub struct Immediate<R, E> {
    value: Option<R>,
    _marker: PhantomData<fn() -> E>,
}

impl<R, E> Immediate<R, E> {
    /// Wraps an already-computed value.
    #[must_use]
    pub fn new(value: R) -> Self {
        Self {
            value: Some(value),
            _marker: PhantomData,
        }
    }
}

impl<R, E> Suspendable for Immediate<R, E> {
    type Yield = ();
    type Resume = ();
    type Output = R;
    type Error = E;

    fn resume(&mut self, (): ()) -> Result<Step<(), R>, E> {
        match self.value.take() {
            Some(value) => Ok(Step::Completed(value)),
            None => panic!("immediate coroutine resumed after completion"),
        }
    }

    fn inject(&mut self, error: E) -> Result<Step<(), R>, E> {
        assert!(
            self.value.take().is_some(),
            "immediate coroutine injected after completion"
        );
        Err(error)
    }
}

/// Adapts a plain `Fn(Args) -> R` function into a never-suspending factory.
///
/// `SUSPENDABLE` is `false`: this is the "decorated as a coroutine, but isn't
/// really a coroutine" case, and the driver passes such factories through
/// unwrapped with a warning.
pub struct ImmediateFn<F, Args, R, E> {
    f: F,
    _marker: PhantomData<fn(Args) -> (R, E)>,
}

/// Wraps a plain value function as a never-suspending factory.
pub fn from_immediate<F, Args, R, E>(f: F) -> ImmediateFn<F, Args, R, E>
where
    F: Fn(Args) -> R,
{
    ImmediateFn {
        f,
        _marker: PhantomData,
    }
}

impl<F, Args, R, E> CoroutineFactory for ImmediateFn<F, Args, R, E>
where
    F: Fn(Args) -> R,
{
    type Args = Args;
    type Coroutine = Immediate<R, E>;

    const SUSPENDABLE: bool = false;

    fn call(&self, args: Args) -> Immediate<R, E> {
        Immediate::new((self.f)(args))
    }
}

impl<F, Args, R, E> std::fmt::Debug for ImmediateFn<F, Args, R, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ImmediateFn(..)")
    }
}
