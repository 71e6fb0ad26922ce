//! Time sources for the timer.
//!
//! The [`Timer`](crate::timer::Timer) never reads the system clock directly;
//! it samples an injected [`TimeSource`]. Production code uses [`WallClock`]
//! (monotonic). Tests use [`VirtualClock`], which only advances when told to,
//! so every timing property can be asserted exactly instead of within a
//! sleep-dependent tolerance.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// A nanosecond-resolution instant on a time source's own axis.
///
/// `Time` is an offset from the source's epoch, not a calendar timestamp.
/// Two `Time` values are only comparable when they came from the same source.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Time(u64);

impl Time {
    /// The source's epoch.
    pub const ZERO: Self = Self(0);

    /// Creates a time from nanoseconds since the epoch.
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Creates a time from milliseconds since the epoch.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis.saturating_mul(1_000_000))
    }

    /// Creates a time from seconds since the epoch.
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1_000_000_000))
    }

    /// Returns the time as nanoseconds since the epoch.
    #[must_use]
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Returns the elapsed duration since `earlier`.
    ///
    /// Saturates to zero if `self` is before `earlier`, so a run interval can
    /// never be negative even against a misbehaving source.
    #[must_use]
    pub const fn duration_since(self, earlier: Self) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

impl std::fmt::Debug for Time {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Time({}ns)", self.0)
    }
}

impl std::fmt::Display for Time {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 >= 1_000_000_000 {
            write!(
                f,
                "{}.{:03}s",
                self.0 / 1_000_000_000,
                (self.0 / 1_000_000) % 1000
            )
        } else if self.0 >= 1_000_000 {
            write!(f, "{}ms", self.0 / 1_000_000)
        } else {
            write!(f, "{}ns", self.0)
        }
    }
}

/// Source of the current time.
///
/// Implementations must be cheap to sample; the timer reads the source twice
/// per run interval, on the hot relay path.
pub trait TimeSource: Send + Sync {
    /// Returns the current time on this source's axis.
    fn now(&self) -> Time;
}

/// Monotonic wall-clock source for production use.
///
/// Backed by [`std::time::Instant`], with the epoch fixed at construction.
/// Monotonicity means accumulated runtimes can never go negative or jump
/// backwards with clock adjustments.
#[derive(Debug)]
pub struct WallClock {
    epoch: std::time::Instant,
}

impl WallClock {
    /// Creates a wall clock whose epoch is now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: std::time::Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for WallClock {
    fn now(&self) -> Time {
        let nanos = self.epoch.elapsed().as_nanos();
        Time::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

/// Virtual time source for deterministic tests.
///
/// Time stands still until [`advance`](VirtualClock::advance) is called, so a
/// test coroutine can simulate busy work by advancing the clock inside its
/// own `resume`, and the test scheduler can simulate suspended delay by
/// advancing it between protocol steps. Accumulated runtimes then come out
/// exact.
///
/// # Example
///
/// ```
/// use coroutime::clock::{Time, TimeSource, VirtualClock};
/// use std::time::Duration;
///
/// let clock = VirtualClock::new();
/// assert_eq!(clock.now(), Time::ZERO);
/// clock.advance(Duration::from_millis(250));
/// assert_eq!(clock.now(), Time::from_millis(250));
/// ```
#[derive(Debug, Default)]
pub struct VirtualClock {
    now: AtomicU64,
}

impl VirtualClock {
    /// Creates a virtual clock at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            now: AtomicU64::new(0),
        }
    }

    /// Creates a virtual clock starting at the given time.
    #[must_use]
    pub fn starting_at(time: Time) -> Self {
        Self {
            now: AtomicU64::new(time.as_nanos()),
        }
    }

    /// Advances the clock by `step`.
    pub fn advance(&self, step: Duration) {
        let nanos = u64::try_from(step.as_nanos()).unwrap_or(u64::MAX);
        self.now.fetch_add(nanos, Ordering::Release);
    }

    /// Sets the clock to an absolute time. May go backwards.
    pub fn set(&self, time: Time) {
        self.now.store(time.as_nanos(), Ordering::Release);
    }
}

impl TimeSource for VirtualClock {
    fn now(&self) -> Time {
        Time::from_nanos(self.now.load(Ordering::Acquire))
    }
}
