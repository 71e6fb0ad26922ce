//! Wrap-time configuration for the timing driver.
//!
//! A [`TimingConfig`] carries the injected collaborators (clock and stats
//! sink), the static tags attached to every report, and the
//! [`IdentifierScope`] knob. Defaults match the production setup: monotonic
//! wall clock, structured-log sink, aggregate identifiers, no tags.
//!
//! [`TimingConfig::from_env`] overlays environment variables on the defaults
//! for deployments that tune scope or tags without code changes.

use crate::clock::{TimeSource, WallClock};
use crate::stats::{LogSink, StatsSink};
use std::sync::Arc;

/// Environment variable selecting the identifier scope.
pub const IDENTIFIER_SCOPE_ENV: &str = "COROUTIME_IDENTIFIER_SCOPE";
/// Environment variable supplying comma-separated static tags.
pub const TAGS_ENV: &str = "COROUTIME_TAGS";

/// How identifiers relate invocations of one wrapped factory.
///
/// Under `Aggregate` (the default), the identifier is derived once, on the
/// first invocation, and shared by every later invocation — all calls of one
/// wrapped factory report under a single label, even when a first-call
/// receiver hook would name different receivers. `PerInvocation` re-derives
/// the identifier on every call, giving per-receiver granularity at the cost
/// of one derivation per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentifierScope {
    /// Derive once, cache, share across all invocations.
    #[default]
    Aggregate,
    /// Re-derive the identifier for every invocation.
    PerInvocation,
}

impl std::str::FromStr for IdentifierScope {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, ConfigError> {
        match s.to_ascii_lowercase().as_str() {
            "aggregate" => Ok(Self::Aggregate),
            "per-invocation" | "per_invocation" => Ok(Self::PerInvocation),
            _ => Err(ConfigError::InvalidScope {
                value: s.to_string(),
            }),
        }
    }
}

/// Errors from environment-based configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The scope variable held something other than a known scope name.
    #[error("invalid identifier scope {value:?} (expected \"aggregate\" or \"per-invocation\")")]
    InvalidScope {
        /// The rejected value.
        value: String,
    },
}

/// Options and collaborators for one wrapped factory.
#[derive(Clone)]
pub struct TimingConfig {
    /// Identifier caching behavior.
    pub scope: IdentifierScope,
    /// Static tags forwarded with every stats report.
    pub tags: Vec<String>,
    /// The time source timers sample.
    pub clock: Arc<dyn TimeSource>,
    /// The sink finalized runtimes are reported to.
    pub sink: Arc<dyn StatsSink>,
}

impl TimingConfig {
    /// Creates the default configuration: aggregate scope, no tags, wall
    /// clock, log sink.
    #[must_use]
    pub fn new() -> Self {
        Self {
            scope: IdentifierScope::default(),
            tags: Vec::new(),
            clock: Arc::new(WallClock::new()),
            sink: Arc::new(LogSink),
        }
    }

    /// Creates the default configuration overlaid with environment settings.
    ///
    /// Unset variables fall back to defaults; present-but-invalid values are
    /// errors.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new();
        if let Ok(value) = std::env::var(IDENTIFIER_SCOPE_ENV) {
            config.scope = value.parse()?;
        }
        if let Ok(value) = std::env::var(TAGS_ENV) {
            config.tags = value
                .split(',')
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(str::to_string)
                .collect();
        }
        Ok(config)
    }

    /// Sets the identifier scope.
    #[must_use]
    pub fn with_scope(mut self, scope: IdentifierScope) -> Self {
        self.scope = scope;
        self
    }

    /// Appends one static tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Replaces the static tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Replaces the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the stats sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn StatsSink>) -> Self {
        self.sink = sink;
        self
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TimingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimingConfig")
            .field("scope", &self.scope)
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}
