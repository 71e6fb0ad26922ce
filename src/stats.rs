//! Stats sinks: where finalized runtimes are reported.
//!
//! A [`StatsSink`] is the injected collaborator that receives one record per
//! coroutine invocation, at finalize time. It is passed in through
//! [`TimingConfig`](crate::config::TimingConfig), never reached through a
//! global. The default [`LogSink`] emits a structured debug event; real
//! deployments substitute a sink that forwards to their metrics backend.
//!
//! # Example
//!
//! A backend that reports every coroutine under one constant stat name and
//! carries the identifier as a tag:
//!
//! ```
//! use coroutime::stats::StatsSink;
//! use std::time::Duration;
//!
//! struct TaggedSink;
//!
//! impl StatsSink for TaggedSink {
//!     fn record(&self, name: &str, runtime: Duration, tags: &[String]) {
//!         let mut all_tags = vec![format!("name:{name}")];
//!         all_tags.extend_from_slice(tags);
//!         // forward ("my.coroutine.time", runtime, all_tags) to the backend
//!         let _ = (runtime, all_tags);
//!     }
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

/// Receives the finalized runtime of one coroutine invocation.
///
/// `record` is invoked at most once per invocation. `runtime` is the
/// accumulated active time; sinks that want float seconds use
/// [`Duration::as_secs_f64`].
pub trait StatsSink: Send + Sync {
    /// Reports one finalized runtime.
    fn record(&self, name: &str, runtime: Duration, tags: &[String]);
}

/// One captured stats report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsRecord {
    /// The derived identifier of the instrumented coroutine.
    pub name: String,
    /// Accumulated active runtime.
    pub runtime: Duration,
    /// Static tags from the timing configuration.
    pub tags: Vec<String>,
}

/// Default sink: emits a structured debug log event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl StatsSink for LogSink {
    fn record(&self, name: &str, runtime: Duration, tags: &[String]) {
        tracing::debug!(
            name = %name,
            runtime_s = runtime.as_secs_f64(),
            tags = ?tags,
            "coroutine active runtime"
        );
    }
}

/// Sink that discards every record.
///
/// Used where stats are disabled, and in benches to isolate driver overhead
/// from reporting cost.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpSink;

impl StatsSink for NoOpSink {
    fn record(&self, _name: &str, _runtime: Duration, _tags: &[String]) {}
}

/// Sink that captures every record for later inspection.
///
/// Tests hold one handle and hand a clone to the timing configuration; the
/// records accumulate behind a mutex and are cloned out with
/// [`records`](RecordingSink::records).
#[derive(Debug, Default)]
pub struct RecordingSink {
    records: parking_lot::Mutex<Vec<StatsRecord>>,
}

impl RecordingSink {
    /// Creates an empty recording sink behind an `Arc`.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Returns a snapshot of the captured records, in report order.
    #[must_use]
    pub fn records(&self) -> Vec<StatsRecord> {
        self.records.lock().clone()
    }

    /// Returns the number of captured records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Clears the captured records.
    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl StatsSink for RecordingSink {
    fn record(&self, name: &str, runtime: Duration, tags: &[String]) {
        self.records.lock().push(StatsRecord {
            name: name.to_string(),
            runtime,
            tags: tags.to_vec(),
        });
    }
}
