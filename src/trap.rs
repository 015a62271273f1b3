// Copyright 2024 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Report failures that happen while logging.
//!
//! A logger cannot log its own failures through the handler that just failed. Instead, failures
//! are handed to a [`Trap`]. The [`DefaultTrap`] writes them to standard error; the [`FailureLog`]
//! that every [`Logger`](crate::Logger) owns additionally keeps the most recent ones for
//! introspection.

use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::io::Write;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use jiff::Timestamp;

use crate::Error;
use crate::ErrorKind;
use crate::HandlerId;

/// A sink for errors that must not propagate to the code that logged.
pub trait Trap: fmt::Debug + Send + Sync + 'static {
    /// Handle an error.
    fn trap(&self, err: &Error);
}

impl<T: Trap> From<T> for Box<dyn Trap> {
    fn from(value: T) -> Self {
        Box::new(value)
    }
}

/// A default trap that sends errors to standard error if possible.
///
/// If standard error is not available, it does nothing.
#[derive(Debug, Default)]
#[non_exhaustive]
pub struct DefaultTrap {}

impl Trap for DefaultTrap {
    fn trap(&self, err: &Error) {
        let _ = writeln!(io::stderr(), "loghook: {err}");
    }
}

/// A trap that discards every error.
#[derive(Debug, Default)]
#[non_exhaustive]
pub struct NoopTrap {}

impl Trap for NoopTrap {
    fn trap(&self, _: &Error) {}
}

/// One failure recorded by a [`FailureLog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// When the failure was trapped.
    pub at: Timestamp,
    /// The handler that failed, if the failure came from one.
    pub handler: Option<HandlerId>,
    /// The category of the failure.
    pub kind: ErrorKind,
    /// The rendered error, including its context and sources.
    pub message: String,
}

/// A bounded record of the most recent failures, plus a running total.
///
/// Cloning a `FailureLog` yields another handle to the same record, so it can be given to
/// background delivery threads while the logger keeps its own handle.
#[derive(Debug, Clone)]
pub struct FailureLog {
    inner: Arc<FailureLogInner>,
}

#[derive(Debug)]
struct FailureLogInner {
    capacity: usize,
    recent: Mutex<VecDeque<Failure>>,
    total: AtomicU64,
    forward: Option<Box<dyn Trap>>,
}

impl Default for FailureLog {
    fn default() -> Self {
        FailureLog::new(FailureLog::DEFAULT_CAPACITY)
    }
}

impl FailureLog {
    /// The number of failures kept by [`FailureLog::default`].
    pub const DEFAULT_CAPACITY: usize = 64;

    /// Create a failure log keeping the last `capacity` failures and forwarding each one to
    /// [`DefaultTrap`].
    pub fn new(capacity: usize) -> Self {
        Self::create(capacity, Some(Box::new(DefaultTrap::default())))
    }

    /// Create a failure log that forwards each failure to the given trap.
    pub fn with_forward(capacity: usize, forward: impl Into<Box<dyn Trap>>) -> Self {
        Self::create(capacity, Some(forward.into()))
    }

    /// Create a failure log that only records.
    pub fn silent(capacity: usize) -> Self {
        Self::create(capacity, None)
    }

    fn create(capacity: usize, forward: Option<Box<dyn Trap>>) -> Self {
        Self {
            inner: Arc::new(FailureLogInner {
                capacity,
                recent: Mutex::new(VecDeque::with_capacity(capacity)),
                total: AtomicU64::new(0),
                forward,
            }),
        }
    }

    fn recent_guard(&self) -> MutexGuard<'_, VecDeque<Failure>> {
        self.inner.recent.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The recorded failures, oldest first.
    pub fn recent(&self) -> Vec<Failure> {
        self.recent_guard().iter().cloned().collect()
    }

    /// The most recent failure, if any.
    pub fn last(&self) -> Option<Failure> {
        self.recent_guard().back().cloned()
    }

    /// The number of failures trapped since creation, including those no longer kept.
    pub fn total(&self) -> u64 {
        self.inner.total.load(Ordering::Relaxed)
    }

    /// Forget the recorded failures. The total is left untouched.
    pub fn clear(&self) {
        self.recent_guard().clear();
    }
}

impl FailureLog {
    pub(crate) fn record(&self, handler: Option<HandlerId>, err: &Error) {
        self.inner.total.fetch_add(1, Ordering::Relaxed);

        if self.inner.capacity > 0 {
            let mut recent = self.recent_guard();
            if recent.len() == self.inner.capacity {
                recent.pop_front();
            }
            recent.push_back(Failure {
                at: Timestamp::now(),
                handler,
                kind: err.kind(),
                message: err.to_string(),
            });
        }

        if let Some(forward) = &self.inner.forward {
            forward.trap(err);
        }
    }

    /// A trap recording into this log on behalf of one handler.
    pub(crate) fn for_handler(&self, id: HandlerId) -> HandlerFailures {
        HandlerFailures {
            id,
            log: self.clone(),
        }
    }
}

impl Trap for FailureLog {
    fn trap(&self, err: &Error) {
        self.record(None, err);
    }
}

#[derive(Debug)]
pub(crate) struct HandlerFailures {
    id: HandlerId,
    log: FailureLog,
}

impl Trap for HandlerFailures {
    fn trap(&self, err: &Error) {
        self.log.record(Some(self.id), err);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[derive(Debug, Default, Clone)]
    struct Counting(Arc<AtomicUsize>);

    impl Trap for Counting {
        fn trap(&self, _: &Error) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn keeps_only_the_latest_failures() {
        let log = FailureLog::silent(2);
        for i in 0..5 {
            log.trap(&Error::sink_write(format!("write {i} failed")));
        }

        assert_eq!(log.total(), 5);
        let recent = log.recent();
        assert_eq!(recent.len(), 2);
        assert!(recent[0].message.contains("write 3 failed"));
        assert!(recent[1].message.contains("write 4 failed"));
        assert_eq!(log.last().unwrap().kind, ErrorKind::SinkWrite);

        log.clear();
        assert!(log.recent().is_empty());
        assert_eq!(log.total(), 5);
    }

    #[test]
    fn forwards_to_inner_trap() {
        let counting = Counting::default();
        let log = FailureLog::with_forward(4, counting.clone());
        let handle = log.clone();

        handle.trap(&Error::delivery("gave up"));
        log.trap(&Error::delivery("gave up again"));

        assert_eq!(counting.0.load(Ordering::SeqCst), 2);
        assert_eq!(log.total(), 2);
        assert_eq!(handle.recent().len(), 2);
    }

    #[test]
    fn zero_capacity_only_counts() {
        let log = FailureLog::silent(0);
        log.trap(&Error::delivery("dropped"));
        assert_eq!(log.total(), 1);
        assert!(log.last().is_none());
    }
}
