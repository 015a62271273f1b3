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

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU8;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

/// The last state a delivery pipeline reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryState {
    /// The last record was accepted by the remote.
    Success,
    /// The last attempt failed and a retry is scheduled.
    RetryableFailure,
    /// The last record was rejected and will not be retried.
    TerminalFailure,
    /// The last record was given up on: attempts or retry window exhausted, or shutdown.
    Abandoned,
}

impl DeliveryState {
    fn to_u8(self) -> u8 {
        match self {
            DeliveryState::Success => 1,
            DeliveryState::RetryableFailure => 2,
            DeliveryState::TerminalFailure => 3,
            DeliveryState::Abandoned => 4,
        }
    }

    fn from_u8(value: u8) -> Option<DeliveryState> {
        match value {
            1 => Some(DeliveryState::Success),
            2 => Some(DeliveryState::RetryableFailure),
            3 => Some(DeliveryState::TerminalFailure),
            4 => Some(DeliveryState::Abandoned),
            _ => None,
        }
    }
}

/// Counters of one endpoint pipeline, shared between the handler and its delivery thread.
#[derive(Debug, Default)]
pub(crate) struct EndpointStats {
    attempts: AtomicU64,
    successes: AtomicU64,
    retryable_failures: AtomicU64,
    terminal_failures: AtomicU64,
    consecutive_terminal_failures: AtomicU64,
    abandoned: AtomicU64,
    dropped: AtomicU64,
    disabled: AtomicBool,
    last_state: AtomicU8,
}

impl EndpointStats {
    pub(crate) fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        self.consecutive_terminal_failures.store(0, Ordering::Relaxed);
        self.set_state(DeliveryState::Success);
    }

    pub(crate) fn record_retryable(&self) {
        self.retryable_failures.fetch_add(1, Ordering::Relaxed);
        self.set_state(DeliveryState::RetryableFailure);
    }

    /// Returns the number of consecutive terminal failures, this one included.
    pub(crate) fn record_terminal(&self) -> u64 {
        self.terminal_failures.fetch_add(1, Ordering::Relaxed);
        self.set_state(DeliveryState::TerminalFailure);
        self.consecutive_terminal_failures
            .fetch_add(1, Ordering::Relaxed)
            + 1
    }

    pub(crate) fn record_abandoned(&self) {
        self.abandoned.fetch_add(1, Ordering::Relaxed);
        self.set_state(DeliveryState::Abandoned);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns `true` if this call disabled the endpoint.
    pub(crate) fn disable(&self) -> bool {
        !self.disabled.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }

    fn set_state(&self, state: DeliveryState) {
        self.last_state.store(state.to_u8(), Ordering::Release);
    }

    fn snapshot(&self, endpoint: usize) -> EndpointSnapshot {
        EndpointSnapshot {
            endpoint,
            attempts: self.attempts.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            retryable_failures: self.retryable_failures.load(Ordering::Relaxed),
            terminal_failures: self.terminal_failures.load(Ordering::Relaxed),
            consecutive_terminal_failures: self
                .consecutive_terminal_failures
                .load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            disabled: self.is_disabled(),
            last_state: DeliveryState::from_u8(self.last_state.load(Ordering::Acquire)),
        }
    }
}

/// A point-in-time copy of one endpoint's counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSnapshot {
    /// The position of the endpoint, in the order endpoints were configured.
    pub endpoint: usize,
    /// Send attempts, retries included.
    pub attempts: u64,
    /// Records accepted by the remote.
    pub successes: u64,
    /// Attempts that failed in a way worth retrying.
    pub retryable_failures: u64,
    /// Records rejected by the remote.
    pub terminal_failures: u64,
    /// Terminal failures since the last success.
    pub consecutive_terminal_failures: u64,
    /// Records given up on after retrying or on shutdown.
    pub abandoned: u64,
    /// Records never queued: queue full, pipeline gone, or endpoint disabled.
    pub dropped: u64,
    /// Whether the endpoint stopped accepting records after too many terminal failures.
    pub disabled: bool,
    /// The last state reached, if any record was processed yet.
    pub last_state: Option<DeliveryState>,
}

/// A read-only view on the delivery pipelines of a [`RemoteNotify`](super::RemoteNotify).
///
/// Obtain it with [`RemoteNotify::monitor`](super::RemoteNotify::monitor) before handing the
/// handler to a logger; it stays valid afterwards.
#[derive(Debug, Clone)]
pub struct DeliveryMonitor {
    endpoints: Arc<[Arc<EndpointStats>]>,
}

impl DeliveryMonitor {
    pub(crate) fn new(endpoints: Arc<[Arc<EndpointStats>]>) -> Self {
        Self { endpoints }
    }

    /// Snapshots of every endpoint, in configuration order.
    pub fn snapshot(&self) -> Vec<EndpointSnapshot> {
        self.endpoints
            .iter()
            .enumerate()
            .map(|(i, stats)| stats.snapshot(i))
            .collect()
    }

    /// Snapshot of one endpoint.
    pub fn endpoint(&self, index: usize) -> Option<EndpointSnapshot> {
        self.endpoints.get(index).map(|stats| stats.snapshot(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_resets_consecutive_terminal_failures() {
        let stats = EndpointStats::default();
        assert_eq!(stats.record_terminal(), 1);
        assert_eq!(stats.record_terminal(), 2);
        stats.record_success();
        assert_eq!(stats.record_terminal(), 1);

        let snapshot = stats.snapshot(0);
        assert_eq!(snapshot.terminal_failures, 3);
        assert_eq!(snapshot.consecutive_terminal_failures, 1);
        assert_eq!(snapshot.last_state, Some(DeliveryState::TerminalFailure));
    }

    #[test]
    fn disable_reports_first_transition_only() {
        let stats = EndpointStats::default();
        assert!(stats.disable());
        assert!(!stats.disable());
        assert!(stats.is_disabled());
    }
}
