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

use std::cell::Cell;
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::Receiver;
use crossbeam_channel::RecvTimeoutError;
use crossbeam_channel::Sender;
use crossbeam_channel::TryRecvError;

use crate::Error;
use crate::handler::remote::Secret;
use crate::handler::remote::TrapSlot;
use crate::handler::remote::backoff::RetryPolicy;
use crate::handler::remote::monitor::EndpointStats;
use crate::handler::remote::transport::Payload;
use crate::handler::remote::transport::Transport;
use crate::handler::remote::transport::Verdict;

thread_local! {
    static DELIVERY_THREAD: Cell<bool> = const { Cell::new(false) };
}

/// Whether the current thread is a remote delivery thread. Records logged there, e.g. by the
/// HTTP client, are never fed back into a logger.
pub(crate) fn is_delivery_thread() -> bool {
    DELIVERY_THREAD.with(Cell::get)
}

pub(crate) fn mark_delivery_thread() {
    DELIVERY_THREAD.with(|flag| flag.set(true));
}

pub(crate) enum Task {
    Deliver(Arc<Payload>),
    Flush(Sender<()>),
    Shutdown(Sender<()>),
}

pub(crate) struct Worker {
    pub(crate) index: usize,
    pub(crate) endpoint: Secret,
    pub(crate) receiver: Receiver<Task>,
    pub(crate) cancel: Receiver<()>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) policy: RetryPolicy,
    pub(crate) terminal_failure_limit: u64,
    pub(crate) stats: Arc<EndpointStats>,
    pub(crate) trap: Arc<TrapSlot>,
}

impl Worker {
    pub(crate) fn run(self) {
        mark_delivery_thread();
        while let Ok(task) = self.receiver.recv() {
            match task {
                Task::Deliver(payload) => {
                    if self.is_cancelled() {
                        self.stats.record_abandoned();
                    } else if self.stats.is_disabled() {
                        self.stats.record_dropped();
                    } else {
                        self.deliver(&payload);
                    }
                }
                Task::Flush(done) => {
                    let _ = done.send(());
                }
                Task::Shutdown(done) => {
                    let _ = done.send(());
                    break;
                }
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        matches!(self.cancel.try_recv(), Err(TryRecvError::Disconnected))
    }

    fn deliver(&self, payload: &Payload) {
        let started = Instant::now();
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.stats.record_attempt();

            match self.transport.send(&self.endpoint, payload).verdict() {
                Verdict::Success => {
                    self.stats.record_success();
                    return;
                }
                Verdict::Terminal { reason } => {
                    let consecutive = self.stats.record_terminal();
                    self.report(
                        Error::delivery("webhook rejected the record")
                            .with_context("reason", reason)
                            .with_context("attempt", attempt),
                    );
                    if consecutive >= self.terminal_failure_limit && self.stats.disable() {
                        self.report(
                            Error::delivery("endpoint disabled after consecutive terminal failures")
                                .with_context("consecutive", consecutive),
                        );
                    }
                    return;
                }
                Verdict::Retryable {
                    reason,
                    retry_after,
                } => {
                    self.stats.record_retryable();
                    if !self.policy.can_retry(attempt) {
                        return self.abandon("retry attempts exhausted", reason, attempt);
                    }

                    let delay = retry_after.unwrap_or_else(|| self.policy.backoff(attempt));
                    if started.elapsed() + delay > self.policy.max_retry_window {
                        return self.abandon("retry window exceeded", reason, attempt);
                    }
                    match self.cancel.recv_timeout(delay) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                            return self.abandon("cancelled by shutdown", reason, attempt);
                        }
                    }
                }
            }
        }
    }

    fn abandon(&self, why: &str, reason: String, attempt: u32) {
        self.stats.record_abandoned();
        self.report(
            Error::delivery(format!("webhook delivery abandoned: {why}"))
                .with_context("reason", reason)
                .with_context("attempt", attempt),
        );
    }

    fn report(&self, err: Error) {
        self.trap.trap(&err.with_context("endpoint", self.index));
    }
}
