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

use std::thread::JoinHandle;
use std::time::Duration;
use std::time::Instant;

use crossbeam_channel::Receiver;
use crossbeam_channel::SendTimeoutError;
use crossbeam_channel::Sender;
use crossbeam_channel::TrySendError;

use crate::Error;
use crate::handler::remote::worker::Task;

/// The caller side of one endpoint's delivery thread.
///
/// Dropping it asks the thread to finish the queued records, waits up to the shutdown timeout,
/// then cancels whatever is left and lets the thread go.
#[derive(Debug)]
pub(crate) struct Pipeline(Option<State>);

#[derive(Debug)]
struct State {
    sender: Sender<Task>,
    cancel: Sender<()>,
    handle: JoinHandle<()>,
    shutdown_timeout: Duration,
}

impl Pipeline {
    pub(crate) fn new(
        sender: Sender<Task>,
        cancel: Sender<()>,
        handle: JoinHandle<()>,
        shutdown_timeout: Duration,
    ) -> Self {
        Self(Some(State {
            sender,
            cancel,
            handle,
            shutdown_timeout,
        }))
    }

    fn state(&self) -> Result<&State, Error> {
        self.0
            .as_ref()
            .ok_or_else(|| Error::delivery("delivery pipeline is shut down"))
    }

    /// Queue a task without blocking.
    pub(crate) fn try_send(&self, task: Task) -> Result<(), Error> {
        let state = self.state()?;
        match state.sender.try_send(task) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(Error::delivery(
                "remote delivery queue is full, record dropped",
            )),
            Err(TrySendError::Disconnected(_)) => Err(Error::delivery(
                "remote delivery thread is gone, record dropped",
            )),
        }
    }

    /// Wait until everything queued before this call has been processed.
    pub(crate) fn flush(&self) -> Result<(), Error> {
        let state = self.state()?;
        let deadline = Instant::now() + state.shutdown_timeout;

        let (done, wait) = crossbeam_channel::bounded(1);
        state
            .sender
            .send_deadline(Task::Flush(done), deadline)
            .map_err(|_| Error::delivery("failed to send flush task to remote delivery thread"))?;
        wait.recv_deadline(deadline)
            .map_err(|_| Error::delivery("timed out waiting for remote deliveries to drain"))
    }
}

enum Ack {
    Pending(Receiver<()>),
    // the thread already exited
    Gone,
    Missed,
}

/// Shut down the delivery threads of all `pipelines` under one shared deadline.
///
/// Every thread is asked to finish its queue before any of them is waited on, so the whole
/// shutdown takes at most the longest shutdown timeout rather than their sum.
pub(crate) fn shutdown(pipelines: &mut [Pipeline]) {
    let states: Vec<State> = pipelines.iter_mut().filter_map(|p| p.0.take()).collect();
    let Some(timeout) = states.iter().map(|state| state.shutdown_timeout).max() else {
        return;
    };
    let deadline = Instant::now() + timeout;

    let pending: Vec<(State, Ack)> = states
        .into_iter()
        .map(|state| {
            let (done, wait) = crossbeam_channel::bounded(1);
            let ack = match state.sender.send_deadline(Task::Shutdown(done), deadline) {
                Ok(()) => Ack::Pending(wait),
                Err(SendTimeoutError::Disconnected(_)) => Ack::Gone,
                Err(SendTimeoutError::Timeout(_)) => Ack::Missed,
            };
            (state, ack)
        })
        .collect();

    for (state, ack) in pending {
        let drained = match ack {
            Ack::Pending(wait) => wait.recv_deadline(deadline).is_ok(),
            Ack::Gone => true,
            Ack::Missed => false,
        };

        let State {
            sender,
            cancel,
            handle,
            ..
        } = state;
        // interrupts pending backoff waits; queued records are abandoned
        drop(cancel);
        drop(sender);

        if drained {
            let _ = handle.join();
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        shutdown(std::slice::from_mut(self));
    }
}
