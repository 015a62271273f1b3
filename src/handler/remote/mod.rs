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

//! Deliver log records to chat-ops webhooks.
//!
//! [`RemoteNotify`] renders a record on the calling thread, then hands it to one background
//! delivery thread per configured endpoint. Each thread posts the record, retrying network
//! failures, rate limits and server errors with exponential backoff, and gives up on records the
//! remote rejects. The calling thread never waits for the network.
//!
//! # Ordering
//!
//! Stream and file handlers write synchronously, so their output follows the order of the log
//! calls. Webhook delivery does not give that guarantee: endpoints are independent of each other,
//! and a record that is abandoned after retrying leaves a gap while later records still arrive.
//! Within one endpoint, a record finishes all of its attempts before the next one is sent.

use std::fmt;
use std::sync::Arc;
use std::sync::RwLock;
use std::time::Duration;

use crate::Error;
use crate::FormatSpec;
use crate::Formatter;
use crate::HandlerId;
use crate::IntoLevel;
use crate::Level;
use crate::Record;
use crate::check_env;
use crate::handler::Handler;
use crate::trap::DefaultTrap;
use crate::trap::FailureLog;
use crate::trap::Trap;

mod backoff;
mod monitor;
mod state;
mod transport;
mod worker;

pub(crate) use self::worker::is_delivery_thread;
#[cfg(test)]
pub(crate) use self::worker::mark_delivery_thread;

pub use self::monitor::DeliveryMonitor;
pub use self::monitor::DeliveryState;
pub use self::monitor::EndpointSnapshot;
pub use self::transport::HttpTransport;
pub use self::transport::Payload;
pub use self::transport::SendOutcome;
pub use self::transport::Transport;

use self::backoff::RetryPolicy;
use self::monitor::EndpointStats;
use self::state::Pipeline;
use self::worker::Task;
use self::worker::Worker;

/// A webhook URL or token that must never show up in any output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Secret(value.into())
    }

    /// The wrapped value.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Secret::new(value)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Secret(value)
    }
}

/// Where delivery threads report failures.
///
/// Unless the builder was given a trap explicitly, the slot is re-pointed at the failure log of
/// the logger the handler gets attached to.
#[derive(Debug)]
pub(crate) struct TrapSlot {
    trap: RwLock<Arc<dyn Trap>>,
    explicit: bool,
}

impl TrapSlot {
    pub(crate) fn trap(&self, err: &Error) {
        let trap = self.trap.read().unwrap_or_else(|e| e.into_inner()).clone();
        trap.trap(err);
    }

    fn attach(&self, id: HandlerId, failures: &FailureLog) {
        if !self.explicit {
            *self.trap.write().unwrap_or_else(|e| e.into_inner()) =
                Arc::new(failures.for_handler(id));
        }
    }
}

/// Cut `text` to at most `max_chars` characters, ending with `marker` when anything was cut.
///
/// A truncated result is exactly `max_chars` characters long.
pub(crate) fn truncate(text: String, max_chars: usize, marker: &str) -> String {
    if text.chars().count() <= max_chars {
        return text;
    }

    let marker_chars = marker.chars().count();
    if marker_chars >= max_chars {
        return marker.chars().take(max_chars).collect();
    }

    let keep = max_chars - marker_chars;
    let cut = text.char_indices().nth(keep).map_or(text.len(), |(i, _)| i);
    let mut truncated = String::with_capacity(cut + marker.len());
    truncated.push_str(&text[..cut]);
    truncated.push_str(marker);
    truncated
}

/// A handler that posts records to one or more chat-ops webhooks.
///
/// Typically attached at [`Level::Error`] so that only serious records reach the channel. See the
/// [module documentation](self) for the delivery and ordering semantics.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
///
/// use loghook::Level;
/// use loghook::Logger;
/// use loghook::handler::RemoteNotifyBuilder;
///
/// let remote = RemoteNotifyBuilder::new("https://hooks.example.com/services/T000", "#alerts")
///     .level(Level::Error)
///     .timeout(Duration::from_secs(5))
///     .build()
///     .unwrap();
///
/// let logger = Logger::new("billing");
/// logger.add_handler(remote);
/// logger.error("payment provider unreachable");
/// ```
#[derive(Debug)]
pub struct RemoteNotify {
    level: Level,
    formatter: Formatter,
    channel: String,
    max_payload_chars: usize,
    truncation_marker: String,
    pipelines: Vec<Pipeline>,
    stats: Arc<[Arc<EndpointStats>]>,
    trap: Arc<TrapSlot>,
}

impl RemoteNotify {
    /// A handle on the per-endpoint delivery counters.
    pub fn monitor(&self) -> DeliveryMonitor {
        DeliveryMonitor::new(self.stats.clone())
    }

    fn payload(&self, record: &Record) -> Result<Payload, Error> {
        let text = self.formatter.render(record)?;
        Ok(Payload {
            channel: self.channel.clone(),
            text: truncate(text, self.max_payload_chars, &self.truncation_marker),
        })
    }
}

impl Handler for RemoteNotify {
    fn level(&self) -> Level {
        self.level
    }

    fn emit(&self, record: &Record) -> Result<(), Error> {
        let payload = Arc::new(self.payload(record)?);

        let mut dropped = vec![];
        for (index, (pipeline, stats)) in self.pipelines.iter().zip(self.stats.iter()).enumerate() {
            if stats.is_disabled() {
                stats.record_dropped();
                continue;
            }
            if let Err(err) = pipeline.try_send(Task::Deliver(payload.clone())) {
                stats.record_dropped();
                dropped.push((index, err));
            }
        }

        match dropped.pop() {
            None => Ok(()),
            Some((index, err)) => {
                let endpoints = dropped
                    .iter()
                    .map(|(i, _)| i.to_string())
                    .chain(std::iter::once(index.to_string()))
                    .collect::<Vec<_>>()
                    .join(",");
                Err(err.with_context("endpoints", endpoints))
            }
        }
    }

    fn flush(&self) -> Result<(), Error> {
        for pipeline in &self.pipelines {
            pipeline.flush()?;
        }
        Ok(())
    }

    fn attached(&self, id: HandlerId, failures: &FailureLog) {
        self.trap.attach(id, failures);
    }
}

impl Drop for RemoteNotify {
    fn drop(&mut self) {
        state::shutdown(&mut self.pipelines);
    }
}

/// A builder for configuring a [`RemoteNotify`] handler.
///
/// The request timeout has no default and must be set with [`RemoteNotifyBuilder::timeout`].
#[derive(Debug)]
pub struct RemoteNotifyBuilder {
    endpoints: Vec<Secret>,
    channel: String,
    level: Result<Level, Error>,
    formatter: FormatSpec,
    timeout: Option<Duration>,
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    max_retry_window: Duration,
    terminal_failure_limit: u64,
    max_payload_chars: usize,
    truncation_marker: String,
    buffered_records_limit: usize,
    shutdown_timeout: Duration,
    thread_name: String,
    trap: Option<Arc<dyn Trap>>,
    transport: Option<Arc<dyn Transport>>,
}

impl RemoteNotifyBuilder {
    /// Create a builder posting to `endpoint` with `channel` as the target channel identifier.
    pub fn new(endpoint: impl Into<Secret>, channel: impl Into<String>) -> Self {
        Self {
            endpoints: vec![endpoint.into()],
            channel: channel.into(),
            level: Ok(Level::Error),
            formatter: FormatSpec::Default,
            timeout: None,
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            max_retry_window: Duration::from_secs(120),
            terminal_failure_limit: 3,
            max_payload_chars: 40_000,
            truncation_marker: "…[truncated]".to_string(),
            buffered_records_limit: 1024,
            shutdown_timeout: Duration::from_secs(1),
            thread_name: "loghook-remote".to_string(),
            trap: None,
            transport: None,
        }
    }

    /// Create a builder whose endpoint is read from the environment variable `var`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the variable is unset or empty.
    pub fn from_env(var: &str, channel: impl Into<String>) -> Result<Self, Error> {
        let endpoint = check_env(None, var)?;
        Ok(Self::new(endpoint, channel))
    }

    /// Add one more endpoint. Every endpoint gets its own independent delivery pipeline.
    pub fn endpoint(mut self, endpoint: impl Into<Secret>) -> Self {
        self.endpoints.push(endpoint.into());
        self
    }

    /// Set the minimum level this handler accepts.
    ///
    /// Default to [`Level::Error`].
    pub fn level(mut self, level: impl IntoLevel) -> Self {
        self.level = level.into_level();
        self
    }

    /// Set the formatter rendering the payload text.
    ///
    /// Default to [`Formatter::verbose`].
    pub fn formatter(mut self, formatter: impl Into<FormatSpec>) -> Self {
        self.formatter = formatter.into();
        self
    }

    /// Set the timeout of a single request. Required.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the number of send attempts per record, the first one included.
    ///
    /// Default to 3.
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the delay before the first retry; later retries double it.
    ///
    /// Default to 500ms.
    pub fn base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Set the ceiling of computed backoff delays.
    ///
    /// Default to 30s.
    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Set how long after its first attempt a record may still be retried.
    ///
    /// Default to 2 minutes.
    pub fn max_retry_window(mut self, max_retry_window: Duration) -> Self {
        self.max_retry_window = max_retry_window;
        self
    }

    /// Set after how many consecutive rejected records an endpoint stops being used.
    ///
    /// Default to 3.
    pub fn terminal_failure_limit(mut self, limit: u64) -> Self {
        self.terminal_failure_limit = limit;
        self
    }

    /// Set the maximum payload text length, in characters.
    ///
    /// Default to 40 000.
    pub fn max_payload_chars(mut self, max_payload_chars: usize) -> Self {
        self.max_payload_chars = max_payload_chars;
        self
    }

    /// Set the marker ending a truncated payload text.
    ///
    /// Default to `…[truncated]`.
    pub fn truncation_marker(mut self, marker: impl Into<String>) -> Self {
        self.truncation_marker = marker.into();
        self
    }

    /// Set the number of records each endpoint may have queued. Further records are dropped.
    ///
    /// Default to 1024.
    pub fn buffered_records_limit(mut self, limit: usize) -> Self {
        self.buffered_records_limit = limit;
        self
    }

    /// Set how long flushing or dropping the handler waits for queued records.
    ///
    /// Default to 1s.
    pub fn shutdown_timeout(mut self, shutdown_timeout: Duration) -> Self {
        self.shutdown_timeout = shutdown_timeout;
        self
    }

    /// Set the name prefix of the delivery threads.
    pub fn thread_name(mut self, thread_name: impl Into<String>) -> Self {
        self.thread_name = thread_name.into();
        self
    }

    /// Set the trap receiving delivery failures.
    ///
    /// By default failures go to the failure log of the logger the handler is attached to, or to
    /// [`DefaultTrap`] while unattached.
    pub fn trap(mut self, trap: impl Trap) -> Self {
        self.trap = Some(Arc::new(trap));
        self
    }

    /// Replace the HTTP transport.
    ///
    /// Default to [`HttpTransport`] with the configured timeout.
    pub fn transport(mut self, transport: impl Transport) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Build the [`RemoteNotify`] handler and start its delivery threads.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the timeout is missing, any limit is zero, the backoff
    /// ceiling is below the base delay, the level or template is invalid, or a delivery thread
    /// cannot be spawned.
    pub fn build(self) -> Result<RemoteNotify, Error> {
        let RemoteNotifyBuilder {
            endpoints,
            channel,
            level,
            formatter,
            timeout,
            max_attempts,
            base_delay,
            max_delay,
            max_retry_window,
            terminal_failure_limit,
            max_payload_chars,
            truncation_marker,
            buffered_records_limit,
            shutdown_timeout,
            thread_name,
            trap,
            transport,
        } = self;

        let level = level?;
        let formatter = formatter.resolve(Formatter::verbose)?;
        let timeout = match timeout {
            Some(timeout) if !timeout.is_zero() => timeout,
            Some(_) => return Err(Error::configuration("remote handler timeout must be positive")),
            None => return Err(Error::configuration("remote handler timeout is required")),
        };
        for (name, value) in [
            ("max_attempts", max_attempts as u64),
            ("terminal_failure_limit", terminal_failure_limit),
            ("max_payload_chars", max_payload_chars as u64),
            ("buffered_records_limit", buffered_records_limit as u64),
        ] {
            if value == 0 {
                return Err(Error::configuration("remote handler limit must be positive")
                    .with_context("option", name));
            }
        }
        if max_delay < base_delay {
            return Err(Error::configuration("max_delay must not be below base_delay")
                .with_context("base_delay", format!("{base_delay:?}"))
                .with_context("max_delay", format!("{max_delay:?}")));
        }

        let policy = RetryPolicy {
            max_attempts,
            base_delay,
            max_delay,
            max_retry_window,
        };
        let transport = transport.unwrap_or_else(|| Arc::new(HttpTransport::new(timeout)));
        let trap = Arc::new(TrapSlot {
            explicit: trap.is_some(),
            trap: RwLock::new(trap.unwrap_or_else(|| Arc::new(DefaultTrap::default()))),
        });

        let mut pipelines = Vec::with_capacity(endpoints.len());
        let mut stats = Vec::with_capacity(endpoints.len());
        for (index, endpoint) in endpoints.into_iter().enumerate() {
            let endpoint_stats = Arc::new(EndpointStats::default());
            let (sender, receiver) = crossbeam_channel::bounded(buffered_records_limit);
            let (cancel, cancelled) = crossbeam_channel::bounded(0);

            let worker = Worker {
                index,
                endpoint,
                receiver,
                cancel: cancelled,
                transport: transport.clone(),
                policy,
                terminal_failure_limit,
                stats: endpoint_stats.clone(),
                trap: trap.clone(),
            };
            let handle = std::thread::Builder::new()
                .name(format!("{thread_name}-{index}"))
                .spawn(move || worker.run())
                .map_err(|err| {
                    Error::configuration("failed to spawn remote delivery thread").with_source(err)
                })?;

            pipelines.push(Pipeline::new(sender, cancel, handle, shutdown_timeout));
            stats.push(endpoint_stats);
        }

        Ok(RemoteNotify {
            level,
            formatter,
            channel,
            max_payload_chars,
            truncation_marker,
            pipelines,
            stats: stats.into(),
            trap,
        })
    }
}
