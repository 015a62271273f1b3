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

use std::any::Any;
use std::fmt;
use std::panic;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;
use std::sync::atomic::AtomicU8;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::Error;
use crate::FormatSpec;
use crate::IntoLevel;
use crate::Level;
use crate::Record;
use crate::check_env;
use crate::handler::FileHandler;
use crate::handler::Handler;
use crate::handler::RemoteNotifyBuilder;
use crate::handler::Stream;
use crate::handler::StreamHandler;
use crate::handler::remote::Secret;
use crate::trap::FailureLog;

mod registry;

pub use self::registry::get_logger;
pub use self::registry::get_logger_with;

/// Identifies one handler attachment, for [`Logger::remove_handler`].
///
/// Identifiers are unique within the process.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct HandlerId(u64);

impl HandlerId {
    fn next() -> HandlerId {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        HandlerId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
struct Attached {
    id: HandlerId,
    handler: Box<dyn Handler>,
}

/// A named logger that fans each accepted record out to its handlers.
///
/// A record is dispatched only if its level is at least the logger's level. It then goes to every
/// handler whose own level accepts it, in attachment order. A handler that fails, or panics, is
/// reported to the logger's [`FailureLog`] and the record still reaches the remaining handlers;
/// logging never returns an error and never panics because of a handler.
///
/// # Examples
///
/// ```
/// use loghook::Level;
/// use loghook::Logger;
/// use loghook::handler::Stream;
///
/// let logger = Logger::new("billing");
/// logger
///     .add_stream_handler(Stream::Stderr, Level::Warning, "{level}: {message}")
///     .unwrap();
///
/// logger.info("dropped: below the handler level");
/// logger.warning("written to stderr");
/// ```
#[derive(Debug)]
pub struct Logger {
    name: Arc<str>,
    level: AtomicU8,
    handlers: RwLock<Vec<Attached>>,
    failures: FailureLog,
}

impl Logger {
    /// Create a logger at [`Level::Debug`] with no handlers.
    pub fn new(name: impl Into<Arc<str>>) -> Logger {
        Logger {
            name: name.into(),
            level: AtomicU8::new(Level::Debug as u8),
            handlers: RwLock::new(vec![]),
            failures: FailureLog::default(),
        }
    }

    /// Create a logger with the default handlers attached.
    ///
    /// * standard output at [`Level::Info`], message only;
    /// * `<name>.log` in the working directory at [`Level::Debug`], verbose.
    ///
    /// # Errors
    ///
    /// Returns an error if the log file cannot be opened.
    pub fn with_default_handlers(name: impl Into<Arc<str>>) -> Result<Logger, Error> {
        let logger = Logger::new(name);
        let path = format!("{}.log", logger.name);
        logger.add_handler(StreamHandler::stdout());
        logger.add_handler(FileHandler::new(path, Level::Debug, FormatSpec::Default)?);
        Ok(logger)
    }

    /// Replace the failure log, e.g. to change its capacity or where it forwards to.
    pub fn with_failure_log(mut self, failures: FailureLog) -> Logger {
        self.failures = failures;
        self
    }

    /// The logger name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The minimum level a record needs to be dispatched at all.
    pub fn level(&self) -> Level {
        Level::from_u8(self.level.load(Ordering::Relaxed))
    }

    /// Set the logger level.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the level name is unknown.
    pub fn set_level(&self, level: impl IntoLevel) -> Result<(), Error> {
        let level = level.into_level()?;
        self.level.store(level as u8, Ordering::Relaxed);
        Ok(())
    }

    /// Set the logger level from the environment variable `var`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the variable is unset, empty or not a level name.
    pub fn level_from_env(&self, var: &str) -> Result<Level, Error> {
        let name = check_env(None, var)?;
        let level = name
            .into_level()
            .map_err(|err| err.with_context("var", var))?;
        self.set_level(level)?;
        Ok(level)
    }

    /// The failure log of this logger.
    pub fn failures(&self) -> &FailureLog {
        &self.failures
    }

    fn handlers(&self) -> RwLockReadGuard<'_, Vec<Attached>> {
        self.handlers.read().unwrap_or_else(|e| e.into_inner())
    }

    fn handlers_mut(&self) -> RwLockWriteGuard<'_, Vec<Attached>> {
        self.handlers.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a handler. It receives records after all handlers attached before it.
    pub fn add_handler(&self, handler: impl Into<Box<dyn Handler>>) -> HandlerId {
        let handler = handler.into();
        let id = HandlerId::next();
        handler.attached(id, &self.failures);
        self.handlers_mut().push(Attached { id, handler });
        id
    }

    /// Detach and drop a handler. Returns `false` if no such handler is attached.
    ///
    /// Dropping the handler releases its resources: files are closed and remote deliveries are
    /// drained within their shutdown timeout.
    pub fn remove_handler(&self, id: HandlerId) -> bool {
        let removed = {
            let mut handlers = self.handlers_mut();
            handlers
                .iter()
                .position(|attached| attached.id == id)
                .map(|index| handlers.remove(index))
        };
        removed.is_some()
    }

    /// Detach and drop every handler.
    pub fn reset(&self) {
        let removed = std::mem::take(&mut *self.handlers_mut());
        drop(removed);
    }

    /// The number of attached handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers().len()
    }

    /// Attach a [`StreamHandler`].
    ///
    /// # Errors
    ///
    /// Returns an error if the level or template is invalid.
    pub fn add_stream_handler(
        &self,
        stream: Stream,
        level: impl IntoLevel,
        formatter: impl Into<FormatSpec>,
    ) -> Result<HandlerId, Error> {
        let handler = StreamHandler::new(stream, level, formatter)?;
        Ok(self.add_handler(handler))
    }

    /// Attach a [`FileHandler`] appending to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the level or template is invalid, or the file cannot be opened.
    pub fn add_file_handler(
        &self,
        path: impl Into<PathBuf>,
        level: impl IntoLevel,
        formatter: impl Into<FormatSpec>,
    ) -> Result<HandlerId, Error> {
        let handler = FileHandler::new(path, level, formatter)?;
        Ok(self.add_handler(handler))
    }

    /// Attach a [`RemoteNotify`](crate::handler::RemoteNotify) handler with default delivery
    /// options. Use [`RemoteNotifyBuilder`] for anything else.
    ///
    /// # Errors
    ///
    /// Returns an error if the level, template or timeout is invalid.
    pub fn add_remote_handler(
        &self,
        endpoint: impl Into<Secret>,
        channel: impl Into<String>,
        level: impl IntoLevel,
        formatter: impl Into<FormatSpec>,
        timeout: Duration,
    ) -> Result<HandlerId, Error> {
        let handler = RemoteNotifyBuilder::new(endpoint, channel)
            .level(level)
            .formatter(formatter)
            .timeout(timeout)
            .build()?;
        Ok(self.add_handler(handler))
    }

    /// Whether a record at `level` would be dispatched.
    pub fn enabled(&self, level: Level) -> bool {
        level >= self.level()
    }

    /// Log a message.
    pub fn log(&self, level: Level, message: impl Into<String>) {
        if !self.enabled(level) {
            return;
        }
        self.dispatch(&Record::new(self.name.clone(), level, message));
    }

    /// Log a message with structured fields.
    pub fn log_with<I, K, V>(&self, level: Level, message: impl Into<String>, fields: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        if !self.enabled(level) {
            return;
        }
        let record = fields
            .into_iter()
            .fold(Record::new(self.name.clone(), level, message), |record, (k, v)| {
                record.with_field(k, v)
            });
        self.dispatch(&record);
    }

    /// Log a message at [`Level::Debug`].
    pub fn debug(&self, message: impl Into<String>) {
        self.log(Level::Debug, message)
    }

    /// Log a message at [`Level::Info`].
    pub fn info(&self, message: impl Into<String>) {
        self.log(Level::Info, message)
    }

    /// Log a message at [`Level::Warning`].
    pub fn warning(&self, message: impl Into<String>) {
        self.log(Level::Warning, message)
    }

    /// Log a message at [`Level::Error`].
    pub fn error(&self, message: impl Into<String>) {
        self.log(Level::Error, message)
    }

    /// Log a message at [`Level::Critical`].
    pub fn critical(&self, message: impl Into<String>) {
        self.log(Level::Critical, message)
    }

    fn dispatch(&self, record: &Record) {
        let handlers = self.handlers();
        for attached in handlers.iter() {
            if record.level() < attached.handler.level() {
                continue;
            }

            let result = panic::catch_unwind(AssertUnwindSafe(|| attached.handler.emit(record)))
                .unwrap_or_else(|payload| {
                    Err(Error::sink_write("handler panicked while emitting")
                        .with_context("panic", panic_message(payload.as_ref())))
                });
            if let Err(err) = result {
                self.failures
                    .record(Some(attached.id), &err.with_context("logger", &self.name));
            }
        }
    }

    /// Flush every handler. Failures are reported to the failure log.
    pub fn flush(&self) {
        let handlers = self.handlers();
        for attached in handlers.iter() {
            if let Err(err) = attached.handler.flush() {
                self.failures
                    .record(Some(attached.id), &err.with_context("logger", &self.name));
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "<non-string panic payload>"
    }
}
