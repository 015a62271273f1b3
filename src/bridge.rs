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

//! Forward records of the [`log`] crate to a [`Logger`].

use std::sync::Arc;

use crate::Error;
use crate::Level;
use crate::Logger;
use crate::Record;
use crate::handler::remote::is_delivery_thread;

/// A [`log::Log`] implementation that forwards to a [`Logger`].
///
/// `trace` and `debug` records map to [`Level::Debug`], `warn` to [`Level::Warning`]. Key-values
/// attached to a `log` record become fields of the forwarded record.
///
/// Records logged on a remote delivery thread, or by the HTTP client crates behind it, are
/// dropped so a delivery never produces further deliveries.
#[derive(Debug, Clone)]
pub struct LogBridge(Arc<Logger>);

impl LogBridge {
    /// Create a bridge to `logger`.
    pub fn new(logger: Arc<Logger>) -> LogBridge {
        LogBridge(logger)
    }

    /// The logger records are forwarded to.
    pub fn logger(&self) -> &Arc<Logger> {
        &self.0
    }
}

fn level_from_log(level: log::Level) -> Level {
    match level {
        log::Level::Trace | log::Level::Debug => Level::Debug,
        log::Level::Info => Level::Info,
        log::Level::Warn => Level::Warning,
        log::Level::Error => Level::Error,
    }
}

fn max_level_filter(level: Level) -> log::LevelFilter {
    match level {
        Level::Debug => log::LevelFilter::Trace,
        Level::Info => log::LevelFilter::Info,
        Level::Warning => log::LevelFilter::Warn,
        Level::Error | Level::Critical => log::LevelFilter::Error,
    }
}

struct FieldVisitor<'a> {
    fields: &'a mut Vec<(String, String)>,
}

impl<'kvs> log::kv::VisitSource<'kvs> for FieldVisitor<'_> {
    fn visit_pair(
        &mut self,
        key: log::kv::Key<'kvs>,
        value: log::kv::Value<'kvs>,
    ) -> Result<(), log::kv::Error> {
        self.fields.push((key.as_str().to_string(), value.to_string()));
        Ok(())
    }
}

/// Crates on the webhook delivery path. Their records would turn into deliveries of their own.
const DELIVERY_STACK_TARGETS: [&str; 6] = [
    "reqwest",
    "hyper",
    "hyper_util",
    "h2",
    "rustls",
    "want",
];

fn is_delivery_stack(target: &str) -> bool {
    DELIVERY_STACK_TARGETS.iter().any(|prefix| {
        target
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
    })
}

impl log::Log for LogBridge {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        !is_delivery_thread()
            && !is_delivery_stack(metadata.target())
            && self.0.enabled(level_from_log(metadata.level()))
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let level = level_from_log(record.level());

        let mut fields = vec![];
        let mut visitor = FieldVisitor {
            fields: &mut fields,
        };
        // the visitor never fails, a failing source just yields fewer fields
        let _ = record.key_values().visit(&mut visitor);

        self.0.log_with(level, record.args().to_string(), fields);
    }

    fn flush(&self) {
        self.0.flush();
    }
}

impl Logger {
    /// Install this logger as the global [`log`] crate logger.
    ///
    /// The `log` max level is set from the logger level at the time of the call.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a global `log` logger is already set.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    ///
    /// let logger = Arc::new(loghook::Logger::new("app"));
    /// logger.clone().install().unwrap();
    ///
    /// log::info!(user = "alice"; "signed in");
    /// ```
    pub fn install(self: Arc<Self>) -> Result<(), Error> {
        let max_level = max_level_filter(self.level());
        log::set_boxed_logger(Box::new(LogBridge(self))).map_err(|err| {
            Error::configuration("cannot install the global log crate logger").with_source(err)
        })?;
        log::set_max_level(max_level);
        Ok(())
    }
}
