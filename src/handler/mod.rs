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

//! Destinations that receive filtered, formatted log records.

use std::fmt;

use crate::Error;
use crate::HandlerId;
use crate::Level;
use crate::Record;
use crate::trap::FailureLog;

mod file;
pub mod remote;
mod stream;

pub use self::file::FileHandler;
pub use self::remote::RemoteNotify;
pub use self::remote::RemoteNotifyBuilder;
pub use self::stream::Stream;
pub use self::stream::StreamHandler;

/// A handler that can process log records.
///
/// The [`Logger`](crate::Logger) calls [`Handler::emit`] only for records whose level is at
/// least [`Handler::level`]. An error returned from `emit` is reported through the logger's
/// trap and never stops the record from reaching the other handlers.
pub trait Handler: fmt::Debug + Send + Sync + 'static {
    /// The minimum level this handler accepts.
    fn level(&self) -> Level;

    /// Dispatch a log record to the handler destination.
    fn emit(&self, record: &Record) -> Result<(), Error>;

    /// Flush any buffered records.
    ///
    /// Default to a no-op.
    fn flush(&self) -> Result<(), Error> {
        Ok(())
    }

    /// Called once when the handler is attached to a logger, with its attachment id and that
    /// logger's failure log.
    ///
    /// Handlers that fail outside of [`Handler::emit`], such as background deliveries, report
    /// there. Default to a no-op.
    fn attached(&self, id: HandlerId, failures: &FailureLog) {
        let _ = (id, failures);
    }
}

impl<T: Handler> From<T> for Box<dyn Handler> {
    fn from(value: T) -> Self {
        Box::new(value)
    }
}
