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

//! Loghook is a small logging facade that fans records out to standard streams, files and chat-ops
//! webhooks.
//!
//! # Overview
//!
//! A [`Logger`] owns an ordered list of [handlers](handler::Handler). Each record that passes the
//! logger level goes to every handler whose own level accepts it. Handlers render records with a
//! [`Formatter`] and write them to their destination:
//!
//! * [`StreamHandler`](handler::StreamHandler) writes to stdout, stderr or any writer;
//! * [`FileHandler`](handler::FileHandler) appends to a file;
//! * [`RemoteNotify`](handler::RemoteNotify) posts to a webhook from background threads, retrying
//!   transient failures with bounded exponential backoff.
//!
//! Logging never fails from the caller's point of view. Handler errors go to the logger's
//! [`FailureLog`](trap::FailureLog).
//!
//! # Examples
//!
//! ```
//! use loghook::Level;
//! use loghook::Logger;
//! use loghook::handler::Stream;
//!
//! let logger = Logger::new("billing");
//! logger
//!     .add_stream_handler(Stream::Stdout, Level::Info, "{level}: {message}")
//!     .unwrap();
//!
//! logger.debug("not printed");
//! logger.log_with(Level::Info, "invoice sent", [("invoice", "2024-0042")]);
//! ```
//!
//! Posting errors to a webhook:
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use loghook::Level;
//!
//! let logger = loghook::get_logger("billing");
//! logger
//!     .add_remote_handler(
//!         loghook::check_env(None, "SLACK_WEBHOOK_URL").unwrap(),
//!         "#alerts",
//!         Level::Error,
//!         "{logger_name}: {message}",
//!         Duration::from_secs(5),
//!     )
//!     .unwrap();
//!
//! logger.error("payment gateway unreachable");
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod handler;
pub mod trap;

mod bridge;
mod env;
mod error;
mod format;
mod level;
mod logger;
mod record;

pub use self::bridge::LogBridge;
pub use self::env::check_env;
pub use self::error::Error;
pub use self::error::ErrorKind;
pub use self::format::FormatSpec;
pub use self::format::Formatter;
pub use self::format::TERSE_TEMPLATE;
pub use self::format::VERBOSE_TEMPLATE;
pub use self::level::IntoLevel;
pub use self::level::Level;
pub use self::logger::HandlerId;
pub use self::logger::Logger;
pub use self::logger::get_logger;
pub use self::logger::get_logger_with;
pub use self::record::Record;
