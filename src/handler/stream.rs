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

use std::fmt;
use std::io;
use std::io::Write;
use std::sync::Mutex;

use crate::Error;
use crate::FormatSpec;
use crate::Formatter;
use crate::IntoLevel;
use crate::Level;
use crate::Record;
use crate::handler::Handler;

/// The destination of a [`StreamHandler`].
pub enum Stream {
    /// The process standard output.
    Stdout,
    /// The process standard error.
    Stderr,
    /// Any in-process writer.
    Writer(Mutex<Box<dyn Write + Send>>),
}

impl Stream {
    /// Wrap an in-process writer.
    pub fn writer(writer: impl Write + Send + 'static) -> Stream {
        Stream::Writer(Mutex::new(Box::new(writer)))
    }

    fn write_line(&self, line: &[u8]) -> io::Result<()> {
        match self {
            Stream::Stdout => {
                let mut stdout = io::stdout().lock();
                stdout.write_all(line)?;
                stdout.flush()
            }
            Stream::Stderr => {
                let mut stderr = io::stderr().lock();
                stderr.write_all(line)?;
                stderr.flush()
            }
            Stream::Writer(writer) => {
                let mut writer = writer.lock().unwrap_or_else(|e| e.into_inner());
                writer.write_all(line)?;
                writer.flush()
            }
        }
    }

    fn flush(&self) -> io::Result<()> {
        match self {
            Stream::Stdout => io::stdout().flush(),
            Stream::Stderr => io::stderr().flush(),
            Stream::Writer(writer) => writer.lock().unwrap_or_else(|e| e.into_inner()).flush(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Stream::Stdout => "stdout",
            Stream::Stderr => "stderr",
            Stream::Writer(_) => "writer",
        }
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stream::{}", self.name())
    }
}

/// A handler that writes one line per record to a [`Stream`], flushing after each record.
///
/// # Examples
///
/// ```
/// use loghook::Level;
/// use loghook::handler::Stream;
/// use loghook::handler::StreamHandler;
///
/// let handler = StreamHandler::new(Stream::Stderr, Level::Warning, "{level}: {message}").unwrap();
/// ```
#[derive(Debug)]
pub struct StreamHandler {
    stream: Stream,
    level: Level,
    formatter: Formatter,
}

impl StreamHandler {
    /// Create a stream handler.
    ///
    /// [`FormatSpec::Default`] selects [`Formatter::terse`].
    ///
    /// # Errors
    ///
    /// Returns an error if the level name is unknown or the template is invalid.
    pub fn new(
        stream: Stream,
        level: impl IntoLevel,
        formatter: impl Into<FormatSpec>,
    ) -> Result<StreamHandler, Error> {
        Ok(StreamHandler {
            stream,
            level: level.into_level()?,
            formatter: formatter.into().resolve(Formatter::terse)?,
        })
    }

    /// The standard output handler attached by default: `INFO`, message only.
    pub fn stdout() -> StreamHandler {
        StreamHandler {
            stream: Stream::Stdout,
            level: Level::Info,
            formatter: Formatter::terse(),
        }
    }
}

impl Handler for StreamHandler {
    fn level(&self) -> Level {
        self.level
    }

    fn emit(&self, record: &Record) -> Result<(), Error> {
        let mut line = self.formatter.render(record)?;
        line.push('\n');
        self.stream.write_line(line.as_bytes()).map_err(|err| {
            Error::from_io_error(err).with_context("stream", self.stream.name())
        })
    }

    fn flush(&self) -> Result<(), Error> {
        self.stream.flush().map_err(Error::from_io_error)
    }
}
