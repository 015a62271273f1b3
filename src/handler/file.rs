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

use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::Error;
use crate::FormatSpec;
use crate::Formatter;
use crate::IntoLevel;
use crate::Level;
use crate::Record;
use crate::handler::Handler;

/// A handler that appends one line per record to a file.
///
/// The file is opened in append mode when the handler is created, and stays open until the
/// handler is dropped, which happens when it is removed from its logger or the logger goes away.
#[derive(Debug)]
pub struct FileHandler {
    path: PathBuf,
    writer: Mutex<File>,
    level: Level,
    formatter: Formatter,
}

impl FileHandler {
    /// Open (or create) `path` for appending.
    ///
    /// Missing parent directories are created. [`FormatSpec::Default`] selects
    /// [`Formatter::verbose`].
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the level or template is invalid, or if the file cannot
    /// be opened.
    pub fn new(
        path: impl Into<PathBuf>,
        level: impl IntoLevel,
        formatter: impl Into<FormatSpec>,
    ) -> Result<FileHandler, Error> {
        let path = path.into();
        let level = level.into_level()?;
        let formatter = formatter.into().resolve(Formatter::verbose)?;
        let file = open_append(&path)?;
        Ok(FileHandler {
            path,
            writer: Mutex::new(file),
            level,
            formatter,
        })
    }

    /// The path this handler appends to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer(&self) -> MutexGuard<'_, File> {
        self.writer.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn open_append(path: &Path) -> Result<File, Error> {
    let open_failed = |message: &str, err: std::io::Error| {
        Error::configuration(message.to_string())
            .with_context("path", path.display())
            .with_source(err)
    };

    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|err| open_failed("failed to create log directory", err))?;
    }
    OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .map_err(|err| open_failed("failed to open log file", err))
}

impl Handler for FileHandler {
    fn level(&self) -> Level {
        self.level
    }

    fn emit(&self, record: &Record) -> Result<(), Error> {
        let mut line = self.formatter.render(record)?;
        line.push('\n');
        let mut writer = self.writer();
        writer
            .write_all(line.as_bytes())
            .and_then(|()| writer.flush())
            .map_err(|err| Error::from_io_error(err).with_context("path", self.path.display()))
    }

    fn flush(&self) -> Result<(), Error> {
        let mut writer = self.writer();
        writer.flush().map_err(Error::from_io_error)
    }
}

impl Drop for FileHandler {
    fn drop(&mut self) {
        let writer = self.writer.get_mut().unwrap_or_else(|e| e.into_inner());
        let _ = writer.flush();
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::ErrorKind;

    #[test]
    fn appends_lines_across_handlers() {
        let dir = TempDir::new().expect("failed to create a temporary directory");
        let path = dir.path().join("nested").join("app.log");

        let handler = FileHandler::new(&path, Level::Debug, "{level}:{message}").unwrap();
        handler
            .emit(&Record::new("app", Level::Debug, "one"))
            .unwrap();
        drop(handler);

        let handler = FileHandler::new(&path, "debug", "{level}:{message}").unwrap();
        handler
            .emit(&Record::new("app", Level::Critical, "two"))
            .unwrap();
        assert_eq!(handler.path(), path.as_path());

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "DEBUG:one\nCRITICAL:two\n");
    }

    #[test]
    fn default_formatter_is_verbose() {
        let dir = TempDir::new().expect("failed to create a temporary directory");
        let path = dir.path().join("audit.log");

        let time = "2024-01-02T03:04:05Z".parse().unwrap();
        let handler = FileHandler::new(&path, Level::Info, FormatSpec::Default).unwrap();
        handler
            .emit(&Record::new("audit", Level::Warning, "low disk").with_time(time))
            .unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "2024-01-02T03:04:05.000000+00:00:audit:WARNING:low disk\n"
        );
    }

    #[test]
    fn unopenable_path_is_a_configuration_error() {
        let dir = TempDir::new().expect("failed to create a temporary directory");
        // a directory cannot be opened for appending
        let err = FileHandler::new(dir.path(), Level::Info, FormatSpec::Default).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
