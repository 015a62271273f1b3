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

use jiff::Timestamp;

use crate::Level;

/// A single log event.
///
/// A record is created by [`Logger`](crate::Logger) once the logger's own level accepts it and is
/// then shared, by reference, with every attached handler. It cannot be modified afterwards.
#[derive(Clone, Debug)]
pub struct Record {
    // the observed time
    time: Timestamp,

    // the metadata
    logger_name: Arc<str>,
    level: Level,

    // the payload
    message: String,

    // structural logging, in the order given by the caller
    fields: Vec<(String, String)>,
}

impl Record {
    /// Create a record observed now, with no structured fields.
    pub fn new(logger_name: impl Into<Arc<str>>, level: Level, message: impl Into<String>) -> Self {
        Self {
            time: Timestamp::now(),
            logger_name: logger_name.into(),
            level,
            message: message.into(),
            fields: vec![],
        }
    }

    /// Replace the observed time.
    pub fn with_time(mut self, time: Timestamp) -> Self {
        self.time = time;
        self
    }

    /// Append one structured field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.fields.push((key.into(), value.to_string()));
        self
    }

    /// The observed time.
    pub fn time(&self) -> Timestamp {
        self.time
    }

    /// The name of the logger that produced this record.
    pub fn logger_name(&self) -> &str {
        &self.logger_name
    }

    /// The severity of the record.
    pub fn level(&self) -> Level {
        self.level
    }

    /// The message body.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The structured fields.
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Look up a structured field by name. The first match wins.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_keep_insertion_order() {
        let record = Record::new("app", Level::Info, "started")
            .with_field("port", 8080)
            .with_field("host", "localhost")
            .with_field("port", 9090);

        let keys: Vec<_> = record.fields().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["port", "host", "port"]);
        assert_eq!(record.field("port"), Some("8080"));
        assert_eq!(record.field("user"), None);
    }
}
