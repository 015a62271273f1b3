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

//! Render records into display strings with a template of named placeholders.
//!
//! A template is literal text interleaved with placeholders written as `{name}`. The built-in
//! names are `timestamp`, `logger_name`, `level` and `message`; structured field names must be
//! declared with [`Formatter::with_fields`]. Use `{{` and `}}` for literal braces.
//!
//! ```
//! use loghook::Formatter;
//! use loghook::Level;
//! use loghook::Record;
//!
//! let formatter = Formatter::new("{level}:{message}").unwrap();
//! let record = Record::new("app", Level::Error, "disk full");
//! assert_eq!(formatter.render(&record).unwrap(), "ERROR:disk full");
//! ```

use std::collections::BTreeSet;
use std::fmt::Write;

use jiff::tz::TimeZone;

use crate::Error;
use crate::Record;

/// The template of [`Formatter::terse`].
pub const TERSE_TEMPLATE: &str = "{message}";

/// The template of [`Formatter::verbose`].
pub const VERBOSE_TEMPLATE: &str = "{timestamp}:{logger_name}:{level}:{message}";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S.%6f%:z";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Timestamp,
    LoggerName,
    Level,
    Message,
    Field(String),
}

/// A parsed template that renders [`Record`]s.
///
/// Rendering is pure: the same record rendered twice by the same formatter yields byte-identical
/// output. Timestamps are rendered as ISO-8601 with microseconds and a numeric offset, in the
/// formatter's time zone (UTC unless [`Formatter::with_time_zone`] says otherwise).
#[derive(Debug, Clone)]
pub struct Formatter {
    template: String,
    segments: Vec<Segment>,
    tz: TimeZone,
}

impl Formatter {
    /// Parse a template that uses only the built-in placeholders.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the template is malformed, and a format error if it names
    /// a placeholder that is neither built-in nor declared.
    pub fn new(template: impl Into<String>) -> Result<Formatter, Error> {
        Formatter::with_fields(template, std::iter::empty::<String>())
    }

    /// Parse a template that may also reference the given structured field names.
    ///
    /// A declared field that is absent from a record renders as an empty string.
    pub fn with_fields<I, S>(template: impl Into<String>, fields: I) -> Result<Formatter, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let template = template.into();
        let declared: BTreeSet<String> = fields.into_iter().map(Into::into).collect();
        let segments = parse(&template, &declared)?;
        Ok(Formatter {
            template,
            segments,
            tz: TimeZone::UTC,
        })
    }

    /// The message-only formatter used by interactive streams.
    pub fn terse() -> Formatter {
        Formatter {
            template: TERSE_TEMPLATE.to_string(),
            segments: vec![Segment::Message],
            tz: TimeZone::UTC,
        }
    }

    /// The `{timestamp}:{logger_name}:{level}:{message}` formatter used by file and audit sinks.
    pub fn verbose() -> Formatter {
        let colon = || Segment::Literal(":".to_string());
        Formatter {
            template: VERBOSE_TEMPLATE.to_string(),
            segments: vec![
                Segment::Timestamp,
                colon(),
                Segment::LoggerName,
                colon(),
                Segment::Level,
                colon(),
                Segment::Message,
            ],
            tz: TimeZone::UTC,
        }
    }

    /// Render timestamps in the given time zone instead of UTC.
    pub fn with_time_zone(mut self, tz: TimeZone) -> Formatter {
        self.tz = tz;
        self
    }

    /// The source template.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Render a record into a display string.
    pub fn render(&self, record: &Record) -> Result<String, Error> {
        let mut text = String::with_capacity(self.template.len() + record.message().len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => text.push_str(s),
                Segment::Timestamp => {
                    let zoned = record.time().to_zoned(self.tz.clone());
                    write!(&mut text, "{}", zoned.strftime(TIMESTAMP_FORMAT)).map_err(|err| {
                        Error::format("failed to render timestamp").with_source(err)
                    })?;
                }
                Segment::LoggerName => text.push_str(record.logger_name()),
                Segment::Level => text.push_str(record.level().as_str()),
                Segment::Message => text.push_str(record.message()),
                Segment::Field(name) => text.push_str(record.field(name).unwrap_or_default()),
            }
        }
        Ok(text)
    }
}

fn parse(template: &str, declared: &BTreeSet<String>) -> Result<Vec<Segment>, Error> {
    let malformed = |message: &str| {
        Error::configuration(format!("malformed template: {message}"))
            .with_context("template", template)
    };

    let mut segments = vec![];
    let mut literal = String::new();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '}' => return Err(malformed("unmatched '}'")),
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') => return Err(malformed("nested '{' in placeholder")),
                        Some(c) => name.push(c),
                        None => return Err(malformed("unclosed '{'")),
                    }
                }
                let name = name.trim();
                if name.is_empty() {
                    return Err(malformed("empty placeholder"));
                }

                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(match name {
                    "timestamp" => Segment::Timestamp,
                    "logger_name" => Segment::LoggerName,
                    "level" => Segment::Level,
                    "message" => Segment::Message,
                    field if declared.contains(field) => Segment::Field(field.to_string()),
                    unknown => {
                        return Err(Error::format(format!("unknown placeholder: {{{unknown}}}"))
                            .with_context("template", template));
                    }
                });
            }
            c => literal.push(c),
        }
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

/// How a handler should obtain its [`Formatter`].
///
/// Either the handler's own default, a literal template, or a prebuilt formatter.
#[derive(Debug, Clone, Default)]
pub enum FormatSpec {
    /// Use the handler's default formatter.
    #[default]
    Default,
    /// Parse this template with the built-in placeholders only.
    Template(String),
    /// Use this formatter as is.
    Formatter(Formatter),
}

impl FormatSpec {
    /// Resolve into a formatter, falling back to `default` for [`FormatSpec::Default`].
    pub fn resolve(self, default: impl FnOnce() -> Formatter) -> Result<Formatter, Error> {
        match self {
            FormatSpec::Default => Ok(default()),
            FormatSpec::Template(template) => Formatter::new(template),
            FormatSpec::Formatter(formatter) => Ok(formatter),
        }
    }
}

impl From<&str> for FormatSpec {
    fn from(template: &str) -> Self {
        FormatSpec::Template(template.to_string())
    }
}

impl From<String> for FormatSpec {
    fn from(template: String) -> Self {
        FormatSpec::Template(template)
    }
}

impl From<Formatter> for FormatSpec {
    fn from(formatter: Formatter) -> Self {
        FormatSpec::Formatter(formatter)
    }
}

impl<T: Into<FormatSpec>> From<Option<T>> for FormatSpec {
    fn from(spec: Option<T>) -> Self {
        spec.map_or(FormatSpec::Default, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;

    use super::*;
    use crate::ErrorKind;
    use crate::Level;

    fn fixed_record() -> Record {
        let time: Timestamp = "2024-03-01T12:30:45.123456Z".parse().unwrap();
        Record::new("billing", Level::Error, "disk full")
            .with_time(time)
            .with_field("user", "alice")
    }

    #[test]
    fn render_level_and_message() {
        let formatter = Formatter::new("{level}:{message}").unwrap();
        assert_eq!(formatter.render(&fixed_record()).unwrap(), "ERROR:disk full");
    }

    #[test]
    fn render_default_templates() {
        let record = fixed_record();
        assert_eq!(Formatter::terse().render(&record).unwrap(), "disk full");
        assert_eq!(
            Formatter::verbose().render(&record).unwrap(),
            "2024-03-01T12:30:45.123456+00:00:billing:ERROR:disk full"
        );
    }

    #[test]
    fn default_templates_match_their_parsed_form() {
        let record = fixed_record();
        let parsed = Formatter::new(VERBOSE_TEMPLATE).unwrap();
        assert_eq!(
            parsed.render(&record).unwrap(),
            Formatter::verbose().render(&record).unwrap()
        );
        let parsed = Formatter::new(TERSE_TEMPLATE).unwrap();
        assert_eq!(
            parsed.render(&record).unwrap(),
            Formatter::terse().render(&record).unwrap()
        );
    }

    #[test]
    fn render_is_idempotent() {
        let record = fixed_record();
        let formatter = Formatter::verbose();
        let first = formatter.render(&record).unwrap();
        let second = formatter.render(&record).unwrap();
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn render_in_other_time_zone() {
        let tz = TimeZone::fixed(jiff::tz::offset(9));
        let formatter = Formatter::new("{timestamp}").unwrap().with_time_zone(tz);
        assert_eq!(
            formatter.render(&fixed_record()).unwrap(),
            "2024-03-01T21:30:45.123456+09:00"
        );
    }

    #[test]
    fn declared_fields_render() {
        let formatter = Formatter::with_fields("[{user}|{tenant}] {message}", ["user", "tenant"])
            .unwrap();
        assert_eq!(
            formatter.render(&fixed_record()).unwrap(),
            "[alice|] disk full"
        );
    }

    #[test]
    fn escaped_braces_are_literal() {
        let formatter = Formatter::new("{{{level}}} }}{{").unwrap();
        assert_eq!(formatter.render(&fixed_record()).unwrap(), "{ERROR} }{");
    }

    #[test]
    fn unknown_placeholder_fails_fast() {
        let err = Formatter::new("{level}:{user}").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(err.to_string().contains("{user}"));
    }

    #[test]
    fn malformed_templates_are_configuration_errors() {
        for template in ["{message", "message}", "{}", "{mes{sage}"] {
            let err = Formatter::new(template).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration, "{template}");
        }
    }

    #[test]
    fn format_spec_resolution() {
        let formatter = FormatSpec::Default.resolve(Formatter::verbose).unwrap();
        assert_eq!(formatter.template(), VERBOSE_TEMPLATE);

        let formatter = FormatSpec::from("{level}").resolve(Formatter::terse).unwrap();
        assert_eq!(formatter.template(), "{level}");

        let formatter = FormatSpec::from(None::<&str>).resolve(Formatter::terse).unwrap();
        assert_eq!(formatter.template(), TERSE_TEMPLATE);

        let err = FormatSpec::from("{nope}").resolve(Formatter::terse).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }
}
