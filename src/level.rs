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
use std::str::FromStr;

use crate::Error;

/// The severity of a log record.
///
/// Levels are totally ordered, from the least severe [`Level::Debug`] to the most severe
/// [`Level::Critical`]. A record passes a threshold when `record.level() >= threshold`.
#[repr(u8)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Level {
    /// Designates lower priority information.
    Debug = 10,
    /// Designates useful information.
    Info = 20,
    /// Designates hazardous situations.
    Warning = 30,
    /// Designates very serious errors.
    Error = 40,
    /// Designates errors the application may not survive.
    Critical = 50,
}

impl Level {
    /// All levels, from the least to the most severe.
    pub const ALL: [Level; 5] = [
        Level::Debug,
        Level::Info,
        Level::Warning,
        Level::Error,
        Level::Critical,
    ];

    /// Return the string representation of the `Level`.
    ///
    /// This returns the same string as the `fmt::Display` implementation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        }
    }

    pub(crate) fn from_u8(value: u8) -> Level {
        match value {
            v if v >= Level::Critical as u8 => Level::Critical,
            v if v >= Level::Error as u8 => Level::Error,
            v if v >= Level::Warning as u8 => Level::Warning,
            v if v >= Level::Info as u8 => Level::Info,
            _ => Level::Debug,
        }
    }
}

impl fmt::Debug for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Level {
    type Err = Error;

    fn from_str(s: &str) -> Result<Level, Self::Err> {
        for (name, level) in [
            ("debug", Level::Debug),
            ("info", Level::Info),
            ("warning", Level::Warning),
            ("warn", Level::Warning),
            ("error", Level::Error),
            ("critical", Level::Critical),
            ("fatal", Level::Critical),
        ] {
            if s.eq_ignore_ascii_case(name) {
                return Ok(level);
            }
        }

        Err(Error::configuration(format!("malformed level: {s:?}")))
    }
}

/// A value that names a [`Level`].
///
/// Implemented for [`Level`] itself and for level names, so that every setup API accepts either.
/// Conversion from a name fails with a configuration error, which surfaces when the handler or
/// logger is built rather than when a record is logged.
pub trait IntoLevel {
    /// Resolve into a [`Level`].
    fn into_level(self) -> Result<Level, Error>;
}

impl IntoLevel for Level {
    fn into_level(self) -> Result<Level, Error> {
        Ok(self)
    }
}

impl IntoLevel for &str {
    fn into_level(self) -> Result<Level, Error> {
        self.parse()
    }
}

impl IntoLevel for &String {
    fn into_level(self) -> Result<Level, Error> {
        self.parse()
    }
}

impl IntoLevel for String {
    fn into_level(self) -> Result<Level, Error> {
        self.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn levels_are_totally_ordered() {
        for pair in Level::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn parse_level_names() {
        assert_eq!("debug".parse::<Level>().unwrap(), Level::Debug);
        assert_eq!("INFO".parse::<Level>().unwrap(), Level::Info);
        assert_eq!("Warning".parse::<Level>().unwrap(), Level::Warning);
        assert_eq!("warn".parse::<Level>().unwrap(), Level::Warning);
        assert_eq!("error".parse::<Level>().unwrap(), Level::Error);
        assert_eq!("CRITICAL".parse::<Level>().unwrap(), Level::Critical);
        assert_eq!("fatal".parse::<Level>().unwrap(), Level::Critical);

        let err = "verbose".parse::<Level>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn round_trip_through_u8() {
        for level in Level::ALL {
            assert_eq!(Level::from_u8(level as u8), level);
        }
    }

    #[test]
    fn display_pads() {
        assert_eq!(format!("{:>7}", Level::Info), "   INFO");
    }
}
