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

//! A process-wide registry of loggers by name.
//!
//! A logger is created on its first lookup and lives until the process exits.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::OnceLock;

use crate::Error;
use crate::Logger;

fn registry() -> &'static Mutex<HashMap<String, Arc<Logger>>> {
    static REGISTRY: OnceLock<Mutex<HashMap<String, Arc<Logger>>>> = OnceLock::new();
    REGISTRY.get_or_init(Default::default)
}

/// Look up the logger named `name`, creating it without handlers on first use.
///
/// # Examples
///
/// ```
/// let a = loghook::get_logger("payments");
/// let b = loghook::get_logger("payments");
/// assert!(std::sync::Arc::ptr_eq(&a, &b));
/// ```
pub fn get_logger(name: &str) -> Arc<Logger> {
    let mut loggers = registry().lock().unwrap_or_else(|e| e.into_inner());
    loggers
        .entry(name.to_string())
        .or_insert_with(|| Arc::new(Logger::new(name)))
        .clone()
}

/// Look up the logger named `name`, creating it on first use.
///
/// If the logger is created by this call and `enable_output` is set, the default handlers of
/// [`Logger::with_default_handlers`] are attached. A logger that already exists is returned as is.
///
/// # Errors
///
/// Returns an error if the default handlers cannot be created; nothing is registered then.
pub fn get_logger_with(name: &str, enable_output: bool) -> Result<Arc<Logger>, Error> {
    let mut loggers = registry().lock().unwrap_or_else(|e| e.into_inner());
    if let Some(logger) = loggers.get(name) {
        return Ok(logger.clone());
    }

    let logger = if enable_output {
        Logger::with_default_handlers(name)?
    } else {
        Logger::new(name)
    };
    let logger = Arc::new(logger);
    loggers.insert(name.to_string(), logger.clone());
    Ok(logger)
}
