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

//! Configuration values that may come from the environment.

use std::env;
use std::env::VarError;

use crate::Error;

/// Resolve a configuration value that is either given explicitly or read from an environment
/// variable.
///
/// An explicit value wins over the environment. A missing, empty or non-unicode variable is a
/// configuration error naming the variable, but never its value.
///
/// ```
/// let url = loghook::check_env(Some("https://hooks.example.com/T000"), "LOGHOOK_WEBHOOK_URL");
/// assert_eq!(url.unwrap(), "https://hooks.example.com/T000");
/// ```
pub fn check_env(value: Option<&str>, var: &str) -> Result<String, Error> {
    if let Some(value) = value {
        return Ok(value.to_string());
    }

    match env::var(var) {
        Ok(value) if !value.is_empty() => Ok(value),
        Ok(_) => Err(Error::configuration("environment variable is empty").with_context("var", var)),
        Err(VarError::NotPresent) => Err(Error::configuration(
            "no value given and environment variable is not set",
        )
        .with_context("var", var)),
        // the rejected value may be a credential, never attach it
        Err(VarError::NotUnicode(_)) => Err(Error::configuration(
            "environment variable is not valid unicode",
        )
        .with_context("var", var)),
    }
}
