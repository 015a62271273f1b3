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

//! Post errors to a chat-ops webhook read from `LOGHOOK_WEBHOOK_URL`, and forward `log` macros.
//!
//! ```shell
//! LOGHOOK_WEBHOOK_URL=https://hooks.slack.com/services/... cargo run --example webhook
//! ```

use std::time::Duration;

use loghook::Level;
use loghook::handler::RemoteNotifyBuilder;

fn main() -> Result<(), loghook::Error> {
    let logger = loghook::get_logger_with("webhook-demo", true)?;
    if let Err(err) = logger.level_from_env("LOGHOOK_LEVEL") {
        eprintln!("keeping level {}: {err}", logger.level());
    }

    let remote = RemoteNotifyBuilder::from_env("LOGHOOK_WEBHOOK_URL", "#alerts")?
        .level(Level::Error)
        .formatter("*{logger_name}* {level}: {message}")
        .timeout(Duration::from_secs(5))
        .max_attempts(5)
        .build()?;
    let monitor = remote.monitor();
    logger.add_handler(remote);

    logger.clone().install()?;

    log::debug!("starting up");
    log::info!(job = "nightly-export"; "export started");
    log::error!(job = "nightly-export", rows = 0; "export produced no rows");
    logger.critical("giving up on nightly export");

    logger.flush();
    for endpoint in monitor.snapshot() {
        println!("{endpoint:?}");
    }
    for failure in logger.failures().recent() {
        println!("delivery failure: {}", failure.message);
    }
    Ok(())
}
