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

//! A remote handler behind the global `log` bridge. Lives in its own test binary since the
//! global logger can be installed once per process.

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use loghook::Level;
use loghook::Logger;
use loghook::handler::RemoteNotifyBuilder;
use loghook::handler::remote::Payload;
use loghook::handler::remote::Secret;
use loghook::handler::remote::SendOutcome;
use loghook::handler::remote::Transport;
use loghook::trap::FailureLog;

/// Logs through the `log` crate on every send, the way an HTTP client does.
#[derive(Debug, Clone, Default)]
struct Chatty {
    sends: Arc<AtomicUsize>,
}

impl Transport for Chatty {
    fn send(&self, _: &Secret, payload: &Payload) -> SendOutcome {
        self.sends.fetch_add(1, Ordering::SeqCst);
        log::info!("posting {} chars", payload.text.len());

        // connection pools log from their own runtime threads
        thread::spawn(|| {
            log::debug!(target: "hyper_util::client::legacy::pool", "reuse idle connection");
            log::debug!(target: "reqwest::connect", "starting new connection");
        })
        .join()
        .unwrap();

        SendOutcome::Delivered
    }
}

#[test]
fn deliveries_do_not_feed_back_through_the_log_bridge() {
    let transport = Chatty::default();
    let remote = RemoteNotifyBuilder::new("hook", "#alerts")
        .level(Level::Debug)
        .timeout(Duration::from_secs(1))
        .formatter("{message}")
        .transport(transport.clone())
        .build()
        .unwrap();
    let monitor = remote.monitor();

    let logger = Arc::new(Logger::new("bridged").with_failure_log(FailureLog::silent(64)));
    logger.add_handler(remote);
    logger.clone().install().unwrap();

    logger.error("one record");
    log::warn!("another record");
    logger.flush();

    // give a feedback loop time to show up before counting
    thread::sleep(Duration::from_millis(200));
    logger.flush();

    assert_eq!(transport.sends.load(Ordering::SeqCst), 2);
    let snapshot = monitor.endpoint(0).unwrap();
    assert_eq!(snapshot.attempts, 2);
    assert_eq!(snapshot.successes, 2);
    assert_eq!(snapshot.dropped, 0);
    assert_eq!(logger.failures().total(), 0);
}
