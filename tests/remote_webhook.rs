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

//! End-to-end delivery through the HTTP transport against a mock webhook.

use std::time::Duration;
use std::time::Instant;

use loghook::Logger;
use loghook::handler::RemoteNotifyBuilder;
use loghook::handler::remote::DeliveryMonitor;
use loghook::handler::remote::DeliveryState;
use loghook::trap::FailureLog;
use serde_json::json;
use tokio::runtime::Runtime;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::body_json;
use wiremock::matchers::method;
use wiremock::matchers::path;

struct Harness {
    server: MockServer,
    rt: Runtime,
}

impl Harness {
    fn start() -> Self {
        let rt = Runtime::new().unwrap();
        let server = rt.block_on(MockServer::start());
        Self { server, rt }
    }

    fn mount(&self, mock: Mock) {
        self.rt.block_on(mock.mount(&self.server));
    }

    fn url(&self) -> String {
        format!("{}/services/T000/B000/secret-token", self.server.uri())
    }

    fn requests(&self) -> usize {
        self.rt
            .block_on(self.server.received_requests())
            .map(|requests| requests.len())
            .unwrap_or_default()
    }

    fn logger(&self, builder: RemoteNotifyBuilder) -> (Logger, DeliveryMonitor) {
        let logger = Logger::new("webhook").with_failure_log(FailureLog::silent(16));
        let handler = builder.build().unwrap();
        let monitor = handler.monitor();
        logger.add_handler(handler);
        (logger, monitor)
    }

    fn builder(&self) -> RemoteNotifyBuilder {
        RemoteNotifyBuilder::new(self.url(), "#ops")
            .timeout(Duration::from_secs(2))
            .formatter("{logger_name}:{level}:{message}")
            .base_delay(Duration::from_millis(10))
            .max_delay(Duration::from_millis(50))
            .shutdown_timeout(Duration::from_secs(10))
    }
}

const WEBHOOK_PATH: &str = "/services/T000/B000/secret-token";

#[test]
fn posts_channel_and_text_as_json() {
    let harness = Harness::start();
    harness.mount(
        Mock::given(method("POST"))
            .and(path(WEBHOOK_PATH))
            .and(body_json(json!({
                "channel": "#ops",
                "text": "webhook:ERROR:disk full",
            })))
            .respond_with(ResponseTemplate::new(200)),
    );

    let (logger, monitor) = harness.logger(harness.builder());
    logger.error("disk full");
    logger.flush();

    assert_eq!(harness.requests(), 1);
    let snapshot = monitor.endpoint(0).unwrap();
    assert_eq!(snapshot.successes, 1);
    assert_eq!(snapshot.last_state, Some(DeliveryState::Success));
    assert_eq!(logger.failures().total(), 0);
}

#[test]
fn retries_server_errors() {
    let harness = Harness::start();
    harness.mount(
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1),
    );
    harness.mount(Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)));

    let (logger, monitor) = harness.logger(harness.builder());
    logger.error("bad gateway");
    logger.flush();

    assert_eq!(harness.requests(), 2);
    let snapshot = monitor.endpoint(0).unwrap();
    assert_eq!(snapshot.retryable_failures, 1);
    assert_eq!(snapshot.successes, 1);
}

#[test]
fn honors_retry_after_header() {
    let harness = Harness::start();
    harness.mount(
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
            .up_to_n_times(1),
    );
    harness.mount(Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)));

    let (logger, monitor) = harness.logger(harness.builder());
    let started = Instant::now();
    logger.error("rate limited");
    logger.flush();

    assert!(started.elapsed() >= Duration::from_secs(1));
    assert_eq!(harness.requests(), 2);
    assert_eq!(
        monitor.endpoint(0).unwrap().last_state,
        Some(DeliveryState::Success)
    );
}

#[test]
fn rejection_is_reported_without_the_credential() {
    let harness = Harness::start();
    harness.mount(Mock::given(method("POST")).respond_with(ResponseTemplate::new(404)));

    let (logger, monitor) = harness.logger(harness.builder());
    logger.error("channel_not_found");
    logger.flush();

    assert_eq!(harness.requests(), 1);
    assert_eq!(
        monitor.endpoint(0).unwrap().last_state,
        Some(DeliveryState::TerminalFailure)
    );
    let failure = logger.failures().last().unwrap();
    assert!(failure.message.contains("404"));
    assert!(!failure.message.contains("secret-token"));
}

#[test]
fn slow_webhook_times_out() {
    let harness = Harness::start();
    harness.mount(
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3))),
    );

    let builder = harness
        .builder()
        .timeout(Duration::from_millis(200))
        .max_attempts(1);
    let (logger, monitor) = harness.logger(builder);

    let started = Instant::now();
    logger.error("slow");
    assert!(started.elapsed() < Duration::from_millis(200));
    logger.flush();

    let snapshot = monitor.endpoint(0).unwrap();
    assert_eq!(snapshot.attempts, 1);
    assert_eq!(snapshot.abandoned, 1);
    let failure = logger.failures().last().unwrap();
    assert!(failure.message.contains("retry attempts exhausted"));
    assert!(!failure.message.contains("secret-token"));
}
