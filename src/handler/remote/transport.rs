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
use std::sync::Mutex;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::header::RETRY_AFTER;
use serde::Serialize;

use crate::handler::remote::Secret;

/// The JSON body posted to a chat-ops webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Payload {
    /// The target channel identifier.
    pub channel: String,
    /// The rendered, possibly truncated, record.
    pub text: String,
}

/// What happened to a single send attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The remote answered with a 2xx status.
    Delivered,
    /// The request never got an answer: connection refused, DNS failure, timeout.
    Network(String),
    /// The remote answered with a non-2xx status.
    Status {
        /// The HTTP status code.
        code: u16,
        /// The delay requested by a `Retry-After` header, if any.
        retry_after: Option<Duration>,
    },
    /// The request could not even be built, e.g. the endpoint is not a valid URL.
    Rejected(String),
}

/// How the delivery loop must react to a [`SendOutcome`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Verdict {
    Success,
    Retryable {
        reason: String,
        retry_after: Option<Duration>,
    },
    Terminal {
        reason: String,
    },
}

impl SendOutcome {
    pub(crate) fn verdict(self) -> Verdict {
        match self {
            SendOutcome::Delivered => Verdict::Success,
            SendOutcome::Network(reason) => Verdict::Retryable {
                reason,
                retry_after: None,
            },
            SendOutcome::Status { code, retry_after } if code == 429 => Verdict::Retryable {
                reason: "rate limited (429)".to_string(),
                retry_after,
            },
            SendOutcome::Status { code, .. } if (200..300).contains(&code) => Verdict::Success,
            SendOutcome::Status { code, retry_after } if code >= 500 => Verdict::Retryable {
                reason: format!("server error ({code})"),
                retry_after,
            },
            SendOutcome::Status { code, .. } => Verdict::Terminal {
                reason: format!("rejected by remote ({code})"),
            },
            SendOutcome::Rejected(reason) => Verdict::Terminal { reason },
        }
    }
}

/// Performs one outbound request per call.
///
/// Implementations must return within a bounded time; [`HttpTransport`] enforces the timeout the
/// handler was built with.
pub trait Transport: fmt::Debug + Send + Sync + 'static {
    /// Send one payload to one endpoint.
    fn send(&self, endpoint: &Secret, payload: &Payload) -> SendOutcome;
}

/// A [`Transport`] posting JSON with a blocking `reqwest` client.
///
/// The client is built on first use, which happens on a delivery thread.
pub struct HttpTransport {
    timeout: Duration,
    client: Mutex<Option<Client>>,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Create a transport whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            client: Mutex::new(None),
        }
    }

    fn client(&self) -> Result<Client, reqwest::Error> {
        let mut client = self.client.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(client) = client.as_ref() {
            return Ok(client.clone());
        }
        let built = Client::builder().timeout(self.timeout).build()?;
        *client = Some(built.clone());
        Ok(built)
    }
}

impl Transport for HttpTransport {
    fn send(&self, endpoint: &Secret, payload: &Payload) -> SendOutcome {
        let client = match self.client() {
            Ok(client) => client,
            Err(err) => return SendOutcome::Rejected(err.without_url().to_string()),
        };

        let body = match serde_json::to_vec(payload) {
            Ok(body) => body,
            Err(err) => return SendOutcome::Rejected(format!("cannot encode payload: {err}")),
        };

        let request = client
            .post(endpoint.expose())
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        match request.send() {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return SendOutcome::Delivered;
                }
                SendOutcome::Status {
                    code: status.as_u16(),
                    retry_after: retry_after(&response, status),
                }
            }
            // never render the endpoint, it carries the credential
            Err(err) if err.is_builder() => SendOutcome::Rejected(err.without_url().to_string()),
            Err(err) => SendOutcome::Network(err.without_url().to_string()),
        }
    }
}

fn retry_after(response: &reqwest::blocking::Response, status: StatusCode) -> Option<Duration> {
    if status != StatusCode::TOO_MANY_REQUESTS && !status.is_server_error() {
        return None;
    }
    let value = response.headers().get(RETRY_AFTER)?.to_str().ok()?;
    let seconds = value.trim().parse::<u64>().ok()?;
    Some(Duration::from_secs(seconds))
}
