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

use std::time::Duration;

use rand::Rng;

/// Bounds on how often and for how long a single record is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RetryPolicy {
    /// Send attempts per record, including the first one.
    pub(crate) max_attempts: u32,
    /// Delay before the first retry.
    pub(crate) base_delay: Duration,
    /// Ceiling of any computed delay.
    pub(crate) max_delay: Duration,
    /// A retry that would start later than this after the first attempt is not made.
    pub(crate) max_retry_window: Duration,
}

impl RetryPolicy {
    /// The delay before retry number `retry` (the first retry is `1`).
    ///
    /// Exponential from `base_delay` with up to 10% jitter on top, clamped to
    /// `base_delay..=max_delay`.
    pub(crate) fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        let capped = self
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay);

        let jitter = capped.mul_f64(rand::rng().random_range(0.0..=0.1));
        (capped + jitter).min(self.max_delay).max(self.base_delay)
    }

    pub(crate) fn can_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
