// Copyright 2025 dentsusoken
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

use crate::config::LockingConfig;
use std::time::Duration;

/// How hard a chain lock tries to take one lock before rolling back the pass.
///
/// Each lock gets one immediate attempt followed by `attempts` timed attempts
/// of `wait` each. There is no overall deadline and no growth between passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquirePolicy {
    attempts: u32,
    wait: Duration,
}

impl AcquirePolicy {
    pub const DEFAULT_ATTEMPTS: u32 = 3;
    pub const DEFAULT_WAIT: Duration = Duration::from_millis(5);

    pub fn new(attempts: u32, wait: Duration) -> Self {
        Self { attempts, wait }
    }

    pub fn from_config(config: &LockingConfig) -> Self {
        Self::new(config.retry_attempts, config.retry_wait())
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn wait(&self) -> Duration {
        self.wait
    }

    /// Longest time a single lock is waited for before the pass is abandoned.
    pub fn max_wait_per_lock(&self) -> Duration {
        self.wait.saturating_mul(self.attempts)
    }
}

impl Default for AcquirePolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ATTEMPTS, Self::DEFAULT_WAIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_locking_config() {
        let from_config = AcquirePolicy::from_config(&LockingConfig::default());
        assert_eq!(from_config, AcquirePolicy::default());
        assert_eq!(from_config.attempts(), 3);
        assert_eq!(from_config.wait(), Duration::from_millis(5));
    }

    #[test]
    fn max_wait_scales_with_attempts() {
        let policy = AcquirePolicy::new(4, Duration::from_millis(10));
        assert_eq!(policy.max_wait_per_lock(), Duration::from_millis(40));
        let unbounded = AcquirePolicy::new(u32::MAX, Duration::MAX);
        assert_eq!(unbounded.max_wait_per_lock(), Duration::MAX);
    }
}
