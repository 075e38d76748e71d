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

use crate::error::{LockError, Result};
use crate::locking::guard::ChainGuard;
use crate::locking::policy::AcquirePolicy;
use crate::locking::primitive::RawLock;
use log::{debug, trace};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Ordered group of locks taken and released as one unit.
///
/// `lock` takes every lock in list order. When one of them stays unavailable
/// for the whole retry budget, every lock taken in that pass is released and
/// the pass starts over from the first lock, so callers never observe a
/// partially held chain.
pub struct ChainLock {
    locks: Vec<Arc<dyn RawLock>>,
    policy: AcquirePolicy,
    restarts: AtomicUsize,
}

impl ChainLock {
    pub fn new(locks: Vec<Arc<dyn RawLock>>, policy: AcquirePolicy) -> Result<Self> {
        if locks.is_empty() {
            return Err(LockError::EmptyChain);
        }
        Ok(Self {
            locks,
            policy,
            restarts: AtomicUsize::new(0),
        })
    }

    /// Blocks until every lock in the chain is held by the calling thread.
    ///
    /// Under sustained contention this can retry indefinitely.
    pub fn lock(&self) {
        let mut restarts = 0usize;
        while let Err(failed_at) = self.lock_pass() {
            restarts += 1;
            trace!(
                "Chain pass {restarts} abandoned at {} ({}/{})",
                self.locks[failed_at].label(),
                failed_at + 1,
                self.locks.len()
            );
        }

        if restarts > 0 {
            debug!(
                "Acquired chain of {} locks after {restarts} restarts",
                self.locks.len()
            );
        }
        self.restarts.store(restarts, Ordering::Relaxed);
    }

    /// Releases every lock in list order. Release failures are logged and skipped.
    ///
    /// Safe to call when `lock` never completed, and safe to call twice. Locks
    /// are reentrant, so on a chain this thread does not hold it can release
    /// holds the thread took through another chain over the same locks.
    pub fn unlock(&self) {
        self.release_prefix(self.locks.len());
    }

    /// Locks the chain and returns a guard that unlocks it when dropped.
    pub fn lock_scoped(&self) -> ChainGuard<'_> {
        ChainGuard::new(self)
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    pub fn labels(&self) -> Vec<String> {
        self.locks.iter().map(|lock| lock.label()).collect()
    }

    pub fn locks(&self) -> &[Arc<dyn RawLock>] {
        &self.locks
    }

    pub fn policy(&self) -> AcquirePolicy {
        self.policy
    }

    /// Restarts needed by the most recent completed `lock` call.
    pub fn restarts(&self) -> usize {
        self.restarts.load(Ordering::Relaxed)
    }

    /// Tries to take every lock once in order. On failure returns the index of
    /// the lock that could not be taken, after releasing the ones before it.
    fn lock_pass(&self) -> std::result::Result<(), usize> {
        for (index, lock) in self.locks.iter().enumerate() {
            if !self.acquire_one(lock.as_ref()) {
                self.release_prefix(index);
                return Err(index);
            }
        }
        Ok(())
    }

    fn acquire_one(&self, lock: &dyn RawLock) -> bool {
        if lock.try_lock() {
            return true;
        }

        for _ in 0..self.policy.attempts() {
            match lock.try_lock_for(self.policy.wait()) {
                Ok(true) => return true,
                Ok(false) => {}
                Err(err) => {
                    debug!("Waiting for {} failed: {err}", lock.label());
                    return false;
                }
            }
        }
        false
    }

    fn release_prefix(&self, end: usize) {
        let end = end.min(self.locks.len());
        for lock in &self.locks[..end] {
            if let Err(err) = lock.unlock() {
                debug!("Ignoring release failure for {}: {err}", lock.label());
            }
        }
    }
}

impl fmt::Debug for ChainLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainLock")
            .field("locks", &self.labels())
            .field("policy", &self.policy)
            .finish()
    }
}
