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
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

/// Mutual-exclusion primitive that a chain lock can hold.
#[cfg_attr(test, mockall::automock)]
pub trait RawLock: Send + Sync {
    /// Takes the lock if it is free, without waiting.
    fn try_lock(&self) -> bool;

    /// Waits up to `timeout` for the lock. `Err` means the wait itself failed.
    fn try_lock_for(&self, timeout: Duration) -> Result<bool>;

    /// Releases one hold of the lock owned by the calling thread.
    fn unlock(&self) -> Result<()>;

    /// Human-readable label used for logging.
    fn label(&self) -> String;
}

#[derive(Debug, Default)]
struct MonitorState {
    owner: Option<ThreadId>,
    holds: usize,
}

impl MonitorState {
    fn try_take(&mut self, me: ThreadId) -> bool {
        match self.owner {
            None => {
                self.owner = Some(me);
                self.holds = 1;
                true
            }
            Some(owner) if owner == me => {
                self.holds += 1;
                true
            }
            Some(_) => false,
        }
    }
}

/// Reentrant lock owned by a thread rather than by a guard.
///
/// A thread that already owns the monitor may take it again; it is released
/// once every hold has been matched by an `unlock`. Unlocking from a thread
/// that does not own it reports [`LockError::NotOwner`] and changes nothing.
pub struct MonitorLock {
    label: String,
    state: Mutex<MonitorState>,
    released: Condvar,
}

impl MonitorLock {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            state: Mutex::new(MonitorState::default()),
            released: Condvar::new(),
        }
    }

    /// Blocks until the calling thread owns the monitor.
    pub fn lock(&self) {
        let me = thread::current().id();
        let mut state = self.state.lock();
        while !state.try_take(me) {
            self.released.wait(&mut state);
        }
    }

    pub fn is_locked(&self) -> bool {
        self.state.lock().owner.is_some()
    }

    pub fn is_held_by_current_thread(&self) -> bool {
        self.state.lock().owner == Some(thread::current().id())
    }

    /// Number of holds the calling thread has on this monitor.
    pub fn hold_count(&self) -> usize {
        let state = self.state.lock();
        if state.owner == Some(thread::current().id()) {
            state.holds
        } else {
            0
        }
    }
}

impl RawLock for MonitorLock {
    fn try_lock(&self) -> bool {
        self.state.lock().try_take(thread::current().id())
    }

    fn try_lock_for(&self, timeout: Duration) -> Result<bool> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if state.try_take(me) {
            return Ok(true);
        }

        let Some(deadline) = Instant::now().checked_add(timeout) else {
            while !state.try_take(me) {
                self.released.wait(&mut state);
            }
            return Ok(true);
        };

        loop {
            let timed_out = self.released.wait_until(&mut state, deadline).timed_out();
            if state.try_take(me) {
                return Ok(true);
            }
            if timed_out {
                return Ok(false);
            }
        }
    }

    fn unlock(&self) -> Result<()> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if state.owner != Some(me) {
            return Err(LockError::NotOwner {
                lock: self.label.clone(),
            });
        }

        state.holds -= 1;
        if state.holds == 0 {
            state.owner = None;
            drop(state);
            self.released.notify_one();
        }
        Ok(())
    }

    fn label(&self) -> String {
        self.label.clone()
    }
}

impl fmt::Debug for MonitorLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MonitorLock")
            .field("label", &self.label)
            .field("owner", &state.owner)
            .field("holds", &state.holds)
            .finish()
    }
}
