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

use crate::locking::chain::ChainLock;
use log::trace;

/// RAII guard that unlocks a chain lock when dropped.
pub struct ChainGuard<'a> {
    chain: &'a ChainLock,
    released: bool,
}

impl<'a> ChainGuard<'a> {
    pub(crate) fn new(chain: &'a ChainLock) -> Self {
        chain.lock();
        Self {
            chain,
            released: false,
        }
    }

    pub fn chain(&self) -> &ChainLock {
        self.chain
    }

    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.chain.unlock();
        self.released = true;
        trace!("Released chain of {} locks", self.chain.len());
    }
}

impl Drop for ChainGuard<'_> {
    fn drop(&mut self) {
        self.release_inner();
    }
}
