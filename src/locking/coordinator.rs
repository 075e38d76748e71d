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

//! Builds deadlock-free chain locks for arbitrary sets of objects.
//!
//! Locks are ordered by identity key, then by class. Objects of one class whose
//! keys coincide have no such order; the class tie-break lock is taken right
//! before the first of them, so at most one chain at a time orders them.
//!
//! The tie-break lock sits at the key position of its run, so two chains can
//! take it and a differently keyed object lock in opposite order. A wait cycle
//! formed that way is broken by the chain's timed attempts and full rollback;
//! it costs restarts, never a permanent deadlock.

use crate::config::ChainLockConfig;
use crate::error::{LockError, Result};
use crate::locking::chain::ChainLock;
use crate::locking::identity::ClassId;
use crate::locking::policy::AcquirePolicy;
use crate::locking::primitive::{MonitorLock, RawLock};
use crate::locking::registry::{LockRegistry, ObjectLock};
use crate::locking::target::LockTarget;
use log::trace;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// One position in a canonical acquisition order.
#[derive(Clone)]
pub enum PlanStep {
    TieBreak {
        class: ClassId,
        lock: Arc<MonitorLock>,
    },
    Object(Arc<ObjectLock>),
}

impl PlanStep {
    pub fn is_tie_break(&self) -> bool {
        matches!(self, PlanStep::TieBreak { .. })
    }

    pub fn class(&self) -> ClassId {
        match self {
            PlanStep::TieBreak { class, .. } => *class,
            PlanStep::Object(lock) => lock.class(),
        }
    }

    pub fn label(&self) -> String {
        match self {
            PlanStep::TieBreak { lock, .. } => lock.label(),
            PlanStep::Object(lock) => lock.label(),
        }
    }

    pub fn into_raw(self) -> Arc<dyn RawLock> {
        match self {
            PlanStep::TieBreak { lock, .. } => lock,
            PlanStep::Object(lock) => lock,
        }
    }
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl fmt::Debug for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanStep::TieBreak { class, .. } => write!(f, "TieBreak({})", class.name()),
            PlanStep::Object(lock) => write!(f, "Object({})", lock.label()),
        }
    }
}

/// Resolves object sets into canonically ordered chain locks.
#[derive(Debug, Clone)]
pub struct LockCoordinator {
    registry: Arc<LockRegistry>,
    policy: AcquirePolicy,
}

impl LockCoordinator {
    pub fn new(registry: Arc<LockRegistry>, policy: AcquirePolicy) -> Self {
        Self { registry, policy }
    }

    pub fn from_config(config: &ChainLockConfig) -> Self {
        Self::new(
            Arc::new(LockRegistry::from_config(&config.locking)),
            AcquirePolicy::from_config(&config.locking),
        )
    }

    pub fn registry(&self) -> &Arc<LockRegistry> {
        &self.registry
    }

    pub fn policy(&self) -> AcquirePolicy {
        self.policy
    }

    /// Builds a chain lock covering every target.
    ///
    /// Fails with [`LockError::EmptyChain`] when `targets` is empty; nothing is
    /// locked by this call.
    pub fn acquire(&self, targets: &[LockTarget]) -> Result<ChainLock> {
        self.build(targets.iter())
    }

    /// Like [`acquire`](Self::acquire), skipping absent entries.
    pub fn acquire_optional(&self, targets: &[Option<LockTarget>]) -> Result<ChainLock> {
        self.build(targets.iter().flatten())
    }

    /// Returns the order in which a chain for `targets` would take its locks.
    pub fn plan(&self, targets: &[LockTarget]) -> Vec<PlanStep> {
        self.resolve(targets.iter())
    }

    fn build<'a>(&self, targets: impl Iterator<Item = &'a LockTarget>) -> Result<ChainLock> {
        let steps = self.resolve(targets);
        if steps.is_empty() {
            return Err(LockError::EmptyChain);
        }
        trace!(
            "Chain order: {}",
            steps
                .iter()
                .map(PlanStep::label)
                .collect::<Vec<_>>()
                .join(", ")
        );
        ChainLock::new(
            steps.into_iter().map(PlanStep::into_raw).collect(),
            self.policy,
        )
    }

    fn resolve<'a>(&self, targets: impl Iterator<Item = &'a LockTarget>) -> Vec<PlanStep> {
        let mut seen = HashSet::new();
        let mut locks: Vec<Arc<ObjectLock>> = targets
            .filter(|target| seen.insert(target.address()))
            .map(|target| self.registry.object_lock(target))
            .collect();

        // Stable sort: tied locks keep their input order, which the tie-break lock makes irrelevant.
        locks.sort_by(|a, b| a.key().cmp(b.key()).then_with(|| a.class().cmp(&b.class())));

        let tie_starts = self.tie_run_starts(&locks);

        let mut steps = Vec::with_capacity(locks.len() + tie_starts.len());
        for (index, lock) in locks.into_iter().enumerate() {
            if tie_starts.contains(&index) {
                let class = lock.class();
                steps.push(PlanStep::TieBreak {
                    class,
                    lock: self.registry.tie_lock(class),
                });
            }
            steps.push(PlanStep::Object(lock));
        }
        steps
    }

    /// Indices where a run of tied locks starts, keeping the first run of each class.
    ///
    /// A run of one lock is tied when another live instance of its class
    /// shares its key, even if that instance is not part of this chain. Later
    /// runs of a class are covered by the tie-break lock taken before the
    /// first one, so a chain never holds the same lock twice.
    fn tie_run_starts(&self, locks: &[Arc<ObjectLock>]) -> Vec<usize> {
        let mut starts = Vec::new();
        let mut classes = HashSet::new();
        let mut run_start = 0;

        while run_start < locks.len() {
            let mut run_end = run_start + 1;
            while run_end < locks.len() && locks[run_start].is_tie(&locks[run_end]) {
                run_end += 1;
            }

            let tied = run_end - run_start > 1 || self.registry.has_live_twin(&locks[run_start]);
            if tied && classes.insert(locks[run_start].class()) {
                starts.push(run_start);
            }
            run_start = run_end;
        }
        starts
    }
}

impl Default for LockCoordinator {
    fn default() -> Self {
        Self::new(Arc::new(LockRegistry::default()), AcquirePolicy::default())
    }
}
