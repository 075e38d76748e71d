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

//! Registry binding live objects to their locks.
//!
//! Locks are grouped per class. Each class owns one tie-break lock for the
//! lifetime of its registration and a map from object address to that
//! object's lock. The map only keeps `Weak` handles to the objects, so the
//! registry never keeps an object alive; entries whose object is gone are
//! replaced on lookup and swept as the map grows.

use crate::config::LockingConfig;
use crate::error::Result;
use crate::locking::identity::{ClassId, IdentityKey};
use crate::locking::primitive::{MonitorLock, RawLock};
use crate::locking::target::LockTarget;
use log::{debug, trace, warn};
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

pub const DEFAULT_MAX_CLASSES: usize = 1000;

/// Live entry count at which a class map is first swept for dead objects.
const MIN_SWEEP_THRESHOLD: usize = 64;

/// The lock bound to one live object instance.
pub struct ObjectLock {
    class: ClassId,
    key: IdentityKey,
    monitor: MonitorLock,
}

impl ObjectLock {
    fn new(class: ClassId, key: IdentityKey) -> Self {
        let monitor = MonitorLock::new(format!("{}#{key}", class.short_name()));
        Self {
            class,
            key,
            monitor,
        }
    }

    pub fn class(&self) -> ClassId {
        self.class
    }

    pub fn key(&self) -> &IdentityKey {
        &self.key
    }

    /// Two object locks tie when they belong to one class and share a key.
    pub fn is_tie(&self, other: &ObjectLock) -> bool {
        self.class == other.class && self.key == other.key
    }

    pub fn monitor(&self) -> &MonitorLock {
        &self.monitor
    }
}

impl RawLock for ObjectLock {
    fn try_lock(&self) -> bool {
        self.monitor.try_lock()
    }

    fn try_lock_for(&self, timeout: Duration) -> Result<bool> {
        self.monitor.try_lock_for(timeout)
    }

    fn unlock(&self) -> Result<()> {
        self.monitor.unlock()
    }

    fn label(&self) -> String {
        self.monitor.label()
    }
}

impl fmt::Debug for ObjectLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectLock")
            .field("class", &self.class.name())
            .field("key", &self.key)
            .finish()
    }
}

struct Entry {
    object: Weak<dyn Any + Send + Sync>,
    lock: Arc<ObjectLock>,
}

impl Entry {
    fn is_alive(&self) -> bool {
        self.object.strong_count() > 0
    }

    fn belongs_to(&self, target: &LockTarget) -> bool {
        self.is_alive() && Weak::as_ptr(&self.object) as *const () as usize == target.address()
    }
}

#[derive(Default)]
struct ClassEntries {
    by_address: HashMap<usize, Entry>,
    /// Addresses of entries sharing each key, used to find tied instances.
    by_key: HashMap<IdentityKey, Vec<usize>>,
}

impl ClassEntries {
    fn insert(&mut self, address: usize, entry: Entry) {
        let key = entry.lock.key().clone();
        if let Some(previous) = self.by_address.insert(address, entry) {
            self.unindex(previous.lock.key(), address);
        }
        self.by_key.entry(key).or_default().push(address);
    }

    fn unindex(&mut self, key: &IdentityKey, address: usize) {
        if let Some(addresses) = self.by_key.get_mut(key) {
            addresses.retain(|a| *a != address);
            if addresses.is_empty() {
                self.by_key.remove(key);
            }
        }
    }

    fn sweep(&mut self) -> usize {
        let dead: Vec<(usize, IdentityKey)> = self
            .by_address
            .iter()
            .filter(|(_, entry)| !entry.is_alive())
            .map(|(address, entry)| (*address, entry.lock.key().clone()))
            .collect();

        for (address, key) in &dead {
            self.by_address.remove(address);
            self.unindex(key, *address);
        }
        dead.len()
    }

    fn has_live_twin(&self, lock: &ObjectLock) -> bool {
        self.by_key.get(lock.key()).is_some_and(|addresses| {
            addresses.iter().any(|address| {
                self.by_address.get(address).is_some_and(|entry| {
                    entry.is_alive() && !std::ptr::eq(Arc::as_ptr(&entry.lock), lock)
                })
            })
        })
    }

    fn live_count(&self) -> usize {
        self.by_address.values().filter(|e| e.is_alive()).count()
    }
}

/// Locks of every live instance of one class plus the class tie-break lock.
struct ClassLocks {
    class: ClassId,
    tie_lock: Arc<MonitorLock>,
    entries: RwLock<ClassEntries>,
    sweep_threshold: AtomicUsize,
}

impl ClassLocks {
    fn new(class: ClassId) -> Self {
        Self {
            class,
            tie_lock: Arc::new(MonitorLock::new(format!(
                "tie-break:{}",
                class.short_name()
            ))),
            entries: RwLock::new(ClassEntries::default()),
            sweep_threshold: AtomicUsize::new(MIN_SWEEP_THRESHOLD),
        }
    }

    fn lock_for(&self, target: &LockTarget) -> Arc<ObjectLock> {
        if let Some(entry) = self.entries.read().by_address.get(&target.address())
            && entry.belongs_to(target)
        {
            return Arc::clone(&entry.lock);
        }

        let mut entries = self.entries.write();
        // Another thread may have created the entry while we waited for the write lock.
        if let Some(entry) = entries.by_address.get(&target.address()) {
            if entry.belongs_to(target) {
                return Arc::clone(&entry.lock);
            }
            debug!(
                "Replacing stale lock entry for {} at {:#x}",
                self.class,
                target.address()
            );
        }

        let lock = Arc::new(ObjectLock::new(self.class, target.key().clone()));
        entries.insert(
            target.address(),
            Entry {
                object: target.downgrade(),
                lock: Arc::clone(&lock),
            },
        );
        trace!(
            "Created {} ({} entries)",
            lock.label(),
            entries.by_address.len()
        );

        if entries.by_address.len() >= self.sweep_threshold.load(Ordering::Relaxed) {
            let reclaimed = entries.sweep();
            let next = (entries.by_address.len() * 2).max(MIN_SWEEP_THRESHOLD);
            self.sweep_threshold.store(next, Ordering::Relaxed);
            if reclaimed > 0 {
                debug!(
                    "Reclaimed {reclaimed} dead lock entries for {}; next sweep at {next}",
                    self.class
                );
            }
        }

        lock
    }

    fn has_live_twin(&self, lock: &ObjectLock) -> bool {
        self.entries.read().has_live_twin(lock)
    }

    fn live_count(&self) -> usize {
        self.entries.read().live_count()
    }

    fn purge(&self) -> usize {
        self.entries.write().sweep()
    }

    /// No live objects and nobody outside the registry holds the tie-break lock.
    fn is_idle(&self) -> bool {
        Arc::strong_count(&self.tie_lock) == 1 && self.live_count() == 0
    }
}

/// Maps live objects to their object locks and classes to their tie-break locks.
///
/// One registry is meant to be shared by every coordinator in a process; two
/// registries hand out unrelated locks for the same object.
pub struct LockRegistry {
    classes: RwLock<HashMap<ClassId, Arc<ClassLocks>>>,
    max_classes: usize,
}

impl LockRegistry {
    pub fn new(max_classes: usize) -> Self {
        Self {
            classes: RwLock::new(HashMap::new()),
            max_classes: max_classes.max(1),
        }
    }

    pub fn from_config(config: &LockingConfig) -> Self {
        Self::new(config.max_classes)
    }

    pub fn max_classes(&self) -> usize {
        self.max_classes
    }

    /// Returns the lock of `target`, creating it on first use.
    ///
    /// Repeated lookups for one live instance return the same lock. A new
    /// instance never receives the lock of a dropped one, even when their
    /// identity keys or addresses coincide.
    pub fn object_lock(&self, target: &LockTarget) -> Arc<ObjectLock> {
        self.class_locks(target.class()).lock_for(target)
    }

    /// Returns the tie-break lock shared by every instance of `class`.
    pub fn tie_lock(&self, class: ClassId) -> Arc<MonitorLock> {
        Arc::clone(&self.class_locks(class).tie_lock)
    }

    /// Whether another live instance of the lock's class shares its identity key.
    pub fn has_live_twin(&self, lock: &ObjectLock) -> bool {
        self.classes
            .read()
            .get(&lock.class())
            .is_some_and(|locks| locks.has_live_twin(lock))
    }

    /// Number of tracked objects of `class` that are still alive.
    pub fn live_count(&self, class: ClassId) -> usize {
        self.classes
            .read()
            .get(&class)
            .map(|locks| locks.live_count())
            .unwrap_or(0)
    }

    pub fn class_count(&self) -> usize {
        self.classes.read().len()
    }

    pub fn is_registered(&self, class: ClassId) -> bool {
        self.classes.read().contains_key(&class)
    }

    /// Drops entries of objects that no longer exist. Returns how many were reclaimed.
    pub fn purge(&self) -> usize {
        let classes: Vec<Arc<ClassLocks>> = self.classes.read().values().cloned().collect();
        let reclaimed: usize = classes.iter().map(|locks| locks.purge()).sum();
        if reclaimed > 0 {
            debug!("Purged {reclaimed} dead lock entries");
        }
        reclaimed
    }

    fn class_locks(&self, class: ClassId) -> Arc<ClassLocks> {
        if let Some(locks) = self.classes.read().get(&class) {
            return Arc::clone(locks);
        }

        let mut classes = self.classes.write();
        if let Some(locks) = classes.get(&class) {
            return Arc::clone(locks);
        }

        if classes.len() >= self.max_classes {
            evict_idle(&mut classes, self.max_classes);
            if classes.len() >= self.max_classes {
                warn!(
                    "Lock registry tracks {} classes (limit {}) and none is idle; registering {} \
                     anyway",
                    classes.len(),
                    self.max_classes,
                    class.name()
                );
            }
        }

        let locks = Arc::new(ClassLocks::new(class));
        classes.insert(class, Arc::clone(&locks));
        debug!("Registered lock holder for {}", class.name());
        locks
    }
}

/// Removes idle classes until there is room for one more.
fn evict_idle(classes: &mut HashMap<ClassId, Arc<ClassLocks>>, max_classes: usize) {
    let idle: Vec<ClassId> = classes
        .iter()
        .filter(|(_, locks)| Arc::strong_count(locks) == 1 && locks.is_idle())
        .map(|(class, _)| *class)
        .collect();

    for class in idle {
        if classes.len() < max_classes {
            break;
        }
        classes.remove(&class);
        debug!("Evicted idle lock holder for {}", class.name());
    }
}

impl Default for LockRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CLASSES)
    }
}

impl fmt::Debug for LockRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockRegistry")
            .field("classes", &self.class_count())
            .field("max_classes", &self.max_classes)
            .finish()
    }
}
