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

//! Memoizing builder for composite string keys.
//!
//! Keys are interned: building the same key twice within its lifetime
//! returns the same shared allocation.

use crate::config::KeyCacheConfig;
use crate::locking::identity::ClassId;
use lru::LruCache;
use parking_lot::Mutex;
use std::fmt::{self, Display, Write};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const SEPARATOR: &str = "-";

struct CachedKey {
    key: Arc<str>,
    written_at: Instant,
}

pub struct KeyCache {
    entries: Mutex<LruCache<String, CachedKey>>,
    capacity: NonZeroUsize,
    ttl: Duration,
}

impl KeyCache {
    pub fn new(max_keys: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_keys).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            capacity,
            ttl,
        }
    }

    pub fn from_config(config: &KeyCacheConfig) -> Self {
        Self::new(config.max_keys, config.ttl())
    }

    /// Joins `parts` with the separator: `["a", "b"]` becomes `a-b`.
    pub fn key_of_parts(&self, parts: &[&str]) -> Arc<str> {
        self.intern(parts.join(SEPARATOR))
    }

    /// Prefixes every part with the separator: `[1, 2]` becomes `-1-2`.
    pub fn key_of(&self, parts: &[&dyn Display]) -> Arc<str> {
        self.intern(gen_key(parts))
    }

    /// Scopes [`key_of`](Self::key_of) by the short name of `T`: `Account--1-2`.
    pub fn key_of_class<T: ?Sized + 'static>(&self, parts: &[&dyn Display]) -> Arc<str> {
        let class = ClassId::of::<T>();
        self.intern(format!("{}{SEPARATOR}{}", class.short_name(), gen_key(parts)))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    fn intern(&self, key: String) -> Arc<str> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        if let Some(cached) = entries.get(key.as_str())
            && now.duration_since(cached.written_at) < self.ttl
        {
            return Arc::clone(&cached.key);
        }

        let interned: Arc<str> = Arc::from(key.as_str());
        entries.put(
            key,
            CachedKey {
                key: Arc::clone(&interned),
                written_at: now,
            },
        );
        interned
    }
}

impl Default for KeyCache {
    fn default() -> Self {
        Self::from_config(&KeyCacheConfig::default())
    }
}

impl fmt::Debug for KeyCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Builds an uncached key, prefixing every part with the separator.
pub fn gen_key(parts: &[&dyn Display]) -> String {
    let mut key = String::new();
    for part in parts {
        // Writing into a String cannot fail.
        let _ = write!(key, "{SEPARATOR}{part}");
    }
    key
}
