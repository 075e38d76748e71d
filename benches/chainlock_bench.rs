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

use chainlock::key_cache::KeyCache;
use chainlock::locking::{DomainId, Identity, LockCoordinator, LockTarget};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::fmt::Display;
use std::sync::Arc;

struct Account {
    id: i64,
}

impl Identity for Account {
    fn identity(&self) -> Option<DomainId> {
        Some(DomainId::Int(self.id))
    }
}

fn accounts(count: usize, tie_every: i64) -> Vec<Arc<Account>> {
    (0..count as i64)
        .map(|i| Arc::new(Account { id: i % tie_every }))
        .collect()
}

fn benchmark_acquire(c: &mut Criterion) {
    let coordinator = LockCoordinator::default();
    let mut group = c.benchmark_group("acquire");

    for size in [1usize, 4, 16, 64] {
        let distinct = accounts(size, i64::MAX);
        let distinct_targets: Vec<LockTarget> = distinct.iter().map(LockTarget::new).collect();
        group.bench_with_input(BenchmarkId::new("distinct", size), &size, |b, _| {
            b.iter(|| coordinator.acquire(black_box(&distinct_targets)).unwrap())
        });

        let tied = accounts(size, 4);
        let tied_targets: Vec<LockTarget> = tied.iter().map(LockTarget::new).collect();
        group.bench_with_input(BenchmarkId::new("tied", size), &size, |b, _| {
            b.iter(|| coordinator.acquire(black_box(&tied_targets)).unwrap())
        });
    }
    group.finish();
}

fn benchmark_lock_unlock(c: &mut Criterion) {
    let coordinator = LockCoordinator::default();
    let objects = accounts(8, 3);
    let targets: Vec<LockTarget> = objects.iter().map(LockTarget::new).collect();
    let chain = coordinator.acquire(&targets).unwrap();

    c.bench_function("chain_lock_unlock_uncontended", |b| {
        b.iter(|| {
            chain.lock();
            chain.unlock();
        })
    });

    c.bench_function("chain_scoped_guard", |b| {
        b.iter(|| drop(black_box(chain.lock_scoped())))
    });
}

fn benchmark_key_cache(c: &mut Criterion) {
    let cache = KeyCache::default();
    let parts: [&dyn Display; 3] = [&"Account", &42, &"eu"];

    c.bench_function("key_cache_hit", |b| b.iter(|| cache.key_of(black_box(&parts))));

    let mut next = 0u64;
    c.bench_function("key_cache_miss", |b| {
        b.iter(|| {
            next += 1;
            cache.key_of(&[&next])
        })
    });
}

criterion_group!(
    benches,
    benchmark_acquire,
    benchmark_lock_unlock,
    benchmark_key_cache
);
criterion_main!(benches);
