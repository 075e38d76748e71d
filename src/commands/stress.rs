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

use crate::config::ChainLockConfig;
use crate::error::{LockError, Result};
use crate::locking::{DomainId, Identity, LockCoordinator, LockTarget};
use comfy_table::{Cell, Table};
use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StressOptions {
    pub threads: usize,
    pub objects: usize,
    pub rounds: usize,
    pub set_size: usize,
    /// Objects whose ids are congruent modulo this value share an identity.
    pub tie_modulo: Option<u64>,
}

impl Default for StressOptions {
    fn default() -> Self {
        Self {
            threads: 8,
            objects: 16,
            rounds: 200,
            set_size: 3,
            tie_modulo: Some(4),
        }
    }
}

impl StressOptions {
    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(LockError::InvalidArgument(
                "--threads must be at least 1".to_string(),
            ));
        }
        if self.objects == 0 {
            return Err(LockError::InvalidArgument(
                "--objects must be at least 1".to_string(),
            ));
        }
        if self.set_size == 0 || self.set_size > self.objects {
            return Err(LockError::InvalidArgument(format!(
                "--set-size must be between 1 and {} (the object count)",
                self.objects
            )));
        }
        if self.tie_modulo == Some(0) {
            return Err(LockError::InvalidArgument(
                "--tie-modulo must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StressReport {
    pub acquisitions: usize,
    pub restarts: usize,
    pub max_restarts: usize,
    pub elapsed: Duration,
}

/// Shared object that flags concurrent access inside a critical section.
struct Slot {
    identity: Option<DomainId>,
    busy: AtomicBool,
}

impl Identity for Slot {
    fn identity(&self) -> Option<DomainId> {
        self.identity.clone()
    }
}

#[derive(Default)]
struct WorkerTally {
    acquisitions: usize,
    restarts: usize,
    max_restarts: usize,
}

pub struct StressCommand<'a> {
    config: &'a ChainLockConfig,
}

impl<'a> StressCommand<'a> {
    pub fn new(config: &'a ChainLockConfig) -> Result<Self> {
        Ok(Self { config })
    }

    pub fn execute(&self, options: &StressOptions) -> Result<()> {
        let coordinator = LockCoordinator::from_config(self.config);
        let report = run_stress(&coordinator, options)?;

        let mut table = Table::new();
        table.load_preset(comfy_table::presets::UTF8_BORDERS_ONLY);
        table.set_header(vec![Cell::new("Metric"), Cell::new("Value")]);
        table.add_row(vec![Cell::new("Threads"), Cell::new(options.threads)]);
        table.add_row(vec![Cell::new("Acquisitions"), Cell::new(report.acquisitions)]);
        table.add_row(vec![Cell::new("Restarts"), Cell::new(report.restarts)]);
        table.add_row(vec![
            Cell::new("Max restarts per acquisition"),
            Cell::new(report.max_restarts),
        ]);
        table.add_row(vec![
            Cell::new("Elapsed"),
            Cell::new(format!("{:.2?}", report.elapsed)),
        ]);
        println!("{table}");
        Ok(())
    }
}

/// Runs overlapping random lock sets from many threads and checks that no
/// object is ever entered by two threads at once.
pub fn run_stress(coordinator: &LockCoordinator, options: &StressOptions) -> Result<StressReport> {
    options.validate()?;

    let slots: Vec<Arc<Slot>> = (0..options.objects as u64)
        .map(|id| {
            let identity = match options.tie_modulo {
                Some(modulo) => id % modulo,
                None => id,
            };
            Arc::new(Slot {
                identity: Some(DomainId::from(identity)),
                busy: AtomicBool::new(false),
            })
        })
        .collect();

    log::info!(
        "Stress run: {} threads x {} rounds over {} objects",
        options.threads,
        options.rounds,
        options.objects
    );

    let started = Instant::now();
    let results: Vec<Result<WorkerTally>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..options.threads)
            .map(|_| scope.spawn(|| worker(coordinator, &slots, options)))
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle.join().unwrap_or_else(|payload| {
                    Err(LockError::WorkerPanicked(panic_message(payload.as_ref())))
                })
            })
            .collect()
    });

    let mut report = StressReport {
        acquisitions: 0,
        restarts: 0,
        max_restarts: 0,
        elapsed: started.elapsed(),
    };
    for result in results {
        let tally = result?;
        report.acquisitions += tally.acquisitions;
        report.restarts += tally.restarts;
        report.max_restarts = report.max_restarts.max(tally.max_restarts);
    }
    log::debug!("Stress run finished: {report:?}");
    Ok(report)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn worker(
    coordinator: &LockCoordinator,
    slots: &[Arc<Slot>],
    options: &StressOptions,
) -> Result<WorkerTally> {
    let mut rng = rand::thread_rng();
    let mut tally = WorkerTally::default();

    for _ in 0..options.rounds {
        let picks = rand::seq::index::sample(&mut rng, slots.len(), options.set_size).into_vec();
        let targets: Vec<LockTarget> = picks.iter().map(|&i| LockTarget::new(&slots[i])).collect();
        let chain = coordinator.acquire(&targets)?;

        let guard = chain.lock_scoped();
        let mut entered: Vec<usize> = Vec::with_capacity(picks.len());
        for &index in &picks {
            if slots[index].busy.swap(true, Ordering::SeqCst) {
                for &held in &entered {
                    slots[held].busy.store(false, Ordering::SeqCst);
                }
                return Err(LockError::ExclusionViolated(format!(
                    "object {index} was entered by two threads at once"
                )));
            }
            entered.push(index);
        }
        thread::yield_now();
        for &index in &entered {
            slots[index].busy.store(false, Ordering::SeqCst);
        }
        guard.release();

        let restarts = chain.restarts();
        tally.acquisitions += 1;
        tally.restarts += restarts;
        tally.max_restarts = tally.max_restarts.max(restarts);
    }
    Ok(tally)
}
