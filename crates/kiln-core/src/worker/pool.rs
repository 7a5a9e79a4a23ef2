// Copyright 2025 eraflo
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

use super::task::*;
use super::thread::{WorkerHandle, WorkerThread};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A fixed set of [`WorkerThread`]s fed round-robin.
#[derive(Debug)]
pub struct WorkerPool {
    workers: Vec<WorkerThread>,
    handle: PoolHandle,
    failures: flume::Receiver<TaskFailure>,
}

impl WorkerPool {
    /// Creates `count` stopped workers (at least one) named `{prefix}-{index}`.
    pub fn new(prefix: &str, count: usize, settings: WorkerSettings) -> Self {
        let (sender, receiver) = flume::unbounded();
        let workers: Vec<WorkerThread> = (0..count.max(1))
            .map(|index| {
                WorkerThread::with_failure_channel(
                    format!("{prefix}-{index}"),
                    settings.clone(),
                    sender.clone(),
                    receiver.clone(),
                )
            })
            .collect();
        let handle = PoolHandle {
            workers: workers.iter().map(WorkerThread::handle).collect(),
            next: Arc::new(AtomicUsize::new(0)),
        };
        Self {
            workers,
            handle,
            failures: receiver,
        }
    }

    /// Spawns every worker's OS thread.
    pub fn start(&mut self) -> io::Result<()> {
        for worker in &mut self.workers {
            worker.start_thread()?;
        }
        log::info!("Worker pool started with {} thread(s)", self.workers.len());
        Ok(())
    }

    /// Stops and joins every worker after its in-flight tick.
    pub fn kill(&mut self) {
        for worker in &mut self.workers {
            worker.kill_thread();
        }
    }

    /// Attaches a task to the next worker in round-robin order.
    pub fn attach_function<F>(&self, task: F) -> TaskId
    where
        F: FnMut() -> TaskStatus + Send + 'static,
    {
        self.handle.attach_function(task)
    }

    /// A cloneable round-robin attach endpoint.
    pub fn handle(&self) -> PoolHandle {
        self.handle.clone()
    }

    /// Runs one tick of every worker on the calling thread.
    ///
    /// Meant for pools whose threads were never started.
    pub fn update_all(&self) -> TickReport {
        self.workers
            .iter()
            .map(WorkerThread::update_functions)
            .fold(TickReport::default(), |acc, r| TickReport {
                executed: acc.executed + r.executed,
                completed: acc.completed + r.completed,
                failed: acc.failed + r.failed,
                remaining: acc.remaining + r.remaining,
            })
    }

    /// The workers of the pool.
    pub fn workers(&self) -> &[WorkerThread] {
        &self.workers
    }

    /// Returns `true` if any worker has pending or active tasks.
    pub fn has_work(&self) -> bool {
        self.workers.iter().any(WorkerThread::has_work)
    }

    /// Counters summed over every worker.
    pub fn stats(&self) -> WorkerStats {
        self.workers
            .iter()
            .map(WorkerThread::stats)
            .fold(WorkerStats::default(), |acc, s| acc + s)
    }

    /// Receives failures from every worker of the pool.
    pub fn failures(&self) -> &flume::Receiver<TaskFailure> {
        &self.failures
    }
}

/// Cloneable round-robin endpoint of a [`WorkerPool`].
#[derive(Debug, Clone)]
pub struct PoolHandle {
    workers: Arc<[WorkerHandle]>,
    next: Arc<AtomicUsize>,
}

impl PoolHandle {
    /// Attaches a task to the next worker in round-robin order.
    pub fn attach_function<F>(&self, task: F) -> TaskId
    where
        F: FnMut() -> TaskStatus + Send + 'static,
    {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.workers.len();
        self.workers[index].attach_function(task)
    }
}
