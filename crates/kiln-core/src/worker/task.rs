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

use crate::config::LoaderConfig;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// The outcome of one execution of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// The task finished and is removed.
    Done,
    /// The task wants to be stepped again on a later tick.
    Running,
    /// The task failed and is removed. The message is reported.
    Error(String),
}

/// A unit of work executed by a worker thread.
pub type Task = Box<dyn FnMut() -> TaskStatus + Send + 'static>;

/// Identifies a task within the worker it was attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

/// A task that was removed because it failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    /// Name of the worker that ran the task.
    pub worker: String,
    /// The failed task.
    pub task: TaskId,
    /// What went wrong: the task's own message, a panic payload or the
    /// execution bound that was exceeded.
    pub message: String,
}

/// Counters of a worker, or the sum over a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkerStats {
    /// Task executions, including executions that returned `Running`.
    pub executed: u64,
    /// Tasks that returned `Done`.
    pub completed: u64,
    /// Tasks that failed, panicked or exceeded their execution bound.
    pub failed: u64,
}

impl std::ops::Add for WorkerStats {
    type Output = WorkerStats;

    fn add(self, rhs: WorkerStats) -> WorkerStats {
        WorkerStats {
            executed: self.executed + rhs.executed,
            completed: self.completed + rhs.completed,
            failed: self.failed + rhs.failed,
        }
    }
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    /// Tasks executed this tick.
    pub executed: usize,
    /// Tasks that finished this tick.
    pub completed: usize,
    /// Tasks removed as failed this tick.
    pub failed: usize,
    /// Tasks kept in the active list for a later tick.
    pub remaining: usize,
}

/// A function run on a worker's own thread, given the worker's name.
pub type WorkerHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Scheduling parameters of a worker thread.
#[derive(Clone)]
pub struct WorkerSettings {
    /// Minimum duration of a tick. The thread sleeps the remainder.
    pub tick_budget: Option<Duration>,
    /// How long an idle thread parks before checking its queues again.
    pub idle_sleep: Duration,
    /// Cap of the cooldown, in skipped ticks, of a task that keeps running.
    pub max_backoff_ticks: u32,
    /// Executions after which a still-running task is dropped.
    pub max_task_ticks: u32,
    /// Runs on the spawned thread before its first tick.
    pub on_start: Option<WorkerHook>,
    /// Runs on the spawned thread after its last tick.
    pub on_exit: Option<WorkerHook>,
}

impl fmt::Debug for WorkerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerSettings")
            .field("tick_budget", &self.tick_budget)
            .field("idle_sleep", &self.idle_sleep)
            .field("max_backoff_ticks", &self.max_backoff_ticks)
            .field("max_task_ticks", &self.max_task_ticks)
            .field("on_start", &self.on_start.is_some())
            .field("on_exit", &self.on_exit.is_some())
            .finish()
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self::from_config(&LoaderConfig::default())
    }
}

impl WorkerSettings {
    /// Derives worker settings from the loader configuration.
    pub fn from_config(config: &LoaderConfig) -> Self {
        Self {
            tick_budget: config.worker_tick_budget(),
            idle_sleep: config.idle_sleep(),
            max_backoff_ticks: config.max_backoff_ticks,
            max_task_ticks: config.max_task_ticks.max(1),
            on_start: None,
            on_exit: None,
        }
    }

    /// Sets the hook run when a worker thread starts.
    pub fn with_on_start(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_start = Some(Arc::new(hook));
        self
    }

    /// Sets the hook run when a worker thread stops.
    pub fn with_on_exit(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_exit = Some(Arc::new(hook));
        self
    }
}

/// A task in the active list with its scheduling state.
pub(super) struct ActiveTask {
    pub(super) id: TaskId,
    pub(super) task: Task,
    pub(super) executions: u32,
    cooldown: u32,
    next_backoff: u32,
}

impl ActiveTask {
    pub(super) fn new(id: TaskId, task: Task) -> Self {
        Self {
            id,
            task,
            executions: 0,
            cooldown: 0,
            next_backoff: 0,
        }
    }

    /// Consumes one tick of cooldown. Returns `true` if the task may run now.
    pub(super) fn ready(&mut self) -> bool {
        if self.cooldown == 0 {
            true
        } else {
            self.cooldown -= 1;
            false
        }
    }

    /// Schedules the next run after a `Running` result: 0, 1, 2, 4 ... skipped
    /// ticks, capped at `max`.
    pub(super) fn back_off(&mut self, max: u32) {
        self.cooldown = self.next_backoff;
        self.next_backoff = if self.next_backoff == 0 {
            1
        } else {
            self.next_backoff.saturating_mul(2)
        }
        .min(max);
    }
}
