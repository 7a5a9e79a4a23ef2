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
use crate::sync::Spinlock;
use std::any::Any;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, Thread};
use std::time::Instant;

/// State shared between a worker, its OS thread and its handles.
struct Shared {
    name: String,
    settings: WorkerSettings,
    pending: Spinlock<Vec<(TaskId, Task)>>,
    active: Spinlock<Vec<ActiveTask>>,
    running: AtomicBool,
    thread: Spinlock<Option<Thread>>,
    next_id: AtomicU64,
    executed: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    failures: flume::Sender<TaskFailure>,
}

impl Shared {
    fn attach(&self, task: Task) -> TaskId {
        let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.pending.lock().push((id, task));
        if let Some(thread) = self.thread.lock().as_ref() {
            thread.unpark();
        }
        id
    }

    fn update_functions(&self) -> TickReport {
        let incoming = std::mem::take(&mut *self.pending.lock());
        let batch = {
            let mut active = self.active.lock();
            active.extend(
                incoming
                    .into_iter()
                    .map(|(id, task)| ActiveTask::new(id, task)),
            );
            std::mem::take(&mut *active)
        };

        let mut report = TickReport::default();
        let mut kept = Vec::with_capacity(batch.len());

        for mut entry in batch {
            if !entry.ready() {
                kept.push(entry);
                continue;
            }

            entry.executions += 1;
            report.executed += 1;
            self.executed.fetch_add(1, Ordering::Relaxed);

            let status = panic::catch_unwind(AssertUnwindSafe(|| (entry.task)()))
                .unwrap_or_else(|payload| {
                    TaskStatus::Error(format!("task panicked: {}", panic_message(&*payload)))
                });

            match status {
                TaskStatus::Done => {
                    report.completed += 1;
                    self.completed.fetch_add(1, Ordering::Relaxed);
                }
                TaskStatus::Running if entry.executions >= self.settings.max_task_ticks => {
                    report.failed += 1;
                    self.report_failure(
                        entry.id,
                        format!("still running after {} executions", entry.executions),
                    );
                }
                TaskStatus::Running => {
                    entry.back_off(self.settings.max_backoff_ticks);
                    kept.push(entry);
                }
                TaskStatus::Error(message) => {
                    report.failed += 1;
                    self.report_failure(entry.id, message);
                }
            }
        }

        report.remaining = kept.len();
        if !kept.is_empty() {
            self.active.lock().extend(kept);
        }
        report
    }

    fn report_failure(&self, task: TaskId, message: String) {
        log::warn!("[{}] task {task:?} failed: {message}", self.name);
        self.failed.fetch_add(1, Ordering::Relaxed);
        let _ = self.failures.send(TaskFailure {
            worker: self.name.clone(),
            task,
            message,
        });
    }

    fn has_work(&self) -> bool {
        !self.pending.lock().is_empty() || !self.active.lock().is_empty()
    }

    fn run(self: Arc<Self>) {
        log::debug!("[{}] worker thread started", self.name);
        if let Some(on_start) = &self.settings.on_start {
            on_start(&self.name);
        }
        while self.running.load(Ordering::Acquire) {
            let started = Instant::now();
            let report = self.update_functions();

            if let Some(budget) = self.settings.tick_budget {
                if let Some(rest) = budget.checked_sub(started.elapsed()) {
                    thread::sleep(rest);
                }
            } else if report.executed == 0 && !self.pending_nonempty() {
                // Nothing ran: either no tasks or all of them are cooling down.
                thread::park_timeout(self.settings.idle_sleep);
            }
        }
        if let Some(on_exit) = &self.settings.on_exit {
            on_exit(&self.name);
        }
        log::debug!("[{}] worker thread stopped", self.name);
    }

    fn pending_nonempty(&self) -> bool {
        !self.pending.lock().is_empty()
    }
}

/// Renders a panic payload caught by `catch_unwind` as text.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

/// A background execution context stepping loading tasks.
///
/// Tasks can be attached before or after [`start_thread`](Self::start_thread).
/// Without a started thread, [`update_functions`](Self::update_functions) can be
/// called manually to run one tick on the calling thread.
pub struct WorkerThread {
    shared: Arc<Shared>,
    failures: flume::Receiver<TaskFailure>,
    join: Option<JoinHandle<()>>,
}

impl WorkerThread {
    /// Creates a stopped worker with its own failure channel.
    pub fn new(name: impl Into<String>, settings: WorkerSettings) -> Self {
        let (sender, receiver) = flume::unbounded();
        Self::with_failure_channel(name, settings, sender, receiver)
    }

    pub(super) fn with_failure_channel(
        name: impl Into<String>,
        settings: WorkerSettings,
        sender: flume::Sender<TaskFailure>,
        receiver: flume::Receiver<TaskFailure>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                settings,
                pending: Spinlock::new(Vec::new()),
                active: Spinlock::new(Vec::new()),
                running: AtomicBool::new(false),
                thread: Spinlock::new(None),
                next_id: AtomicU64::new(0),
                executed: AtomicU64::new(0),
                completed: AtomicU64::new(0),
                failed: AtomicU64::new(0),
                failures: sender,
            }),
            failures: receiver,
            join: None,
        }
    }

    /// The worker's name, also used as the OS thread name.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Appends a task to the pending list. Callable from any thread.
    pub fn attach_function<F>(&self, task: F) -> TaskId
    where
        F: FnMut() -> TaskStatus + Send + 'static,
    {
        self.shared.attach(Box::new(task))
    }

    /// Returns a cloneable endpoint that attaches tasks to this worker.
    pub fn handle(&self) -> WorkerHandle {
        WorkerHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Runs one tick: moves pending tasks into the active list and executes
    /// every active task that is not cooling down, with no lock held.
    pub fn update_functions(&self) -> TickReport {
        self.shared.update_functions()
    }

    /// Spawns the OS thread. Does nothing if it is already running.
    pub fn start_thread(&mut self) -> io::Result<()> {
        if self.join.is_some() {
            log::warn!("[{}] start_thread called on a running worker", self.name());
            return Ok(());
        }

        self.shared.running.store(true, Ordering::Release);
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(self.shared.name.clone())
            .spawn(move || shared.run());

        match spawned {
            Ok(join) => {
                *self.shared.thread.lock() = Some(join.thread().clone());
                self.join = Some(join);
                Ok(())
            }
            Err(e) => {
                self.shared.running.store(false, Ordering::Release);
                Err(e)
            }
        }
    }

    /// Stops the OS thread after its in-flight tick and joins it.
    ///
    /// Tasks still queued stay queued and run again after a restart.
    pub fn kill_thread(&mut self) {
        let Some(join) = self.join.take() else {
            return;
        };
        self.shared.running.store(false, Ordering::Release);
        join.thread().unpark();
        if join.join().is_err() {
            log::error!("[{}] worker thread panicked outside a task", self.name());
        }
        *self.shared.thread.lock() = None;
    }

    /// Returns `true` while the OS thread is running.
    pub fn is_running(&self) -> bool {
        self.join.is_some()
    }

    /// Tasks attached but not yet moved into the active list.
    pub fn pending_count(&self) -> usize {
        self.shared.pending.lock().len()
    }

    /// Tasks in the active list. Tasks being executed right now are not counted.
    pub fn active_count(&self) -> usize {
        self.shared.active.lock().len()
    }

    /// Returns `true` if any task is pending or active.
    pub fn has_work(&self) -> bool {
        self.shared.has_work()
    }

    /// A snapshot of the worker's counters.
    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            executed: self.shared.executed.load(Ordering::Relaxed),
            completed: self.shared.completed.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
        }
    }

    /// Receives a [`TaskFailure`] for every task removed as failed.
    pub fn failures(&self) -> &flume::Receiver<TaskFailure> {
        &self.failures
    }
}

impl fmt::Debug for WorkerThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerThread")
            .field("name", &self.shared.name)
            .field("running", &self.is_running())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl Drop for WorkerThread {
    fn drop(&mut self) {
        self.kill_thread();
    }
}

/// A cloneable endpoint attaching tasks to one [`WorkerThread`].
#[derive(Clone)]
pub struct WorkerHandle {
    shared: Arc<Shared>,
}

impl WorkerHandle {
    /// Appends a task to the worker's pending list.
    pub fn attach_function<F>(&self, task: F) -> TaskId
    where
        F: FnMut() -> TaskStatus + Send + 'static,
    {
        self.shared.attach(Box::new(task))
    }

    /// The name of the target worker.
    pub fn worker_name(&self) -> &str {
        &self.shared.name
    }
}

impl fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("worker", &self.shared.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn settings() -> WorkerSettings {
        WorkerSettings {
            tick_budget: None,
            idle_sleep: Duration::from_micros(100),
            max_backoff_ticks: 0,
            max_task_ticks: 100,
            on_start: None,
            on_exit: None,
        }
    }

    #[test]
    fn done_running_and_error_statuses() {
        let worker = WorkerThread::new("test", settings());
        let steps = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&steps);
        worker.attach_function(move || {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                TaskStatus::Running
            } else {
                TaskStatus::Done
            }
        });
        worker.attach_function(|| TaskStatus::Error("bad header".to_string()));
        assert_eq!(worker.pending_count(), 2);

        let first = worker.update_functions();
        assert_eq!(first.executed, 2);
        assert_eq!(first.failed, 1);
        assert_eq!(first.remaining, 1);

        worker.update_functions();
        let last = worker.update_functions();
        assert_eq!(last.completed, 1);
        assert!(!worker.has_work());
        assert_eq!(steps.load(Ordering::SeqCst), 3);
        assert_eq!(
            worker.stats(),
            WorkerStats {
                executed: 4,
                completed: 1,
                failed: 1
            }
        );

        let failure = worker.failures().try_recv().unwrap();
        assert_eq!(failure.message, "bad header");
        assert_eq!(failure.worker, "test");
    }

    #[test]
    fn tasks_attached_during_a_tick_run_on_the_next_tick() {
        let worker = WorkerThread::new("chain", settings());
        let handle = worker.handle();
        let ran = Arc::new(AtomicUsize::new(0));

        let ran_outer = Arc::clone(&ran);
        worker.attach_function(move || {
            let ran_inner = Arc::clone(&ran_outer);
            handle.attach_function(move || {
                ran_inner.fetch_add(1, Ordering::SeqCst);
                TaskStatus::Done
            });
            TaskStatus::Done
        });

        worker.update_functions();
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(worker.pending_count(), 1);

        worker.update_functions();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_task_is_reported_and_the_worker_survives() {
        let worker = WorkerThread::new("panics", settings());
        worker.attach_function(|| panic!("decoder exploded"));
        worker.attach_function(|| TaskStatus::Done);

        let report = worker.update_functions();
        assert_eq!(report.failed, 1);
        assert_eq!(report.completed, 1);
        let failure = worker.failures().try_recv().unwrap();
        assert!(failure.message.contains("decoder exploded"));
    }

    #[test]
    fn running_task_is_dropped_after_its_execution_bound() {
        let worker = WorkerThread::new(
            "bounded",
            WorkerSettings {
                max_task_ticks: 3,
                ..settings()
            },
        );
        worker.attach_function(|| TaskStatus::Running);

        for _ in 0..3 {
            worker.update_functions();
        }
        assert!(!worker.has_work());
        assert_eq!(worker.stats().failed, 1);
        let failure = worker.failures().try_recv().unwrap();
        assert_eq!(failure.message, "still running after 3 executions");
    }

    #[test]
    fn running_tasks_back_off() {
        let worker = WorkerThread::new(
            "backoff",
            WorkerSettings {
                max_backoff_ticks: 4,
                ..settings()
            },
        );
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        worker.attach_function(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            TaskStatus::Running
        });

        // Cooldowns 0, 1, 2 give runs on ticks 1, 2, 4 and 7.
        for _ in 0..7 {
            worker.update_functions();
        }
        assert_eq!(runs.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn start_and_exit_hooks_run_on_the_worker_thread() {
        let seen: Arc<Spinlock<Vec<(&'static str, String, thread::ThreadId)>>> =
            Arc::new(Spinlock::new(Vec::new()));
        let on_start = Arc::clone(&seen);
        let on_exit = Arc::clone(&seen);
        let hooked = settings()
            .with_on_start(move |name| {
                on_start
                    .lock()
                    .push(("start", name.to_string(), thread::current().id()));
            })
            .with_on_exit(move |name| {
                on_exit
                    .lock()
                    .push(("exit", name.to_string(), thread::current().id()));
            });

        let mut worker = WorkerThread::new("hooked", hooked);
        // Manual ticks run no hook.
        worker.update_functions();
        assert!(seen.lock().is_empty());

        worker.start_thread().unwrap();
        let worker_thread = Arc::new(Spinlock::new(None));
        let sink = Arc::clone(&worker_thread);
        worker.attach_function(move || {
            *sink.lock() = Some(thread::current().id());
            TaskStatus::Done
        });
        let deadline = Instant::now() + Duration::from_secs(5);
        while worker.stats().completed == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        worker.kill_thread();

        let worker_id = worker_thread.lock().unwrap();
        assert_ne!(worker_id, thread::current().id());
        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], ("start", "hooked".to_string(), worker_id));
        assert_eq!(seen[1], ("exit", "hooked".to_string(), worker_id));
    }

    #[test]
    fn kill_waits_for_the_task_in_flight() {
        let mut worker = WorkerThread::new("inflight", settings());
        let entered = Arc::new(std::sync::Barrier::new(2));
        let finished = Arc::new(AtomicBool::new(false));

        let gate = Arc::clone(&entered);
        let flag = Arc::clone(&finished);
        worker.attach_function(move || {
            gate.wait();
            thread::sleep(Duration::from_millis(20));
            flag.store(true, Ordering::SeqCst);
            TaskStatus::Done
        });
        worker.start_thread().unwrap();

        // The task is mid-tick once the barrier releases.
        entered.wait();
        let killer = thread::spawn(move || {
            worker.kill_thread();
            worker
        });
        let worker = killer.join().unwrap();

        assert!(finished.load(Ordering::SeqCst));
        assert!(!worker.is_running());
        assert_eq!(worker.stats().completed, 1);
        assert!(!worker.has_work());
    }

    #[test]
    fn started_thread_drains_tasks_and_stops() {
        let mut worker = WorkerThread::new("threaded", settings());
        worker.start_thread().unwrap();
        assert!(worker.is_running());

        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..32 {
            let done = Arc::clone(&done);
            worker.attach_function(move || {
                done.fetch_add(1, Ordering::SeqCst);
                TaskStatus::Done
            });
        }

        let deadline = Instant::now() + Duration::from_secs(5);
        while done.load(Ordering::SeqCst) < 32 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        worker.kill_thread();

        assert!(!worker.is_running());
        assert_eq!(done.load(Ordering::SeqCst), 32);
        assert_eq!(worker.stats().completed, 32);
    }
}
