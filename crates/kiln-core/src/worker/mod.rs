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

//! Background execution contexts for loading tasks.
//!
//! A [`WorkerThread`] owns two task lists, each behind its own
//! [`Spinlock`](crate::sync::Spinlock):
//!
//! - the *pending* list, which any thread appends to through
//!   [`WorkerThread::attach_function`] or a cloned [`WorkerHandle`];
//! - the *active* list, which the worker swaps the pending tasks into at the
//!   start of every tick.
//!
//! Tasks run with no lock held. A task may therefore attach follow-up tasks to
//! its own worker; they are picked up on the next tick.
//!
//! Every task returns a [`TaskStatus`]. Tasks that keep reporting
//! [`TaskStatus::Running`] are stepped again on later ticks with an exponential
//! cooldown, and are dropped and reported once they exceed the configured
//! execution bound. [`WorkerPool`] spreads tasks over several workers.

mod pool;
mod task;
mod thread;

pub use self::pool::{PoolHandle, WorkerPool};
pub use self::task::*;
pub use self::thread::{panic_message, WorkerHandle, WorkerThread};
