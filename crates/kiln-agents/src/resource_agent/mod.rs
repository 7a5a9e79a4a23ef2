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

//! Acts as the **[A]gent** for resource loading.
//!
//! The [`ResourceAgent`] is the resource manager: it owns the path table,
//! hands out [`ResourcePointer`]s, attaches decode tasks to the worker pool
//! and, on the owning thread, finalizes, fences and promotes the results.

mod agent;
mod event;
mod handle;

pub use agent::{
    ResetCallback, ResetPhase, ResetToken, ResourceAgent, UpdateReport, WorkerMode,
};
pub use event::ResourceEvent;
pub use handle::{ResourceHandle, ResourcePointer, UsableCallback};
